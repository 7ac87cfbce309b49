//! Turns a case name or path into exactly one [`CaseBundle`].
//!
//! Lookup order for a request string:
//!
//! 1. an existing local directory is loaded as-is;
//! 2. `collection/case` is joined onto the bundled root, then tried as a
//!    remote name;
//! 3. a bare name is searched in every bundled collection (plus the legacy
//!    flat top level) and in the remote registry. Exactly one hit is loaded;
//!    several hits are an [`CaseError::AmbiguousCase`], never a guess.
//!
//! Because of step 3, a bare name fails with [`CaseError::RegistryHttp`]
//! when a registry is configured but unreachable and no index snapshot is
//! cached, even if the case is bundled. The qualified form does not consult
//! the registry for bundled cases.

use std::collections::HashMap;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use crate::bundle::CaseBundle;
use crate::cache::Cache;
use crate::domain::{self, CaseRef, ROOT_COLLECTION, SourceKind};
use crate::error::CaseError;
use crate::fs_util;
use crate::manifest::{self, MANIFEST_FILE};
use crate::registry::RegistryClient;
use crate::safety;

pub const CASES_DIR_ENV: &str = "POWERFULCASES_CASES_DIR";

pub const COLLECTION_FILE: &str = "collection.toml";

const UNKNOWN_SAMPLE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub source: SourceKind,
    pub collection: String,
    pub location: MatchLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchLocation {
    Dir(Utf8PathBuf),
    Remote(String),
}

impl Match {
    pub fn label(&self) -> String {
        format!("{}:{}", self.source, self.collection)
    }
}

pub struct Resolver<R: RegistryClient> {
    cases_dir: Utf8PathBuf,
    cache: Cache,
    registry: R,
}

impl<R: RegistryClient> Resolver<R> {
    pub fn new(cases_dir: impl Into<Utf8PathBuf>, cache: Cache, registry: R) -> Self {
        Self {
            cases_dir: cases_dir.into(),
            cache,
            registry,
        }
    }

    pub fn cases_dir(&self) -> &Utf8Path {
        &self.cases_dir
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn resolve(&self, name_or_path: &str) -> Result<CaseBundle, CaseError> {
        let path = Path::new(name_or_path);
        if path.is_dir() {
            return self.load_local(path);
        }

        match name_or_path.parse::<CaseRef>()? {
            CaseRef::Qualified(parts) => self.resolve_qualified(&parts),
            CaseRef::Bare(name) => self.resolve_bare(&name),
        }
    }

    fn resolve_qualified(&self, parts: &[String]) -> Result<CaseBundle, CaseError> {
        let joined = parts.join("/");
        let mut dir = self.cases_dir.clone();
        for part in parts {
            dir.push(part);
        }

        if dir.as_std_path().is_dir()
            && safety::is_safe_subpath(dir.as_std_path(), self.cases_dir.as_std_path())
        {
            let name = parts.last().map(String::as_str).unwrap_or(&joined);
            let collection = self.bundled_collection(&dir);
            return self.load_dir(name, &dir, false, collection);
        }

        if self.registry.is_remote(&joined)? {
            return self.load_remote(&joined);
        }

        Err(CaseError::UnknownCase {
            name: joined,
            available: self.available_sample(),
        })
    }

    fn resolve_bare(&self, name: &str) -> Result<CaseBundle, CaseError> {
        let mut matches = self.find_matches(name)?;
        tracing::debug!(case = name, matches = matches.len(), "searched all sources");

        if matches.len() > 1 {
            return Err(CaseError::AmbiguousCase {
                name: name.to_string(),
                sources: matches.iter().map(Match::label).collect(),
            });
        }
        let Some(found) = matches.pop() else {
            return Err(CaseError::UnknownCase {
                name: name.to_string(),
                available: self.available_sample(),
            });
        };

        match found.location {
            MatchLocation::Dir(dir) => {
                let collection =
                    (found.collection != ROOT_COLLECTION).then_some(found.collection);
                self.load_dir(name, &dir, false, collection)
            }
            MatchLocation::Remote(remote) => self.load_remote(&remote),
        }
    }

    pub fn find_matches(&self, name: &str) -> Result<Vec<Match>, CaseError> {
        safety::validate_component(name)?;
        let mut matches = Vec::new();

        if self.cases_dir.as_std_path().is_dir() {
            let top_level = self.cases_dir.join(name);
            if top_level.as_std_path().is_dir()
                && safety::is_safe_subpath(top_level.as_std_path(), self.cases_dir.as_std_path())
            {
                matches.push(Match {
                    source: SourceKind::Bundled,
                    collection: ROOT_COLLECTION.to_string(),
                    location: MatchLocation::Dir(top_level),
                });
            }

            for (collection, collection_dir) in self.collection_dirs()? {
                let candidate = collection_dir.join(name);
                if candidate.as_std_path().is_dir()
                    && safety::is_safe_subpath(
                        candidate.as_std_path(),
                        collection_dir.as_std_path(),
                    )
                {
                    matches.push(Match {
                        source: SourceKind::Bundled,
                        collection,
                        location: MatchLocation::Dir(candidate),
                    });
                }
            }
        }

        let remotes = self.registry.list_remote().map_err(|err| match err {
            CaseError::RegistryHttp(message) => CaseError::RegistryHttp(format!(
                "{message}. A bare name is checked against the registry too; \
                 use 'collection/case' to load a bundled case offline"
            )),
            other => other,
        })?;
        for remote in remotes {
            let (collection, case) = domain::split_qualified(&remote);
            if case == name {
                matches.push(Match {
                    source: SourceKind::Remote,
                    collection: collection.unwrap_or(ROOT_COLLECTION).to_string(),
                    location: MatchLocation::Remote(remote.clone()),
                });
            }
        }

        Ok(matches)
    }

    pub fn remote_name(&self, name: &str) -> Result<String, CaseError> {
        let remotes = self.registry.list_remote()?;
        if remotes.iter().any(|remote| remote == name) {
            return Ok(name.to_string());
        }
        safety::validate_component(name)?;
        let mut hits = remotes
            .into_iter()
            .filter(|remote| domain::split_qualified(remote).1 == name)
            .collect::<Vec<_>>();
        match hits.len() {
            0 => Err(CaseError::UnknownCase {
                name: name.to_string(),
                available: self.registry.list_remote()?.into_iter().take(UNKNOWN_SAMPLE).collect(),
            }),
            1 => Ok(hits.remove(0)),
            _ => Err(CaseError::AmbiguousCase {
                name: name.to_string(),
                sources: hits
                    .iter()
                    .map(|remote| {
                        let collection = domain::split_qualified(remote).0;
                        format!("{}:{}", SourceKind::Remote, collection.unwrap_or(ROOT_COLLECTION))
                    })
                    .collect(),
            }),
        }
    }

    /// Sorted, de-duplicated case names across bundled, remote and cached
    /// sources, optionally narrowed to one collection and/or tag. A bundled
    /// case belongs to the directory it sits in, whatever its manifest
    /// declares. When a name shows up in several sources the first one seen
    /// supplies its collection and tags.
    pub fn list_cases(
        &self,
        collection: Option<&str>,
        tag: Option<&str>,
    ) -> Result<Vec<String>, CaseError> {
        let mut found: HashMap<String, (Option<String>, Vec<String>)> = HashMap::new();

        if self.cases_dir.as_std_path().is_dir() {
            self.scan_manifests(&mut found)?;
            for (collection_name, collection_dir) in self.collection_dirs()? {
                if collection_dir.join(MANIFEST_FILE).as_std_path().is_file() {
                    continue;
                }
                for (case, _) in subdirs(&collection_dir)? {
                    found
                        .entry(case)
                        .or_insert_with(|| (Some(collection_name.clone()), Vec::new()));
                }
            }
        }

        for remote in self.registry.list_remote()? {
            let (remote_collection, case) = domain::split_qualified(&remote);
            found
                .entry(case.to_string())
                .or_insert_with(|| (remote_collection.map(str::to_string), Vec::new()));
        }

        for cached in self.cache.list_cached()? {
            let (cached_collection, case) = domain::split_qualified(&cached);
            found
                .entry(case.to_string())
                .or_insert_with(|| (cached_collection.map(str::to_string), Vec::new()));
        }

        let mut names = found
            .into_iter()
            .filter(|(_, (case_collection, _))| {
                collection.is_none_or(|wanted| case_collection.as_deref() == Some(wanted))
            })
            .filter(|(_, (_, tags))| tag.is_none_or(|wanted| tags.iter().any(|t| t == wanted)))
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }

    pub fn list_collections(&self) -> Result<Vec<String>, CaseError> {
        if !self.cases_dir.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let mut collections = Vec::new();
        for (name, dir) in self.collection_dirs()? {
            if dir.join(COLLECTION_FILE).as_std_path().is_file() || !subdirs(&dir)?.is_empty() {
                collections.push(name);
            }
        }
        Ok(collections)
    }

    fn scan_manifests(
        &self,
        found: &mut HashMap<String, (Option<String>, Vec<String>)>,
    ) -> Result<(), CaseError> {
        let walker = WalkDir::new(self.cases_dir.as_std_path())
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
            });
        for entry in walker {
            let entry = entry.map_err(|err| CaseError::Filesystem(err.to_string()))?;
            if !entry.file_type().is_file() || entry.file_name() != MANIFEST_FILE {
                continue;
            }
            let manifest_path = fs_util::utf8(entry.into_path())?;
            let Some(case_dir) = manifest_path.parent() else {
                continue;
            };
            let Some(case_name) = case_dir.file_name() else {
                continue;
            };
            if case_dir == self.cases_dir.as_path() {
                continue;
            }
            let dir_collection = case_dir
                .parent()
                .filter(|parent| *parent != self.cases_dir.as_path())
                .and_then(Utf8Path::file_name)
                .map(str::to_string);
            let tags = match manifest::parse_manifest(&manifest_path) {
                Ok(parsed) => parsed.tags,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping tags of unreadable manifest");
                    Vec::new()
                }
            };
            found
                .entry(case_name.to_string())
                .or_insert((dir_collection, tags));
        }
        Ok(())
    }

    fn collection_dirs(&self) -> Result<Vec<(String, Utf8PathBuf)>, CaseError> {
        subdirs(&self.cases_dir)
    }

    fn bundled_collection(&self, case_dir: &Utf8Path) -> Option<String> {
        case_dir
            .parent()
            .filter(|parent| *parent != self.cases_dir.as_path())
            .and_then(Utf8Path::file_name)
            .map(str::to_string)
    }

    fn available_sample(&self) -> Vec<String> {
        match self.list_cases(None, None) {
            Ok(mut names) => {
                names.truncate(UNKNOWN_SAMPLE);
                names
            }
            Err(err) => {
                tracing::debug!(error = %err, "could not list cases for error message");
                Vec::new()
            }
        }
    }

    fn load_local(&self, path: &Path) -> Result<CaseBundle, CaseError> {
        let dir = canonical(path)?;
        let name = dir
            .file_name()
            .ok_or_else(|| CaseError::InvalidPath(format!("{dir} has no directory name")))?
            .to_string();
        let manifest = manifest::load_manifest(&dir)?;
        Ok(CaseBundle::new(name, dir, manifest, false, None))
    }

    fn load_dir(
        &self,
        name: &str,
        dir: &Utf8Path,
        is_remote: bool,
        collection: Option<String>,
    ) -> Result<CaseBundle, CaseError> {
        let dir = canonical(dir.as_std_path())?;
        let manifest = manifest::load_manifest(&dir)?;
        tracing::debug!(case = name, dir = %dir, is_remote, "loaded case");
        Ok(CaseBundle::new(name, dir, manifest, is_remote, collection))
    }

    fn load_remote(&self, remote: &str) -> Result<CaseBundle, CaseError> {
        if !self.cache.is_cached(remote)? {
            self.registry.download(remote, &self.cache, false)?;
        }
        let dir = self.cache.cached_dir(remote)?;
        let (collection, name) = domain::split_qualified(remote);
        self.load_dir(name, &dir, true, collection.map(str::to_string))
    }
}

fn subdirs(dir: &Utf8Path) -> Result<Vec<(String, Utf8PathBuf)>, CaseError> {
    fs_util::visible_subdirs(dir).map_err(|err| CaseError::Filesystem(err.to_string()))
}

fn canonical(path: &Path) -> Result<Utf8PathBuf, CaseError> {
    let resolved = path
        .canonicalize()
        .map_err(|err| CaseError::Filesystem(format!("{}: {err}", path.display())))?;
    fs_util::utf8(resolved)
}
