use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain;
use crate::error::CaseError;
use crate::fs_util;

pub const MANIFEST_FILE: &str = "manifest.toml";

static VERSION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<stem>.+?)_v(?P<version>\d+)$").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits: Option<Credits>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub maintainers: Vec<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Manifest {
    pub fn formats(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter(|entry| seen.insert(entry.format.as_str()))
            .map(|entry| entry.format.clone())
            .collect()
    }

    pub fn variants(&self, format: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.files
            .iter()
            .filter(|entry| entry.format == format)
            .filter_map(|entry| entry.variant.as_deref())
            .filter(|variant| !variant.is_empty() && seen.insert(*variant))
            .map(str::to_string)
            .collect()
    }

    /// Entry matching `format` and `variant` exactly (no variant matches only
    /// variant-less entries), and `version` when one is given. Among several
    /// candidates the one marked default wins.
    pub fn file_entry(
        &self,
        format: &str,
        version: Option<&str>,
        variant: Option<&str>,
    ) -> Option<&FileEntry> {
        let mut candidates = self.files.iter().filter(|entry| {
            entry.format == format
                && entry.variant.as_deref() == variant
                && version.is_none_or(|v| entry.format_version.as_deref() == Some(v))
        });
        let first = candidates.next()?;
        if first.default {
            return Some(first);
        }
        Some(candidates.find(|entry| entry.default).unwrap_or(first))
    }

    pub fn default_file(&self, format: &str) -> Option<&FileEntry> {
        self.files
            .iter()
            .find(|entry| entry.format == format && entry.default)
            .or_else(|| self.files.iter().find(|entry| entry.format == format))
    }

    fn validate(&self, path: &Utf8Path) -> Result<(), CaseError> {
        let mut defaults = HashSet::new();
        for entry in &self.files {
            let entry_path = Utf8Path::new(&entry.path);
            if entry.path.is_empty()
                || entry_path.is_absolute()
                || entry.path.starts_with('/')
                || entry.path.split(['/', '\\']).any(|part| part == "..")
            {
                return Err(CaseError::manifest(
                    path,
                    format!("file path '{}' must be relative to the case directory", entry.path),
                ));
            }
            if entry.format.is_empty() {
                return Err(CaseError::manifest(
                    path,
                    format!("file '{}' has no format", entry.path),
                ));
            }
            if entry.default {
                let key = (
                    entry.format.as_str(),
                    entry.variant.as_deref(),
                    entry.format_version.as_deref(),
                );
                if !defaults.insert(key) {
                    return Err(CaseError::manifest(
                        path,
                        format!(
                            "more than one default file for format '{}' (variant {:?}, version {:?})",
                            entry.format, entry.variant, entry.format_version
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

pub fn parse_manifest(path: &Utf8Path) -> Result<Manifest, CaseError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| CaseError::manifest(path, err.to_string()))?;
    let manifest: Manifest =
        toml::from_str(&content).map_err(|err| CaseError::manifest(path, err.to_string()))?;
    manifest.validate(path)?;
    Ok(manifest)
}

pub fn infer_manifest(dir: &Utf8Path) -> Result<Manifest, CaseError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| CaseError::manifest(dir, err.to_string()))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| CaseError::manifest(dir, err.to_string()))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || !entry.path().is_file() {
            continue;
        }
        names.push(name);
    }
    names.sort();

    let case_name = dir.file_name().unwrap_or_default();
    let mut files: Vec<FileEntry> = Vec::new();
    for name in names {
        let file = Utf8Path::new(&name);
        let Some(format) = file.extension().and_then(domain::format_for_extension) else {
            continue;
        };
        let stem = file.file_stem().unwrap_or_default();
        let (base, version) = match VERSION_SUFFIX.captures(stem) {
            Some(caps) => (
                caps["stem"].to_string(),
                Some(caps["version"].to_string()),
            ),
            None => (stem.to_string(), None),
        };
        let variant = if base == case_name {
            None
        } else {
            Some(
                base.strip_prefix(&format!("{case_name}_"))
                    .unwrap_or(&base)
                    .to_string(),
            )
        };
        files.push(FileEntry {
            path: name.clone(),
            format: format.to_string(),
            format_version: version,
            variant,
            default: false,
            includes: Vec::new(),
        });
    }

    if files.is_empty() {
        return Err(CaseError::manifest(dir, "no recognized case files to infer a manifest from"));
    }

    mark_inferred_defaults(&mut files);
    Ok(Manifest {
        name: Some(case_name.to_string()),
        files,
        ..Manifest::default()
    })
}

// One default per format: the variant-less file, else the first listed.
// A lone file of its format is the base file, so its variant is dropped.
fn mark_inferred_defaults(files: &mut [FileEntry]) {
    let formats = files
        .iter()
        .map(|entry| entry.format.clone())
        .collect::<Vec<_>>();
    let mut done = HashSet::new();
    for format in formats {
        if !done.insert(format.clone()) {
            continue;
        }
        let indices = files
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.format == format)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        if let [only] = indices.as_slice() {
            files[*only].variant = None;
            files[*only].default = true;
            continue;
        }
        let chosen = indices
            .iter()
            .copied()
            .find(|idx| files[*idx].variant.is_none())
            .or_else(|| indices.first().copied());
        if let Some(idx) = chosen {
            files[idx].default = true;
        }
    }
}

pub fn load_manifest(dir: &Utf8Path) -> Result<Manifest, CaseError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.as_std_path().is_file() {
        parse_manifest(&manifest_path)
    } else {
        infer_manifest(dir)
    }
}

pub fn create_manifest(dir: &Utf8Path) -> Result<Utf8PathBuf, CaseError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.as_std_path().exists() {
        return Err(CaseError::AlreadyExists(manifest_path));
    }
    let manifest = infer_manifest(dir)?;
    let content = toml::to_string_pretty(&manifest)
        .map_err(|err| CaseError::manifest(&manifest_path, err.to_string()))?;
    fs_util::write_bytes_atomic(&manifest_path, content.as_bytes())?;
    Ok(manifest_path)
}
