use std::fs;
use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

use camino::Utf8PathBuf;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::cache::Cache;
use crate::domain;
use crate::error::CaseError;
use crate::fs_util;

pub const REGISTRY_URL_ENV: &str = "POWERFULCASES_REGISTRY_URL";

const INDEX_FILE: &str = "index.json";
const INDEX_SNAPSHOT: &str = ".registry-index.json";

pub trait RegistryClient {
    fn list_remote(&self) -> Result<Vec<String>, CaseError>;

    fn download(&self, name: &str, cache: &Cache, force: bool) -> Result<Utf8PathBuf, CaseError>;

    fn is_remote(&self, name: &str) -> Result<bool, CaseError> {
        Ok(self.list_remote()?.iter().any(|remote| remote == name))
    }
}

impl<R: RegistryClient + ?Sized> RegistryClient for Box<R> {
    fn list_remote(&self) -> Result<Vec<String>, CaseError> {
        (**self).list_remote()
    }

    fn download(&self, name: &str, cache: &Cache, force: bool) -> Result<Utf8PathBuf, CaseError> {
        (**self).download(name, cache, force)
    }

    fn is_remote(&self, name: &str) -> Result<bool, CaseError> {
        (**self).is_remote(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegistry;

impl RegistryClient for NoRegistry {
    fn list_remote(&self) -> Result<Vec<String>, CaseError> {
        Ok(Vec::new())
    }

    fn download(&self, name: &str, _cache: &Cache, _force: bool) -> Result<Utf8PathBuf, CaseError> {
        Err(CaseError::UnknownCase {
            name: name.to_string(),
            available: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryIndex {
    pub cases: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub archive: String,
}

impl RegistryIndex {
    pub fn find(&self, name: &str) -> Option<&RegistryEntry> {
        self.cases.iter().find(|entry| entry.name == name)
    }
}

pub struct HttpRegistry {
    client: Client,
    base_url: String,
    cache: Cache,
    index: OnceLock<RegistryIndex>,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>, cache: Cache) -> Result<Self, CaseError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("pcase/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CaseError::RegistryHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|err| CaseError::RegistryHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache,
            index: OnceLock::new(),
        })
    }

    fn url(&self, relative: &str) -> String {
        format!("{}/{}", self.base_url, relative.trim_start_matches('/'))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, CaseError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| CaseError::RegistryHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "registry request failed".to_string());
            return Err(CaseError::RegistryStatus { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| CaseError::RegistryHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    /// Registry index, fetched once per process. A network failure falls
    /// back to the last snapshot stored in the cache root.
    pub fn index(&self) -> Result<&RegistryIndex, CaseError> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let index = match self.fetch_index() {
            Ok(index) => index,
            Err(err) => match self.read_snapshot()? {
                Some(index) => {
                    tracing::warn!(error = %err, "registry unreachable, using cached index");
                    index
                }
                None => return Err(err),
            },
        };
        Ok(self.index.get_or_init(|| index))
    }

    fn fetch_index(&self) -> Result<RegistryIndex, CaseError> {
        let bytes = self.get(&self.url(INDEX_FILE))?;
        let index: RegistryIndex = serde_json::from_slice(&bytes)
            .map_err(|err| CaseError::RegistryHttp(format!("invalid registry index: {err}")))?;
        let root = self.cache.ensure_root()?;
        fs_util::write_bytes_atomic(&root.join(INDEX_SNAPSHOT), &bytes)?;
        Ok(index)
    }

    fn read_snapshot(&self) -> Result<Option<RegistryIndex>, CaseError> {
        let path = self.cache.root()?.join(INDEX_SNAPSHOT);
        if !path.as_std_path().is_file() {
            return Ok(None);
        }
        let content = fs::read(path.as_std_path()).map_err(|err| CaseError::Cache(err.to_string()))?;
        Ok(serde_json::from_slice(&content).ok())
    }
}

impl RegistryClient for HttpRegistry {
    fn list_remote(&self) -> Result<Vec<String>, CaseError> {
        Ok(self
            .index()?
            .cases
            .iter()
            .map(|entry| entry.name.clone())
            .collect())
    }

    fn download(&self, name: &str, cache: &Cache, force: bool) -> Result<Utf8PathBuf, CaseError> {
        if !force && cache.is_cached(name)? {
            return cache.cached_dir(name);
        }
        let entry = self
            .index()?
            .find(name)
            .cloned()
            .ok_or_else(|| CaseError::UnknownCase {
                name: name.to_string(),
                available: Vec::new(),
            })?;

        let url = self.url(&entry.archive);
        tracing::info!(case = name, url = %url, "downloading remote case");
        let bytes = self.get(&url)?;

        let staging = cache.staging_dir()?;
        let archive_path = staging.path().join("case.zip");
        let mut archive =
            fs::File::create(&archive_path).map_err(|err| CaseError::Cache(err.to_string()))?;
        archive
            .write_all(&bytes)
            .map_err(|err| CaseError::Cache(err.to_string()))?;
        drop(archive);

        let extracted = staging.path().join("case");
        fs::create_dir_all(&extracted).map_err(|err| CaseError::Cache(err.to_string()))?;
        let files = fs_util::extract_zip(&archive_path, &extracted)?;
        let content_root = fs_util::utf8(single_top_dir(&extracted, name)?)?;

        let dir = cache.install(&content_root, name)?;
        tracing::info!(case = name, files, dir = %dir, "cached remote case");
        Ok(dir)
    }
}

// Archives usually wrap the case in one folder named after it.
fn single_top_dir(
    extracted: &std::path::Path,
    name: &str,
) -> Result<std::path::PathBuf, CaseError> {
    let entries = fs::read_dir(extracted)
        .map_err(|err| CaseError::Cache(err.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| CaseError::Cache(err.to_string()))?;
    let (_, case) = domain::split_qualified(name);
    if let [only] = entries.as_slice() {
        if only.path().is_dir() && only.file_name().to_string_lossy() == case {
            return Ok(only.path());
        }
    }
    Ok(extracted.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_lookup_by_full_name() {
        let index: RegistryIndex = serde_json::from_str(
            r#"{"cases":[{"name":"synthetic/ACTIVSg2000","archive":"synthetic/ACTIVSg2000.zip"}]}"#,
        )
        .unwrap();
        assert!(index.find("synthetic/ACTIVSg2000").is_some());
        assert!(index.find("ACTIVSg2000").is_none());
    }

    #[test]
    fn snapshot_used_when_registry_unreachable() {
        let temp = tempfile::tempdir().unwrap();
        let root = fs_util::utf8(temp.path().to_path_buf()).unwrap();
        fs::write(
            root.join(INDEX_SNAPSHOT).as_std_path(),
            r#"{"cases":[{"name":"case5","archive":"case5.zip"}]}"#,
        )
        .unwrap();
        let registry = HttpRegistry::new("http://127.0.0.1:9", Cache::at(root)).unwrap();

        assert_eq!(registry.list_remote().unwrap(), vec!["case5".to_string()]);
        assert!(registry.is_remote("case5").unwrap());
    }

    #[test]
    fn extracted_archive_is_installed_under_its_name() {
        let temp = tempfile::tempdir().unwrap();
        let root = fs_util::utf8(temp.path().to_path_buf()).unwrap();
        let cache = Cache::at(root.join("cache"));
        let staging = cache.staging_dir().unwrap();

        let archive_path = staging.path().join("case.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&archive_path).unwrap());
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        writer.start_file("case9/case9.m", options).unwrap();
        writer.write_all(b"mpc").unwrap();
        writer.finish().unwrap();

        let extracted = staging.path().join("case");
        fs::create_dir_all(&extracted).unwrap();
        assert_eq!(fs_util::extract_zip(&archive_path, &extracted).unwrap(), 1);
        let content_root = fs_util::utf8(single_top_dir(&extracted, "matpower/case9").unwrap()).unwrap();

        let dir = cache.install(&content_root, "matpower/case9").unwrap();
        assert_eq!(dir, root.join("cache/matpower/case9"));
        assert!(dir.join("case9.m").as_std_path().is_file());
        assert!(cache.is_cached("matpower/case9").unwrap());
        assert_eq!(cache.list_cached().unwrap(), vec!["matpower/case9"]);
    }

    #[test]
    fn single_folder_archives_are_flattened() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("case9")).unwrap();
        fs::write(temp.path().join("case9/case9.m"), b"mpc").unwrap();
        assert_eq!(
            single_top_dir(temp.path(), "matpower/case9").unwrap(),
            temp.path().join("case9")
        );
        assert_eq!(single_top_dir(temp.path(), "other").unwrap(), temp.path());
    }
}
