use std::fs;
use std::sync::RwLock;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;
use tempfile::{Builder, TempDir};

use crate::error::CaseError;
use crate::fs_util;
use crate::manifest::MANIFEST_FILE;
use crate::safety;

pub const CACHE_DIR_ENV: &str = "POWERFULCASES_CACHE_DIR";

const STAGING_PREFIX: &str = ".pcase-";

static ROOT_OVERRIDE: RwLock<Option<Utf8PathBuf>> = RwLock::new(None);

pub fn set_root(root: impl Into<Utf8PathBuf>) {
    let mut guard = ROOT_OVERRIDE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(root.into());
}

pub fn reset_root() {
    let mut guard = ROOT_OVERRIDE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = None;
}

/// Current process-wide cache root: the [`set_root`] override, then
/// `POWERFULCASES_CACHE_DIR`, then `~/.cache/powerfulcases`.
pub fn root() -> Result<Utf8PathBuf, CaseError> {
    let guard = ROOT_OVERRIDE
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(root) = guard.as_ref() {
        return Ok(root.clone());
    }
    drop(guard);
    default_root()
}

pub fn default_root() -> Result<Utf8PathBuf, CaseError> {
    if let Ok(dir) = std::env::var(CACHE_DIR_ENV) {
        return Ok(Utf8PathBuf::from(dir));
    }
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("powerfulcases")).ok()
        })
        .ok_or_else(|| CaseError::Cache("unable to resolve cache directory".to_string()))
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub directory: String,
    pub exists: bool,
    pub num_cases: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub cases: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Cache {
    pinned: Option<Utf8PathBuf>,
}

impl Cache {
    pub fn global() -> Self {
        Self { pinned: None }
    }

    pub fn at(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            pinned: Some(root.into()),
        }
    }

    pub fn root(&self) -> Result<Utf8PathBuf, CaseError> {
        match &self.pinned {
            Some(root) => Ok(root.clone()),
            None => root(),
        }
    }

    pub fn case_dir(&self, name: &str) -> Result<Utf8PathBuf, CaseError> {
        let parts = safety::split_components(name)?;
        let mut dir = self.root()?;
        for part in parts {
            dir.push(part);
        }
        Ok(dir)
    }

    pub fn is_cached(&self, name: &str) -> Result<bool, CaseError> {
        let dir = self.case_dir(name)?;
        let root = self.root()?;
        if !dir.as_std_path().is_dir()
            || !safety::is_safe_subpath(dir.as_std_path(), root.as_std_path())
        {
            return Ok(false);
        }
        let mut entries =
            fs::read_dir(dir.as_std_path()).map_err(|err| CaseError::Cache(err.to_string()))?;
        Ok(entries.next().is_some())
    }

    pub fn cached_dir(&self, name: &str) -> Result<Utf8PathBuf, CaseError> {
        if !self.is_cached(name)? {
            return Err(CaseError::Cache(format!("case '{name}' is not cached")));
        }
        self.case_dir(name)
    }

    pub fn list_cached(&self) -> Result<Vec<String>, CaseError> {
        let root = self.root()?;
        if !root.as_std_path().is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for (name, dir) in visible_subdirs(&root)? {
            if looks_like_case(&dir)? {
                names.push(name);
                continue;
            }
            for (child, child_dir) in visible_subdirs(&dir)? {
                if looks_like_case(&child_dir)? {
                    names.push(format!("{name}/{child}"));
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Removes one cached case, or the whole cache when `name` is `None`.
    /// The target is first renamed into a staging directory, so it is either
    /// gone from its place or untouched. Absent targets are a no-op.
    pub fn clear(&self, name: Option<&str>) -> Result<(), CaseError> {
        let (target, staging_parent) = match name {
            Some(name) => (self.case_dir(name)?, self.root()?),
            None => {
                let root = self.root()?;
                let parent = root
                    .parent()
                    .map(|parent| match parent.as_str() {
                        "" => Utf8PathBuf::from("."),
                        _ => parent.to_path_buf(),
                    })
                    .ok_or_else(|| CaseError::Cache(format!("refusing to clear {root}")))?;
                (root, parent)
            }
        };
        if fs::symlink_metadata(target.as_std_path()).is_err() {
            return Ok(());
        }

        let staging = Builder::new()
            .prefix(&format!("{STAGING_PREFIX}evict"))
            .tempdir_in(staging_parent.as_std_path())
            .map_err(|err| CaseError::Cache(format!("stage eviction of {target}: {err}")))?;
        fs::rename(target.as_std_path(), staging.path().join("evicted"))
            .map_err(|err| CaseError::Cache(format!("evict {target}: {err}")))?;
        staging
            .close()
            .map_err(|err| CaseError::Cache(format!("delete evicted {target}: {err}")))?;
        tracing::info!(dir = %target, "cleared cache entry");
        Ok(())
    }

    pub fn info(&self) -> Result<CacheInfo, CaseError> {
        let root = self.root()?;
        let exists = root.as_std_path().is_dir();
        let cases = self.list_cached()?;
        let total_size_bytes = if exists {
            fs_util::tree_size(&root)?.1
        } else {
            0
        };
        Ok(CacheInfo {
            directory: root.to_string(),
            exists,
            num_cases: cases.len(),
            total_size_bytes,
            total_size_mb: megabytes(total_size_bytes),
            cases,
        })
    }

    pub fn ensure_root(&self) -> Result<Utf8PathBuf, CaseError> {
        let root = self.root()?;
        fs::create_dir_all(root.as_std_path()).map_err(|err| CaseError::Cache(err.to_string()))?;
        Ok(root)
    }

    pub fn staging_dir(&self) -> Result<TempDir, CaseError> {
        let root = self.ensure_root()?;
        Builder::new()
            .prefix(&format!("{STAGING_PREFIX}download"))
            .tempdir_in(root.as_std_path())
            .map_err(|err| CaseError::Cache(err.to_string()))
    }

    pub fn install(&self, staged: &Utf8Path, name: &str) -> Result<Utf8PathBuf, CaseError> {
        let dest = self.case_dir(name)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| CaseError::Cache(err.to_string()))?;
        }
        fs_util::replace_dir(staged.as_std_path(), dest.as_std_path())
            .map_err(|err| CaseError::Cache(format!("install {dest}: {err}")))?;
        Ok(dest)
    }
}

pub fn megabytes(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

fn visible_subdirs(dir: &Utf8Path) -> Result<Vec<(String, Utf8PathBuf)>, CaseError> {
    fs_util::visible_subdirs(dir).map_err(|err| CaseError::Cache(err.to_string()))
}

fn looks_like_case(dir: &Utf8Path) -> Result<bool, CaseError> {
    if dir.join(MANIFEST_FILE).as_std_path().is_file() {
        return Ok(true);
    }
    let entries = fs::read_dir(dir.as_std_path()).map_err(|err| CaseError::Cache(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| CaseError::Cache(err.to_string()))?;
        let visible = !entry.file_name().to_string_lossy().starts_with('.');
        if visible && entry.path().is_file() {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_dir_nests_collections() {
        let cache = Cache::at("/tmp/pc-cache");
        assert_eq!(
            cache.case_dir("synthetic/ACTIVSg2000").unwrap(),
            Utf8PathBuf::from("/tmp/pc-cache/synthetic/ACTIVSg2000")
        );
        assert!(cache.case_dir("../escape").is_err());
    }
}
