use std::fs;
use std::io::{self, Write};
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, NamedTempFile};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::CaseError;

pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<usize, CaseError> {
    let file = fs::File::open(zip_path)
        .map_err(|err| CaseError::Cache(format!("open zip {}: {err}", zip_path.display())))?;
    let mut archive = ZipArchive::new(file).map_err(|err| CaseError::Cache(err.to_string()))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| CaseError::Cache(err.to_string()))?;
        let entry_path = match entry.enclosed_name() {
            Some(path) => target_dir.join(path),
            None => {
                return Err(CaseError::InvalidPath(format!(
                    "zip entry '{}' escapes the extraction directory",
                    entry.name()
                )));
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&entry_path).map_err(|err| CaseError::Cache(err.to_string()))?;
            continue;
        }

        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|err| CaseError::Cache(err.to_string()))?;
        }
        let mut outfile =
            fs::File::create(&entry_path).map_err(|err| CaseError::Cache(err.to_string()))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| CaseError::Cache(err.to_string()))?;
        written += 1;
    }
    Ok(written)
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), CaseError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CaseError::Filesystem(err.to_string()))?;
    let mut staged = NamedTempFile::new_in(parent.as_std_path())
        .map_err(|err| CaseError::Filesystem(err.to_string()))?;
    staged
        .write_all(content)
        .map_err(|err| CaseError::Filesystem(err.to_string()))?;
    staged
        .persist(path.as_std_path())
        .map_err(|err| CaseError::Filesystem(format!("write {path}: {}", err.error)))?;
    Ok(())
}

pub fn tree_size(root: &Utf8Path) -> Result<(usize, u64), CaseError> {
    let mut files = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(root.as_std_path()).follow_links(true) {
        let entry = entry.map_err(|err| CaseError::Filesystem(err.to_string()))?;
        if entry.file_type().is_file() {
            let metadata = entry
                .metadata()
                .map_err(|err| CaseError::Filesystem(err.to_string()))?;
            files += 1;
            bytes += metadata.len();
        }
    }
    Ok((files, bytes))
}

pub fn copy_dir_recursive(source: &Utf8Path, dest: &Utf8Path) -> Result<(), CaseError> {
    fs::create_dir_all(dest.as_std_path()).map_err(|err| CaseError::Filesystem(err.to_string()))?;
    for entry in WalkDir::new(source.as_std_path())
        .follow_links(true)
        .min_depth(1)
    {
        let entry = entry.map_err(|err| CaseError::Filesystem(err.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(source.as_std_path())
            .map_err(|err| CaseError::Filesystem(err.to_string()))?;
        let target = dest.as_std_path().join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|err| CaseError::Filesystem(err.to_string()))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| CaseError::Filesystem(err.to_string()))?;
            }
            fs::copy(entry.path(), &target).map_err(|err| CaseError::Filesystem(err.to_string()))?;
        }
    }
    Ok(())
}

pub fn copy_dir_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), CaseError> {
    let parent = dest
        .parent()
        .ok_or_else(|| CaseError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| CaseError::Filesystem(err.to_string()))?;
    let temp_dir = Builder::new()
        .prefix(".pcase-copy")
        .tempdir_in(parent.as_std_path())
        .map_err(|err| CaseError::Filesystem(err.to_string()))?;
    let temp_path = utf8(temp_dir.path().join("tree"))?;
    copy_dir_recursive(source, &temp_path)?;
    replace_dir(temp_path.as_std_path(), dest.as_std_path())
        .map_err(|err| CaseError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Renames `from` onto `to`. An existing `to` is moved aside first and only
/// deleted once the new tree is in place; on failure it is put back.
pub fn replace_dir(from: &Path, to: &Path) -> io::Result<()> {
    if fs::symlink_metadata(to).is_err() {
        return fs::rename(from, to);
    }
    let parent = to
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let aside = Builder::new().prefix(".pcase-old").tempdir_in(parent)?;
    let old = aside.path().join("old");
    fs::rename(to, &old)?;
    if let Err(err) = fs::rename(from, to) {
        if let Err(restore) = fs::rename(&old, to) {
            tracing::warn!(error = %restore, path = %to.display(), "could not restore replaced directory");
        }
        return Err(err);
    }
    aside.close()
}

pub fn visible_subdirs(dir: &Utf8Path) -> io::Result<Vec<(String, Utf8PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir.as_std_path())? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        dirs.push((name.clone(), dir.join(name)));
    }
    dirs.sort();
    Ok(dirs)
}

pub fn utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, CaseError> {
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| CaseError::InvalidPath(format!("non-utf8 path {}", path.display())))
}
