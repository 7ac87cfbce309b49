use camino::Utf8Path;
use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::cache::megabytes;
use crate::error::CaseError;
use crate::fs_util;
use crate::registry::RegistryClient;
use crate::resolver::Resolver;

pub const PROGRESS_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct ExportResult {
    pub case: String,
    pub destination: String,
    pub files: usize,
    pub total_bytes: u64,
    pub total_mb: f64,
}

/// Copies the resolved case to `dest/<case name>`. An existing target is
/// only replaced with `overwrite`, and then as a whole: the new tree is
/// staged beside it and swapped in.
pub fn export_case<R: RegistryClient>(
    resolver: &Resolver<R>,
    name_or_path: &str,
    dest: &Utf8Path,
    overwrite: bool,
    sink: &dyn ProgressSink,
) -> Result<ExportResult, CaseError> {
    let bundle = resolver.resolve(name_or_path)?;
    let dest = fs_util::utf8(
        std::path::absolute(dest.as_std_path())
            .map_err(|err| CaseError::Filesystem(err.to_string()))?,
    )?;
    let dest_dir = dest.join(bundle.name());

    if dest_dir.as_std_path().exists() && !overwrite {
        return Err(CaseError::AlreadyExists(dest_dir));
    }
    if dest_dir.starts_with(bundle.dir()) {
        return Err(CaseError::InvalidPath(format!(
            "cannot export {} into itself ({dest_dir})",
            bundle.name()
        )));
    }

    let (files, total_bytes) = fs_util::tree_size(bundle.dir())?;
    let total_mb = megabytes(total_bytes);
    if total_bytes > PROGRESS_THRESHOLD_BYTES {
        sink.event(ProgressEvent {
            message: format!("Exporting {} ({total_mb} MB)...", bundle.name()),
            elapsed: None,
        });
    }

    let start = std::time::Instant::now();
    fs_util::copy_dir_atomic(bundle.dir(), &dest_dir)?;

    sink.event(ProgressEvent {
        message: format!("Exported {} -> {dest_dir}", bundle.name()),
        elapsed: Some(start.elapsed()),
    });
    sink.event(ProgressEvent {
        message: format!("Copied {files} files ({total_mb} MB)"),
        elapsed: None,
    });
    tracing::info!(case = bundle.name(), dest = %dest_dir, files, total_bytes, "exported case");

    Ok(ExportResult {
        case: bundle.name().to_string(),
        destination: dest_dir.to_string(),
        files,
        total_bytes,
        total_mb,
    })
}

