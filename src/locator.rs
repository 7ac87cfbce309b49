use camino::Utf8PathBuf;

use crate::bundle::CaseBundle;
use crate::domain::normalize_format;
use crate::error::CaseError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRequest {
    pub format: String,
    pub version: Option<String>,
    pub variant: Option<String>,
}

impl FileRequest {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            version: None,
            variant: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }
}

/// Path of the requested file. With `required` unset a missing file yields
/// `Ok(None)` instead of [`CaseError::FileNotFound`].
pub fn locate(
    bundle: &CaseBundle,
    request: &FileRequest,
    required: bool,
) -> Result<Option<Utf8PathBuf>, CaseError> {
    if let Some(path) = find_file(bundle, request) {
        return Ok(Some(path));
    }
    if !required {
        return Ok(None);
    }
    Err(not_found(bundle, request))
}

pub fn file(bundle: &CaseBundle, request: &FileRequest) -> Result<Utf8PathBuf, CaseError> {
    find_file(bundle, request).ok_or_else(|| not_found(bundle, request))
}

pub fn find_file(bundle: &CaseBundle, request: &FileRequest) -> Option<Utf8PathBuf> {
    let format = normalize_format(&request.format);
    let version = request.version.as_deref();
    let variant = request.variant.as_deref();
    let manifest = bundle.manifest();

    let entry = manifest
        .file_entry(format, version, variant)
        .or_else(|| match (version, variant) {
            (None, None) => manifest.default_file(format),
            _ => None,
        })?;
    Some(bundle.dir().join(&entry.path))
}

pub fn formats(bundle: &CaseBundle) -> Vec<String> {
    bundle.manifest().formats()
}

pub fn variants(bundle: &CaseBundle, format: &str) -> Vec<String> {
    bundle.manifest().variants(normalize_format(format))
}

fn not_found(bundle: &CaseBundle, request: &FileRequest) -> CaseError {
    let format = &request.format;
    let case = bundle.name();
    let message = if let Some(variant) = &request.variant {
        format!(
            "File not found for format '{format}' with variant '{variant}' in case '{case}'. Available variants: {}",
            variants(bundle, format).join(", ")
        )
    } else if let Some(version) = &request.version {
        format!(
            "File not found for format '{format}' with version '{version}' in case '{case}'. Available formats: {}",
            formats(bundle).join(", ")
        )
    } else {
        format!(
            "File not found for format '{format}' in case '{case}'. Available formats: {}",
            formats(bundle).join(", ")
        )
    };
    CaseError::FileNotFound(message)
}
