use std::path::Path;

use crate::error::CaseError;

pub fn validate_component(component: &str) -> Result<(), CaseError> {
    if component.is_empty() {
        return Err(CaseError::InvalidPath(
            "path component cannot be empty".to_string(),
        ));
    }
    if component.contains("..") || component.contains('/') || component.contains('\\') {
        return Err(CaseError::InvalidPath(format!(
            "'{component}' contains path separators or '..'"
        )));
    }
    if has_drive_prefix(component) {
        return Err(CaseError::InvalidPath(format!(
            "'{component}' is an absolute path"
        )));
    }
    Ok(())
}

pub fn split_components(value: &str) -> Result<Vec<&str>, CaseError> {
    if value.starts_with('/') {
        return Err(CaseError::InvalidPath(format!(
            "'{value}' is an absolute path"
        )));
    }
    let parts = value.split('/').collect::<Vec<_>>();
    for part in &parts {
        validate_component(part)?;
    }
    Ok(parts)
}

/// True when `child` resolves (symlinks followed) to a location inside
/// `parent`. Resolution failures count as unsafe.
pub fn is_safe_subpath(child: &Path, parent: &Path) -> bool {
    let Ok(child) = child.canonicalize() else {
        return false;
    };
    let Ok(parent) = parent.canonicalize() else {
        return false;
    };
    child.starts_with(&parent)
}

fn has_drive_prefix(component: &str) -> bool {
    let bytes = component.as_bytes();
    bytes.len() > 1 && bytes[1] == b':'
}
