use std::fmt;
use std::str::FromStr;

use crate::error::CaseError;
use crate::safety;

pub const PSSE_RAW: &str = "psse_raw";
pub const PSSE_DYR: &str = "psse_dyr";
pub const PSSE_SEQ: &str = "psse_seq";
pub const MATPOWER: &str = "matpower";
pub const PSAT: &str = "psat";
pub const OPENDSS: &str = "opendss";

pub const ROOT_COLLECTION: &str = "(root)";

pub fn normalize_format(format: &str) -> &str {
    match format {
        "raw" => PSSE_RAW,
        "dyr" => PSSE_DYR,
        other => other,
    }
}

pub fn format_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "raw" => Some(PSSE_RAW),
        "dyr" => Some(PSSE_DYR),
        "seq" => Some(PSSE_SEQ),
        "m" => Some(MATPOWER),
        "dss" => Some(OPENDSS),
        _ => None,
    }
}

pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once('/') {
        Some((collection, case)) => (
            Some(collection.split('/').next().unwrap_or(collection)),
            case,
        ),
        None => (None, name),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Bundled,
    Remote,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Bundled => write!(f, "bundled"),
            SourceKind::Remote => write!(f, "remote"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseRef {
    Qualified(Vec<String>),
    Bare(String),
}

impl CaseRef {
    pub fn name(&self) -> &str {
        match self {
            CaseRef::Qualified(parts) => parts.last().map(String::as_str).unwrap_or_default(),
            CaseRef::Bare(name) => name,
        }
    }
}

impl fmt::Display for CaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseRef::Qualified(parts) => write!(f, "{}", parts.join("/")),
            CaseRef::Bare(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for CaseRef {
    type Err = CaseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.contains('/') {
            let parts = safety::split_components(trimmed)?;
            return Ok(CaseRef::Qualified(
                parts.into_iter().map(str::to_string).collect(),
            ));
        }
        safety::validate_component(trimmed)?;
        Ok(CaseRef::Bare(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn normalizes_legacy_aliases() {
        assert_eq!(normalize_format("raw"), PSSE_RAW);
        assert_eq!(normalize_format("dyr"), PSSE_DYR);
        assert_eq!(normalize_format("matpower"), MATPOWER);
    }

    #[test]
    fn parse_case_refs() {
        let bare: CaseRef = "ieee14".parse().unwrap();
        assert_eq!(bare, CaseRef::Bare("ieee14".to_string()));

        let qualified: CaseRef = "synthetic/ACTIVSg2000".parse().unwrap();
        assert_eq!(qualified.name(), "ACTIVSg2000");
        assert_eq!(qualified.to_string(), "synthetic/ACTIVSg2000");

        let err = "../etc".parse::<CaseRef>().unwrap_err();
        assert_matches!(err, CaseError::InvalidPath(_));
    }

    #[test]
    fn split_remote_names() {
        assert_eq!(split_qualified("synthetic/ACTIVSg2000"), (Some("synthetic"), "ACTIVSg2000"));
        assert_eq!(split_qualified("case5"), (None, "case5"));
    }
}
