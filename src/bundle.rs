use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::{MATPOWER, PSAT, PSSE_DYR, PSSE_RAW};
use crate::error::CaseError;
use crate::locator::{self, FileRequest};
use crate::manifest::{Citation, Credits, Manifest};

#[derive(Debug, Clone, PartialEq)]
pub struct CaseBundle {
    name: String,
    dir: Utf8PathBuf,
    manifest: Manifest,
    is_remote: bool,
    collection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub format: String,
    pub format_version: Option<String>,
    pub variant: Option<String>,
    pub default: bool,
    pub includes: Vec<String>,
}

impl CaseBundle {
    pub(crate) fn new(
        name: impl Into<String>,
        dir: Utf8PathBuf,
        manifest: Manifest,
        is_remote: bool,
        inferred_collection: Option<String>,
    ) -> Self {
        let collection = manifest.collection.clone().or(inferred_collection);
        Self {
            name: name.into(),
            dir,
            manifest,
            is_remote,
            collection,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    /// Collection declared in the manifest, else the one implied by where
    /// the case was found.
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.manifest.tags
    }

    pub fn credits(&self) -> Option<&Credits> {
        self.manifest.credits.as_ref()
    }

    pub fn has_credits(&self) -> bool {
        self.manifest.credits.is_some()
    }

    pub fn license(&self) -> Option<&str> {
        self.credits().and_then(|credits| credits.license.as_deref())
    }

    pub fn authors(&self) -> &[String] {
        self.credits()
            .map(|credits| credits.authors.as_slice())
            .unwrap_or_default()
    }

    pub fn maintainers(&self) -> &[String] {
        self.credits()
            .map(|credits| credits.maintainers.as_slice())
            .unwrap_or_default()
    }

    pub fn citations(&self) -> &[Citation] {
        self.credits()
            .map(|credits| credits.citations.as_slice())
            .unwrap_or_default()
    }

    pub fn files(&self) -> Vec<FileInfo> {
        self.manifest
            .files
            .iter()
            .map(|entry| FileInfo {
                path: entry.path.clone(),
                format: entry.format.clone(),
                format_version: entry.format_version.clone(),
                variant: entry.variant.clone(),
                default: entry.default,
                includes: entry.includes.clone(),
            })
            .collect()
    }

    pub fn raw(&self) -> Result<Utf8PathBuf, CaseError> {
        locator::file(self, &FileRequest::new(PSSE_RAW))
    }

    pub fn dyr(&self) -> Option<Utf8PathBuf> {
        locator::find_file(self, &FileRequest::new(PSSE_DYR))
    }

    pub fn matpower(&self) -> Result<Utf8PathBuf, CaseError> {
        locator::file(self, &FileRequest::new(MATPOWER))
    }

    pub fn psat(&self) -> Result<Utf8PathBuf, CaseError> {
        locator::file(self, &FileRequest::new(PSAT))
    }

    pub fn dyr_variant(&self, variant: &str) -> Result<Utf8PathBuf, CaseError> {
        locator::file(self, &FileRequest::new(PSSE_DYR).variant(variant))
    }

    pub fn dyr_variants(&self) -> Vec<String> {
        locator::variants(self, PSSE_DYR)
    }
}
