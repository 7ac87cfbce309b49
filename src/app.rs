use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;

use crate::cache::CacheInfo;
use crate::error::CaseError;
use crate::export::{self, ExportResult};
use crate::locator::{self, FileRequest};
use crate::manifest::{self, Citation};
use crate::registry::RegistryClient;
use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListSource {
    #[default]
    All,
    Remote,
    Cached,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub source: ListSource,
    pub collection: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub source: String,
    pub cases: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionsResult {
    pub collections: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseInfoResult {
    pub name: String,
    pub dir: String,
    pub is_remote: bool,
    pub collection: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub data_version: Option<String>,
    pub license: Option<String>,
    pub authors: Vec<String>,
    pub maintainers: Vec<String>,
    pub citations: Vec<Citation>,
    pub files: Vec<crate::bundle::FileInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub case: String,
    pub format: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub case: String,
    pub dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub cleared: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestResult {
    pub manifest: String,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<R: RegistryClient> {
    resolver: Resolver<R>,
}

impl<R: RegistryClient> App<R> {
    pub fn new(resolver: Resolver<R>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Resolver<R> {
        &self.resolver
    }

    pub fn list(&self, filter: &ListFilter) -> Result<ListResult, CaseError> {
        let (source, cases) = match filter.source {
            ListSource::All => (
                "all",
                self.resolver
                    .list_cases(filter.collection.as_deref(), filter.tag.as_deref())?,
            ),
            ListSource::Remote => ("remote", self.resolver.registry().list_remote()?),
            ListSource::Cached => ("cached", self.resolver.cache().list_cached()?),
        };
        Ok(ListResult {
            source: source.to_string(),
            cases,
        })
    }

    pub fn collections(&self) -> Result<CollectionsResult, CaseError> {
        Ok(CollectionsResult {
            collections: self.resolver.list_collections()?,
        })
    }

    pub fn info(&self, name_or_path: &str) -> Result<CaseInfoResult, CaseError> {
        let bundle = self.resolver.resolve(name_or_path)?;
        let manifest = bundle.manifest();
        Ok(CaseInfoResult {
            name: bundle.name().to_string(),
            dir: bundle.dir().to_string(),
            is_remote: bundle.is_remote(),
            collection: bundle.collection().map(str::to_string),
            tags: bundle.tags().to_vec(),
            description: manifest.description.clone(),
            data_version: manifest.data_version.clone(),
            license: bundle.license().map(str::to_string),
            authors: bundle.authors().to_vec(),
            maintainers: bundle.maintainers().to_vec(),
            citations: bundle.citations().to_vec(),
            files: bundle.files(),
        })
    }

    pub fn file(
        &self,
        name_or_path: &str,
        request: &FileRequest,
        required: bool,
    ) -> Result<FileResult, CaseError> {
        let bundle = self.resolver.resolve(name_or_path)?;
        let path = locator::locate(&bundle, request, required)?;
        Ok(FileResult {
            case: bundle.name().to_string(),
            format: request.format.clone(),
            path: path.map(|path| path.to_string()),
        })
    }

    pub fn export(
        &self,
        name_or_path: &str,
        dest: &Utf8Path,
        overwrite: bool,
        sink: &dyn ProgressSink,
    ) -> Result<ExportResult, CaseError> {
        export::export_case(&self.resolver, name_or_path, dest, overwrite, sink)
    }

    pub fn download(
        &self,
        name: &str,
        force: bool,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadResult, CaseError> {
        let remote = self.resolver.remote_name(name)?;
        sink.event(ProgressEvent {
            message: format!("phase=Download; {remote}"),
            elapsed: None,
        });
        let start = std::time::Instant::now();
        let dir = self
            .resolver
            .registry()
            .download(&remote, self.resolver.cache(), force)?;
        sink.event(ProgressEvent {
            message: format!("Downloaded to: {dir}"),
            elapsed: Some(start.elapsed()),
        });
        Ok(DownloadResult {
            case: remote,
            dir: dir.to_string(),
        })
    }

    pub fn clear_cache(&self, name: Option<&str>) -> Result<ClearResult, CaseError> {
        self.resolver.cache().clear(name)?;
        Ok(ClearResult {
            cleared: name.unwrap_or("(all)").to_string(),
        })
    }

    pub fn cache_info(&self) -> Result<CacheInfo, CaseError> {
        self.resolver.cache().info()
    }

    pub fn create_manifest(&self, dir: &Utf8Path) -> Result<ManifestResult, CaseError> {
        let path = manifest::create_manifest(dir)?;
        Ok(ManifestResult {
            manifest: path.to_string(),
        })
    }
}
