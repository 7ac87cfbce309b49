#![allow(dead_code)]

use std::fs;
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use powerful_cases::app::{ProgressEvent, ProgressSink};
use powerful_cases::cache::Cache;
use powerful_cases::error::CaseError;
use powerful_cases::registry::RegistryClient;

pub fn temp_root() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().canonicalize().unwrap()).unwrap();
    (temp, root)
}

/// Creates `root/relative` holding `files` and returns it.
pub fn write_case(root: &Utf8Path, relative: &str, files: &[(&str, &str)]) -> Utf8PathBuf {
    let dir = root.join(relative);
    fs::create_dir_all(&dir).unwrap();
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
    dir
}

/// Registry serving fixed in-memory cases, counting real downloads.
#[derive(Default)]
pub struct MockRegistry {
    cases: Vec<(String, Vec<(String, String)>)>,
    downloads: Mutex<usize>,
}

impl MockRegistry {
    pub fn with_case(mut self, name: &str, files: &[(&str, &str)]) -> Self {
        self.cases.push((
            name.to_string(),
            files
                .iter()
                .map(|(file, content)| (file.to_string(), content.to_string()))
                .collect(),
        ));
        self
    }

    pub fn downloads(&self) -> usize {
        *self.downloads.lock().unwrap()
    }
}

impl RegistryClient for MockRegistry {
    fn list_remote(&self) -> Result<Vec<String>, CaseError> {
        Ok(self.cases.iter().map(|(name, _)| name.clone()).collect())
    }

    fn download(&self, name: &str, cache: &Cache, force: bool) -> Result<Utf8PathBuf, CaseError> {
        if !force && cache.is_cached(name)? {
            return cache.cached_dir(name);
        }
        let (_, files) = self
            .cases
            .iter()
            .find(|(remote, _)| remote == name)
            .ok_or_else(|| CaseError::UnknownCase {
                name: name.to_string(),
                available: Vec::new(),
            })?;
        *self.downloads.lock().unwrap() += 1;

        let staging = cache.staging_dir()?;
        let staged = Utf8PathBuf::from_path_buf(staging.path().join("case")).unwrap();
        fs::create_dir_all(&staged).unwrap();
        for (file, content) in files {
            fs::write(staged.join(file), content).unwrap();
        }
        cache.install(&staged, name)
    }
}

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}
