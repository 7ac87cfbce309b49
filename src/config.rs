use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::cache::{self, CACHE_DIR_ENV};
use crate::error::CaseError;
use crate::registry::REGISTRY_URL_ENV;
use crate::resolver::CASES_DIR_ENV;

pub const CONFIG_FILE: &str = "powerfulcases.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cases_dir: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub registry_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub cases_dir: Utf8PathBuf,
    pub cache_dir: Utf8PathBuf,
    pub registry_url: Option<String>,
}

pub trait Env {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CaseError> {
        let config = Self::read(path)?;
        Self::resolve_config(config, &ProcessEnv)
    }

    pub fn read(path: Option<&str>) -> Result<Config, CaseError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };
        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&config_path)
            .map_err(|_| CaseError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| CaseError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(config: Config, env: &dyn Env) -> Result<ResolvedConfig, CaseError> {
        let cases_dir = match config.cases_dir.or_else(|| env.var(CASES_DIR_ENV)) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_cases_dir()?,
        };
        let cache_dir = match config.cache_dir.or_else(|| env.var(CACHE_DIR_ENV)) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => cache::default_root()?,
        };
        let registry_url = config
            .registry_url
            .or_else(|| env.var(REGISTRY_URL_ENV))
            .filter(|url| !url.trim().is_empty());

        Ok(ResolvedConfig {
            cases_dir,
            cache_dir,
            registry_url,
        })
    }
}

pub fn default_cases_dir() -> Result<Utf8PathBuf, CaseError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.data_dir().join("powerfulcases").join("cases")).ok()
        })
        .ok_or_else(|| CaseError::Filesystem("unable to resolve bundled cases directory".to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl Env for MapEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|value| value.to_string())
        }
    }

    #[test]
    fn config_values_beat_environment() {
        let env = MapEnv(HashMap::from([
            (CASES_DIR_ENV, "/env/cases"),
            (CACHE_DIR_ENV, "/env/cache"),
            (REGISTRY_URL_ENV, "https://env.example"),
        ]));
        let config = Config {
            cases_dir: Some("/cfg/cases".to_string()),
            cache_dir: None,
            registry_url: None,
        };

        let resolved = ConfigLoader::resolve_config(config, &env).unwrap();
        assert_eq!(resolved.cases_dir, Utf8PathBuf::from("/cfg/cases"));
        assert_eq!(resolved.cache_dir, Utf8PathBuf::from("/env/cache"));
        assert_eq!(resolved.registry_url.as_deref(), Some("https://env.example"));
    }
}
