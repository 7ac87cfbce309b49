pub mod app;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod fs_util;
pub mod legacy;
pub mod locator;
pub mod manifest;
pub mod output;
pub mod registry;
pub mod resolver;
pub mod safety;

pub use bundle::CaseBundle;
pub use error::CaseError;
pub use resolver::Resolver;
