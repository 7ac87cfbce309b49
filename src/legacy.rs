use std::collections::HashSet;
use std::sync::{LazyLock, Mutex};

use crate::bundle::CaseBundle;
use crate::error::CaseError;
use crate::registry::RegistryClient;
use crate::resolver::Resolver;

pub const LEGACY_CASES: &[&str] = &[
    "ieee14",
    "ieee39",
    "ieee118",
    "ACTIVSg2000",
    "ACTIVSg2000_singlegen",
    "ACTIVSg10k",
    "ACTIVSg70k",
    "ACTIVSg70k_singlegen",
    "case5",
    "case9",
    "npcc",
    "two_bus_branch",
    "two_bus_transformer",
    "ieee14_fault",
    "ieee14_island",
    "ieee39_nopq31",
    "ieee39_rt",
];

static WARNED: LazyLock<Mutex<HashSet<String>>> = LazyLock::new(|| Mutex::new(HashSet::new()));

pub fn is_legacy(name: &str) -> bool {
    LEGACY_CASES.contains(&name)
}

pub fn legacy_case<R: RegistryClient>(
    resolver: &Resolver<R>,
    name: &str,
) -> Result<CaseBundle, CaseError> {
    if !is_legacy(name) {
        return Err(CaseError::UnknownCase {
            name: name.to_string(),
            available: LEGACY_CASES.iter().map(|case| case.to_string()).collect(),
        });
    }
    if first_use(name) {
        tracing::warn!(case = name, "{name}() is deprecated, resolve '{name}' by name instead");
    }
    resolver.resolve(name)
}

fn first_use(name: &str) -> bool {
    let mut warned = WARNED.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    warned.insert(name.to_string())
}
