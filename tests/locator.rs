mod common;

use assert_matches::assert_matches;

use powerful_cases::bundle::CaseBundle;
use powerful_cases::cache::Cache;
use powerful_cases::domain::{PSSE_DYR, PSSE_RAW};
use powerful_cases::error::CaseError;
use powerful_cases::locator::{self, FileRequest};
use powerful_cases::registry::NoRegistry;
use powerful_cases::resolver::Resolver;

use common::{temp_root, write_case};

const MANIFEST: &str = r#"
name = "ieee14"

[[files]]
path = "ieee14.raw"
format = "psse_raw"
default = true

[[files]]
path = "ieee14_v33.raw"
format = "psse_raw"
format_version = "33"

[[files]]
path = "ieee14.dyr"
format = "psse_dyr"
default = true

[[files]]
path = "ieee14_genrou.dyr"
format = "psse_dyr"
variant = "genrou"
"#;

fn bundle() -> (tempfile::TempDir, CaseBundle) {
    let (temp, root) = temp_root();
    let dir = write_case(
        &root,
        "cases/ieee/ieee14",
        &[
            ("ieee14.raw", "raw"),
            ("ieee14_v33.raw", "raw33"),
            ("ieee14.dyr", "dyr"),
            ("ieee14_genrou.dyr", "genrou"),
            ("manifest.toml", MANIFEST),
        ],
    );
    let resolver = Resolver::new(root.join("cases"), Cache::at(root.join("cache")), NoRegistry);
    let bundle = resolver.resolve(dir.as_str()).unwrap();
    (temp, bundle)
}

#[test]
fn legacy_alias_matches_canonical_format() {
    let (_temp, bundle) = bundle();
    let alias = locator::file(&bundle, &FileRequest::new("raw")).unwrap();
    let canonical = locator::file(&bundle, &FileRequest::new(PSSE_RAW)).unwrap();
    assert_eq!(alias, canonical);
    assert_eq!(alias, bundle.dir().join("ieee14.raw"));
    assert_eq!(bundle.raw().unwrap(), canonical);
}

#[test]
fn version_and_variant_select_exact_entries() {
    let (_temp, bundle) = bundle();

    let v33 = locator::file(&bundle, &FileRequest::new("raw").version("33")).unwrap();
    assert_eq!(v33, bundle.dir().join("ieee14_v33.raw"));

    let genrou = bundle.dyr_variant("genrou").unwrap();
    assert_eq!(genrou, bundle.dir().join("ieee14_genrou.dyr"));
    assert_eq!(bundle.dyr(), Some(bundle.dir().join("ieee14.dyr")));
    assert_eq!(bundle.dyr_variants(), vec!["genrou"]);
}

#[test]
fn optional_lookup_returns_none() {
    let (_temp, bundle) = bundle();
    let found = locator::locate(&bundle, &FileRequest::new("dyr").variant("gencls"), false).unwrap();
    assert_eq!(found, None);

    let found = locator::locate(&bundle, &FileRequest::new("opendss"), false).unwrap();
    assert_eq!(found, None);
}

#[test]
fn missing_variant_lists_available_variants() {
    let (_temp, bundle) = bundle();
    let err = locator::locate(&bundle, &FileRequest::new(PSSE_DYR).variant("gencls"), true)
        .unwrap_err();
    assert_matches!(err, CaseError::FileNotFound(ref message) => {
        assert!(message.contains("variant 'gencls'"));
        assert!(message.contains("Available variants: genrou"));
    });
}

#[test]
fn missing_version_lists_formats() {
    let (_temp, bundle) = bundle();
    let err = locator::file(&bundle, &FileRequest::new("raw").version("35")).unwrap_err();
    assert_matches!(err, CaseError::FileNotFound(ref message) => {
        assert!(message.contains("version '35'"));
        assert!(message.contains("Available formats: psse_raw, psse_dyr"));
    });
}

#[test]
fn missing_format_lists_formats() {
    let (_temp, bundle) = bundle();
    assert_matches!(bundle.matpower(), Err(CaseError::FileNotFound(message)) => {
        assert!(message.contains("format 'matpower' in case 'ieee14'"));
        assert!(message.contains("Available formats: psse_raw, psse_dyr"));
    });
}

#[test]
fn formats_and_variants_follow_manifest_order() {
    let (_temp, bundle) = bundle();
    assert_eq!(locator::formats(&bundle), vec![PSSE_RAW, PSSE_DYR]);
    assert_eq!(locator::variants(&bundle, "dyr"), vec!["genrou"]);
    assert!(locator::variants(&bundle, "raw").is_empty());
}
