mod common;

use std::fs;

use assert_matches::assert_matches;

use powerful_cases::domain::{MATPOWER, PSSE_DYR, PSSE_RAW};
use powerful_cases::error::CaseError;
use powerful_cases::manifest::{self, MANIFEST_FILE};

use common::{temp_root, write_case};

#[test]
fn parses_credits_and_metadata() {
    let (_temp, root) = temp_root();
    let dir = write_case(
        &root,
        "ieee39",
        &[(
            MANIFEST_FILE,
            r#"
name = "ieee39"
description = "IEEE 39-bus New England system"
data_version = "2024-01"
collection = "ieee"
tags = ["transmission", "dynamics"]

[[files]]
path = "ieee39.raw"
format = "psse_raw"
format_version = "33"
default = true

[[files]]
path = "ieee39.dyr"
format = "psse_dyr"
includes = ["ieee39_extra.dyr"]

[credits]
license = "CC-BY-4.0"
authors = ["T. Athay"]

[[credits.citations]]
text = "Athay et al., 1979"
doi = "10.1109/TPAS.1979.319407"
"#,
        )],
    );

    let parsed = manifest::load_manifest(&dir).unwrap();
    assert_eq!(parsed.description.as_deref(), Some("IEEE 39-bus New England system"));
    assert_eq!(parsed.collection.as_deref(), Some("ieee"));
    assert_eq!(parsed.tags, vec!["transmission", "dynamics"]);
    assert_eq!(parsed.files.len(), 2);
    assert_eq!(parsed.files[1].includes, vec!["ieee39_extra.dyr"]);

    let credits = parsed.credits.unwrap();
    assert_eq!(credits.license.as_deref(), Some("CC-BY-4.0"));
    assert_eq!(credits.citations[0].doi.as_deref(), Some("10.1109/TPAS.1979.319407"));
}

#[test]
fn duplicate_defaults_are_rejected() {
    let (_temp, root) = temp_root();
    let dir = write_case(
        &root,
        "broken",
        &[(
            MANIFEST_FILE,
            r#"
[[files]]
path = "a.raw"
format = "psse_raw"
default = true

[[files]]
path = "b.raw"
format = "psse_raw"
default = true
"#,
        )],
    );

    assert_matches!(
        manifest::load_manifest(&dir),
        Err(CaseError::Manifest { message, .. }) if message.contains("more than one default")
    );
}

#[test]
fn escaping_file_paths_are_rejected() {
    let (_temp, root) = temp_root();
    let dir = write_case(
        &root,
        "escape",
        &[(
            MANIFEST_FILE,
            "[[files]]\npath = \"../../etc/passwd\"\nformat = \"psse_raw\"\n",
        )],
    );

    assert_matches!(manifest::load_manifest(&dir), Err(CaseError::Manifest { .. }));
}

#[test]
fn malformed_toml_is_a_manifest_error() {
    let (_temp, root) = temp_root();
    let dir = write_case(&root, "garbled", &[(MANIFEST_FILE, "[[files]\npath = ")]);

    assert_matches!(manifest::load_manifest(&dir), Err(CaseError::Manifest { path, .. }) => {
        assert_eq!(path, dir.join(MANIFEST_FILE));
    });
}

#[test]
fn infers_formats_versions_and_variants() {
    let (_temp, root) = temp_root();
    let dir = write_case(
        &root,
        "case9",
        &[
            ("case9.m", "mpc"),
            ("case9.raw", "raw"),
            ("case9_v33.raw", "raw33"),
            ("case9.dyr", "dyr"),
            ("case9_genrou.dyr", "genrou"),
            ("README.md", "docs"),
            (".hidden.raw", "skip"),
        ],
    );

    let inferred = manifest::load_manifest(&dir).unwrap();
    assert_eq!(inferred.name.as_deref(), Some("case9"));
    assert_eq!(inferred.formats(), vec![PSSE_DYR, MATPOWER, PSSE_RAW]);
    assert_eq!(inferred.variants(PSSE_DYR), vec!["genrou"]);

    let raw = inferred.default_file(PSSE_RAW).unwrap();
    assert_eq!(raw.path, "case9.raw");
    let v33 = inferred.file_entry(PSSE_RAW, Some("33"), None).unwrap();
    assert_eq!(v33.path, "case9_v33.raw");
    assert_eq!(inferred.default_file(PSSE_DYR).unwrap().path, "case9.dyr");
    assert!(inferred.default_file(MATPOWER).unwrap().default);
}

#[test]
fn directory_without_case_files_cannot_be_inferred() {
    let (_temp, root) = temp_root();
    let dir = write_case(&root, "docs", &[("README.md", "nothing here")]);

    assert_matches!(manifest::load_manifest(&dir), Err(CaseError::Manifest { .. }));
}

#[test]
fn create_manifest_writes_inferred_toml_once() {
    let (_temp, root) = temp_root();
    let dir = write_case(&root, "case5", &[("case5.m", "mpc"), ("case5.raw", "raw")]);

    let path = manifest::create_manifest(&dir).unwrap();
    assert_eq!(path, dir.join(MANIFEST_FILE));

    let written = manifest::parse_manifest(&path).unwrap();
    assert_eq!(written, manifest::infer_manifest(&dir).unwrap());
    assert!(fs::read_to_string(&path).unwrap().contains("format = \"matpower\""));

    assert_matches!(manifest::create_manifest(&dir), Err(CaseError::AlreadyExists(_)));
}
