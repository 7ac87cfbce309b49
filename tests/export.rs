mod common;

use std::fs;

use assert_matches::assert_matches;

use powerful_cases::cache::Cache;
use powerful_cases::error::CaseError;
use powerful_cases::export;
use powerful_cases::registry::NoRegistry;
use powerful_cases::resolver::Resolver;

use common::{RecordingSink, temp_root, write_case};

fn resolver(root: &camino::Utf8Path) -> Resolver<NoRegistry> {
    write_case(
        root,
        "cases/ieee/ieee14",
        &[("ieee14.raw", "0123456789"), ("ieee14.dyr", "abcde")],
    );
    write_case(root, "cases/ieee/ieee14/extras", &[("notes.txt", "xyz")]);
    Resolver::new(root.join("cases"), Cache::at(root.join("cache")), NoRegistry)
}

#[test]
fn export_copies_whole_tree() {
    let (_temp, root) = temp_root();
    let resolver = resolver(&root);
    let sink = RecordingSink::default();

    let result = export::export_case(&resolver, "ieee14", &root.join("out"), false, &sink).unwrap();

    assert_eq!(result.case, "ieee14");
    assert_eq!(result.destination, root.join("out/ieee14").to_string());
    assert_eq!(result.files, 3);
    assert_eq!(result.total_bytes, 18);
    assert_eq!(
        fs::read_to_string(root.join("out/ieee14/extras/notes.txt")).unwrap(),
        "xyz"
    );
    assert!(
        sink.messages()
            .iter()
            .any(|message| message.starts_with("Copied 3 files"))
    );
}

#[test]
fn existing_destination_needs_overwrite() {
    let (_temp, root) = temp_root();
    let resolver = resolver(&root);
    let sink = RecordingSink::default();
    write_case(&root, "out/ieee14", &[("stale.txt", "old")]);

    let err = export::export_case(&resolver, "ieee14", &root.join("out"), false, &sink).unwrap_err();
    assert_matches!(err, CaseError::AlreadyExists(ref path) if path == &root.join("out/ieee14"));
    assert!(root.join("out/ieee14/stale.txt").as_std_path().exists());

    export::export_case(&resolver, "ieee14", &root.join("out"), true, &sink).unwrap();
    assert!(!root.join("out/ieee14/stale.txt").as_std_path().exists());
    assert!(root.join("out/ieee14/ieee14.raw").as_std_path().is_file());
}

#[test]
fn exported_copy_resolves_as_local_case() {
    let (_temp, root) = temp_root();
    let resolver = resolver(&root);
    let sink = RecordingSink::default();

    let result = export::export_case(&resolver, "ieee/ieee14", &root.join("out"), false, &sink).unwrap();
    let copy = resolver.resolve(&result.destination).unwrap();

    assert_eq!(copy.name(), "ieee14");
    assert_eq!(copy.raw().unwrap(), root.join("out/ieee14/ieee14.raw"));
}

#[test]
fn export_into_own_directory_is_refused() {
    let (_temp, root) = temp_root();
    let resolver = resolver(&root);
    let sink = RecordingSink::default();
    let inside = root.join("cases/ieee/ieee14");

    assert_matches!(
        export::export_case(&resolver, "ieee14", &inside, false, &sink),
        Err(CaseError::InvalidPath(_))
    );
}

#[test]
fn unknown_case_is_not_exported() {
    let (_temp, root) = temp_root();
    let resolver = resolver(&root);
    let sink = RecordingSink::default();

    assert_matches!(
        export::export_case(&resolver, "ieee300", &root.join("out"), false, &sink),
        Err(CaseError::UnknownCase { .. })
    );
    assert!(!root.join("out").as_std_path().exists());
}
