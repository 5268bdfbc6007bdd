#![cfg(unix)]

use std::os::unix::fs::symlink;
use tempfile::tempdir;

use relocator::{RelocateError, audit_volume};

#[test]
fn reports_links_and_skips_trash() {
    let td = tempdir().unwrap();
    let root = td.path();
    std::fs::create_dir_all(root.join("games")).unwrap();
    std::fs::create_dir_all(root.join("archive/Foo")).unwrap();
    std::fs::create_dir_all(root.join("$RECYCLE.BIN/S-1-5")).unwrap();
    symlink(root.join("archive/Foo"), root.join("games/Foo")).unwrap();
    symlink(root.join("archive/Foo"), root.join("$RECYCLE.BIN/S-1-5/Old")).unwrap();

    let mut streamed = Vec::new();
    let report = audit_volume(root, |e| streamed.push(e.clone())).unwrap();

    assert_eq!(report.entries.len(), 1, "{report}");
    let entry = &report.entries[0];
    assert_eq!(entry.path, root.join("games/Foo"));
    assert_eq!(entry.target.as_deref(), Some(root.join("archive/Foo").as_path()));
    assert_eq!(streamed, report.entries, "entries are streamed as found");
}

#[test]
fn empty_tree_has_no_links() {
    let td = tempdir().unwrap();
    std::fs::create_dir_all(td.path().join("plain/dir")).unwrap();
    std::fs::write(td.path().join("plain/file.txt"), "x").unwrap();

    let report = audit_volume(td.path(), |_| {}).unwrap();
    assert!(report.entries.is_empty());
    assert_eq!(report.to_string(), "No links found.");
}

#[test]
fn missing_root_is_invalid() {
    let td = tempdir().unwrap();
    let err = audit_volume(&td.path().join("nope"), |_| {}).unwrap_err();
    assert!(matches!(err, RelocateError::InvalidPath { .. }), "{err:?}");
}

#[test]
fn file_name_ending_in_colon_keeps_link_paths_intact() {
    let td = tempdir().unwrap();
    let root = td.path();
    std::fs::create_dir_all(root.join("games")).unwrap();
    std::fs::create_dir_all(root.join("archive")).unwrap();
    std::fs::write(root.join("games/a-notes:"), "x").unwrap();
    symlink(root.join("archive"), root.join("games/zz-link")).unwrap();

    let report = audit_volume(root, |_| {}).unwrap();
    assert_eq!(report.entries.len(), 1, "{report}");
    assert_eq!(report.entries[0].path, root.join("games/zz-link"));
}
