#![cfg(unix)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use walkdir::WalkDir;

use relocator::{Config, RelocationEngine, RelocationOutcome, RelocationRequest};

fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn files_are_readable_through_the_link() {
    let td = tempdir().unwrap();
    let base = dunce::canonicalize(td.path()).unwrap();
    let source = base.join("games/Foo");
    fs::create_dir_all(source.join("data/maps")).unwrap();
    fs::write(source.join("game.bin"), vec![7u8; 4096]).unwrap();
    fs::write(source.join("data/config.ini"), "[video]\nwidth=1920\n").unwrap();
    fs::write(source.join("data/maps/e1m1.map"), "spawn 0 0 0").unwrap();
    fs::create_dir_all(source.join("empty/leaf")).unwrap();
    let before = snapshot(&source);

    let engine = RelocationEngine::new(Config::with_log_dir(base.join("logs")));
    let plan = engine.plan(&RelocationRequest::new(&source, base.join("archive"))).unwrap();
    assert_eq!(plan.estimated_file_count, 3);
    assert_eq!(plan.estimated_byte_size, 4096 + 19 + 11);

    let outcome = engine.execute(plan.clone()).unwrap().wait();
    let RelocationOutcome::Completed { destination, link, summary } = &outcome else {
        panic!("expected Completed, got {outcome:?}");
    };
    assert_eq!(*destination, plan.destination_path);
    assert_eq!(summary.progress.files_moved, 3);
    assert_eq!(summary.bytes, plan.estimated_byte_size);

    let meta = fs::symlink_metadata(&source).unwrap();
    assert!(meta.file_type().is_symlink(), "source path should now be a link");
    assert_eq!(fs::read_link(&source).unwrap(), plan.destination_path);
    assert_eq!(link.link_path, source);

    assert_eq!(snapshot(&source), before, "contents through the link must match");
    assert_eq!(snapshot(&plan.destination_path), before);

    let log = fs::read_to_string(&summary.log_path).unwrap();
    assert_eq!(log.matches("MOVED ").count(), 3);
    assert!(log.contains("SUMMARY completed"));
}

#[test]
fn identical_files_already_at_destination_count_as_skipped() {
    let td = tempdir().unwrap();
    let base = dunce::canonicalize(td.path()).unwrap();
    let source = base.join("src/Foo");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("a.txt"), "same").unwrap();
    fs::write(source.join("b.txt"), "new").unwrap();

    let engine = RelocationEngine::new(Config::with_log_dir(base.join("logs")));
    let plan = engine.plan(&RelocationRequest::new(&source, base.join("dst"))).unwrap();
    fs::create_dir_all(&plan.destination_path).unwrap();
    fs::write(plan.destination_path.join("a.txt"), "same").unwrap();

    let outcome = engine.execute(plan.clone()).unwrap().wait();
    let summary = outcome.summary();
    assert!(matches!(outcome, RelocationOutcome::Completed { .. }), "{outcome:?}");
    assert_eq!(summary.progress.files_moved, 1);
    assert_eq!(summary.progress.files_skipped, 1);
    assert_eq!(fs::read_to_string(source.join("b.txt")).unwrap(), "new");
}
