use std::fs;
use tempfile::tempdir;

use relocator::{Config, EngineEvent, RelocationEngine, RelocationOutcome, RelocationRequest, RelocationState};

#[test]
fn preview_touches_nothing_and_reports_true_size() {
    let td = tempdir().unwrap();
    let source = td.path().join("src/Game");
    fs::create_dir_all(source.join("sub")).unwrap();
    fs::write(source.join("a.pak"), vec![1u8; 1500]).unwrap();
    fs::write(source.join("sub/b.pak"), vec![2u8; 500]).unwrap();
    let dest_root = td.path().join("not-created-yet");

    let engine = RelocationEngine::new(Config::with_log_dir(td.path().join("logs")));
    let plan = engine
        .plan(&RelocationRequest::new(&source, &dest_root).dry_run(true))
        .unwrap();

    let execution = engine.execute(plan.clone()).unwrap();
    let events: Vec<EngineEvent> = execution.events().iter().collect();
    let outcome = execution.wait();

    let RelocationOutcome::PreviewCompleted { summary } = &outcome else {
        panic!("expected PreviewCompleted, got {outcome:?}");
    };
    assert_eq!(summary.bytes, 2000);
    assert_eq!(summary.progress.total_files, 2);
    assert_eq!(summary.progress.files_moved, 0);

    assert!(!events.contains(&EngineEvent::State(RelocationState::Transferring)));
    assert!(source.join("a.pak").is_file());
    assert!(source.join("sub/b.pak").is_file());
    assert!(!fs::symlink_metadata(&source).unwrap().file_type().is_symlink());
    assert!(!dest_root.exists(), "dry run must not create the destination");

    let log = fs::read_to_string(&summary.log_path).unwrap();
    assert_eq!(log.matches("WOULD-MOVE ").count(), 2);
    assert!(log.contains("SUMMARY preview"));
}
