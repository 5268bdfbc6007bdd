use std::fs;
use tempfile::tempdir;

use relocator::{Config, EngineEvent, RelocationEngine, RelocationRequest, RelocationState};

#[cfg(unix)]
#[test]
fn percent_never_decreases_and_finished_is_last() {
    let td = tempdir().unwrap();
    let base = dunce::canonicalize(td.path()).unwrap();
    let source = base.join("src/Tree");
    for i in 0..7 {
        let dir = source.join(format!("d{}", i % 3));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("f{i}.dat")), vec![0u8; 100 + i]).unwrap();
    }

    let engine = RelocationEngine::new(Config::with_log_dir(base.join("logs")));
    let plan = engine.plan(&RelocationRequest::new(&source, base.join("dst"))).unwrap();
    let execution = engine.execute(plan).unwrap();
    let events: Vec<EngineEvent> = execution.events().iter().collect();
    execution.wait();

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Progress(p) => Some(p.percent),
            _ => None,
        })
        .collect();
    assert!(!percents.is_empty());
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "percent regressed: {percents:?}"
    );
    assert_eq!(*percents.last().unwrap(), 100);

    let finished = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Finished(_)))
        .count();
    assert_eq!(finished, 1);
    assert!(matches!(events.last(), Some(EngineEvent::Finished(_))));

    let states: Vec<RelocationState> = events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::State(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(
        states,
        vec![
            RelocationState::Planned,
            RelocationState::SpaceChecked,
            RelocationState::Transferring,
            RelocationState::ReapingEmptyDirs,
            RelocationState::LinkPublished,
            RelocationState::Completed,
        ]
    );
}

#[test]
fn second_execution_while_running_is_refused() {
    let td = tempdir().unwrap();
    let source = td.path().join("src");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("a"), "a").unwrap();

    let engine = RelocationEngine::new(Config::with_log_dir(td.path().join("logs")));
    let plan = engine
        .plan(&RelocationRequest::new(&source, td.path().join("dst")).dry_run(true))
        .unwrap();

    let mut second = None;
    let outcome = engine
        .run(plan.clone(), |ev| {
            if second.is_none() && matches!(ev, EngineEvent::State(RelocationState::Planned)) {
                second = Some(engine.execute(plan.clone()).map(|_| ()));
            }
        })
        .unwrap();

    assert_eq!(second, Some(Err(relocator::RelocateError::EngineBusy)));
    assert_eq!(outcome.state(), RelocationState::PreviewCompleted);
    assert!(!engine.is_busy(), "engine must be free once the run returns");
    let again = engine.execute(plan).unwrap().wait();
    assert_eq!(again.state(), RelocationState::PreviewCompleted);
}
