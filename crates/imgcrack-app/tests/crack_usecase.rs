mod support;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use imgcrack_app::{CrackPlan, RunSession, crack_with_backend};
use imgcrack_core::candidates::CandidateSource;
use imgcrack_core::events::{RecordingReporter, RunEvent};
use imgcrack_core::input::ChannelLines;
use imgcrack_core::scheduler::TargetOutcome;
use imgcrack_core::signal_bus::{Signal, SignalBus};

use support::{Event, FakeBackend, fast_config, write_source};

fn plan(targets: &[&str], sources: Vec<CandidateSource>) -> CrackPlan {
    CrackPlan {
        config: fast_config(),
        targets: targets.iter().map(PathBuf::from).collect(),
        sources,
    }
}

#[test]
fn finds_first_target_and_exhausts_second() {
    let temp = tempfile::tempdir().expect("temp dir");
    let list = write_source(temp.path(), "list.txt", &["aaa", "bbb", "ccc"]);
    let plan = plan(&["/img/A.dmg", "/img/B.dmg"], vec![CandidateSource::from_path(list)]);
    let backend = FakeBackend::new().accepting(&plan.targets[0], "bbb");
    let (_sender, receiver) = mpsc::channel();
    let reporter = RecordingReporter::new();

    let reports = crack_with_backend(
        &backend,
        &plan,
        RunSession {
            bus: Arc::new(SignalBus::new()),
            reporter: &reporter,
            lines: Box::new(ChannelLines::new(receiver)),
        },
    )
    .expect("run");

    assert_eq!(reports.len(), 2);
    assert!(matches!(
        &reports[0].outcome,
        TargetOutcome::Found { candidate, .. } if candidate == b"bbb"
    ));
    assert_eq!(reports[1].outcome, TargetOutcome::NoMatch);
    assert_eq!(backend.attempts(&plan.targets[0]), vec!["aaa", "bbb"]);
    assert_eq!(backend.attempts(&plan.targets[1]), vec!["aaa", "bbb", "ccc"]);

    let events = backend.events();
    assert_eq!(events.first(), Some(&Event::Sweep));
    assert_eq!(events.last(), Some(&Event::Sweep));
    assert_eq!(backend.live_processes(), 0);
    assert!(
        reporter
            .events()
            .iter()
            .any(|event| matches!(event, RunEvent::NoMatch { .. }))
    );
}

#[test]
fn operator_quit_aborts_the_run_and_reaps_the_attempt() {
    let temp = tempfile::tempdir().expect("temp dir");
    let list = write_source(temp.path(), "list.txt", &["aaa", "bbb"]);
    let plan = plan(&["/img/A.dmg", "/img/B.dmg"], vec![CandidateSource::from_path(list)]);
    let backend = FakeBackend::new().hanging_on_reject();
    let (sender, receiver) = mpsc::channel();
    let typist = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        sender.send("q".to_string()).expect("send quit");
    });

    let reports = crack_with_backend(
        &backend,
        &plan,
        RunSession {
            bus: Arc::new(SignalBus::new()),
            reporter: &RecordingReporter::new(),
            lines: Box::new(ChannelLines::new(receiver)),
        },
    )
    .expect("run");
    typist.join().expect("typist thread");

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, TargetOutcome::Aborted);
    assert_eq!(backend.attempts(&plan.targets[0]), vec!["aaa"]);
    assert!(backend.attempts(&plan.targets[1]).is_empty());
    assert_eq!(backend.live_processes(), 0);
}

#[test]
fn skip_target_from_operator_moves_to_next_image() {
    let temp = tempfile::tempdir().expect("temp dir");
    let list = write_source(temp.path(), "list.txt", &["aaa", "bbb"]);
    let plan = plan(&["/img/A.dmg", "/img/B.dmg"], vec![CandidateSource::from_path(list)]);
    let accepted = plan.targets[1].clone();
    let backend = FakeBackend::new()
        .hanging_on_reject()
        .accepting(&accepted, "aaa");
    let (sender, receiver) = mpsc::channel();
    let typist = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        sender.send("b".to_string()).expect("send skip");
    });

    let reports = crack_with_backend(
        &backend,
        &plan,
        RunSession {
            bus: Arc::new(SignalBus::new()),
            reporter: &RecordingReporter::new(),
            lines: Box::new(ChannelLines::new(receiver)),
        },
    )
    .expect("run");
    typist.join().expect("typist thread");

    assert_eq!(reports[0].outcome, TargetOutcome::SkippedTarget);
    assert!(matches!(
        &reports[1].outcome,
        TargetOutcome::Found { candidate, .. } if candidate == b"aaa"
    ));
    assert_eq!(backend.live_processes(), 0);
}

#[test]
fn abort_raised_before_start_attempts_nothing() {
    let temp = tempfile::tempdir().expect("temp dir");
    let list = write_source(temp.path(), "list.txt", &["aaa"]);
    let plan = plan(&["/img/A.dmg"], vec![CandidateSource::from_path(list)]);
    let backend = FakeBackend::new();
    let bus = Arc::new(SignalBus::new());
    bus.set(Signal::Abort);
    let (_sender, receiver) = mpsc::channel();

    let reports = crack_with_backend(
        &backend,
        &plan,
        RunSession {
            bus,
            reporter: &RecordingReporter::new(),
            lines: Box::new(ChannelLines::new(receiver)),
        },
    )
    .expect("run");

    assert!(reports.is_empty());
    assert!(backend.attempts(&plan.targets[0]).is_empty());
    assert_eq!(backend.events(), vec![Event::Sweep, Event::Sweep]);
}

#[test]
fn empty_plan_is_rejected() {
    let backend = FakeBackend::new();
    let (_sender, receiver) = mpsc::channel();

    let error = crack_with_backend(
        &backend,
        &plan(&["/img/A.dmg"], Vec::new()),
        RunSession {
            bus: Arc::new(SignalBus::new()),
            reporter: &RecordingReporter::new(),
            lines: Box::new(ChannelLines::new(receiver)),
        },
    )
    .expect_err("no sources");

    assert!(error.to_string().contains("no candidate sources"));
    assert!(backend.events().is_empty());
}
