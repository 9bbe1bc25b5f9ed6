//! Integration tests for progress reporting and cancellation
//!
//! These tests verify that:
//! - Cancellation releases every worker, whatever the pause history
//! - Workers outlive their progress indicators safely
//! - Bridges can be dropped in any order
//! - The progress panel publishes events for its indicators
//! - Managers and failure reporters plug in through ProgressContext

use crossloop::models::ProgressSettings;
use crossloop::progress::set_global_manager;
use crossloop::{
    BackgroundExecutor, FailureReport, FailureReporter, LoopThread, NullProgress, PanelEvent,
    Progress, ProgressChannel, ProgressContext, ProgressIndicator, ProgressManager, ProgressPanel,
    ProgressState, RunLoop,
};
use mockall::mock;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tokio::time::{Duration, timeout};

mock! {
    pub Manager {}

    impl ProgressManager for Manager {
        fn create_progress(&self, operation_name: &str) -> Box<dyn Progress>;
    }
}

mock! {
    pub Reporter {}

    impl FailureReporter for Reporter {
        fn present(&self, report: &FailureReport);
    }
}

/// Loop until told to abort, then check the answer stays true.
fn run_worker(progress: &dyn Progress) -> bool {
    let mut step = 0u32;
    while !progress.shall_abort() {
        step = (step + 1) % 100;
        progress.set_progress(f64::from(step) / 100.0);
        thread::yield_now();
    }
    (0..10).all(|_| progress.shall_abort())
}

#[test]
fn test_cancel_releases_every_worker() {
    let channel = ProgressChannel::new();
    channel.pause(true);

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let channel = channel.clone();
            thread::spawn(move || run_worker(&channel))
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    assert!(workers.iter().all(|worker| !worker.is_finished()));

    assert!(channel.cancel());
    assert!(!channel.cancel());

    for worker in workers {
        assert!(worker.join().unwrap());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_any_pause_history_ends_in_abort(ops in prop::collection::vec(0u8..3, 0..24)) {
        let channel = ProgressChannel::new();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let channel = channel.clone();
                thread::spawn(move || run_worker(&channel))
            })
            .collect();

        for op in ops {
            match op {
                0 => channel.pause(true),
                1 => channel.resume(),
                _ => {
                    channel.cancel();
                }
            }
            thread::yield_now();
        }
        channel.cancel();

        for worker in workers {
            prop_assert!(worker.join().unwrap());
        }
        prop_assert_eq!(channel.state(), ProgressState::Cancelled);
    }
}

#[test]
fn test_indicator_destroyed_while_worker_loops() {
    let ui = LoopThread::spawn("indicator-ui").unwrap();
    let panel = ProgressPanel::new(ui.handle().clone(), ProgressSettings::default());
    let bridge = panel.open("Long scan").unwrap();
    let id = panel.find("Long scan").unwrap();

    let reported = Arc::new(AtomicBool::new(false));
    let worker = {
        let reported = Arc::clone(&reported);
        thread::spawn(move || {
            let result = run_worker(&bridge);
            // Ignored: the indicator is gone.
            bridge.set_progress(0.99);
            reported.store(true, Ordering::SeqCst);
            (result, bridge.is_attached())
        })
    };

    thread::sleep(Duration::from_millis(20));
    assert!(panel.close(id).unwrap());

    let (aborted, attached) = worker.join().unwrap();
    assert!(aborted);
    assert!(!attached);
    assert!(reported.load(Ordering::SeqCst));
    assert!(panel.is_empty());
}

#[test]
fn test_indicator_destroyed_while_worker_paused() {
    let indicator = ProgressIndicator::new("paused scan");
    indicator.channel().pause(true);
    let bridge = indicator.attach();

    let worker = thread::spawn(move || run_worker(&bridge));
    thread::sleep(Duration::from_millis(20));
    drop(indicator);

    assert!(worker.join().unwrap());
}

#[test]
fn test_two_bridges_dropped_in_either_order() {
    for first_dropped in 0..2 {
        let indicator = ProgressIndicator::new("two observers");
        let mut bridges = vec![indicator.attach(), indicator.attach()];
        assert_eq!(indicator.observer_count(), 2);

        let first = bridges.remove(first_dropped);
        drop(first);
        assert_eq!(indicator.observer_count(), 1);

        bridges.clear();
        assert_eq!(indicator.observer_count(), 0);

        // Teardown must not touch the dropped bridges.
        drop(indicator);
    }
}

#[test]
fn test_bridge_outlives_indicator_and_registry() {
    let indicator = ProgressIndicator::new("short-lived");
    let first = indicator.attach();
    let second = indicator.attach();

    drop(indicator);
    drop(second);

    assert!(first.shall_abort());
    first.set_progress(0.5);
}

#[tokio::test]
async fn test_panel_publishes_indicator_lifecycle() {
    let ui = tokio::task::spawn_blocking(|| LoopThread::spawn("events-ui").unwrap())
        .await
        .unwrap();
    let panel = ProgressPanel::new(ui.handle().clone(), ProgressSettings::default());
    let mut rx = panel.subscribe();

    let bridge = {
        let panel = panel.clone();
        tokio::task::spawn_blocking(move || panel.open("Upload").unwrap())
            .await
            .unwrap()
    };

    let added = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    let id = match added {
        PanelEvent::Added { id, ref operation } if operation == "Upload" => id,
        other => panic!("Expected Added event, got: {:?}", other),
    };

    bridge.set_progress(0.5);
    let event = timeout(Duration::from_millis(100), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event, PanelEvent::ProgressChanged { id, fraction: 0.5 });

    panel.pause(id, true);
    let event = timeout(Duration::from_millis(100), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event, PanelEvent::StateChanged { id, state: ProgressState::Paused });

    let closed = {
        let panel = panel.clone();
        tokio::task::spawn_blocking(move || panel.close(id).unwrap()).await.unwrap()
    };
    assert!(closed);
    let event = timeout(Duration::from_millis(100), rx.recv()).await.unwrap().unwrap();
    assert_eq!(event, PanelEvent::Removed { id });

    // The paused bridge is released by the teardown.
    assert!(bridge.shall_abort());

    tokio::task::spawn_blocking(move || drop(ui)).await.unwrap();
}

#[test]
fn test_context_uses_registered_manager() {
    let channel = ProgressChannel::new();
    channel.cancel();

    let mut manager = MockManager::new();
    let handed_out = channel.clone();
    manager
        .expect_create_progress()
        .withf(|name| name == "scan")
        .times(1)
        .returning(move |_| -> Box<dyn Progress> { Box::new(handed_out.clone()) });

    let run_loop = RunLoop::with_name("mock-ui");
    let context = ProgressContext::new(run_loop.handle()).with_manager(Arc::new(manager));

    let progress = context.create_progress("scan");
    assert!(progress.shall_abort());
}

#[test]
fn test_context_falls_back_to_null_progress() {
    let run_loop = RunLoop::with_name("null-ui");

    let explicit = ProgressContext::new(run_loop.handle());
    assert!(explicit.manager().is_none());
    assert!(!explicit.create_progress("anything").shall_abort());

    // The process-wide slot: empty means the no-op sink too.
    set_global_manager(None);
    let global = ProgressContext::from_global(run_loop.handle());
    assert!(global.manager().is_none());

    let mut manager = MockManager::new();
    manager
        .expect_create_progress()
        .returning(|_| -> Box<dyn Progress> { Box::new(NullProgress) });
    set_global_manager(Some(Arc::new(manager)));

    let global = ProgressContext::from_global(run_loop.handle());
    assert!(global.manager().is_some());
    assert!(!global.create_progress("through global").shall_abort());

    set_global_manager(None);
}

#[test]
fn test_failed_operation_is_reported_on_ui_loop() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ui = LoopThread::spawn("report-ui").unwrap();
    let ui_handle = ui.handle().clone();

    let mut reporter = MockReporter::new();
    reporter
        .expect_present()
        .withf(move |report| {
            report.main_message == "A problem occurred with the following chain of reasons:"
                && report.reasons == "\t1. Failed to upload chunk 3\n\t2. connection reset"
        })
        .times(1)
        .return_const(());
    let reporter: Arc<dyn FailureReporter> = Arc::new(reporter);

    let panel = ProgressPanel::new(ui_handle.clone(), ProgressSettings::default());
    let context = ProgressContext::new(ui_handle.clone()).with_manager(Arc::new(panel.clone()));
    let executor = BackgroundExecutor::new(rt.handle().clone(), context);

    let failed = executor.spawn_reported("Upload", Arc::clone(&reporter), |progress| {
        progress.checkpoint()?;
        Err::<(), _>(anyhow::anyhow!("connection reset").context("Failed to upload chunk 3"))
    });
    let cancelled = {
        let id_panel = panel.clone();
        let handle = executor.spawn_reported("Download", Arc::clone(&reporter), |progress| {
            // Spin until the controller cancels us.
            while !progress.shall_abort() {
                thread::yield_now();
            }
            progress.checkpoint()?;
            Ok(())
        });
        let id = id_panel.find("Download").unwrap();
        assert!(id_panel.cancel(id));
        handle
    };

    assert_eq!(rt.block_on(failed).unwrap(), None);
    assert_eq!(rt.block_on(cancelled).unwrap(), None);

    // Reports are queued on the UI loop; flush it.
    ui_handle.post_sync(|| ()).unwrap();
}
