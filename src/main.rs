//! crossloop - demonstration binary
//!
//! # Overview
//!
//! Runs three background operations against a progress panel whose UI loop is
//! driven by the main thread. It initializes:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime (its blocking pool runs the operations)
//! - The UI run loop, the [`ProgressPanel`] and a [`ProgressContext`]
//!
//! # Execution Flow
//!
//! 1. Load `crossloop-data/crossloop.yaml` (defaults when missing)
//! 2. Initialize logging → logs/crossloop.<date>
//! 3. Create the tokio runtime from the runtime settings
//! 4. Spawn the operations; each gets a progress bridge from the panel
//! 5. Drive the UI loop: pause, resume, cancel and close indicators on a schedule
//! 6. Collect the results and shut the runtime down with the configured timeout

use anyhow::{Context, Result};
use crossloop::models::Settings;
use crossloop::{
    APP_NAME, BackgroundExecutor, ConfigManager, FailureReporter, LogFailureReporter, PanelEvent,
    Progress, ProgressContext, ProgressPanel, RunLoop, VERSION,
};
use std::sync::Arc;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(20);

/// Simulated operation: `steps` units of work, failing at `fail_at` if given
fn simulated_work(
    name: &str,
    progress: &dyn Progress,
    steps: u32,
    fail_at: Option<u32>,
) -> Result<u32> {
    for step in 0..steps {
        progress.checkpoint()?;

        if fail_at == Some(step) {
            return Err(anyhow::anyhow!("unexpected end of stream"))
                .with_context(|| format!("Failed to {} block {}", name, step));
        }

        std::thread::sleep(TICK);
        progress.set_progress(f64::from(step + 1) / f64::from(steps));
    }

    Ok(steps)
}

fn log_event(event: &PanelEvent) {
    match event {
        PanelEvent::ProgressChanged { .. } => tracing::trace!("{:?}", event),
        _ => tracing::info!("Panel: {:?}", event),
    }
}

fn main() -> Result<()> {
    let config_manager = ConfigManager::new("crossloop-data")?;
    let settings: Settings = config_manager.load_settings()?;

    let _log_guard = crossloop::logging::init_logging(&settings.logging)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(settings.runtime.worker_threads)
        .thread_name(settings.runtime.thread_name.clone())
        .build()
        .context("Failed to build the tokio runtime")?;

    tracing::info!(
        "Tokio runtime initialized with {} worker threads",
        settings.runtime.worker_threads
    );

    // The main thread plays the UI thread.
    let mut ui_loop = RunLoop::with_name("ui");
    let panel = ProgressPanel::new(ui_loop.handle(), settings.progress);
    let mut events = panel.subscribe();
    let context = ProgressContext::new(ui_loop.handle()).with_manager(Arc::new(panel.clone()));
    let executor = BackgroundExecutor::new(runtime.handle().clone(), context);
    let reporter: Arc<dyn FailureReporter> = Arc::new(LogFailureReporter);

    let handles = vec![
        executor.spawn_reported("checksum", reporter.clone(), |progress| {
            simulated_work("checksum", progress, 60, None)
        }),
        executor.spawn_reported("index", reporter.clone(), |progress| {
            simulated_work("index", progress, 80, None)
        }),
        executor.spawn_reported("compress", reporter.clone(), |progress| {
            simulated_work("compress", progress, 50, Some(20))
        }),
    ];

    let mut tick = 0u32;
    while handles.iter().any(|handle| !handle.is_finished()) {
        ui_loop.process_pending();

        while let Ok(event) = events.try_recv() {
            log_event(&event);
        }

        match tick {
            10 => {
                if let Some(id) = panel.find("checksum") {
                    panel.pause(id, true);
                }
            }
            30 => {
                if let Some(id) = panel.find("index") {
                    panel.cancel(id);
                }
            }
            35 => {
                if let Some(id) = panel.find("index") {
                    panel.close(id)?;
                }
            }
            40 => {
                if let Some(id) = panel.find("checksum") {
                    panel.pause(id, false);
                }
            }
            _ => {}
        }

        tick += 1;
        std::thread::sleep(TICK);
    }

    for (name, handle) in ["checksum", "index", "compress"].into_iter().zip(handles) {
        match runtime.block_on(handle) {
            Ok(Some(steps)) => tracing::info!("Operation '{}' completed {} steps", name, steps),
            Ok(None) => tracing::info!("Operation '{}' did not complete", name),
            Err(e) => tracing::error!("Operation '{}' task failed: {}", name, e),
        }
    }

    // Failure reports posted by the workers.
    ui_loop.process_pending();

    let closed = panel.close_all()?;
    while let Ok(event) = events.try_recv() {
        log_event(&event);
    }
    tracing::info!("Closed {} remaining indicator(s)", closed);

    // Stopping the UI loop logs its dispatch metrics.
    drop(ui_loop);
    runtime.shutdown_timeout(settings.runtime.shutdown_timeout());

    tracing::info!("Shutdown complete");
    Ok(())
}
