// crossloop - Cross-thread task dispatch and cancellable progress reporting
//
// This is the library crate containing the dispatcher, the progress layer and
// the ambient configuration/logging set-up. The binary crate (main.rs) runs a
// demonstration with a UI loop on the main thread and workers on tokio.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod monitor;
pub mod progress;
pub mod report;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use context::ProgressContext;
pub use dispatch::{InvokeMode, LoopThread, RunLoop, RunLoopHandle, TaskFuture};
pub use error::{Cancelled, DispatchError, PanicPayload};
pub use executor::BackgroundExecutor;
pub use metrics::DispatchMetrics;
pub use models::Settings;
pub use monitor::Monitor;
pub use progress::{
    NullProgress, PanelEvent, Progress, ProgressBridge, ProgressChannel, ProgressIndicator,
    ProgressManager, ProgressPanel, ProgressState, ProgressView,
};
pub use report::{FailureReport, FailureReporter, LogFailureReporter, report_failure};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
