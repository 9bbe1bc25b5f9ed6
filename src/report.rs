// Failure reporting - turns an error chain into a user-facing report
//
// User cancellation is not a failure: any `Cancelled` in the chain suppresses
// the report entirely.

use crate::dispatch::{InvokeMode, RunLoopHandle};
use crate::error::Cancelled;
use std::sync::Arc;

const UNKNOWN_PROBLEM: &str = "A problem of unknown source occurred.";
const SINGLE_PROBLEM: &str = "A problem occurred:";
const CHAINED_PROBLEM: &str = "A problem occurred with the following chain of reasons:";

/// Text of a failure as presented to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// One-line summary
    pub main_message: String,

    /// Cause description; numbered and tab-indented when there are several
    pub reasons: String,
}

impl FailureReport {
    /// Build a report from an error chain.
    ///
    /// Returns `None` when the chain contains [`Cancelled`]. Causes with an
    /// empty message are skipped.
    ///
    /// # Example
    /// ```
    /// use anyhow::anyhow;
    /// use crossloop::FailureReport;
    ///
    /// let error = anyhow!("disk full").context("Failed to write index");
    /// let report = FailureReport::from_error(&error).unwrap();
    ///
    /// assert_eq!(report.reasons, "\t1. Failed to write index\n\t2. disk full");
    /// ```
    pub fn from_error(error: &anyhow::Error) -> Option<Self> {
        if error.chain().any(|cause| cause.is::<Cancelled>()) {
            return None;
        }

        let whats: Vec<String> = error
            .chain()
            .map(|cause| cause.to_string())
            .filter(|what| !what.is_empty())
            .collect();

        Some(Self::from_reasons(whats))
    }

    fn from_reasons(mut whats: Vec<String>) -> Self {
        match whats.len() {
            0 => Self {
                main_message: UNKNOWN_PROBLEM.to_string(),
                reasons: String::new(),
            },
            1 => Self {
                main_message: SINGLE_PROBLEM.to_string(),
                reasons: whats.remove(0),
            },
            _ => Self {
                main_message: CHAINED_PROBLEM.to_string(),
                reasons: whats
                    .iter()
                    .enumerate()
                    .map(|(i, what)| format!("\t{}. {}", i + 1, what))
                    .collect::<Vec<_>>()
                    .join("\n"),
            },
        }
    }
}

/// Presents failure reports to the user.
///
/// `present` is always called on the UI loop.
pub trait FailureReporter: Send + Sync {
    fn present(&self, report: &FailureReport);
}

/// Reporter that writes reports to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFailureReporter;

impl FailureReporter for LogFailureReporter {
    fn present(&self, report: &FailureReport) {
        if report.reasons.is_empty() {
            tracing::error!("{}", report.main_message);
        } else {
            tracing::error!("{}\n{}", report.main_message, report.reasons);
        }
    }
}

/// A report on its way to the UI loop; warns if dropped before presentation
struct PendingReport {
    reporter: Arc<dyn FailureReporter>,
    report: Option<FailureReport>,
    ui_name: String,
}

impl PendingReport {
    fn present(mut self) {
        if let Some(report) = self.report.take() {
            self.reporter.present(&report);
        }
    }
}

impl Drop for PendingReport {
    fn drop(&mut self) {
        if let Some(report) = self.report.take() {
            tracing::warn!(
                "Failure report dropped: UI loop '{}' stopped before presenting it ({})",
                self.ui_name,
                report.main_message
            );
        }
    }
}

/// Report `error` on the UI loop.
///
/// Returns false when nothing was queued, either because the error is a
/// user cancellation or because the UI loop had already stopped. A report
/// that is queued but abandoned when the loop stops later is logged as a
/// warning instead of being presented.
pub fn report_failure(
    ui: &RunLoopHandle,
    reporter: Arc<dyn FailureReporter>,
    error: &anyhow::Error,
) -> bool {
    let Some(report) = FailureReport::from_error(error) else {
        tracing::debug!("Operation cancelled by user; not reported");
        return false;
    };

    tracing::error!("Operation failed: {:#}", error);

    let pending = PendingReport {
        reporter,
        report: Some(report),
        ui_name: ui.name().to_string(),
    };
    let presented = ui.post(move || pending.present(), InvokeMode::Auto);
    match presented.try_wait() {
        Ok(Err(dispatch_error)) if dispatch_error.is_thread_unavailable() => false,
        _ => true,
    }
}
