//! Data models for crossloop.
//!
//! - [`Settings`]: The application settings loaded from `crossloop.yaml`
//! - [`LoggingSettings`]: Log directory, file prefix and verbosity
//! - [`RuntimeSettings`]: Tokio runtime sizing and shutdown timeout
//! - [`ProgressSettings`]: Which buttons progress indicators show
//!
//! All structs derive `Serialize`/`Deserialize` with `#[serde(default)]`, so a
//! settings file only needs the keys it changes.

pub mod settings;

pub use settings::{LoggingSettings, ProgressSettings, RuntimeSettings, Settings};
