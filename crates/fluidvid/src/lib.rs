pub mod config;
pub mod error;
pub mod event_log;
pub mod hardware;
pub mod job;
pub mod progress;
pub mod prompt;
pub mod runner;

pub use config::Config;
pub use error::PreflightError;
pub use event_log::{DisplayedMessages, EventLog, LogEvent, LogTail, Severity};
pub use hardware::{AcceleratorDescriptor, Codec, EncoderProfile, EncoderProfiles, Vendor};
pub use job::{build_queue, Job, JobKind, QueueSpec};
pub use progress::{ProgressSnapshot, ProgressState, Shutdown, ShutdownListener};
pub use runner::{FfmpegExecutor, JobRunner, RunReport, ToolExecutor, ToolOutcome};

/// Display name used in titles and headers
pub const APP_NAME: &str = "FluidVid";

/// Crate version, shown next to `APP_NAME`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
