//! forcepoint live display
//!
//! Streams force/torque records from a growing sensor log, smooths them, runs
//! the point-of-application estimator and drives a marker display.
//!
//! # Architecture
//!
//! ```text
//! sensor log ──LogTail──▶ latest record ──parse──▶ MovingAverage(6)
//!     ──PoaEstimator──▶ Estimate ──MarkerSink──▶ console / kiss3d window
//! ```
//!
//! One tick per timer interval, strictly sequential. The log is removed when
//! the loop exits (see [`cleanup`]).
//!
//! # Components
//!
//! - [`config`]: `[live]` section and the combined application config
//! - [`tail`]: Offset-tracking reader for appended log lines
//! - [`live`]: Timer-driven estimation loop
//! - [`sink`]: Marker outputs
//! - [`cleanup`]: Remove-on-exit guard for the sensor log
//! - [`synth`]: Synthetic sensor feed for demos and tests

pub mod config;
pub mod tail;
pub mod sink;
pub mod live;
pub mod cleanup;
pub mod synth;

#[cfg(feature = "viewer")]
pub mod viewer;

#[cfg(feature = "viewer")]
pub use viewer::ViewerSink;

// Re-exports
pub use config::{AppConfig, LiveConfig};
pub use tail::{LogTail, TailError, TailStart};
pub use sink::{ConsoleSink, MarkerSink, RecordingSink};
pub use live::{
    install_stop_handler, LiveError, LiveLoop, LoopStats, RunOptions, RunSummary, StopReason,
    TickOutcome,
};
pub use cleanup::RemoveOnDrop;
pub use synth::{SynthError, SyntheticFeed};
