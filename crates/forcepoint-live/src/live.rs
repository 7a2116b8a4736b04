//! Timer-driven estimation loop
//!
//! Each tick:
//! 1. Poll the log tail for the newest complete record
//! 2. Parse it and push it into the wrench moving average
//! 3. Estimate the contact point from the smoothed wrench
//! 4. Push the display point into the point moving average
//! 5. Hand the estimate to the marker sink
//!
//! Ticks without a new record only give the sink a chance to redraw.
//! Malformed records are logged and skipped; the smoothed state is kept.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nalgebra::Vector3;
use thiserror::Error;

use forcepoint_core::config::SmoothingConfig;
use forcepoint_core::{ConfigError, Estimate, MovingAverage, PoaEstimator, Wrench};

use crate::config::{AppConfig, LiveConfig};
use crate::sink::MarkerSink;
use crate::tail::LogTail;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no sensor log configured (set live.log_path or pass --log)")]
    NoLogPath,

    #[error("failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No new complete record
    Idle,
    /// Log missing or unreadable, retried next tick
    Unavailable,
    /// Newest record was malformed
    Skipped,
    Updated(Estimate),
}

/// Loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    /// Records turned into estimates
    pub records: u64,
    pub skipped: u64,
    pub contacts: u64,
    pub unavailable: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stop flag raised (Ctrl-C)
    Interrupted,
    /// Sink asked to stop (viewer closed, recording full)
    SinkClosed,
    DurationElapsed,
    TickLimit,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Target time between tick starts
    pub interval: Duration,
    /// Wall-clock limit
    pub duration: Option<Duration>,
    pub max_ticks: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1),
            duration: None,
            max_ticks: None,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &LiveConfig) -> Self {
        Self {
            interval: config.interval(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub reason: StopReason,
    pub stats: LoopStats,
    pub elapsed: Duration,
}

/// Stop flag raised by Ctrl-C
pub fn install_stop_handler() -> Result<Arc<AtomicBool>, LiveError> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })?;
    Ok(stop)
}

pub struct LiveLoop {
    estimator: PoaEstimator,
    tail: LogTail,
    wrench_avg: MovingAverage<Wrench>,
    point_avg: MovingAverage<Vector3<f64>>,
    last: Option<Estimate>,
    stats: LoopStats,
    source_down: bool,
}

impl LiveLoop {
    /// # Errors
    /// [`LiveError::Config`] when a smoothing window is zero
    pub fn new(
        estimator: PoaEstimator,
        tail: LogTail,
        smoothing: &SmoothingConfig,
    ) -> Result<Self, LiveError> {
        smoothing.validate()?;
        Ok(Self {
            estimator,
            tail,
            wrench_avg: MovingAverage::new(smoothing.wrench_window),
            point_avg: MovingAverage::new(smoothing.point_window),
            last: None,
            stats: LoopStats::default(),
            source_down: false,
        })
    }

    /// Estimator, tail and smoothing from one application config
    pub fn from_config(config: &AppConfig) -> Result<Self, LiveError> {
        let log_path = config.live.log_path.clone().ok_or(LiveError::NoLogPath)?;
        let estimator = PoaEstimator::from_config(&config.poa)?;
        let tail = LogTail::new(log_path, config.live.start);
        Self::new(estimator, tail, &config.poa.smoothing)
    }

    pub fn estimator(&self) -> &PoaEstimator {
        &self.estimator
    }

    pub fn tail(&self) -> &LogTail {
        &self.tail
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn last_estimate(&self) -> Option<&Estimate> {
        self.last.as_ref()
    }

    /// Mean of the last `wrench_window` records
    pub fn smoothed_wrench(&self) -> Option<Wrench> {
        self.wrench_avg.mean()
    }

    /// Mean of the last `point_window` display points
    ///
    /// Reported only; the marker follows the per-tick estimate.
    pub fn smoothed_display(&self) -> Option<Vector3<f64>> {
        self.point_avg.mean()
    }

    /// Poll the log once and process its newest record
    pub fn tick(&mut self) -> TickOutcome {
        self.stats.ticks += 1;

        match self.tail.poll() {
            Ok(Some(line)) => {
                self.source_up();
                self.ingest(&line)
            }
            Ok(None) => {
                self.source_up();
                TickOutcome::Idle
            }
            Err(e) => {
                self.stats.unavailable += 1;
                if !self.source_down {
                    if e.is_not_found() {
                        log::warn!("{e}; waiting for the sensor writer");
                    } else {
                        log::warn!("{e}; retrying");
                    }
                    self.source_down = true;
                }
                TickOutcome::Unavailable
            }
        }
    }

    /// Parse one record and run it through smoothing and estimation
    pub fn ingest(&mut self, line: &str) -> TickOutcome {
        let wrench = match Wrench::parse_record(line) {
            Ok(w) => w,
            Err(e) => {
                self.stats.skipped += 1;
                log::warn!("skipping malformed record {line:?}: {e}");
                return TickOutcome::Skipped;
            }
        };

        let smoothed = self.wrench_avg.push(wrench);
        let estimate = match self.estimator.estimate(&smoothed) {
            Ok(est) => est,
            Err(e) => {
                self.stats.skipped += 1;
                log::warn!("skipping record {line:?}: {e}");
                return TickOutcome::Skipped;
            }
        };

        self.point_avg.push(estimate.display);
        self.stats.records += 1;
        if estimate.is_contact() {
            self.stats.contacts += 1;
        }
        log::trace!(
            "r = {:?} cm, display {:?}, {:?}",
            estimate.local.as_slice(),
            estimate.display.as_slice(),
            estimate.outcome
        );

        self.last = Some(estimate);
        TickOutcome::Updated(estimate)
    }

    /// Tick until stopped
    ///
    /// `stop` is checked before every tick. Each tick is followed by a sleep
    /// for whatever remains of `options.interval`.
    pub fn run<S>(&mut self, sink: &mut S, options: &RunOptions, stop: &AtomicBool) -> RunSummary
    where
        S: MarkerSink + ?Sized,
    {
        let started = Instant::now();
        let first_tick = self.stats.ticks;

        let reason = loop {
            if stop.load(Ordering::SeqCst) {
                break StopReason::Interrupted;
            }
            if options.duration.is_some_and(|d| started.elapsed() >= d) {
                break StopReason::DurationElapsed;
            }
            if options
                .max_ticks
                .is_some_and(|max| self.stats.ticks - first_tick >= max)
            {
                break StopReason::TickLimit;
            }

            let tick_start = Instant::now();
            let keep_going = match self.tick() {
                TickOutcome::Updated(estimate) => sink.present(&estimate),
                _ => sink.idle(),
            };
            if !keep_going {
                break StopReason::SinkClosed;
            }

            if let Some(rest) = options.interval.checked_sub(tick_start.elapsed()) {
                if !rest.is_zero() {
                    thread::sleep(rest);
                }
            }
        };

        let summary = RunSummary {
            reason,
            stats: self.stats,
            elapsed: started.elapsed(),
        };
        log::info!(
            "live loop stopped ({:?}) after {} ticks in {:.1?}: \
             {} records, {} contacts, {} skipped",
            summary.reason,
            summary.stats.ticks,
            summary.elapsed,
            summary.stats.records,
            summary.stats.contacts,
            summary.stats.skipped
        );
        summary
    }

    fn source_up(&mut self) {
        if self.source_down {
            log::info!("sensor log {} available", self.tail.path().display());
            self.source_down = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use crate::tail::TailStart;
    use approx::assert_relative_eq;
    use forcepoint_core::gate::{ForceGate, ValidityGate};
    use forcepoint_core::{DisplayTransform, PoaSolver};

    fn push_estimator() -> PoaEstimator {
        PoaEstimator::new(
            PoaSolver::default(),
            DisplayTransform::identity(),
            ValidityGate::new(15.0, Some(ForceGate::below(-1.0))),
        )
    }

    fn unused_tail() -> LogTail {
        LogTail::new(
            std::env::temp_dir().join("forcepoint_live_unused.txt"),
            TailStart::Beginning,
        )
    }

    fn detached_loop(smoothing: SmoothingConfig) -> LiveLoop {
        LiveLoop::new(push_estimator(), unused_tail(), &smoothing).unwrap()
    }

    #[test]
    fn test_zero_window_rejected() {
        for smoothing in [
            SmoothingConfig {
                wrench_window: 0,
                point_window: 20,
            },
            SmoothingConfig {
                wrench_window: 6,
                point_window: 0,
            },
        ] {
            let result = LiveLoop::new(push_estimator(), unused_tail(), &smoothing);
            assert!(matches!(result, Err(LiveError::Config(_))));
        }
    }

    #[test]
    fn test_ingest_smooths_wrench() {
        let mut live = detached_loop(SmoothingConfig {
            wrench_window: 2,
            point_window: 20,
        });

        live.ingest("0 0 -4 0 0 0");
        live.ingest("0 0 -6 0 0 0");
        let w = live.smoothed_wrench().unwrap();
        assert_relative_eq!(w.force.z, -5.0, epsilon = 1e-12);

        live.ingest("0 0 -10 0 0 0");
        let w = live.smoothed_wrench().unwrap();
        assert_relative_eq!(w.force.z, -8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_malformed_record_keeps_state() {
        let mut live = detached_loop(SmoothingConfig::default());

        assert!(matches!(live.ingest("0 0 -5 0 0 0"), TickOutcome::Updated(_)));
        let before = live.smoothed_wrench();

        assert_eq!(live.ingest("0 0 -5 0 0"), TickOutcome::Skipped);
        assert_eq!(live.ingest("0 0 abc 0 0 0"), TickOutcome::Skipped);
        assert_eq!(live.smoothed_wrench(), before);
        assert_eq!(live.stats().skipped, 2);
        assert_eq!(live.stats().records, 1);
    }

    #[test]
    fn test_unavailable_log_is_not_fatal() {
        let mut live = detached_loop(SmoothingConfig::default());
        assert_eq!(live.tick(), TickOutcome::Unavailable);
        assert_eq!(live.tick(), TickOutcome::Unavailable);
        assert_eq!(live.stats().unavailable, 2);
    }

    #[test]
    fn test_run_stops_on_flag() {
        let mut live = detached_loop(SmoothingConfig::default());
        let stop = AtomicBool::new(true);
        let mut sink = RecordingSink::new();

        let summary = live.run(&mut sink, &RunOptions::default(), &stop);
        assert_eq!(summary.reason, StopReason::Interrupted);
        assert_eq!(summary.stats.ticks, 0);
    }

    #[test]
    fn test_run_tick_limit() {
        let mut live = detached_loop(SmoothingConfig::default());
        let stop = AtomicBool::new(false);
        let mut sink = RecordingSink::new();
        let options = RunOptions {
            interval: Duration::ZERO,
            max_ticks: Some(5),
            ..RunOptions::default()
        };

        let summary = live.run(&mut sink, &options, &stop);
        assert_eq!(summary.reason, StopReason::TickLimit);
        assert_eq!(summary.stats.ticks, 5);
        assert_eq!(sink.idle_ticks, 5);
    }

    #[test]
    fn test_missing_log_path() {
        let err = LiveLoop::from_config(&AppConfig::default()).err();
        assert!(matches!(err, Some(LiveError::NoLogPath)));
    }
}
