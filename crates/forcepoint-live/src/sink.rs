//! Marker outputs
//!
//! The live loop hands each new estimate to a [`MarkerSink`]. Sinks report
//! back whether the loop should keep running (a closed window stops it).

use nalgebra::Vector2;

use forcepoint_core::Estimate;

pub trait MarkerSink {
    /// Show a new estimate; `false` stops the loop
    fn present(&mut self, estimate: &Estimate) -> bool;

    /// Called on ticks without a new estimate; `false` stops the loop
    fn idle(&mut self) -> bool {
        true
    }
}

/// Logs the marker whenever its rounded position or contact state changes
#[derive(Debug, Default)]
pub struct ConsoleSink {
    last: Option<(Vector2<f64>, bool)>,
    changes: u64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of marker changes logged
    pub fn changes(&self) -> u64 {
        self.changes
    }
}

impl MarkerSink for ConsoleSink {
    fn present(&mut self, estimate: &Estimate) -> bool {
        let state = (estimate.marker(), estimate.is_contact());
        if self.last != Some(state) {
            self.changes += 1;
            if state.1 {
                log::info!(
                    "marker ({:.1}, {:.1})  F = [{:.2}, {:.2}, {:.2}] N",
                    state.0.x,
                    state.0.y,
                    estimate.wrench.force.x,
                    estimate.wrench.force.y,
                    estimate.wrench.force.z
                );
            } else {
                log::info!("no contact ({:?})", estimate.outcome);
            }
            self.last = Some(state);
        }
        true
    }
}

/// Keeps every estimate it is shown
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub estimates: Vec<Estimate>,
    /// Stop the loop once this many estimates were recorded
    pub limit: Option<usize>,
    pub idle_ticks: u64,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn last(&self) -> Option<&Estimate> {
        self.estimates.last()
    }
}

impl MarkerSink for RecordingSink {
    fn present(&mut self, estimate: &Estimate) -> bool {
        self.estimates.push(*estimate);
        self.limit.map_or(true, |limit| self.estimates.len() < limit)
    }

    fn idle(&mut self) -> bool {
        self.idle_ticks += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forcepoint_core::gate::{ForceGate, ValidityGate};
    use forcepoint_core::{DisplayTransform, PoaEstimator, PoaSolver, Wrench};
    use nalgebra::Vector3;

    fn estimate(fz: f64) -> Estimate {
        PoaEstimator::new(
            PoaSolver::default(),
            DisplayTransform::identity(),
            ValidityGate::new(15.0, Some(ForceGate::below(-1.0))),
        )
        .estimate(&Wrench::new(Vector3::new(0.0, 0.0, fz), Vector3::zeros()))
        .unwrap()
    }

    #[test]
    fn test_console_logs_only_changes() {
        let mut sink = ConsoleSink::new();
        let push = estimate(-5.0);
        let light = estimate(-0.5);

        assert!(sink.present(&push));
        assert!(sink.present(&push));
        assert_eq!(sink.changes(), 1);

        assert!(sink.present(&light));
        assert_eq!(sink.changes(), 2);
    }

    #[test]
    fn test_recording_limit_stops() {
        let mut sink = RecordingSink::with_limit(2);
        let est = estimate(-5.0);

        assert!(sink.present(&est));
        assert!(!sink.present(&est));
        assert_eq!(sink.estimates.len(), 2);
        assert!(sink.idle());
        assert_eq!(sink.idle_ticks, 1);
    }
}
