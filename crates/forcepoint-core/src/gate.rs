//! Validity gate
//!
//! Decides whether an estimate is shown as a contact point or replaced by the
//! no-contact sentinel `(0, 0)`. Two checks apply:
//!
//! - the display-frame x/y must lie within `±extent`
//! - the z force must pass the activation threshold
//!
//! The threshold sense is explicit configuration. Sensors disagree on whether
//! pressing the head yields positive or negative `F_z`, so a gate is always
//! built as either [`ForceGate::above`] or [`ForceGate::below`].

use std::fmt;
use std::str::FromStr;

use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::config::GateConfig;

/// Direction in which `F_z` must cross the activation threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateSense {
    /// Contact when `F_z > threshold`
    Above,
    /// Contact when `F_z < threshold`
    Below,
}

impl FromStr for GateSense {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "above" => Ok(GateSense::Above),
            "below" => Ok(GateSense::Below),
            other => Err(format!("unknown gate sense {other:?} (expected above|below)")),
        }
    }
}

impl fmt::Display for GateSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateSense::Above => write!(f, "above"),
            GateSense::Below => write!(f, "below"),
        }
    }
}

/// Activation threshold on the z force component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceGate {
    pub sense: GateSense,
    /// Signed threshold [N]
    pub threshold: f64,
}

impl ForceGate {
    /// Contact when `F_z > threshold`
    pub fn above(threshold: f64) -> Self {
        Self {
            sense: GateSense::Above,
            threshold,
        }
    }

    /// Contact when `F_z < threshold`
    pub fn below(threshold: f64) -> Self {
        Self {
            sense: GateSense::Below,
            threshold,
        }
    }

    pub fn passes(&self, force_z: f64) -> bool {
        match self.sense {
            GateSense::Above => force_z > self.threshold,
            GateSense::Below => force_z < self.threshold,
        }
    }
}

/// Why an estimate was replaced by the sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoContactReason {
    /// `F_z` did not cross the activation threshold
    LowForce,
    /// Display x or y outside `±extent`
    OutOfRange,
}

/// Gate decision for one estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome {
    /// Contact at the given display x/y
    Contact(Vector2<f64>),
    /// Sentinel; the marker is drawn at the origin
    NoContact(NoContactReason),
}

impl GateOutcome {
    pub fn is_contact(&self) -> bool {
        matches!(self, GateOutcome::Contact(_))
    }

    /// Marker position: the contact point, or exactly `(0, 0)`
    pub fn marker(&self) -> Vector2<f64> {
        match self {
            GateOutcome::Contact(xy) => *xy,
            GateOutcome::NoContact(_) => Vector2::zeros(),
        }
    }
}

/// Display-region and activation-force gate
#[derive(Debug, Clone, PartialEq)]
pub struct ValidityGate {
    extent: f64,
    force: Option<ForceGate>,
}

impl ValidityGate {
    pub fn new(extent: f64, force: Option<ForceGate>) -> Self {
        Self { extent, force }
    }

    /// Gate that reports every estimate as contact
    pub fn pass_through() -> Self {
        Self::new(f64::INFINITY, None)
    }

    pub fn from_config(config: &GateConfig) -> Self {
        if config.enabled {
            Self::new(config.extent, config.force)
        } else {
            Self::pass_through()
        }
    }

    pub fn extent(&self) -> f64 {
        self.extent
    }

    pub fn force(&self) -> Option<&ForceGate> {
        self.force.as_ref()
    }

    /// Evaluate one estimate
    ///
    /// # Arguments
    /// * `display` - Estimated point in the display frame (z is ignored)
    /// * `force` - Force used for the estimate
    pub fn evaluate(&self, display: &Vector3<f64>, force: &Vector3<f64>) -> GateOutcome {
        if let Some(gate) = &self.force {
            if !gate.passes(force.z) {
                return GateOutcome::NoContact(NoContactReason::LowForce);
            }
        }

        // NaN compares false and is treated as out of range
        let within = |c: f64| c.abs() <= self.extent;
        if !(within(display.x) && within(display.y)) {
            return GateOutcome::NoContact(NoContactReason::OutOfRange);
        }

        GateOutcome::Contact(Vector2::new(display.x, display.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_gate() -> ValidityGate {
        ValidityGate::new(15.0, Some(ForceGate::below(-1.0)))
    }

    #[test]
    fn test_contact_inside_region() {
        let outcome =
            push_gate().evaluate(&Vector3::new(3.2, -7.5, 4.0), &Vector3::new(0.0, 0.0, -5.0));
        assert_eq!(outcome, GateOutcome::Contact(Vector2::new(3.2, -7.5)));
        assert!(outcome.is_contact());
        assert_eq!(outcome.marker(), Vector2::new(3.2, -7.5));
    }

    #[test]
    fn test_out_of_range_is_exact_sentinel() {
        let force = Vector3::new(0.0, 0.0, -5.0);
        for display in [
            Vector3::new(15.1, 0.0, 0.0),
            Vector3::new(0.0, -15.1, 0.0),
            Vector3::new(-40.0, 40.0, 123.0),
        ] {
            let outcome = push_gate().evaluate(&display, &force);
            assert_eq!(outcome, GateOutcome::NoContact(NoContactReason::OutOfRange));
            assert_eq!(outcome.marker(), Vector2::new(0.0, 0.0));
        }
    }

    #[test]
    fn test_boundary_is_inside() {
        let outcome =
            push_gate().evaluate(&Vector3::new(15.0, -15.0, 0.0), &Vector3::new(0.0, 0.0, -2.0));
        assert!(outcome.is_contact());
    }

    #[test]
    fn test_force_gate_senses() {
        assert!(ForceGate::below(-1.0).passes(-5.0));
        assert!(!ForceGate::below(-1.0).passes(-1.0));
        assert!(!ForceGate::below(-1.0).passes(3.0));

        assert!(ForceGate::above(1.0).passes(5.0));
        assert!(!ForceGate::above(1.0).passes(1.0));
        assert!(!ForceGate::above(1.0).passes(-3.0));
    }

    #[test]
    fn test_low_force_is_sentinel() {
        let outcome =
            push_gate().evaluate(&Vector3::new(1.0, 1.0, 0.0), &Vector3::new(0.0, 0.0, 0.2));
        assert_eq!(outcome, GateOutcome::NoContact(NoContactReason::LowForce));
        assert_eq!(outcome.marker(), Vector2::zeros());
    }

    #[test]
    fn test_nan_display_is_out_of_range() {
        let outcome =
            push_gate().evaluate(&Vector3::new(f64::NAN, 0.0, 0.0), &Vector3::new(0.0, 0.0, -5.0));
        assert_eq!(outcome, GateOutcome::NoContact(NoContactReason::OutOfRange));
    }

    #[test]
    fn test_disabled_gate_passes_everything() {
        let config = GateConfig {
            enabled: false,
            force: Some(ForceGate::above(1.0)),
            ..GateConfig::default()
        };
        let gate = ValidityGate::from_config(&config);
        let outcome = gate.evaluate(&Vector3::new(100.0, -100.0, 0.0), &Vector3::zeros());
        assert_eq!(outcome, GateOutcome::Contact(Vector2::new(100.0, -100.0)));
    }

    #[test]
    fn test_gate_sense_from_str() {
        assert_eq!("Above".parse::<GateSense>(), Ok(GateSense::Above));
        assert_eq!("below".parse::<GateSense>(), Ok(GateSense::Below));
        assert!("down".parse::<GateSense>().is_err());
        assert_eq!(GateSense::Below.to_string(), "below");
    }
}
