//! Contact Sweep Demonstration
//!
//! Moves a synthetic contact across the device head and prints the
//! estimated point of application next to the true one:
//! - Noise-free wrenches generated from M = (r - origin) × F
//! - Default head geometry (origin at 5 cm, ±15 cm box)
//! - Push convention gate (F_z < -1 N)

use nalgebra::Vector3;

use forcepoint_core::gate::{ForceGate, ValidityGate};
use forcepoint_core::{DisplayTransform, PoaEstimator, PoaSolver, Wrench};

fn main() {
    println!("=== forcepoint contact sweep ===\n");

    let estimator = PoaEstimator::new(
        PoaSolver::default(),
        DisplayTransform::identity(),
        ValidityGate::new(15.0, Some(ForceGate::below(-1.0))),
    );
    let origin = *estimator.solver().origin();

    // Contact points [m] on the head surface, last one off the head
    let contacts = [
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(0.05, 0.0, 0.0),
        Vector3::new(0.05, 0.05, 0.0),
        Vector3::new(-0.08, 0.03, 0.0),
        Vector3::new(-0.12, -0.10, 0.0),
        Vector3::new(0.25, 0.0, 0.0),
    ];

    // Pressing down with 6 N, slightly tilted
    let force = Vector3::new(0.3, -0.2, -6.0);

    println!("{:>22}  {:>22}  {:>8}  {:>6}", "true [cm]", "estimate [cm]", "residual", "gate");
    for r_true in &contacts {
        let wrench = Wrench::applied_at(&(r_true - origin), force);
        let est = match estimator.estimate(&wrench) {
            Ok(est) => est,
            Err(e) => {
                println!("solve failed: {e}");
                continue;
            }
        };

        let t = r_true * 100.0;
        println!(
            "({:>5.1}, {:>5.1}, {:>4.1})  ({:>5.1}, {:>5.1}, {:>4.1})  {:>8.2e}  {:>6}",
            t.x,
            t.y,
            t.z,
            est.local.x,
            est.local.y,
            est.local.z,
            est.solution.residual,
            if est.is_contact() { "ok" } else { "--" }
        );
    }

    println!("\nMarker for a light touch (F_z = -0.5 N):");
    let light = Wrench::new(Vector3::new(0.0, 0.0, -0.5), Vector3::zeros());
    if let Ok(est) = estimator.estimate(&light) {
        println!("  outcome {:?}, marker {:?}", est.outcome, est.marker().as_slice());
    }
}
