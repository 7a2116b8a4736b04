//! Synthetic sensor feed
//!
//! Generates records for a known contact point so the live loop can run
//! without hardware:
//! - M = (r* - origin) × F
//! - Independent Gaussian noise on each force and moment channel
//! - Seeded, so a feed is reproducible

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

use forcepoint_core::Wrench;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("noise level must be a finite non-negative std dev, got {0}")]
    Noise(f64),

    #[error("rate must be positive, got {0} Hz")]
    Rate(f64),

    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Zero-mean channel noise with standard deviation `std`
fn zero_mean(std: f64) -> Result<Normal<f64>, SynthError> {
    if !(std >= 0.0 && std.is_finite()) {
        return Err(SynthError::Noise(std));
    }
    Normal::new(0.0, std).map_err(|_| SynthError::Noise(std))
}

#[derive(Debug)]
pub struct SyntheticFeed {
    /// Contact relative to the sensor origin [m]
    lever: Vector3<f64>,
    force: Vector3<f64>,
    force_noise: Normal<f64>,
    moment_noise: Normal<f64>,
    rng: StdRng,
}

impl SyntheticFeed {
    /// # Arguments
    /// * `contact` - True point of application [m]
    /// * `origin` - Sensor origin the moments are taken about [m]
    /// * `force` - Nominal applied force [N]
    /// * `force_noise` - Standard deviation per force channel [N]
    /// * `moment_noise` - Standard deviation per moment channel [N·m]
    pub fn new(
        contact: Vector3<f64>,
        origin: Vector3<f64>,
        force: Vector3<f64>,
        force_noise: f64,
        moment_noise: f64,
        seed: u64,
    ) -> Result<Self, SynthError> {
        Ok(Self {
            lever: contact - origin,
            force,
            force_noise: zero_mean(force_noise)?,
            moment_noise: zero_mean(moment_noise)?,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Noise-free wrench for the configured contact
    pub fn clean(&self) -> Wrench {
        Wrench::applied_at(&self.lever, self.force)
    }

    pub fn next_wrench(&mut self) -> Wrench {
        let clean = self.clean();
        let mut noise = Wrench::zeros();
        for c in noise.force.iter_mut() {
            *c = self.force_noise.sample(&mut self.rng);
        }
        for c in noise.moment.iter_mut() {
            *c = self.moment_noise.sample(&mut self.rng);
        }
        clean + noise
    }

    /// Write `samples` records without pacing
    ///
    /// Each line is `fx fy fz mx my mz t` with `t` the sample time at
    /// `rate_hz`.
    pub fn write_records<W: Write>(
        &mut self,
        out: &mut W,
        samples: usize,
        rate_hz: f64,
    ) -> io::Result<()> {
        for i in 0..samples {
            let t = i as f64 / rate_hz;
            writeln!(out, "{} {t:.6}", self.next_wrench())?;
        }
        out.flush()
    }

    /// Append records to `path` in real time
    ///
    /// One line per `1 / rate_hz` seconds, flushed immediately so a tailing
    /// reader sees it. Stops early when `stop` is raised. Returns the number
    /// of lines written.
    pub fn stream_to(
        &mut self,
        path: &Path,
        samples: usize,
        rate_hz: f64,
        stop: &AtomicBool,
    ) -> Result<usize, SynthError> {
        if !(rate_hz > 0.0 && rate_hz.is_finite()) {
            return Err(SynthError::Rate(rate_hz));
        }
        let write_err = |source| SynthError::Write {
            path: path.to_path_buf(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(write_err)?;
        let mut out = BufWriter::new(file);
        let period = Duration::from_secs_f64(1.0 / rate_hz);
        let started = Instant::now();

        let mut written = 0;
        while written < samples && !stop.load(Ordering::SeqCst) {
            let t = written as f64 / rate_hz;
            writeln!(out, "{} {t:.6}", self.next_wrench()).map_err(write_err)?;
            out.flush().map_err(write_err)?;
            written += 1;

            let due = period.mul_f64(written as f64);
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                thread::sleep(wait);
            }
        }

        log::debug!("wrote {written} synthetic records to {}", path.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn feed(noise: f64, seed: u64) -> SyntheticFeed {
        SyntheticFeed::new(
            Vector3::new(0.05, -0.02, 0.0),
            Vector3::new(0.0, 0.0, 0.05),
            Vector3::new(0.0, 0.0, -6.0),
            noise,
            noise * 0.01,
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_clean_moment_is_lever_cross_force() {
        let feed = feed(0.0, 1);
        let w = feed.clean();
        // (0.05, -0.02, -0.05) × (0, 0, -6)
        assert_relative_eq!(w.moment.x, 0.12, epsilon = 1e-12);
        assert_relative_eq!(w.moment.y, 0.30, epsilon = 1e-12);
        assert_relative_eq!(w.moment.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_noise_is_exact() {
        let mut feed = feed(0.0, 7);
        assert_eq!(feed.next_wrench(), feed.clean());
    }

    #[test]
    fn test_seed_reproducible() {
        let mut a = feed(0.1, 42);
        let mut b = feed(0.1, 42);
        for _ in 0..10 {
            assert_eq!(a.next_wrench(), b.next_wrench());
        }
    }

    #[test]
    fn test_records_parse_back() {
        let mut feed = feed(0.05, 3);
        let mut buf = Vec::new();
        feed.write_records(&mut buf, 4, 100.0).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        for line in lines {
            let w = Wrench::parse_record(line).unwrap();
            assert!((w.force.z + 6.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_negative_noise_rejected() {
        let result = SyntheticFeed::new(
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            -1.0,
            0.0,
            0,
        );
        assert!(matches!(result, Err(SynthError::Noise(std)) if std == -1.0));

        let result = SyntheticFeed::new(
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, -1.0),
            0.0,
            -0.01,
            0,
        );
        assert!(matches!(result, Err(SynthError::Noise(_))));
    }

    #[test]
    fn test_non_finite_noise_rejected() {
        for std in [f64::NAN, f64::INFINITY] {
            let result = SyntheticFeed::new(
                Vector3::zeros(),
                Vector3::zeros(),
                Vector3::new(0.0, 0.0, -1.0),
                std,
                0.0,
                0,
            );
            assert!(matches!(result, Err(SynthError::Noise(_))));
        }
    }
}
