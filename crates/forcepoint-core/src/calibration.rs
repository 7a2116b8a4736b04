//! Display-frame calibration
//!
//! Affine map from the tool frame (output units) to the display frame:
//!
//! ```text
//! p_display = R · p_tool + T
//! ```
//!
//! `R` and `T` come from a one-off calibration and are stored as `.npy`
//! arrays (`Rot.npy`, 3x3 and `Tr.npy`, 3 elements).

use std::path::{Path, PathBuf};

use nalgebra::{Matrix3, Vector3};
use ndarray::ArrayD;
use ndarray_npy::{read_npy, ReadNpyError};
use thiserror::Error;

use crate::config::CalibrationConfig;

/// Calibration loading errors
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("failed to read calibration array {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ReadNpyError,
    },
    #[error("calibration array {} has shape {shape:?}, expected {expected}", .path.display())]
    Shape {
        path: PathBuf,
        shape: Vec<usize>,
        expected: &'static str,
    },
    #[error("calibration contains non-finite values")]
    NonFinite,
    #[error("rotation and translation must be configured together")]
    Incomplete,
}

/// Rotation + translation from tool frame to display frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for DisplayTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl DisplayTransform {
    pub fn new(
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
    ) -> Result<Self, CalibrationError> {
        let finite = rotation.iter().chain(translation.iter()).all(|c| c.is_finite());
        if !finite {
            return Err(CalibrationError::NonFinite);
        }
        Ok(Self {
            rotation,
            translation,
        })
    }

    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Load `R` and `T` from `.npy` files
    ///
    /// The translation may be stored as shape `(3,)`, `(3, 1)` or `(1, 3)`.
    pub fn from_npy(
        rotation_path: impl AsRef<Path>,
        translation_path: impl AsRef<Path>,
    ) -> Result<Self, CalibrationError> {
        let rotation_path = rotation_path.as_ref();
        let rotation = read_array(rotation_path)?;
        if rotation.shape() != [3, 3] {
            return Err(CalibrationError::Shape {
                path: rotation_path.to_path_buf(),
                shape: rotation.shape().to_vec(),
                expected: "(3, 3)",
            });
        }

        let translation_path = translation_path.as_ref();
        let translation = read_array(translation_path)?;
        if translation.len() != 3 || translation.ndim() > 2 {
            return Err(CalibrationError::Shape {
                path: translation_path.to_path_buf(),
                shape: translation.shape().to_vec(),
                expected: "(3,)",
            });
        }

        // ndarray iterates in logical (row-major) order whatever the file layout
        let r: Vec<f64> = rotation.iter().copied().collect();
        let t: Vec<f64> = translation.iter().copied().collect();
        Self::new(Matrix3::from_row_slice(&r), Vector3::from_column_slice(&t))
    }

    /// Build from configuration
    ///
    /// `.npy` files win over inline arrays. Nothing configured gives the
    /// identity. Half a calibration (only R or only T) is rejected.
    pub fn from_config(config: &CalibrationConfig) -> Result<Self, CalibrationError> {
        match (&config.rotation_npy, &config.translation_npy) {
            (Some(rot), Some(tr)) => return Self::from_npy(rot, tr),
            (None, None) => {}
            _ => return Err(CalibrationError::Incomplete),
        }

        match (&config.rotation, &config.translation) {
            (Some(rows), Some(t)) => {
                let r: Vec<f64> = rows.iter().flatten().copied().collect();
                Self::new(Matrix3::from_row_slice(&r), Vector3::from_column_slice(t))
            }
            (None, None) => Ok(Self::identity()),
            _ => Err(CalibrationError::Incomplete),
        }
    }

    /// Map a tool-frame point to the display frame
    pub fn apply(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    pub fn is_identity(&self) -> bool {
        self.rotation == Matrix3::identity() && self.translation == Vector3::zeros()
    }
}

fn read_array(path: &Path) -> Result<ArrayD<f64>, CalibrationError> {
    read_npy(path).map_err(|source| CalibrationError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};
    use ndarray_npy::write_npy;

    fn unique_temp_dir(tag: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("forcepoint-calib-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_apply_rotation_and_translation() {
        // 90° about z, then shift
        let rotation = Matrix3::new(
            0.0, -1.0, 0.0,
            1.0, 0.0, 0.0,
            0.0, 0.0, 1.0,
        );
        let transform = DisplayTransform::new(rotation, Vector3::new(1.0, 2.0, 3.0)).unwrap();

        let p = transform.apply(&Vector3::new(5.0, 0.0, 1.0));
        assert_relative_eq!(p, Vector3::new(1.0, 7.0, 4.0), epsilon = 1e-12);
    }

    #[test]
    fn test_identity_by_default() {
        let transform = DisplayTransform::from_config(&CalibrationConfig::default()).unwrap();
        assert!(transform.is_identity());
        assert_eq!(transform.apply(&Vector3::new(1.5, -2.0, 0.5)), Vector3::new(1.5, -2.0, 0.5));
    }

    #[test]
    fn test_inline_rows_are_row_major() {
        let config = CalibrationConfig {
            rotation: Some([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]),
            translation: Some([0.0, 0.0, 0.0]),
            ..Default::default()
        };
        let transform = DisplayTransform::from_config(&config).unwrap();
        assert_eq!(transform.rotation[(0, 1)], -1.0);
        assert_eq!(transform.rotation[(1, 0)], 1.0);
    }

    #[test]
    fn test_half_calibration_rejected() {
        let config = CalibrationConfig {
            rotation_npy: Some(PathBuf::from("Rot.npy")),
            ..Default::default()
        };
        assert!(matches!(
            DisplayTransform::from_config(&config),
            Err(CalibrationError::Incomplete)
        ));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut rotation = Matrix3::identity();
        rotation[(2, 2)] = f64::INFINITY;
        assert!(matches!(
            DisplayTransform::new(rotation, Vector3::zeros()),
            Err(CalibrationError::NonFinite)
        ));
    }

    #[test]
    fn test_load_npy_files() {
        let dir = unique_temp_dir("load");
        let rot_path = dir.join("Rot.npy");
        let tr_path = dir.join("Tr.npy");

        write_npy(
            &rot_path,
            &arr2(&[[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]),
        )
        .unwrap();
        write_npy(&tr_path, &arr1(&[0.5, -0.5, 0.0])).unwrap();

        let transform = DisplayTransform::from_npy(&rot_path, &tr_path).unwrap();
        assert_eq!(transform.rotation[(0, 1)], -1.0);
        assert_eq!(transform.translation, Vector3::new(0.5, -0.5, 0.0));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_column_translation_accepted() {
        let dir = unique_temp_dir("column");
        let rot_path = dir.join("Rot.npy");
        let tr_path = dir.join("Tr.npy");

        write_npy(&rot_path, &ndarray::Array2::<f64>::eye(3)).unwrap();
        write_npy(&tr_path, &arr2(&[[1.0], [2.0], [3.0]])).unwrap();

        let transform = DisplayTransform::from_npy(&rot_path, &tr_path).unwrap();
        assert_eq!(transform.translation, Vector3::new(1.0, 2.0, 3.0));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        let dir = unique_temp_dir("shape");
        let rot_path = dir.join("Rot.npy");
        let tr_path = dir.join("Tr.npy");

        write_npy(&rot_path, &ndarray::Array2::<f64>::eye(2)).unwrap();
        write_npy(&tr_path, &arr1(&[0.0, 0.0, 0.0])).unwrap();

        let err = DisplayTransform::from_npy(&rot_path, &tr_path).unwrap_err();
        assert!(matches!(err, CalibrationError::Shape { ref shape, .. } if shape == &vec![2, 2]));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = DisplayTransform::from_npy("/nonexistent/Rot.npy", "/nonexistent/Tr.npy")
            .unwrap_err();
        assert!(matches!(err, CalibrationError::Read { .. }));
    }
}
