//! Force/moment pairs and sensor record parsing
//!
//! A sensor record is one text line holding at least six numbers:
//! ```text
//! Fx Fy Fz Mx My Mz [extra fields ...]
//! ```
//! Fields may be separated by whitespace, commas or semicolons. Anything past
//! the sixth field (timestamps, status words) is ignored.

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of numeric fields a record must start with
pub const RECORD_FIELDS: usize = 6;

/// Record parsing errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("record has {found} fields, expected at least 6")]
    TooFewFields { found: usize },
    #[error("field {index} is not a number: {text:?}")]
    InvalidNumber { index: usize, text: String },
    #[error("field {index} is not finite")]
    NonFinite { index: usize },
}

/// Force and moment measured together at the sensor reference point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wrench {
    /// Force [N]
    pub force: Vector3<f64>,
    /// Moment about the reference origin [N·m]
    pub moment: Vector3<f64>,
}

impl Wrench {
    pub fn new(force: Vector3<f64>, moment: Vector3<f64>) -> Self {
        Self { force, moment }
    }

    pub fn zeros() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Wrench produced by `force` applied at `lever` (relative to the origin)
    ///
    /// M = lever × F
    pub fn applied_at(lever: &Vector3<f64>, force: Vector3<f64>) -> Self {
        Self::new(force, lever.cross(&force))
    }

    pub fn is_finite(&self) -> bool {
        self.force.iter().chain(self.moment.iter()).all(|c| c.is_finite())
    }

    /// Parse one sensor record
    pub fn parse_record(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
            .filter(|s| !s.is_empty())
            .take(RECORD_FIELDS)
            .collect();

        if fields.len() < RECORD_FIELDS {
            return Err(ParseError::TooFewFields { found: fields.len() });
        }

        let mut values = [0.0; RECORD_FIELDS];
        for (index, (text, slot)) in fields.iter().zip(values.iter_mut()).enumerate() {
            let value: f64 = text.parse().map_err(|_| ParseError::InvalidNumber {
                index,
                text: text.to_string(),
            })?;
            if !value.is_finite() {
                return Err(ParseError::NonFinite { index });
            }
            *slot = value;
        }

        Ok(Self::new(
            Vector3::new(values[0], values[1], values[2]),
            Vector3::new(values[3], values[4], values[5]),
        ))
    }

    /// Format as a whitespace-separated record
    pub fn to_record(&self) -> String {
        self.to_string()
    }
}

impl FromStr for Wrench {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_record(s)
    }
}

impl fmt::Display for Wrench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (force, moment) = (&self.force, &self.moment);
        write!(
            f,
            "{} {} {} {} {} {}",
            force.x, force.y, force.z, moment.x, moment.y, moment.z
        )
    }
}

impl Add for Wrench {
    type Output = Wrench;

    fn add(self, rhs: Wrench) -> Wrench {
        Wrench::new(self.force + rhs.force, self.moment + rhs.moment)
    }
}

impl Sub for Wrench {
    type Output = Wrench;

    fn sub(self, rhs: Wrench) -> Wrench {
        Wrench::new(self.force - rhs.force, self.moment - rhs.moment)
    }
}

impl Mul<f64> for Wrench {
    type Output = Wrench;

    fn mul(self, rhs: f64) -> Wrench {
        Wrench::new(self.force * rhs, self.moment * rhs)
    }
}

impl Div<f64> for Wrench {
    type Output = Wrench;

    fn div(self, rhs: f64) -> Wrench {
        Wrench::new(self.force / rhs, self.moment / rhs)
    }
}
