//! Physical units attached to raster channels.

use serde::Serialize;

/// How values between data points are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Unknown,
    Continuous,
    Discrete,
}

/// Measurement, unit name and value range of a raster band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    pub measurement: String,
    pub unit: String,
    pub min: f64,
    pub max: f64,
    pub interpolation: Interpolation,
}

impl Unit {
    /// Measurement used when a dataset has no `metric` subgroup.
    pub const DEFAULT_MEASUREMENT: &'static str = "raw";
    pub const DEFAULT_UNIT: &'static str = "unknown";

    /// Unit of uninterpreted raw values.
    pub fn raw() -> Self {
        Self {
            measurement: Self::DEFAULT_MEASUREMENT.to_string(),
            unit: Self::DEFAULT_UNIT.to_string(),
            min: 0.0,
            max: 0.0,
            interpolation: Interpolation::Unknown,
        }
    }

    /// Binary region mask (0 outside, 1 inside).
    pub fn mask() -> Self {
        Self {
            measurement: "mask".to_string(),
            unit: "none".to_string(),
            min: 0.0,
            max: 1.0,
            interpolation: Interpolation::Discrete,
        }
    }

    /// Continuous unit with the range rounded to two significant digits.
    pub fn continuous(measurement: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            measurement: measurement.into(),
            unit: Self::DEFAULT_UNIT.to_string(),
            min: round_significant(min, 2),
            max: round_significant(max, 2),
            interpolation: Interpolation::Continuous,
        }
    }

    pub fn has_default_measurement(&self) -> bool {
        self.measurement == Self::DEFAULT_MEASUREMENT
    }
}

/// Rounds to `digits` significant digits. Non-finite values and zero pass
/// through unchanged.
pub fn round_significant(value: f64, digits: usize) -> f64 {
    if !value.is_finite() || value == 0.0 || digits == 0 {
        return value;
    }
    format!("{:.*e}", digits - 1, value)
        .parse()
        .unwrap_or(value)
}
