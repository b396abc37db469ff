//! Tuned constants of the classifier.
//!
//! The defaults are fit to one camera's optics and reproduce the historical
//! cloud masks exactly. Change them only together with new reference data.

use crate::error::{Error, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything below this elevation is cropped away before classification.
pub const ELEVATION_CUTOFF_DEG: f64 = 30.0;

/// Radius of the disk blanked around the sun's pixel.
pub const OCCLUSION_RADIUS_PX: f64 = 100.0;

/// Sky index below which a pixel away from the sun is a cloud.
pub const BASE_THRESHOLD: f64 = 0.18;

/// Radial step used to size the glare core.
pub const RADIAL_STEP_PX: f64 = 50.0;

/// Number of radial steps in the glare core, where the base threshold is
/// replaced by the glare profile.
pub const CORE_STEPS: u32 = 9;

pub const ANNULUS_WIDTH_PX: f64 = 10.0;
pub const ANNULUS_COUNT: usize = 50;

/// Coefficients of `j`, `j^2`, ..., `j^5` in the glare falloff polynomial.
pub const GLARE_COEFFICIENTS: [f64; 5] = [
    0.4424283716980435,
    -0.06676211439554262,
    0.0026358061791573453,
    -0.000029417130873311177,
    1.0292852149593944e-7,
];

pub const GLARE_SCALE: f64 = 0.001;
pub const GLARE_OFFSET: f64 = 0.08;

/// Describes how the cloud threshold loosens in the concentric annuli around
/// the sun.
///
/// Annulus `j` covers radii `(width * (j - 1), width * j]` and classifies a
/// pixel as cloud when its sky index is below [`GlareProfile::threshold`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GlareProfile {
    pub radial_step_px: f64,
    pub core_steps: u32,
    pub annulus_width_px: f64,
    pub annulus_count: usize,
    pub coefficients: [f64; 5],
    pub scale: f64,
    pub offset: f64,
}

impl GlareProfile {
    /// Radius of the disk around the sun that is excluded from the base rule.
    pub fn core_radius_px(&self) -> f64 {
        self.radial_step_px * self.core_steps as f64
    }

    /// Outer radius of the last annulus.
    pub fn outer_radius_px(&self) -> f64 {
        self.annulus_width_px * self.annulus_count.saturating_sub(1) as f64
    }

    /// The empirically fit polynomial term for annulus `j`.
    pub fn parameter(&self, j: usize) -> f64 {
        let j = j as f64;
        let sum = self
            .coefficients
            .iter()
            .zip(1..)
            .map(|(coefficient, power)| coefficient * j.powi(power))
            .sum::<f64>();

        sum * self.scale
    }

    /// Sky index below which a pixel in annulus `j` is a cloud.
    pub fn threshold(&self, j: usize) -> f64 {
        self.parameter(j) + self.offset
    }

    /// Evaluates [`GlareProfile::threshold`] for every annulus.
    pub fn thresholds(&self) -> Vec<f64> {
        (0..self.annulus_count).map(|j| self.threshold(j)).collect()
    }
}

impl Default for GlareProfile {
    fn default() -> Self {
        Self {
            radial_step_px: RADIAL_STEP_PX,
            core_steps: CORE_STEPS,
            annulus_width_px: ANNULUS_WIDTH_PX,
            annulus_count: ANNULUS_COUNT,
            coefficients: GLARE_COEFFICIENTS,
            scale: GLARE_SCALE,
            offset: GLARE_OFFSET,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ClassifierConfig {
    /// Elevation in degrees below which pixels are cropped away.
    pub elevation_cutoff_deg: f64,

    /// Value written to every channel of a cropped pixel.
    pub fill_value: u8,

    pub occlusion_radius_px: f64,
    pub base_threshold: f64,
    pub glare: GlareProfile,

    /// Radius around the sun inspected for the clear/cloudy verdict.
    ///
    /// Defaults to the outer radius of the glare annuli.
    pub inspection_radius_px: Option<f64>,
}

impl ClassifierConfig {
    pub fn inspection_radius_px(&self) -> f64 {
        self.inspection_radius_px
            .unwrap_or_else(|| self.glare.outer_radius_px())
    }

    /// Returns an error naming the first out of range field.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..90.0).contains(&self.elevation_cutoff_deg) {
            return Err(Error::InvalidConfig(format!(
                "elevation cutoff must be in [0, 90) degrees but got: {}",
                self.elevation_cutoff_deg
            )));
        }

        let radii = [
            ("occlusion radius", self.occlusion_radius_px),
            ("inspection radius", self.inspection_radius_px()),
        ];
        if let Some((name, value)) = radii
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(Error::InvalidConfig(format!(
                "{name} must be a finite, non-negative pixel count but got: {value}"
            )));
        }

        let steps = [
            ("radial step", self.glare.radial_step_px),
            ("annulus width", self.glare.annulus_width_px),
        ];
        if let Some((name, value)) = steps
            .into_iter()
            .find(|(_, value)| !value.is_finite() || *value <= 0.0)
        {
            return Err(Error::InvalidConfig(format!(
                "{name} must be a finite, positive pixel count but got: {value}"
            )));
        }

        if self.glare.annulus_count == 0 {
            return Err(Error::InvalidConfig(
                "glare profile needs at least one annulus".into(),
            ));
        }

        Ok(())
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            elevation_cutoff_deg: ELEVATION_CUTOFF_DEG,
            fill_value: 0,
            occlusion_radius_px: OCCLUSION_RADIUS_PX,
            base_threshold: BASE_THRESHOLD,
            glare: GlareProfile::default(),
            inspection_radius_px: None,
        }
    }
}
