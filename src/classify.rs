//! Per-pixel cloud classification around the sun.
//!
//! Each pixel is scored with a sky index computed from its red and blue
//! channels. Clear sky scatters far more blue than red and scores high, while
//! clouds are grey to white and score near zero. Away from the sun a single
//! threshold separates the two. Within the glare core around the sun the
//! threshold follows a fit polynomial of the distance to the sun.

use crate::{
    config::ClassifierConfig,
    error::{Error, Result},
    frame::Frame,
    occlusion::OcclusionMask,
    optic::PixelCoordinate,
};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Label of a pixel in a [`CloudMask`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Label {
    /// Occluded around the sun or outside the analyzed field of view.
    Excluded = 0,
    Cloud = 1,
    Clear = 2,
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label as u8
    }
}

/// Computes the sky index of a pixel.
///
/// ```text
/// SI = (blue - red) / (blue + red)
/// ```
///
/// A black pixel has no defined ratio and scores 1, the clearest sky.
pub fn sky_index(red: f64, blue: f64) -> f64 {
    let denominator = blue + red;
    if denominator == 0.0 {
        return 1.0;
    }

    (blue - red) / denominator
}

/// A per-pixel label grid with the shape of the classified frame.
#[derive(Clone, Debug, PartialEq)]
pub struct CloudMask {
    rows: usize,
    cols: usize,
    labels: Vec<Label>,
}

impl CloudMask {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the label at `row` and `col`, or `None` outside the grid.
    pub fn label(&self, row: usize, col: usize) -> Option<Label> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        self.labels.get(row * self.cols + col).copied()
    }

    pub fn as_slice(&self) -> &[Label] {
        &self.labels
    }

    /// Returns the labels as bytes, 0 for excluded, 1 for cloud and 2 for
    /// clear.
    pub fn as_bytes(&self) -> Vec<u8> {
        self.labels.par_iter().map(|label| u8::from(*label)).collect()
    }

    /// Renders the mask as RGB bytes: clouds red, clear sky blue and excluded
    /// pixels black.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.labels
            .par_iter()
            .flat_map_iter(|label| match label {
                Label::Excluded => [0, 0, 0],
                Label::Cloud => [255, 0, 0],
                Label::Clear => [0, 0, 255],
            })
            .collect()
    }

    pub fn count(&self, label: Label) -> usize {
        self.labels.par_iter().filter(|l| **l == label).count()
    }

    /// Fraction of the classified (not excluded) pixels that are cloud.
    ///
    /// Returns `None` if every pixel is excluded.
    pub fn cloud_fraction(&self) -> Option<f64> {
        let cloud = self.count(Label::Cloud);
        let classified = cloud + self.count(Label::Clear);
        if classified == 0 {
            return None;
        }

        Some(cloud as f64 / classified as f64)
    }

    /// Returns `true` if no pixel within `radius` of `sun` is a cloud.
    pub fn is_clear_around(&self, sun: PixelCoordinate, radius: f64) -> bool {
        let radius_sq = radius * radius;
        let cols = self.cols;
        !self.labels.par_iter().enumerate().any(|(i, label)| {
            let dx = (i % cols) as f64 - sun.x() as f64;
            let dy = (i / cols) as f64 - sun.y() as f64;
            *label == Label::Cloud && dx * dx + dy * dy <= radius_sq
        })
    }
}

/// Classifies the pixels of a prepared frame.
#[derive(Clone, Debug, Default)]
pub struct CloudClassifier {
    config: ClassifierConfig,
}

impl CloudClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Returns the annulus around the sun that a pixel at squared distance
    /// `distance_sq` falls into.
    ///
    /// Annulus `j` holds the distances in `(width * (j - 1), width * j]`.
    /// Pixels within `inner_radius` or beyond the last annulus have no
    /// annulus.
    fn annulus(&self, distance_sq: f64, inner_radius: f64) -> Option<usize> {
        let glare = &self.config.glare;
        if distance_sq <= inner_radius * inner_radius {
            return None;
        }

        let width = glare.annulus_width_px;
        let outer_radius = glare.outer_radius_px();
        if width <= 0.0 || glare.annulus_count == 0 || distance_sq > outer_radius * outer_radius {
            return None;
        }

        // Bounded by the last annulus since the distance is within the outer radius.
        let last = glare.annulus_count - 1;
        let mut j = ((distance_sq.sqrt() / width).ceil() as usize).min(last);
        // Guard the square root against rounding at annulus edges.
        while j > 0 && distance_sq <= (width * (j - 1) as f64).powi(2) {
            j -= 1;
        }
        while j < last && distance_sq > (width * j as f64).powi(2) {
            j += 1;
        }

        Some(j)
    }

    /// Labels a single pixel whose squared distance to the sun is
    /// `distance_sq`. The annuli start at `inner_radius`.
    fn label(
        &self,
        pixel: &[u8],
        distance_sq: f64,
        inner_radius: f64,
        thresholds: &[f64],
    ) -> Label {
        // Channels are in RGB order.
        let si = sky_index(pixel[0] as f64, pixel[2] as f64);
        let core_radius = self.config.glare.core_radius_px();

        let base_cloud =
            si < self.config.base_threshold && distance_sq > core_radius * core_radius;
        let glare_cloud = self
            .annulus(distance_sq, inner_radius)
            .is_some_and(|j| si < thresholds[j]);

        match base_cloud || glare_cloud {
            true => Label::Cloud,
            false => Label::Clear,
        }
    }

    /// Labels every pixel of `frame`.
    ///
    /// The frame must have at least three channels in RGB order. Pixels
    /// outside the frame's image mask or inside `occlusion` are excluded
    /// regardless of their sky index.
    pub fn classify(
        &self,
        frame: &Frame,
        sun: PixelCoordinate,
        occlusion: &OcclusionMask,
    ) -> Result<CloudMask> {
        if frame.channels() < 3 {
            return Err(Error::InvalidFrameShape {
                channels: frame.channels(),
            });
        }

        let (rows, cols) = frame.dimensions();
        let thresholds = self.config.glare.thresholds();
        let valid = frame.mask();

        let labels: Vec<Label> = frame
            .par_pixels()
            .enumerate()
            .map(|(i, pixel)| {
                let (row, col) = (i / cols, i % cols);
                let dx = col as f64 - sun.x() as f64;
                let dy = row as f64 - sun.y() as f64;
                let label =
                    self.label(pixel, dx * dx + dy * dy, occlusion.radius(), &thresholds);

                // Exclusion is applied last so that it always wins.
                match occlusion.contains(row, col) || !valid.contains(row, col) {
                    true => Label::Excluded,
                    false => label,
                }
            })
            .collect();

        let mask = CloudMask { rows, cols, labels };
        tracing::debug!(
            cloud = mask.count(Label::Cloud),
            clear = mask.count(Label::Clear),
            excluded = mask.count(Label::Excluded),
            "classified frame"
        );

        Ok(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn classifier() -> CloudClassifier {
        CloudClassifier::default()
    }

    #[rstest]
    #[case(0.0, 0.0, 1.0)]
    #[case(100.0, 200.0, 1.0 / 3.0)]
    #[case(220.0, 210.0, -10.0 / 430.0)]
    #[case(0.0, 50.0, 1.0)]
    #[case(50.0, 0.0, -1.0)]
    fn sky_index_cases(#[case] red: f64, #[case] blue: f64, #[case] si: f64) {
        assert_relative_eq!(sky_index(red, blue), si);
    }

    #[rstest]
    #[case(0.0, None)]
    #[case(100.0, None)]
    #[case(100.5, Some(11))]
    #[case(110.0, Some(11))]
    #[case(110.1, Some(12))]
    #[case(450.0, Some(45))]
    #[case(490.0, Some(49))]
    #[case(490.1, None)]
    fn annulus_of_distance(#[case] distance: f64, #[case] annulus: Option<usize>) {
        assert_eq!(classifier().annulus(distance * distance, 100.0), annulus);
    }

    #[test]
    fn zero_annulus_width_has_no_annuli() {
        let classifier = CloudClassifier::new(ClassifierConfig {
            glare: crate::config::GlareProfile {
                annulus_width_px: 0.0,
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(classifier.annulus(25.0, 1.0), None);

        let frame = Frame::from_pixel(8, 8, &[120, 120, 130]).unwrap();
        let sun = PixelCoordinate::new(4, 4);
        let occlusion = OcclusionMask::new(8, 8, sun, 1.0);
        let mask = classifier.classify(&frame, sun, &occlusion).unwrap();
        assert_eq!(mask.count(Label::Excluded), occlusion.mask().count());
    }

    #[test]
    fn black_pixel_is_clear() {
        let thresholds = classifier().config().glare.thresholds();
        let label = classifier().label(&[0, 0, 0], 600.0 * 600.0, 100.0, &thresholds);
        assert_eq!(label, Label::Clear);
    }

    #[rstest]
    // Grey sky away from the sun.
    #[case([120, 120, 130], 600.0, Label::Cloud)]
    // Blue sky away from the sun.
    #[case([100, 120, 200], 600.0, Label::Clear)]
    // Inside the glare core the base threshold does not apply, only the
    // annulus threshold of roughly 0.08.
    #[case([110, 120, 150], 200.0, Label::Clear)]
    #[case([120, 120, 130], 200.0, Label::Cloud)]
    // Beyond the core the base rule applies as well.
    #[case([110, 120, 150], 470.0, Label::Cloud)]
    // Beyond the last annulus only the base rule applies.
    #[case([110, 120, 150], 495.0, Label::Cloud)]
    #[case([100, 120, 200], 495.0, Label::Clear)]
    fn label_rules(#[case] pixel: [u8; 3], #[case] distance: f64, #[case] label: Label) {
        let thresholds = classifier().config().glare.thresholds();
        assert_eq!(
            classifier().label(&pixel, distance * distance, 100.0, &thresholds),
            label
        );
    }

    #[test]
    fn occlusion_wins_over_cloud() {
        let frame = Frame::from_pixel(64, 64, &[220, 220, 210]).unwrap();
        let sun = PixelCoordinate::new(32, 32);
        let occlusion = OcclusionMask::new(64, 64, sun, 10.0);
        let mask = classifier().classify(&frame, sun, &occlusion).unwrap();

        assert_eq!(mask.label(32, 32), Some(Label::Excluded));
        assert_eq!(mask.label(32, 42), Some(Label::Excluded));
        // The annuli start at the edge of the occlusion disk.
        assert_eq!(mask.label(32, 43), Some(Label::Cloud));
        assert_eq!(mask.count(Label::Excluded), occlusion.mask().count());
    }

    #[test]
    fn classify_needs_three_channels() {
        let frame = Frame::from_pixel(8, 8, &[1, 2]).unwrap();
        let sun = PixelCoordinate::new(4, 4);
        let occlusion = OcclusionMask::new(8, 8, sun, 1.0);
        assert!(matches!(
            classifier().classify(&frame, sun, &occlusion),
            Err(Error::InvalidFrameShape { channels: 2 })
        ));
    }

    #[test]
    fn verdict_and_statistics() {
        let frame = Frame::from_pixel(32, 32, &[100, 120, 200]).unwrap();
        let sun = PixelCoordinate::new(-500, -500);
        let occlusion = OcclusionMask::new(32, 32, sun, 100.0);
        let mut mask = classifier().classify(&frame, sun, &occlusion).unwrap();

        assert_eq!(mask.cloud_fraction(), Some(0.0));
        assert!(mask.is_clear_around(PixelCoordinate::new(16, 16), 5.0));

        mask.labels[16 * 32 + 20] = Label::Cloud;
        assert!(!mask.is_clear_around(PixelCoordinate::new(16, 16), 5.0));
        assert!(mask.is_clear_around(PixelCoordinate::new(16, 16), 3.0));
        assert_relative_eq!(mask.cloud_fraction().unwrap(), 1.0 / 1024.0);

        assert_eq!(mask.as_bytes()[16 * 32 + 20], 1);
        assert_eq!(&mask.to_rgb()[..3], &[0, 0, 255]);
    }
}
