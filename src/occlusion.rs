use crate::{
    frame::{Frame, Mask},
    optic::PixelCoordinate,
};

/// The disk around the sun that is erased before classification.
///
/// Lens glare saturates the pixels around the sun. Classifying them yields
/// spurious clouds and spurious clear sky, so they are blanked and removed
/// from the frame's image mask.
#[derive(Clone, Debug, PartialEq)]
pub struct OcclusionMask {
    center: PixelCoordinate,
    radius: f64,
    mask: Mask,
}

impl OcclusionMask {
    /// Creates the disk of `radius` around `center` for a frame of `rows` by
    /// `cols`.
    pub fn new(rows: usize, cols: usize, center: PixelCoordinate, radius: f64) -> Self {
        Self {
            center,
            radius,
            mask: Mask::disk(rows, cols, center, radius),
        }
    }

    /// Erases the disk of `radius` around `sun` from `frame`.
    ///
    /// Every channel of the pixels inside the disk is set to zero and the
    /// disk is subtracted from the frame's image mask.
    pub fn apply(frame: &mut Frame, sun: PixelCoordinate, radius: f64) -> Self {
        let occlusion = Self::new(frame.rows(), frame.cols(), sun, radius);
        frame.fill_where(&occlusion.mask, 0);
        frame.mask_mut().subtract(&occlusion.mask);

        tracing::debug!(
            x = sun.x(),
            y = sun.y(),
            radius,
            occluded = occlusion.mask.count(),
            "occluded sun"
        );

        occlusion
    }

    pub fn center(&self) -> PixelCoordinate {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Returns `true` if the pixel at `row` and `col` is occluded.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.mask.contains(row, col)
    }
}
