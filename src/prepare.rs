//! Cropping a raw camera frame down to the analyzed part of the lens circle.

use crate::{
    error::{Error, Result},
    frame::{Frame, Mask},
    optic::PixelCoordinate,
};
use rayon::prelude::*;

/// Crops `frame` to the largest square centered on the frame center.
///
/// The side of the square is the shorter of the two dimensions. Both
/// orientations crop symmetrically around the center.
pub fn square_crop(frame: &Frame) -> Frame {
    let side = frame.rows().min(frame.cols());
    let center = frame.find_center();

    // Non-negative since `side` is the shorter dimension.
    let col = center.x() as usize - side / 2;
    let row = center.y() as usize - side / 2;

    tracing::debug!(
        rows = frame.rows(),
        cols = frame.cols(),
        side,
        row,
        col,
        "square crop"
    );

    frame.window(row, col, side, side)
}

/// Radius of the disk that keeps everything above `elevation_cutoff_deg` on a
/// square frame of side `size`.
pub fn crop_radius(size: usize, elevation_cutoff_deg: f64) -> f64 {
    let half_size = size as f64 / 2.0;
    half_size - half_size / 90.0 * elevation_cutoff_deg
}

/// Crops away everything below `elevation_cutoff_deg`.
///
/// Pixels outside the disk of [`crop_radius`] around the frame center get
/// `fill_value` written to every channel, and the disk becomes the frame's
/// image mask. Near the horizon the atmosphere is thick and the horizon is
/// cluttered with obstructions, neither of which the sky index handles.
///
/// Frames with 1, 2 or 3 channels are supported.
pub fn fov_crop(frame: &mut Frame, elevation_cutoff_deg: f64, fill_value: u8) -> Result<()> {
    if !(1..=3).contains(&frame.channels()) {
        return Err(Error::InvalidFrameShape {
            channels: frame.channels(),
        });
    }

    let radius = crop_radius(frame.rows(), elevation_cutoff_deg);
    let disk = Mask::disk(frame.rows(), frame.cols(), frame.find_center(), radius);

    let mut outside = Mask::filled(frame.rows(), frame.cols(), true);
    outside.subtract(&disk);
    frame.fill_where(&outside, fill_value);

    tracing::debug!(
        elevation_cutoff_deg,
        radius,
        kept = disk.count(),
        "cropped field of view"
    );

    frame.set_mask(disk);
    Ok(())
}

/// Rotates `frame` clockwise by `heading_deg` about its center.
///
/// The angle is meteorological, so a pixel on the positive x axis moves onto
/// the positive y axis for a heading of 90 degrees. Pixels are sampled from
/// their nearest source pixel. Pixels whose source lies outside the frame are
/// zero and outside the rotated image mask.
pub fn rotate(frame: &Frame, heading_deg: f64) -> Result<Frame> {
    let (rows, cols) = frame.dimensions();
    let channels = frame.channels();
    let center = frame.find_center();
    let (cx, cy) = (center.x() as f64, center.y() as f64);
    let (sin, cos) = heading_deg.to_radians().sin_cos();

    let sources: Vec<Option<(usize, usize)>> = (0..rows * cols)
        .into_par_iter()
        .map(|i| {
            let dx = (i % cols) as f64 - cx;
            let dy = (i / cols) as f64 - cy;
            // Undo the clockwise turn to find where the pixel came from.
            let x = cx + dx * cos + dy * sin;
            let y = cy - dx * sin + dy * cos;
            PixelCoordinate::new(x.round() as i64, y.round() as i64).to_row_col(rows, cols)
        })
        .collect();

    let pixels = sources
        .par_iter()
        .flat_map_iter(|source| {
            match source.and_then(|(row, col)| frame.pixel(row, col)) {
                Some(pixel) => pixel.to_vec(),
                None => vec![0; channels],
            }
        })
        .collect();
    let bits = sources
        .par_iter()
        .map(|source| source.is_some_and(|(row, col)| frame.mask().contains(row, col)))
        .collect();

    tracing::debug!(heading_deg, rows, cols, "rotated frame");

    let mut rotated = Frame::from_raw(rows, cols, channels, pixels)?;
    rotated.set_mask(Mask::from_bits(rows, cols, bits));
    Ok(rotated)
}
