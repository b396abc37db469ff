use crate::{
    error::{Error, Result},
    optic::PixelCoordinate,
};
use rayon::prelude::*;

/// A boolean grid with the same shape as the [`Frame`] it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    rows: usize,
    cols: usize,
    bits: Vec<bool>,
}

impl Mask {
    /// Creates a mask of `rows` by `cols` with every bit set to `value`.
    pub fn filled(rows: usize, cols: usize, value: bool) -> Self {
        Self {
            rows,
            cols,
            bits: vec![value; rows * cols],
        }
    }

    /// Creates a mask that is `true` inside the closed disk of `radius`
    /// around `center`.
    ///
    /// `center` may lie outside the grid, in which case only the part of the
    /// disk that overlaps the grid is set.
    pub fn disk(rows: usize, cols: usize, center: PixelCoordinate, radius: f64) -> Self {
        let radius_sq = radius * radius;
        let bits = (0..rows * cols)
            .into_par_iter()
            .map(|i| {
                let dx = (i % cols) as f64 - center.x() as f64;
                let dy = (i / cols) as f64 - center.y() as f64;
                dx * dx + dy * dy <= radius_sq
            })
            .collect();

        Self { rows, cols, bits }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the bit at `row` and `col`, or `None` if it is outside the grid.
    pub fn get(&self, row: usize, col: usize) -> Option<bool> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        self.bits.get(row * self.cols + col).copied()
    }

    /// Returns `true` if the bit at `row` and `col` is set.
    ///
    /// Locations outside of the grid are never set.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.get(row, col).unwrap_or(false)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.bits.par_iter().filter(|bit| **bit).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    pub(crate) fn from_bits(rows: usize, cols: usize, bits: Vec<bool>) -> Self {
        debug_assert_eq!(bits.len(), rows * cols);
        Self { rows, cols, bits }
    }

    /// Clears every bit that is set in `other`.
    pub(crate) fn subtract(&mut self, other: &Mask) {
        debug_assert_eq!((self.rows, self.cols), (other.rows, other.cols));
        self.bits
            .par_iter_mut()
            .zip(other.bits.par_iter())
            .for_each(|(bit, other)| *bit &= !*other);
    }
}

/// An 8-bit image owned by one classification request.
///
/// Pixels are stored row major with interleaved channels. Each frame carries
/// an image mask marking the pixels that are still part of the analyzed
/// field of view.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    rows: usize,
    cols: usize,
    channels: usize,
    pixels: Vec<u8>,
    mask: Mask,
}

impl Frame {
    /// Create a frame from a buffer of `rows * cols * channels` bytes.
    ///
    /// ```text
    /// +-------------+-------------+-----+-----------------+
    /// | (0,0) c0..c | (0,1) c0..c | ... | (0,cols-1) c0.. |
    /// +-------------+-------------+-----+-----------------+
    /// | (1,0) c0..c | ...         |
    /// ```
    ///
    /// Every pixel starts out inside the image mask.
    pub fn from_raw(rows: usize, cols: usize, channels: usize, pixels: Vec<u8>) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidFrameShape { channels });
        }

        let Some(expected) = rows
            .checked_mul(cols)
            .and_then(|count| count.checked_mul(channels))
        else {
            return Err(Error::BufferSize {
                expected: usize::MAX,
                actual: pixels.len(),
            });
        };

        if pixels.len() != expected {
            return Err(Error::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            rows,
            cols,
            channels,
            pixels,
            mask: Mask::filled(rows, cols, true),
        })
    }

    /// Create a frame where every pixel holds `value`.
    pub fn from_pixel(rows: usize, cols: usize, value: &[u8]) -> Result<Self> {
        let pixels = value
            .iter()
            .copied()
            .cycle()
            .take(rows * cols * value.len())
            .collect();
        Self::from_raw(rows, cols, value.len(), pixels)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Returns `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// The integer center of the frame, `(cols / 2, rows / 2)`.
    pub fn find_center(&self) -> PixelCoordinate {
        PixelCoordinate::new((self.cols / 2) as i64, (self.rows / 2) as i64)
    }

    /// Returns the channels of a pixel if it is inside the frame.
    pub fn pixel(&self, row: usize, col: usize) -> Option<&[u8]> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        let start = (row * self.cols + col) * self.channels;
        self.pixels.get(start..start + self.channels)
    }

    /// Returns mutable channels of a pixel if it is inside the frame.
    pub fn pixel_mut(&mut self, row: usize, col: usize) -> Option<&mut [u8]> {
        if row >= self.rows || col >= self.cols {
            return None;
        }

        let start = (row * self.cols + col) * self.channels;
        self.pixels.get_mut(start..start + self.channels)
    }

    /// Iterate over pixels in parallel and row major order.
    pub fn par_pixels(&self) -> rayon::slice::Chunks<'_, u8> {
        self.pixels.par_chunks(self.channels)
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// The pixels that are still part of the analyzed field of view.
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub(crate) fn set_mask(&mut self, mask: Mask) {
        debug_assert_eq!((mask.rows, mask.cols), (self.rows, self.cols));
        self.mask = mask;
    }

    pub(crate) fn mask_mut(&mut self) -> &mut Mask {
        &mut self.mask
    }

    /// Writes `value` to every channel of every pixel selected by `mask`.
    pub(crate) fn fill_where(&mut self, mask: &Mask, value: u8) {
        debug_assert_eq!((mask.rows, mask.cols), (self.rows, self.cols));
        self.pixels
            .par_chunks_mut(self.channels)
            .zip(mask.bits.par_iter())
            .filter(|(_, selected)| **selected)
            .for_each(|(pixel, _)| pixel.fill(value));
    }

    /// Copies the window starting at `row` and `col` into a new frame.
    ///
    /// The window is clipped to the frame. The image mask is reset.
    pub(crate) fn window(&self, row: usize, col: usize, rows: usize, cols: usize) -> Frame {
        let row_end = (row + rows).min(self.rows);
        let col_end = (col + cols).min(self.cols);
        let (rows, cols) = (row_end.saturating_sub(row), col_end.saturating_sub(col));

        let stride = self.cols * self.channels;
        let pixels: Vec<u8> = (row..row_end)
            .flat_map(|r| {
                let start = r * stride + col * self.channels;
                self.pixels[start..start + cols * self.channels].iter().copied()
            })
            .collect();

        Frame {
            rows,
            cols,
            channels: self.channels,
            pixels,
            mask: Mask::filled(rows, cols, true),
        }
    }
}
