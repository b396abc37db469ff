//! Mapping between pixels of a circular fisheye image and directions in the
//! sky.
//!
//! The lens is modeled as an ideal equidistant fisheye: the distance of a
//! pixel from the optical center grows linearly with the zenith distance of
//! the direction it images. The optical center is the frame center, the
//! zenith maps onto it, and the horizon maps onto the circle of radius
//! `size / 2`.
//!
//! ```text
//!             +y (rows)
//!              ^  azimuth 0
//!              |
//!   azimuth    |        azimuth
//!     270  ----+---->    90  +x (cols)
//!              |
//!              |  azimuth 180
//! ```
//!
//! Azimuth is measured from the `+y` axis towards the `+x` axis, so in image
//! coordinates (rows growing downwards) azimuth 0 points down the image.

use crate::{
    error::{Error, Result},
    frame::Frame,
};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uom::si::{angle::degree, f64::Angle};

/// A pixel location that may lie outside the frame.
///
/// `x` is the column and `y` is the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoordinate {
    x: i64,
    y: i64,
}

impl PixelCoordinate {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }

    /// Euclidean distance to `other` in pixels.
    pub fn distance_to(&self, other: &PixelCoordinate) -> f64 {
        ((self.x - other.x) as f64).hypot((self.y - other.y) as f64)
    }

    /// Returns `(row, col)` if the coordinate is inside a grid of `rows` by
    /// `cols`.
    pub fn to_row_col(&self, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let row = usize::try_from(self.y).ok().filter(|row| *row < rows)?;
        let col = usize::try_from(self.x).ok().filter(|col| *col < cols)?;
        Some((row, col))
    }
}

impl AsRef<PixelCoordinate> for PixelCoordinate {
    fn as_ref(&self) -> &PixelCoordinate {
        self
    }
}

/// A direction in the sky seen from the camera.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkyPoint {
    /// Azimuth on the range 0 to 360 degrees.
    azimuth: Angle,

    /// Angle between the zenith and the direction.
    zenith: Angle,
}

impl SkyPoint {
    /// Creates a `SkyPoint`, wrapping `azimuth` into 0 to 360 degrees.
    pub fn new(azimuth: Angle, zenith: Angle) -> Self {
        Self {
            azimuth: Angle::new::<degree>(azimuth.get::<degree>().rem_euclid(360.0)),
            zenith,
        }
    }

    pub fn from_degrees(azimuth: f64, zenith: f64) -> Self {
        Self::new(Angle::new::<degree>(azimuth), Angle::new::<degree>(zenith))
    }

    pub fn azimuth(&self) -> Angle {
        self.azimuth
    }

    pub fn zenith(&self) -> Angle {
        self.zenith
    }

    /// Elevation above the horizon, the complement of the zenith distance.
    pub fn elevation(&self) -> Angle {
        Angle::new::<degree>(90.0) - self.zenith
    }

    /// Returns `true` if the direction is below the horizon.
    pub fn is_below_horizon(&self) -> bool {
        self.zenith > Angle::new::<degree>(90.0)
    }
}

/// Projection for a square frame whose lens circle spans the full frame.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FisheyeProjection {
    size: usize,
}

impl FisheyeProjection {
    /// Creates a projection for a square frame with side length `size`.
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    /// Creates a projection matching `frame`, which must be square.
    pub fn for_frame(frame: &Frame) -> Result<Self> {
        if !frame.is_square() {
            return Err(Error::NotSquare {
                rows: frame.rows(),
                cols: frame.cols(),
            });
        }

        Ok(Self::new(frame.rows()))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Distance from the frame edge to the optical center, which is also the
    /// radius of the horizon circle.
    pub fn center(&self) -> f64 {
        self.size as f64 / 2.0
    }

    /// Maps a pixel onto the sky.
    ///
    /// The center pixel maps to the zenith and pixels on the rim of the lens
    /// circle map to the horizon.
    pub fn pixel_to_angles(&self, pixel: impl AsRef<PixelCoordinate>) -> SkyPoint {
        let center = self.center();
        let x = pixel.as_ref().x() as f64 - center;
        let y = pixel.as_ref().y() as f64 - center;
        let radius = x.hypot(y);

        let mut azimuth = x.atan2(y).to_degrees();
        if azimuth < 0.0 {
            azimuth += 360.0;
        }

        // Elevation is 90 at the center and 0 at the rim. Flip it into a zenith
        // distance.
        let elevation = 90.0 * (1.0 - radius / center);
        let zenith = -(elevation - 90.0);

        SkyPoint::from_degrees(azimuth, zenith)
    }

    /// Maps a direction in the sky onto the nearest pixel.
    ///
    /// Directions below the horizon map outside of the lens circle and possibly
    /// outside of the frame.
    pub fn angles_to_pixel(&self, point: &SkyPoint) -> PixelCoordinate {
        let center = self.center();
        let zenith = point.zenith().get::<degree>();
        let radius = center * (1.0 - (90.0 - zenith) / 90.0);
        let azimuth = point.azimuth().get::<degree>().to_radians();

        let x = center + radius * azimuth.sin();
        let y = center + radius * azimuth.cos();

        PixelCoordinate::new(x.round() as i64, y.round() as i64)
    }

    /// Maps every pixel of the frame onto the sky in parallel.
    ///
    /// Returns a row major vector.
    pub fn sky_points(&self) -> Vec<SkyPoint> {
        let size = self.size;
        (0..size * size)
            .into_par_iter()
            .map(|i| {
                self.pixel_to_angles(PixelCoordinate::new((i % size) as i64, (i / size) as i64))
            })
            .collect()
    }
}
