use crate::error::{Error, Result};
use sguaba::{engineering::Orientation, system, systems::Wgs84};
use uom::si::{
    angle::degree,
    f64::{Angle, Length},
    length::meter,
};

system!(pub struct CameraEnu using ENU);

/// Position and attitude of the camera when an image was taken.
#[derive(Clone, Debug)]
pub struct NavigationFix {
    position: Wgs84,

    /// Attitude of the camera with respect to the local ENU frame.
    ///
    /// Kept for tilt compensation. The fisheye projection assumes a level
    /// camera and does not read it.
    orientation: Orientation<CameraEnu>,
}

impl NavigationFix {
    pub fn new(position: Wgs84, orientation: Orientation<CameraEnu>) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Creates a fix from raw navigation values in degrees and meters.
    pub fn from_degrees(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        pitch: f64,
        roll: f64,
        heading: f64,
    ) -> Result<Self> {
        let position = geolocation(
            Angle::new::<degree>(latitude),
            Angle::new::<degree>(longitude),
            Length::new::<meter>(altitude),
        )?;
        let orientation = Orientation::<CameraEnu>::tait_bryan_builder()
            .yaw(Angle::new::<degree>(heading))
            .pitch(Angle::new::<degree>(pitch))
            .roll(Angle::new::<degree>(roll))
            .build();

        Ok(Self::new(position, orientation))
    }

    pub fn position(&self) -> &Wgs84 {
        &self.position
    }

    pub fn orientation(&self) -> &Orientation<CameraEnu> {
        &self.orientation
    }
}

/// Builds a `Wgs84` position, rejecting coordinates outside physical bounds.
///
/// Latitude must be on -90 to 90 degrees and longitude on -180 to 180
/// degrees.
pub fn geolocation(latitude: Angle, longitude: Angle, altitude: Length) -> Result<Wgs84> {
    let lat = latitude.get::<degree>();
    let lon = longitude.get::<degree>();
    let alt = altitude.get::<meter>();

    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(Error::InvalidGeolocation(format!(
            "expected latitude in range [-90, 90] but got: {lat}"
        )));
    }

    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidGeolocation(format!(
            "expected longitude in range [-180, 180] but got: {lon}"
        )));
    }

    if !alt.is_finite() {
        return Err(Error::InvalidGeolocation(format!(
            "expected a finite altitude but got: {alt}"
        )));
    }

    Ok(Wgs84::builder()
        .latitude(latitude)
        // Checked above.
        .expect("latitude is between -90 and 90")
        .longitude(longitude)
        .altitude(altitude)
        .build())
}

/// Provides the camera's position and attitude for an image.
pub trait NavigationSource {
    fn read_navigation(&self) -> Result<NavigationFix>;
}

impl<F> NavigationSource for F
where
    F: Fn() -> Result<NavigationFix>,
{
    fn read_navigation(&self) -> Result<NavigationFix> {
        self()
    }
}

/// A navigation source that reports the same fix for every image.
#[derive(Clone, Debug)]
pub struct FixedNavigation {
    fix: NavigationFix,
}

impl FixedNavigation {
    pub fn new(fix: NavigationFix) -> Self {
        Self { fix }
    }
}

impl Default for FixedNavigation {
    /// Latitude 48, longitude 123 at sea level with a level camera heading
    /// 270 degrees.
    fn default() -> Self {
        Self::new(
            NavigationFix::from_degrees(48.0, 123.0, 0.0, 0.0, 0.0, 270.0)
                .expect("fixed position is within physical bounds"),
        )
    }
}

impl NavigationSource for FixedNavigation {
    fn read_navigation(&self) -> Result<NavigationFix> {
        Ok(self.fix.clone())
    }
}
