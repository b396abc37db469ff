use crate::{
    error::{Error, Result},
    optic::SkyPoint,
};
use chrono::{DateTime, Utc};
use sguaba::systems::Wgs84;
use uom::si::{angle::degree, f64::Angle};

/// Computes where the sun is for an observer at a position and time.
pub trait Ephemeris {
    /// Angle of the sun's center above the horizon. Zero is the horizon and
    /// 90 degrees is the zenith.
    fn solar_altitude(&self, position: &Wgs84, time: DateTime<Utc>) -> Result<Angle>;

    /// Azimuth of the sun measured from south with west positive.
    fn solar_azimuth(&self, position: &Wgs84, time: DateTime<Utc>) -> Result<Angle>;
}

/// [`Ephemeris`] backed by the NREL solar position algorithm.
///
/// The algorithm works for an observer at sea level. The altitude of the
/// position is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpaEphemeris;

impl SpaEphemeris {
    fn solar_position(&self, position: &Wgs84, time: DateTime<Utc>) -> Result<spa::SolarPos> {
        spa::solar_position::<spa::StdFloatOps>(
            time,
            position.latitude().get::<degree>(),
            position.longitude().get::<degree>(),
        )
        .map_err(|err| Error::Ephemeris(format!("{err:?}")))
    }
}

impl Ephemeris for SpaEphemeris {
    fn solar_altitude(&self, position: &Wgs84, time: DateTime<Utc>) -> Result<Angle> {
        let solar_pos = self.solar_position(position, time)?;
        Ok(Angle::new::<degree>(90.0 - solar_pos.zenith_angle))
    }

    fn solar_azimuth(&self, position: &Wgs84, time: DateTime<Utc>) -> Result<Angle> {
        let solar_pos = self.solar_position(position, time)?;

        // SPA measures clockwise from north. Shift the origin to south.
        let mut azimuth = solar_pos.azimuth - 180.0;
        if azimuth <= -180.0 {
            azimuth += 360.0;
        }

        Ok(Angle::new::<degree>(azimuth))
    }
}

/// Converts a raw ephemeris azimuth in degrees into the heading used by the
/// projection.
///
/// Negative azimuths down to -180 are mirrored and shifted by a half turn,
/// azimuths below -180 are mirrored and shifted back, and positive azimuths
/// pass through. The result is on the range 0 to 360 degrees.
pub fn normalize_heading(raw_deg: f64) -> f64 {
    let heading = if raw_deg < 0.0 {
        if raw_deg >= -180.0 {
            -raw_deg + 180.0
        } else {
            -raw_deg - 180.0
        }
    } else {
        raw_deg
    };

    heading.rem_euclid(360.0)
}

/// Parses an RFC 3339 timestamp.
///
/// Timestamps without a UTC offset do not name an absolute instant and are
/// rejected.
pub fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| {
            Error::InvalidGeolocation(format!(
                "expected an RFC 3339 timestamp with offset but got {timestamp:?}: {err}"
            ))
        })
}

/// Locates the sun in the sky of one image.
pub struct SunLocator<'a, E> {
    ephemeris: &'a E,
}

impl<'a, E: Ephemeris> SunLocator<'a, E> {
    pub fn new(ephemeris: &'a E) -> Self {
        Self { ephemeris }
    }

    /// Returns the sun's heading and zenith distance.
    pub fn locate(&self, position: &Wgs84, time: DateTime<Utc>) -> Result<SkyPoint> {
        let altitude = self.ephemeris.solar_altitude(position, time)?;
        let azimuth = self.ephemeris.solar_azimuth(position, time)?;

        let zenith = Angle::new::<degree>(90.0) - altitude;
        let heading = normalize_heading(azimuth.get::<degree>());
        tracing::debug!(
            altitude_deg = altitude.get::<degree>(),
            raw_azimuth_deg = azimuth.get::<degree>(),
            heading_deg = heading,
            "located sun"
        );

        if zenith > Angle::new::<degree>(90.0) {
            tracing::warn!(
                altitude_deg = altitude.get::<degree>(),
                "sun is below the horizon"
            );
        }

        Ok(SkyPoint::new(Angle::new::<degree>(heading), zenith))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::NavigationFix;
    use approx::assert_relative_eq;
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;
    use rstest::rstest;

    struct FixedEphemeris {
        altitude: f64,
        azimuth: f64,
    }

    impl Ephemeris for FixedEphemeris {
        fn solar_altitude(&self, _: &Wgs84, _: DateTime<Utc>) -> Result<Angle> {
            Ok(Angle::new::<degree>(self.altitude))
        }

        fn solar_azimuth(&self, _: &Wgs84, _: DateTime<Utc>) -> Result<Angle> {
            Ok(Angle::new::<degree>(self.azimuth))
        }
    }

    fn position() -> Wgs84 {
        NavigationFix::from_degrees(44.2187, -76.4747, 0.0, 0.0, 0.0, 0.0)
            .unwrap()
            .position()
            .clone()
    }

    fn time() -> DateTime<Utc> {
        parse_timestamp("2025-06-13T16:26:47+00:00").unwrap()
    }

    #[rstest]
    #[case(-200.0, 20.0)]
    #[case(-90.0, 270.0)]
    #[case(45.0, 45.0)]
    #[case(0.0, 0.0)]
    #[case(-180.0, 0.0)]
    #[case(-360.0, 180.0)]
    #[case(-600.0, 60.0)]
    fn heading_normalization(#[case] raw: f64, #[case] heading: f64) {
        assert_relative_eq!(normalize_heading(raw), heading);
    }

    #[quickcheck]
    fn heading_is_always_in_range(raw: f64) -> TestResult {
        if !raw.is_finite() {
            return TestResult::discard();
        }

        TestResult::from_bool((0.0..360.0).contains(&normalize_heading(raw)))
    }

    #[test]
    fn altitude_becomes_zenith_distance() {
        let ephemeris = FixedEphemeris {
            altitude: 60.0,
            azimuth: -90.0,
        };
        let sun = SunLocator::new(&ephemeris).locate(&position(), time()).unwrap();
        assert_relative_eq!(sun.zenith().get::<degree>(), 30.0, epsilon = 1e-9);
        assert_relative_eq!(sun.azimuth().get::<degree>(), 270.0, epsilon = 1e-9);
    }

    #[test]
    fn spa_reports_daylight_over_kingston() {
        let ephemeris = SpaEphemeris;
        let altitude = ephemeris
            .solar_altitude(&position(), time())
            .unwrap()
            .get::<degree>();
        let azimuth = ephemeris
            .solar_azimuth(&position(), time())
            .unwrap()
            .get::<degree>();

        // Late morning in mid June.
        assert!((50.0..75.0).contains(&altitude), "{altitude}");
        assert!((-180.0..180.0).contains(&azimuth), "{azimuth}");
    }

    #[rstest]
    #[case("2019-05-30T17:13:11")]
    #[case("2019-05-30 17:13:11")]
    #[case("not a time")]
    fn timestamps_need_an_offset(#[case] timestamp: &str) {
        assert!(matches!(
            parse_timestamp(timestamp),
            Err(Error::InvalidGeolocation(_))
        ));
    }

    #[test]
    fn timestamps_are_converted_to_utc() {
        let time = parse_timestamp("2019-05-30T19:13:11+02:00").unwrap();
        assert_eq!(time, parse_timestamp("2019-05-30T17:13:11Z").unwrap());
    }
}
