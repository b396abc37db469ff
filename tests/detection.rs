use allsky::{
    classify::Label,
    config::ClassifierConfig,
    error::{Error, Result},
    frame::Frame,
    navigation::{FixedNavigation, NavigationFix},
    optic::PixelCoordinate,
    pipeline::{Classification, CloudDetector},
    sun::{Ephemeris, SpaEphemeris, parse_timestamp},
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use sguaba::systems::Wgs84;
use uom::si::{angle::degree, f64::Angle};

const SIZE: usize = 512;
const SKY: [u8; 3] = [100, 120, 200];
const CLOUD: [u8; 3] = [220, 200, 210];

/// Reports the sun five degrees from the zenith towards heading 270.
struct NearZenith;

impl Ephemeris for NearZenith {
    fn solar_altitude(&self, _: &Wgs84, _: DateTime<Utc>) -> Result<Angle> {
        Ok(Angle::new::<degree>(85.0))
    }

    fn solar_azimuth(&self, _: &Wgs84, _: DateTime<Utc>) -> Result<Angle> {
        Ok(Angle::new::<degree>(-90.0))
    }
}

fn time() -> DateTime<Utc> {
    parse_timestamp("2019-05-30T17:13:11+00:00").unwrap()
}

fn sky_frame() -> Frame {
    Frame::from_pixel(SIZE, SIZE, &SKY).unwrap()
}

/// Paints a cloud over rows 240 to 269 and columns 380 to 399.
fn cloudy_frame() -> Frame {
    let mut frame = sky_frame();
    for row in 240..270 {
        for col in 380..400 {
            frame.pixel_mut(row, col).unwrap().copy_from_slice(&CLOUD);
        }
    }
    frame
}

fn distance(row: usize, col: usize, pixel: PixelCoordinate) -> f64 {
    PixelCoordinate::new(col as i64, row as i64).distance_to(&pixel)
}

fn detector<E: Ephemeris>(ephemeris: E) -> CloudDetector<FixedNavigation, E> {
    CloudDetector::new(
        FixedNavigation::default(),
        ephemeris,
        ClassifierConfig::default(),
    )
    .unwrap()
}

/// Checks the labels of a classified [`cloudy_frame`].
fn assert_cloudy_labels(classification: &Classification) {
    let sun = classification.sun_pixel();
    let mask = classification.cloud_mask();
    assert_eq!((mask.rows(), mask.cols()), (SIZE, SIZE));

    let center = PixelCoordinate::new(256, 256);
    for row in 0..SIZE {
        for col in 0..SIZE {
            let label = mask.label(row, col).unwrap();
            let in_patch = (240..270).contains(&row) && (380..400).contains(&col);

            if distance(row, col, sun) <= 100.0 || distance(row, col, center) > 171.0 {
                assert_eq!(label, Label::Excluded, "({row}, {col})");
            } else if in_patch {
                assert_eq!(label, Label::Cloud, "({row}, {col})");
            } else if distance(row, col, center) < 170.0 {
                assert_eq!(label, Label::Clear, "({row}, {col})");
            }
        }
    }

    assert_eq!(mask.count(Label::Cloud), 30 * 20);
    assert!(!classification.clear_around_sun());
}

#[test]
fn cloud_patch_near_sun() {
    let classification = detector(NearZenith)
        .classify_frame(cloudy_frame(), time())
        .unwrap();

    assert_eq!(classification.sun_pixel(), PixelCoordinate::new(242, 256));
    assert_cloudy_labels(&classification);
}

#[test]
fn cloud_patch_under_tropic_noon_sun() {
    // Solstice noon on the Tropic of Cancer puts the sun at the zenith.
    let fix = NavigationFix::from_degrees(23.44, 0.0, 0.0, 0.0, 0.0, 0.0).unwrap();
    let detector = CloudDetector::new(
        FixedNavigation::new(fix),
        SpaEphemeris,
        ClassifierConfig::default(),
    )
    .unwrap();
    let time = parse_timestamp("2025-06-21T12:02:00Z").unwrap();
    let classification = detector.classify_frame(cloudy_frame(), time).unwrap();

    assert!(classification.sun().zenith().get::<degree>() < 1.0);
    assert_eq!(classification.sun_pixel(), PixelCoordinate::new(256, 256));
    assert_cloudy_labels(&classification);
}

#[test]
fn blue_sky_is_clear() {
    let classification = detector(NearZenith)
        .classify_frame(sky_frame(), time())
        .unwrap();

    let mask = classification.cloud_mask();
    assert_eq!(mask.count(Label::Cloud), 0);
    assert_eq!(mask.cloud_fraction(), Some(0.0));
    assert!(classification.clear_around_sun());
}

#[test]
fn field_of_view_boundary() {
    let classification = detector(NearZenith)
        .classify_frame(sky_frame(), time())
        .unwrap();

    let mask = classification.cloud_mask();
    // Both pixels are well clear of the sun at (242, 256).
    assert_eq!(mask.label(256, 256 + 180), Some(Label::Excluded));
    assert_eq!(mask.label(256, 256 + 160), Some(Label::Clear));
}

#[test]
fn sun_from_ephemeris_is_occluded() {
    let fix = NavigationFix::from_degrees(44.2187, -76.4747, 0.0, 0.0, 0.0, 0.0).unwrap();
    let navigation = FixedNavigation::new(fix);
    let detector =
        CloudDetector::new(navigation, SpaEphemeris, ClassifierConfig::default()).unwrap();
    let time = parse_timestamp("2025-06-13T16:26:47+00:00").unwrap();
    let classification = detector.classify_frame(cloudy_frame(), time).unwrap();

    let sun = classification.sun_pixel();
    let mask = classification.cloud_mask();
    for row in 0..SIZE {
        for col in 0..SIZE {
            if distance(row, col, sun) <= 100.0 {
                assert_eq!(mask.label(row, col), Some(Label::Excluded));
            }
        }
    }

    // The sun is above the horizon, so it projects inside the lens circle.
    assert!(sun.distance_to(&PixelCoordinate::new(256, 256)) < 256.0);
}

#[test]
fn rectangular_frames_are_square_cropped() {
    let frame = Frame::from_pixel(SIZE, SIZE + 128, &SKY).unwrap();
    let classification = detector(NearZenith).classify_frame(frame, time()).unwrap();

    let mask = classification.cloud_mask();
    assert_eq!((mask.rows(), mask.cols()), (SIZE, SIZE));
    assert_eq!(classification.sun_pixel(), PixelCoordinate::new(242, 256));
}

#[test]
fn invalid_latitude_aborts() {
    let navigation = || NavigationFix::from_degrees(95.0, 123.0, 0.0, 0.0, 0.0, 270.0);
    let detector =
        CloudDetector::new(navigation, NearZenith, ClassifierConfig::default()).unwrap();

    assert!(matches!(
        detector.classify_frame(sky_frame(), time()),
        Err(Error::InvalidGeolocation(_))
    ));
}

#[test]
fn four_channel_frames_abort() {
    let frame = Frame::from_pixel(SIZE, SIZE, &[100, 120, 200, 255]).unwrap();
    assert!(matches!(
        detector(NearZenith).classify_frame(frame, time()),
        Err(Error::InvalidFrameShape { channels: 4 })
    ));
}

#[test]
fn grey_frames_abort() {
    let frame = Frame::from_pixel(SIZE, SIZE, &[128]).unwrap();
    assert!(matches!(
        detector(NearZenith).classify_frame(frame, time()),
        Err(Error::InvalidFrameShape { channels: 1 })
    ));
}

#[test]
fn timestamp_without_offset_is_rejected() {
    assert!(matches!(
        parse_timestamp("2019-05-30T17:13:11"),
        Err(Error::InvalidGeolocation(_))
    ));
}

#[test]
fn requests_run_in_parallel() {
    let detector = detector(NearZenith);
    let frames = vec![cloudy_frame(), sky_frame(), cloudy_frame(), sky_frame()];

    let verdicts: Vec<bool> = frames
        .into_par_iter()
        .map(|frame| detector.classify_frame(frame, time()))
        .map(|classification| classification.unwrap().clear_around_sun())
        .collect();

    assert_eq!(verdicts, vec![false, true, false, true]);
}
