//! Sequences the stages that turn one sky image into a cloud mask.
//!
//! ```text
//! frame ─> square crop ─> fov crop ─┐
//! navigation ─> sun locator ─> sun pixel ─> occlusion ─> classifier ─> cloud mask
//! ```
//!
//! All state of a request lives in a [`Session`]. Nothing is shared between
//! requests, so independent images may be classified on separate threads with
//! the same [`CloudDetector`].

use crate::{
    classify::{CloudClassifier, CloudMask},
    config::ClassifierConfig,
    error::Result,
    frame::Frame,
    navigation::{NavigationFix, NavigationSource},
    occlusion::OcclusionMask,
    optic::{FisheyeProjection, PixelCoordinate, SkyPoint},
    prepare::{fov_crop, square_crop},
    sun::{Ephemeris, SunLocator},
};
use chrono::{DateTime, Utc};
use std::path::Path;
use uom::si::angle::degree;

/// Reads the pixels of an image from storage.
pub trait ImageSource {
    /// Returns the image at `path` as an RGB frame.
    fn read_image(&self, path: &Path) -> Result<Frame>;
}

impl<F> ImageSource for F
where
    F: Fn(&Path) -> Result<Frame>,
{
    fn read_image(&self, path: &Path) -> Result<Frame> {
        self(path)
    }
}

/// The mutable state of one classification request.
///
/// Each stage takes the session by value and returns it, so a session that
/// failed a stage is dropped with everything it holds.
#[derive(Debug)]
pub struct Session {
    frame: Frame,
    time: DateTime<Utc>,
    navigation: NavigationFix,
    sun: SkyPoint,
}

impl Session {
    /// Starts a session by locating the sun.
    ///
    /// The sun is located before any pixel work so that invalid positions and
    /// times fail fast.
    pub fn start<N, E>(
        frame: Frame,
        time: DateTime<Utc>,
        navigation: &N,
        ephemeris: &E,
    ) -> Result<Self>
    where
        N: NavigationSource,
        E: Ephemeris,
    {
        let navigation = navigation.read_navigation()?;
        let sun = SunLocator::new(ephemeris).locate(navigation.position(), time)?;

        Ok(Self {
            frame,
            time,
            navigation,
            sun,
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn navigation(&self) -> &NavigationFix {
        &self.navigation
    }

    pub fn sun(&self) -> SkyPoint {
        self.sun
    }

    /// Square crops the frame and crops away everything below the configured
    /// elevation.
    pub fn prepare(mut self, config: &ClassifierConfig) -> Result<Self> {
        self.frame = square_crop(&self.frame);
        fov_crop(
            &mut self.frame,
            config.elevation_cutoff_deg,
            config.fill_value,
        )?;
        Ok(self)
    }

    /// Projects the sun onto the prepared frame and erases the glare around
    /// it.
    pub fn occlude_sun(mut self, config: &ClassifierConfig) -> Result<OccludedSession> {
        let projection = FisheyeProjection::for_frame(&self.frame)?;
        let sun_pixel = projection.angles_to_pixel(&self.sun);
        if sun_pixel
            .to_row_col(self.frame.rows(), self.frame.cols())
            .is_none()
        {
            tracing::warn!(
                x = sun_pixel.x(),
                y = sun_pixel.y(),
                size = projection.size(),
                "sun pixel is outside the frame"
            );
        }

        let occlusion =
            OcclusionMask::apply(&mut self.frame, sun_pixel, config.occlusion_radius_px);

        Ok(OccludedSession {
            session: self,
            projection,
            sun_pixel,
            occlusion,
        })
    }
}

/// A session whose frame has the sun erased and is ready to classify.
#[derive(Debug)]
pub struct OccludedSession {
    session: Session,
    projection: FisheyeProjection,
    sun_pixel: PixelCoordinate,
    occlusion: OcclusionMask,
}

impl OccludedSession {
    pub fn frame(&self) -> &Frame {
        &self.session.frame
    }

    pub fn projection(&self) -> FisheyeProjection {
        self.projection
    }

    pub fn sun_pixel(&self) -> PixelCoordinate {
        self.sun_pixel
    }

    pub fn occlusion(&self) -> &OcclusionMask {
        &self.occlusion
    }

    /// Classifies the frame and consumes the session.
    pub fn classify(self, classifier: &CloudClassifier) -> Result<Classification> {
        let cloud_mask =
            classifier.classify(&self.session.frame, self.sun_pixel, &self.occlusion)?;
        let inspection_radius = classifier.config().inspection_radius_px();
        let clear_around_sun = cloud_mask.is_clear_around(self.sun_pixel, inspection_radius);

        tracing::info!(
            time = %self.session.time,
            sun_azimuth_deg = self.session.sun.azimuth().get::<degree>(),
            sun_zenith_deg = self.session.sun.zenith().get::<degree>(),
            clear_around_sun,
            "classified image"
        );

        Ok(Classification {
            cloud_mask,
            sun: self.session.sun,
            sun_pixel: self.sun_pixel,
            clear_around_sun,
        })
    }
}

/// The result of classifying one image.
#[derive(Clone, Debug, PartialEq)]
pub struct Classification {
    cloud_mask: CloudMask,
    sun: SkyPoint,
    sun_pixel: PixelCoordinate,
    clear_around_sun: bool,
}

impl Classification {
    pub fn cloud_mask(&self) -> &CloudMask {
        &self.cloud_mask
    }

    pub fn into_cloud_mask(self) -> CloudMask {
        self.cloud_mask
    }

    /// Heading and zenith distance of the sun.
    pub fn sun(&self) -> SkyPoint {
        self.sun
    }

    /// Pixel of the prepared frame the sun projects onto.
    pub fn sun_pixel(&self) -> PixelCoordinate {
        self.sun_pixel
    }

    /// Returns `true` if no cloud was found within the inspection radius
    /// around the sun.
    pub fn clear_around_sun(&self) -> bool {
        self.clear_around_sun
    }
}

/// Classifies sky images using injected navigation and ephemeris sources.
pub struct CloudDetector<N, E> {
    navigation: N,
    ephemeris: E,
    classifier: CloudClassifier,
}

impl<N, E> CloudDetector<N, E>
where
    N: NavigationSource,
    E: Ephemeris,
{
    /// Creates a detector, rejecting an out of range `config`.
    pub fn new(navigation: N, ephemeris: E, config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            navigation,
            ephemeris,
            classifier: CloudClassifier::new(config),
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        self.classifier.config()
    }

    /// Classifies a decoded `frame` taken at `time`.
    pub fn classify_frame(&self, frame: Frame, time: DateTime<Utc>) -> Result<Classification> {
        let config = self.classifier.config();
        Session::start(frame, time, &self.navigation, &self.ephemeris)?
            .prepare(config)?
            .occlude_sun(config)?
            .classify(&self.classifier)
    }

    /// Reads the image at `path` from `source` and classifies it.
    pub fn classify<S: ImageSource>(
        &self,
        source: &S,
        path: impl AsRef<Path>,
        time: DateTime<Utc>,
    ) -> Result<Classification> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading image");
        let frame = source.read_image(path)?;
        self.classify_frame(frame, time)
    }
}
