use crate::{classify::CloudMask, error::Result, frame::Frame, pipeline::ImageSource};
use image::ImageReader;
use std::path::Path;

/// [`ImageSource`] that decodes image files from disk.
///
/// Any format supported by the `image` crate is accepted. Images are
/// converted to 8 bit RGB.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageFileSource;

impl ImageSource for ImageFileSource {
    fn read_image(&self, path: &Path) -> Result<Frame> {
        let image = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?
            .into_rgb8();

        let (width, height) = image.dimensions();
        tracing::debug!(path = %path.display(), width, height, "decoded image");

        Frame::from_raw(height as usize, width as usize, 3, image.into_raw())
    }
}

/// Encodes `mask` as an RGB image at `path`.
///
/// Clouds are red, clear sky is blue and excluded pixels are black. The
/// format follows the extension of `path`.
pub fn save_cloud_mask(mask: &CloudMask, path: &Path) -> Result<()> {
    image::save_buffer(
        path,
        &mask.to_rgb(),
        mask.cols() as u32,
        mask.rows() as u32,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}
