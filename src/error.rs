use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The frame has a channel layout the operation cannot handle.
    #[error("expected a frame with 1, 2 or 3 channels but got: {channels}")]
    InvalidFrameShape { channels: usize },

    #[error("expected a square frame but got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("expected a pixel buffer of {expected} bytes but got: {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// Latitude, longitude or altitude are outside physical bounds, or a
    /// timestamp does not name an absolute instant.
    #[error("invalid geolocation: {0}")]
    InvalidGeolocation(String),

    #[error("invalid classifier config: {0}")]
    InvalidConfig(String),

    #[error("ephemeris failed: {0}")]
    Ephemeris(String),

    #[cfg(feature = "image")]
    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "image")]
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
