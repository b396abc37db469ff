// #![warn(missing_docs)]

//! Cloud Detection Around the Sun in All-Sky Images
//!
//! Classifies every pixel of a fisheye image of the sky as cloud or clear
//! sky, and decides whether the sky around the sun is free of clouds.
//!
//! ```no_run
//! use allsky::{
//!     config::ClassifierConfig,
//!     frame::Frame,
//!     navigation::FixedNavigation,
//!     pipeline::CloudDetector,
//!     sun::{parse_timestamp, SpaEphemeris},
//! };
//!
//! # fn main() -> allsky::error::Result<()> {
//! let detector = CloudDetector::new(
//!     FixedNavigation::default(),
//!     SpaEphemeris,
//!     ClassifierConfig::default(),
//! )?;
//!
//! let frame = Frame::from_pixel(512, 512, &[100, 120, 200])?;
//! let time = parse_timestamp("2019-05-30T17:13:11Z")?;
//! let classification = detector.classify_frame(frame, time)?;
//! println!("clear around sun: {}", classification.clear_around_sun());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
#[allow(missing_docs)]
pub mod error;
pub mod frame;
pub mod navigation;
pub mod occlusion;
pub mod optic;
pub mod pipeline;
pub mod prepare;
#[cfg(feature = "image")]
pub mod source;
pub mod sun;
