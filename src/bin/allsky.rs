use allsky::{
    classify::Label,
    config::ClassifierConfig,
    navigation::{FixedNavigation, NavigationFix},
    pipeline::CloudDetector,
    source::{ImageFileSource, save_cloud_mask},
    sun::{SpaEphemeris, parse_timestamp},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing_subscriber::EnvFilter;
use uom::si::angle::degree;

#[derive(Parser)]
#[command(name = "allsky", about = "Detect clouds around the sun in all-sky images")]
#[command(version)]
struct Args {
    /// Path to the input image.
    image: PathBuf,

    /// Time the image was taken, as RFC 3339 with a UTC offset.
    #[arg(short, long)]
    timestamp: String,

    #[arg(long, default_value_t = 48.0, allow_negative_numbers = true)]
    latitude: f64,

    #[arg(long, default_value_t = 123.0, allow_negative_numbers = true)]
    longitude: f64,

    /// Altitude above the ellipsoid in meters.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    altitude: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pitch: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    roll: f64,

    #[arg(long, default_value_t = 270.0, allow_negative_numbers = true)]
    heading: f64,

    /// JSON file with classifier parameters. Missing fields keep their
    /// defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Optional path to write the cloud mask image to.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open config {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => ClassifierConfig::default(),
    };

    let fix = NavigationFix::from_degrees(
        args.latitude,
        args.longitude,
        args.altitude,
        args.pitch,
        args.roll,
        args.heading,
    )?;
    let time = parse_timestamp(&args.timestamp)?;

    let detector = CloudDetector::new(FixedNavigation::new(fix), SpaEphemeris, config)?;
    let classification = detector
        .classify(&ImageFileSource, &args.image, time)
        .with_context(|| format!("failed to classify {}", args.image.display()))?;

    let mask = classification.cloud_mask();
    let total = (mask.rows() * mask.cols()).max(1) as f64;
    let sun = classification.sun();

    println!(
        "sun: azimuth {:.2} deg, zenith {:.2} deg, pixel ({}, {})",
        sun.azimuth().get::<degree>(),
        sun.zenith().get::<degree>(),
        classification.sun_pixel().x(),
        classification.sun_pixel().y(),
    );
    for label in [Label::Cloud, Label::Clear, Label::Excluded] {
        println!("{label:?}: {:.4}", mask.count(label) as f64 / total);
    }
    match classification.clear_around_sun() {
        true => println!("clear"),
        false => println!("cloudy"),
    }

    if let Some(output) = &args.output {
        save_cloud_mask(mask, output)
            .with_context(|| format!("failed to write {}", output.display()))?;
    }

    Ok(())
}
