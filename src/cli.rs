// Command-line interface
// Argument definitions and assembly of the effective haptic configuration

use clap::Parser;
use std::path::PathBuf;

use crate::haptics::{ConfigError, HapticConfig};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "hapticbeat")]
#[command(about = "Convert music recordings into haptic glove events", long_about = None)]
pub struct Args {
    /// Directory of recordings (or a single recording) to convert
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output directory (default: haptic_outputs next to the input directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// JSON file overriding any subset of the default configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Append a JSONL pipeline trace to this file
    #[arg(long, value_name = "FILE")]
    pub trace: Option<PathBuf>,

    /// Recordings processed in parallel (default: available cores)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Write an empty event list for recordings that produce no events
    #[arg(long)]
    pub write_empty: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Haptic pulse length in seconds
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Lowest event strength (0-255)
    #[arg(long, value_name = "STRENGTH")]
    pub min_strength: Option<u8>,

    /// Highest event strength (0-255)
    #[arg(long, value_name = "STRENGTH")]
    pub max_strength: Option<u8>,

    /// Relative loudness below which segments are skipped
    #[arg(long, value_name = "FRACTION")]
    pub rms_threshold: Option<f32>,

    /// Fraction of the strongest band another band needs to fire
    #[arg(long, value_name = "FRACTION")]
    pub band_threshold: Option<f32>,
}

impl Args {
    /// Start from defaults or a validated `--config`, apply scalar overrides, then validate again
    pub fn haptic_config(&self) -> Result<HapticConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => {
                log::info!("Loading configuration from '{}'", path.display());
                HapticConfig::load(path)?
            }
            None => HapticConfig::default(),
        };

        if let Some(duration) = self.duration {
            config.haptic_duration = duration;
        }
        if let Some(min) = self.min_strength {
            config.min_strength = min;
        }
        if let Some(max) = self.max_strength {
            config.max_strength = max;
        }
        if let Some(threshold) = self.rms_threshold {
            config.rms_filter_threshold = threshold;
        }
        if let Some(threshold) = self.band_threshold {
            config.band_energy_threshold_factor = threshold;
        }

        config.validate()?;
        Ok(config)
    }

    /// Worker count, falling back to the machine's available parallelism
    pub fn job_count(&self) -> usize {
        self.jobs
            .filter(|&n| n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }
}
