// Haptic pipeline configuration
// Immutable settings shared by the segmenter, band analyzer and event synthesizer

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::haptics::types::FrequencyBand;

/// Highest finger id a glove exposes (thumb = 0 .. pinky = 4)
pub const MAX_FINGER_ID: u8 = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for onset-driven haptic event synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HapticConfig {
    /// Frequency bands, ordered by increasing frequency, one per finger
    pub bands: Vec<FrequencyBand>,

    /// Length of every emitted haptic pulse in seconds
    pub haptic_duration: f64,

    /// Lowest strength any emitted event may carry
    pub min_strength: u8,

    /// Highest strength any emitted event may carry
    pub max_strength: u8,

    /// Segments whose normalized RMS falls below this fraction of full scale are skipped
    pub rms_filter_threshold: f32,

    /// A band fires when its energy reaches this fraction of the segment's strongest band
    pub band_energy_threshold_factor: f32,

    /// Absolute energy a band must exceed to fire
    pub band_energy_floor: f32,

    /// Segments whose strongest band is below this are treated as spectrally silent
    pub spectral_silence_floor: f32,

    /// FFT window size for band analysis
    pub n_fft: usize,

    /// Hop length for band analysis
    pub fft_hop_length: usize,

    /// Hop length for onset detection
    pub onset_hop_length: usize,

    /// Minimum time between consecutive onsets in seconds
    pub onset_wait_time: f64,

    /// How much audio before the onset to include in the analysis segment (seconds)
    pub segment_pre_onset: f64,

    /// Multiplier for `haptic_duration` giving the segment length after the onset
    pub segment_post_onset_factor: f64,

    /// Frame length for whole-channel RMS framing
    pub rms_frame_length: usize,

    /// Hop length for whole-channel RMS framing
    pub rms_hop_length: usize,

    /// Loudness spreads below this are considered degenerate
    pub dynamic_range_epsilon: f32,

    /// Upper bound of the fallback loudness range used for degenerate channels
    pub fallback_rms_max: f32,
}

impl Default for HapticConfig {
    fn default() -> Self {
        HapticConfig {
            bands: default_bands(),
            haptic_duration: 0.15,
            min_strength: 50,
            max_strength: 255,
            rms_filter_threshold: 0.05,
            band_energy_threshold_factor: 0.20,
            band_energy_floor: 1e-5,
            spectral_silence_floor: 1e-6,
            n_fft: 2048,
            fft_hop_length: 512,
            onset_hop_length: 512,
            onset_wait_time: 0.03,
            segment_pre_onset: 0.05,
            segment_post_onset_factor: 1.0,
            rms_frame_length: 2048,
            rms_hop_length: 512,
            dynamic_range_epsilon: 1e-5,
            fallback_rms_max: 0.1,
        }
    }
}

/// Five-band layout: thumb takes the sub-bass, pinky the highs
pub fn default_bands() -> Vec<FrequencyBand> {
    vec![
        FrequencyBand::new("sub_bass", 20.0, 100.0, 0),
        FrequencyBand::new("low_mid", 101.0, 400.0, 1),
        FrequencyBand::new("mid", 401.0, 1500.0, 2),
        FrequencyBand::new("upper_mid", 1501.0, 4000.0, 3),
        FrequencyBand::new("high", 4001.0, 12000.0, 4),
    ]
}

impl HapticConfig {
    /// Load a (possibly partial) configuration from a JSON file and validate it
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read(path)?;
        let config = Self::from_json_bytes(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Deserialize from JSON bytes; missing fields take their defaults
    pub fn from_json_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Serialize to pretty JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Minimum onset spacing expressed in onset hops for a given sample rate
    pub fn onset_wait_frames(&self, sample_rate: u32) -> usize {
        if self.onset_hop_length == 0 {
            return 0;
        }
        (self.onset_wait_time * sample_rate as f64 / self.onset_hop_length as f64) as usize
    }

    /// Seconds of audio analysed after each onset
    pub fn segment_post_onset(&self) -> f64 {
        self.haptic_duration * self.segment_post_onset_factor
    }

    /// Check band layout, strength range and frame sizes
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bands.is_empty() {
            return Err(ConfigError::Invalid("at least one frequency band is required".into()));
        }

        let mut seen_fingers = Vec::with_capacity(self.bands.len());
        for (i, band) in self.bands.iter().enumerate() {
            if !(band.min_hz >= 0.0 && band.min_hz <= band.max_hz) {
                return Err(ConfigError::Invalid(format!(
                    "band '{}' has invalid range {}-{} Hz",
                    band.name, band.min_hz, band.max_hz
                )));
            }
            if band.finger_id > MAX_FINGER_ID {
                return Err(ConfigError::Invalid(format!(
                    "band '{}' targets finger {}, max is {}",
                    band.name, band.finger_id, MAX_FINGER_ID
                )));
            }
            if seen_fingers.contains(&band.finger_id) {
                return Err(ConfigError::Invalid(format!(
                    "finger {} is assigned to more than one band",
                    band.finger_id
                )));
            }
            seen_fingers.push(band.finger_id);

            if i > 0 {
                let prev = &self.bands[i - 1];
                if band.min_hz <= prev.max_hz {
                    return Err(ConfigError::Invalid(format!(
                        "band '{}' overlaps or precedes band '{}'",
                        band.name, prev.name
                    )));
                }
            }
        }

        if self.min_strength > self.max_strength {
            return Err(ConfigError::Invalid(format!(
                "min_strength {} exceeds max_strength {}",
                self.min_strength, self.max_strength
            )));
        }

        if self.n_fft == 0
            || self.fft_hop_length == 0
            || self.onset_hop_length == 0
            || self.rms_frame_length == 0
            || self.rms_hop_length == 0
        {
            return Err(ConfigError::Invalid("FFT, hop and frame sizes must be positive".into()));
        }

        if !(0.0..=1.0).contains(&self.band_energy_threshold_factor) {
            return Err(ConfigError::Invalid(format!(
                "band_energy_threshold_factor {} must be within [0, 1]",
                self.band_energy_threshold_factor
            )));
        }

        if !(0.0..=1.0).contains(&self.rms_filter_threshold) {
            return Err(ConfigError::Invalid(format!(
                "rms_filter_threshold {} must be within [0, 1]",
                self.rms_filter_threshold
            )));
        }

        let durations = [
            ("haptic_duration", self.haptic_duration),
            ("segment_pre_onset", self.segment_pre_onset),
            ("segment_post_onset_factor", self.segment_post_onset_factor),
            ("onset_wait_time", self.onset_wait_time),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be finite and not negative, got {}",
                    name, value
                )));
            }
        }
        if self.haptic_duration == 0.0 {
            return Err(ConfigError::Invalid("haptic_duration must be positive".into()));
        }

        let floors = [
            ("band_energy_floor", self.band_energy_floor),
            ("spectral_silence_floor", self.spectral_silence_floor),
            ("dynamic_range_epsilon", self.dynamic_range_epsilon),
        ];
        for (name, value) in floors {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be finite and not negative, got {}",
                    name, value
                )));
            }
        }

        if !(self.fallback_rms_max.is_finite() && self.fallback_rms_max > 0.0) {
            return Err(ConfigError::Invalid("fallback_rms_max must be positive".into()));
        }

        Ok(())
    }
}
