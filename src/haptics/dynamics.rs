// Channel loudness range
// Min/max short-time RMS of a whole channel, used to normalize segment loudness

use crate::audio::SpectralProvider;
use crate::haptics::config::HapticConfig;

/// Quietest and loudest short-time RMS observed in a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessRange {
    pub min: f32,
    pub max: f32,
}

impl LoudnessRange {
    /// Spread between the loudest and quietest frame
    pub fn spread(&self) -> f32 {
        self.max - self.min
    }

    /// Map a segment RMS onto [0, 1] relative to this range
    /// Values outside the range are not clamped; a degenerate range yields 0.5
    pub fn normalize(&self, rms: f32, epsilon: f32) -> f32 {
        let spread = self.spread();
        if spread > epsilon {
            (rms - self.min) / spread
        } else {
            0.5
        }
    }
}

/// Estimate the loudness range of a channel
///
/// A channel shorter than one frame gets `(0, fallback_rms_max)`. A flat or silent channel
/// whose spread is below `dynamic_range_epsilon` collapses to the same fallback range.
pub fn estimate_loudness_range(
    samples: &[f32],
    provider: &dyn SpectralProvider,
    config: &HapticConfig,
) -> LoudnessRange {
    let frames = provider.rms(samples, config.rms_frame_length, config.rms_hop_length);

    let fallback = LoudnessRange {
        min: 0.0,
        max: config.fallback_rms_max,
    };

    if frames.is_empty() {
        return fallback;
    }

    let min = frames.iter().copied().fold(f32::INFINITY, f32::min);
    let max = frames.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = LoudnessRange { min, max };

    if range.spread() < config.dynamic_range_epsilon {
        fallback
    } else {
        range
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RealFftProvider;

    #[test]
    fn test_silence_collapses_to_fallback() {
        let provider = RealFftProvider::new();
        let config = HapticConfig::default();

        let range = estimate_loudness_range(&vec![0.0; 44100], &provider, &config);
        assert_eq!(range, LoudnessRange { min: 0.0, max: 0.1 });
    }

    #[test]
    fn test_empty_channel_uses_fallback() {
        let provider = RealFftProvider::new();
        let config = HapticConfig::default();

        let range = estimate_loudness_range(&[], &provider, &config);
        assert_eq!(range.min, 0.0);
        assert_eq!(range.max, 0.1);
    }

    #[test]
    fn test_range_tracks_quiet_and_loud_frames() {
        let provider = RealFftProvider::new();
        let config = HapticConfig::default();

        let mut samples = vec![0.0f32; 16384];
        for s in samples[8192..].iter_mut() {
            *s = 0.5;
        }

        let range = estimate_loudness_range(&samples, &provider, &config);
        assert!(range.min.abs() < 1e-6);
        assert!((range.max - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_normalize() {
        let range = LoudnessRange { min: 0.1, max: 0.5 };
        assert!((range.normalize(0.3, 1e-5) - 0.5).abs() < 1e-6);
        assert!((range.normalize(0.1, 1e-5)).abs() < 1e-6);
        // Segment louder than any frame can exceed 1.0
        assert!(range.normalize(0.7, 1e-5) > 1.0);

        let flat = LoudnessRange { min: 0.2, max: 0.2 };
        assert_eq!(flat.normalize(0.9, 1e-5), 0.5);
    }
}
