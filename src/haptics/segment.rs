// Onset segmentation
// Turns onset times into bounded sample windows covering the attack of each transient

use crate::audio::SpectralProvider;
use crate::haptics::config::HapticConfig;

/// Sample range `[start, end)` analysed for one onset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisSegment {
    /// Onset time in seconds this segment was cut around
    pub onset_time: f64,

    /// First sample index, inclusive
    pub start: usize,

    /// Last sample index, exclusive
    pub end: usize,
}

impl AnalysisSegment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Borrow this segment's samples from its channel
    pub fn slice<'a>(&self, samples: &'a [f32]) -> &'a [f32] {
        &samples[self.start..self.end]
    }
}

/// Cut the analysis window for a single onset
///
/// The window spans `segment_pre_onset` seconds before the onset to
/// `haptic_duration * segment_post_onset_factor` seconds after it, clamped to the channel.
/// Returns `None` when nothing of the window lies inside the channel.
pub fn segment_for_onset(
    onset_time: f64,
    channel_len: usize,
    sample_rate: u32,
    provider: &dyn SpectralProvider,
    config: &HapticConfig,
) -> Option<AnalysisSegment> {
    let start_time = onset_time - config.segment_pre_onset;
    let end_time = onset_time + config.segment_post_onset();

    let start = provider.time_to_samples(start_time, sample_rate).max(0);
    let end = provider
        .time_to_samples(end_time, sample_rate)
        .min(channel_len as i64);

    if start >= end {
        return None;
    }

    Some(AnalysisSegment {
        onset_time,
        start: start as usize,
        end: end as usize,
    })
}

/// Segment every onset of a channel, dropping empty windows
pub fn segment_onsets(
    onset_times: &[f64],
    channel_len: usize,
    sample_rate: u32,
    provider: &dyn SpectralProvider,
    config: &HapticConfig,
) -> Vec<AnalysisSegment> {
    onset_times
        .iter()
        .filter_map(|&t| segment_for_onset(t, channel_len, sample_rate, provider, config))
        .collect()
}
