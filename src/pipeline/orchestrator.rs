// Channel orchestration
// Routes decoded channels to hands, runs the channel pipeline and merges the results

use serde::Serialize;

use crate::audio::{AudioData, SpectralProvider};
use crate::haptics::{Hand, HapticConfig, HapticEvent};
use crate::pipeline::channel::{process_channel, Channel};
use crate::pipeline::report::{ChannelContext, ChannelReport, PipelineReporter};

/// How the native channels of a recording map onto the two hands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChannelLayout {
    /// One channel, analysed once per hand
    Mono,

    /// Left channel -> hand 0, right channel -> hand 1
    Stereo,

    /// More than two channels, averaged to mono first
    Downmixed { channels: u16 },
}

impl ChannelLayout {
    pub fn of(audio: &AudioData) -> Self {
        match audio.channels {
            1 => ChannelLayout::Mono,
            2 => ChannelLayout::Stereo,
            n => ChannelLayout::Downmixed { channels: n },
        }
    }

    /// Channel description used in reports
    fn label(&self, hand: Hand) -> &'static str {
        match (self, hand) {
            (ChannelLayout::Stereo, Hand::Left) => "left",
            (ChannelLayout::Stereo, Hand::Right) => "right",
            (ChannelLayout::Mono, Hand::Left) => "mono (as left)",
            (ChannelLayout::Mono, Hand::Right) => "mono (as right)",
            (ChannelLayout::Downmixed { .. }, Hand::Left) => "downmix (as left)",
            (ChannelLayout::Downmixed { .. }, Hand::Right) => "downmix (as right)",
        }
    }
}

/// Why a successfully decoded recording produced no events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// No channel had a detectable transient
    NoOnsets,

    /// Onsets were found but every segment failed the loudness or spectral floor
    AllSegmentsFiltered,
}

/// Everything generated for one recording
#[derive(Debug, Clone)]
pub struct RecordingEvents {
    /// Events of both hands, sorted by timestamp
    pub events: Vec<HapticEvent>,

    /// One report per analysed channel, hand 0 first
    pub channels: Vec<ChannelReport>,

    pub layout: ChannelLayout,
}

impl RecordingEvents {
    pub fn total_onsets(&self) -> usize {
        self.channels.iter().map(|c| c.onsets).sum()
    }

    /// `None` when events were generated
    pub fn empty_reason(&self) -> Option<EmptyReason> {
        if !self.events.is_empty() {
            None
        } else if self.total_onsets() == 0 {
            Some(EmptyReason::NoOnsets)
        } else {
            Some(EmptyReason::AllSegmentsFiltered)
        }
    }
}

/// Generate the haptic events of a decoded recording
///
/// Stereo channels feed one hand each. A mono source is analysed independently for both
/// hands so neither glove stays silent.
pub fn generate_events(
    audio: &AudioData,
    recording: &str,
    provider: &dyn SpectralProvider,
    config: &HapticConfig,
    reporter: &dyn PipelineReporter,
) -> RecordingEvents {
    let layout = ChannelLayout::of(audio);

    let buffers: Vec<Vec<f32>> = match layout {
        ChannelLayout::Stereo => vec![audio.channel(0), audio.channel(1)],
        ChannelLayout::Mono => vec![audio.channel(0)],
        ChannelLayout::Downmixed { channels } => {
            log::warn!(
                "'{}' has {} channels; downmixing to mono for both hands",
                recording,
                channels
            );
            vec![audio.to_mono()]
        }
    };

    let assignments = match layout {
        ChannelLayout::Stereo => [(Hand::Left, 0), (Hand::Right, 1)],
        _ => [(Hand::Left, 0), (Hand::Right, 0)],
    };

    let mut events = Vec::new();
    let mut channels = Vec::with_capacity(assignments.len());

    for (hand, buffer_idx) in assignments {
        let ctx = ChannelContext {
            recording,
            hand,
            label: layout.label(hand),
        };
        let channel = Channel {
            samples: &buffers[buffer_idx],
            sample_rate: audio.sample_rate,
        };

        let output = process_channel(channel, &ctx, provider, config, reporter);
        events.extend(output.events);
        channels.push(output.report);
    }

    RecordingEvents {
        events: finalize_events(events),
        channels,
        layout,
    }
}

/// Sort merged events by ascending timestamp
/// The sort is stable, so equal timestamps keep their hand/band order
pub fn finalize_events(mut events: Vec<HapticEvent>) -> Vec<HapticEvent> {
    events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    events
}
