// Per-channel haptic pipeline
// Onsets -> loudness gate -> band energies -> events, for one hand-assigned channel

use crate::audio::{rms_of, SpectralProvider};
use crate::haptics::{
    analyze_band_energies, estimate_loudness_range, passes_loudness_gate, segment_for_onset,
    synthesize_events, HapticConfig, HapticEvent,
};
use crate::pipeline::report::{ChannelContext, ChannelReport, PipelineReporter, SkipReason};

/// One channel of decoded samples
#[derive(Debug, Clone, Copy)]
pub struct Channel<'a> {
    pub samples: &'a [f32],

    /// Sample rate in Hz
    pub sample_rate: u32,
}

/// Events produced for a channel along with its counters
#[derive(Debug, Clone)]
pub struct ChannelOutput {
    pub events: Vec<HapticEvent>,
    pub report: ChannelReport,
}

/// Run the full pipeline over one channel
///
/// Loudness range and onsets are computed fresh for this channel; nothing is shared
/// with other channels. Events come out in onset order.
pub fn process_channel(
    channel: Channel<'_>,
    ctx: &ChannelContext<'_>,
    provider: &dyn SpectralProvider,
    config: &HapticConfig,
    reporter: &dyn PipelineReporter,
) -> ChannelOutput {
    reporter.channel_started(ctx);

    let mut report = ChannelReport::new(ctx);
    let mut events = Vec::new();

    let onset_times = provider.detect_onsets(
        channel.samples,
        channel.sample_rate,
        config.onset_hop_length,
        config.onset_wait_frames(channel.sample_rate),
    );
    report.onsets = onset_times.len();
    reporter.onsets_detected(ctx, onset_times.len());

    if onset_times.is_empty() {
        reporter.channel_finished(ctx, &report);
        return ChannelOutput { events, report };
    }

    let loudness_range = estimate_loudness_range(channel.samples, provider, config);
    let total = onset_times.len();

    for (index, &onset_time) in onset_times.iter().enumerate() {
        let skip = |report: &mut ChannelReport, reason: SkipReason| {
            report.record_skip(reason);
            reporter.segment_skipped(ctx, index, total, onset_time, reason);
        };

        let Some(segment) = segment_for_onset(
            onset_time,
            channel.samples.len(),
            channel.sample_rate,
            provider,
            config,
        ) else {
            skip(&mut report, SkipReason::EmptySegment);
            continue;
        };

        let samples = segment.slice(channel.samples);
        let normalized_loudness =
            loudness_range.normalize(rms_of(samples), config.dynamic_range_epsilon);

        // Quiet segments are dropped before any spectral work
        if !passes_loudness_gate(normalized_loudness, config) {
            skip(&mut report, SkipReason::TooQuiet { normalized_loudness });
            continue;
        }

        let energies = analyze_band_energies(samples, channel.sample_rate, provider, config);
        if energies.is_spectrally_silent(config.spectral_silence_floor) {
            skip(
                &mut report,
                SkipReason::SpectrallySilent {
                    max_energy: energies.max_energy,
                },
            );
            continue;
        }

        let segment_events =
            synthesize_events(onset_time, ctx.hand, normalized_loudness, &energies, config);
        events.extend(segment_events);
    }

    report.events = events.len();
    reporter.channel_finished(ctx, &report);

    ChannelOutput { events, report }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::{RealFftProvider, Spectrogram};
    use crate::haptics::Hand;
    use crate::pipeline::report::NullReporter;

    /// Deterministic provider: fixed onsets, a flat spectrum per band, real RMS framing
    pub(crate) struct FakeProvider {
        pub onsets: Vec<f64>,
        /// Magnitude assigned to every bin of band i (default band layout)
        pub band_levels: [f32; 5],
    }

    impl SpectralProvider for FakeProvider {
        fn detect_onsets(&self, samples: &[f32], _: u32, _: usize, _: usize) -> Vec<f64> {
            if samples.iter().all(|&s| s == 0.0) {
                return Vec::new();
            }
            self.onsets.clone()
        }

        fn stft_magnitude(&self, _samples: &[f32], n_fft: usize, _hop: usize) -> Spectrogram {
            // Assumes 44.1 kHz with n_fft = 2048 (21.5 Hz bins)
            let bin_width = 44100.0 / n_fft as f32;
            let n_bins = n_fft / 2 + 1;
            let frame: Vec<f32> = (0..n_bins)
                .map(|k| {
                    let f = k as f32 * bin_width;
                    match f {
                        f if (20.0..=100.0).contains(&f) => self.band_levels[0],
                        f if (101.0..=400.0).contains(&f) => self.band_levels[1],
                        f if (401.0..=1500.0).contains(&f) => self.band_levels[2],
                        f if (1501.0..=4000.0).contains(&f) => self.band_levels[3],
                        f if (4001.0..=12000.0).contains(&f) => self.band_levels[4],
                        _ => 0.0,
                    }
                })
                .collect();
            Spectrogram {
                n_bins,
                frames: vec![frame; 3],
            }
        }

        fn rms(&self, samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
            RealFftProvider::new().rms(samples, frame_length, hop_length)
        }
    }

    /// One second at 44.1 kHz: quiet floor with loud bursts at 0.25 s and 0.75 s
    pub(crate) fn bursty_channel() -> Vec<f32> {
        let mut samples = vec![0.001f32; 44100];
        for start in [11025usize, 33075] {
            for (j, s) in samples[start..start + 4410].iter_mut().enumerate() {
                *s = if j % 2 == 0 { 0.8 } else { -0.8 };
            }
        }
        samples
    }

    fn ctx(hand: Hand) -> ChannelContext<'static> {
        ChannelContext {
            recording: "test.wav",
            hand,
            label: "test",
        }
    }

    #[test]
    fn test_no_onsets_yields_no_events() {
        let provider = FakeProvider {
            onsets: vec![0.25],
            band_levels: [1.0, 0.1, 0.05, 0.02, 0.01],
        };
        let config = HapticConfig::default();
        let silence = vec![0.0f32; 44100];

        let output = process_channel(
            Channel {
                samples: &silence,
                sample_rate: 44100,
            },
            &ctx(Hand::Left),
            &provider,
            &config,
            &NullReporter,
        );

        assert!(output.events.is_empty());
        assert_eq!(output.report.onsets, 0);
    }

    #[test]
    fn test_dominant_band_events() {
        let provider = FakeProvider {
            onsets: vec![0.25, 0.75],
            band_levels: [1.0, 0.1, 0.05, 0.02, 0.01],
        };
        let config = HapticConfig::default();
        let samples = bursty_channel();

        let output = process_channel(
            Channel {
                samples: &samples,
                sample_rate: 44100,
            },
            &ctx(Hand::Right),
            &provider,
            &config,
            &NullReporter,
        );

        assert_eq!(output.events.len(), 2);
        for event in &output.events {
            assert_eq!(event.finger_id, 0);
            assert_eq!(event.hand_id, 1);
            assert!(event.strength >= config.min_strength);
        }
        assert_eq!(output.events[0].timestamp, 0.25);
        assert_eq!(output.events[1].timestamp, 0.75);
        assert_eq!(output.report.events, 2);
    }

    #[test]
    fn test_quiet_segment_is_skipped() {
        // Onset at 0.5 s lands in the 0.001 floor between the bursts
        let provider = FakeProvider {
            onsets: vec![0.25, 0.5],
            band_levels: [1.0, 1.0, 1.0, 1.0, 1.0],
        };
        let config = HapticConfig::default();
        let samples = bursty_channel();

        let output = process_channel(
            Channel {
                samples: &samples,
                sample_rate: 44100,
            },
            &ctx(Hand::Left),
            &provider,
            &config,
            &NullReporter,
        );

        assert_eq!(output.report.segments_quiet, 1);
        assert!(output.events.iter().all(|e| e.timestamp == 0.25));
        assert_eq!(output.events.len(), 5);
    }

    #[test]
    fn test_spectrally_silent_segment_is_skipped() {
        let provider = FakeProvider {
            onsets: vec![0.25],
            band_levels: [1e-8, 0.0, 0.0, 0.0, 0.0],
        };
        let config = HapticConfig::default();
        let samples = bursty_channel();

        let output = process_channel(
            Channel {
                samples: &samples,
                sample_rate: 44100,
            },
            &ctx(Hand::Left),
            &provider,
            &config,
            &NullReporter,
        );

        assert!(output.events.is_empty());
        assert_eq!(output.report.segments_silent, 1);
    }

    #[test]
    fn test_onset_beyond_channel_counts_as_empty() {
        let provider = FakeProvider {
            onsets: vec![5.0],
            band_levels: [1.0, 0.0, 0.0, 0.0, 0.0],
        };
        let config = HapticConfig::default();
        let samples = bursty_channel();

        let output = process_channel(
            Channel {
                samples: &samples,
                sample_rate: 44100,
            },
            &ctx(Hand::Left),
            &provider,
            &config,
            &NullReporter,
        );

        assert!(output.events.is_empty());
        assert_eq!(output.report.segments_empty, 1);
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let provider = RealFftProvider::new();
        let config = HapticConfig::default();
        let samples = bursty_channel();
        let channel = Channel {
            samples: &samples,
            sample_rate: 44100,
        };

        let first = process_channel(channel, &ctx(Hand::Left), &provider, &config, &NullReporter);
        let second = process_channel(channel, &ctx(Hand::Left), &provider, &config, &NullReporter);

        assert_eq!(first.events, second.events);
        assert_eq!(first.report, second.report);
    }
}
