// Pipeline progress reporting
// Observability hooks injected into the channel pipeline so the analysis stays side-effect free

use serde::Serialize;
use std::sync::Arc;

use crate::haptics::Hand;

/// Identifies the channel a report refers to
#[derive(Debug, Clone, Copy)]
pub struct ChannelContext<'a> {
    /// Recording name (usually the input file name)
    pub recording: &'a str,

    /// Hand the channel is routed to
    pub hand: Hand,

    /// Human-readable channel description (e.g., "left", "mono as right")
    pub label: &'a str,
}

/// Why an onset produced no events
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The analysis window fell entirely outside the channel
    EmptySegment,

    /// Normalized segment loudness below the relative floor
    TooQuiet { normalized_loudness: f32 },

    /// No band carried resolvable spectral energy
    SpectrallySilent { max_energy: f32 },
}

/// Per-channel counters collected while generating events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelReport {
    pub recording: String,
    pub hand: Hand,
    pub label: String,

    /// Onsets detected in the channel
    pub onsets: usize,

    /// Onsets whose segment was empty after clamping
    pub segments_empty: usize,

    /// Segments rejected by the loudness gate
    pub segments_quiet: usize,

    /// Segments rejected by the spectral silence floor
    pub segments_silent: usize,

    /// Events emitted for this channel
    pub events: usize,
}

impl ChannelReport {
    pub fn new(ctx: &ChannelContext<'_>) -> Self {
        ChannelReport {
            recording: ctx.recording.to_string(),
            hand: ctx.hand,
            label: ctx.label.to_string(),
            onsets: 0,
            segments_empty: 0,
            segments_quiet: 0,
            segments_silent: 0,
            events: 0,
        }
    }

    /// Count a skipped onset under its reason
    pub fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::EmptySegment => self.segments_empty += 1,
            SkipReason::TooQuiet { .. } => self.segments_quiet += 1,
            SkipReason::SpectrallySilent { .. } => self.segments_silent += 1,
        }
    }
}

/// Receives progress notifications from the channel pipeline
///
/// Every method defaults to a no-op so implementors only override what they need.
pub trait PipelineReporter: Send + Sync {
    fn channel_started(&self, _ctx: &ChannelContext<'_>) {}

    fn onsets_detected(&self, _ctx: &ChannelContext<'_>, _count: usize) {}

    /// `index` is the onset's position among `total` onsets of the channel
    fn segment_skipped(
        &self,
        _ctx: &ChannelContext<'_>,
        _index: usize,
        _total: usize,
        _onset_time: f64,
        _reason: SkipReason,
    ) {
    }

    fn channel_finished(&self, _ctx: &ChannelContext<'_>, _report: &ChannelReport) {}
}

impl<R: PipelineReporter + ?Sized> PipelineReporter for Arc<R> {
    fn channel_started(&self, ctx: &ChannelContext<'_>) {
        (**self).channel_started(ctx);
    }

    fn onsets_detected(&self, ctx: &ChannelContext<'_>, count: usize) {
        (**self).onsets_detected(ctx, count);
    }

    fn segment_skipped(
        &self,
        ctx: &ChannelContext<'_>,
        index: usize,
        total: usize,
        onset_time: f64,
        reason: SkipReason,
    ) {
        (**self).segment_skipped(ctx, index, total, onset_time, reason);
    }

    fn channel_finished(&self, ctx: &ChannelContext<'_>, report: &ChannelReport) {
        (**self).channel_finished(ctx, report);
    }
}

/// Discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl PipelineReporter for NullReporter {}

/// Forwards notifications to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl PipelineReporter for LogReporter {
    fn channel_started(&self, ctx: &ChannelContext<'_>) {
        log::info!(
            "Processing {} channel for hand_id {} of '{}'",
            ctx.label,
            ctx.hand.id(),
            ctx.recording
        );
    }

    fn onsets_detected(&self, ctx: &ChannelContext<'_>, count: usize) {
        if count == 0 {
            log::info!("No onsets detected in {} channel of '{}'", ctx.label, ctx.recording);
        } else {
            log::info!("Detected {} onsets in {} channel", count, ctx.label);
        }
    }

    fn segment_skipped(
        &self,
        ctx: &ChannelContext<'_>,
        _index: usize,
        _total: usize,
        onset_time: f64,
        reason: SkipReason,
    ) {
        log::debug!(
            "Skipping segment at {:.3}s in {} channel: {:?}",
            onset_time,
            ctx.label,
            reason
        );
    }

    fn channel_finished(&self, ctx: &ChannelContext<'_>, report: &ChannelReport) {
        log::info!(
            "{} channel of '{}': {} events from {} onsets ({} quiet, {} silent, {} empty)",
            ctx.label,
            ctx.recording,
            report.events,
            report.onsets,
            report.segments_quiet,
            report.segments_silent,
            report.segments_empty
        );
    }
}

/// Fans notifications out to several reporters in order
#[derive(Default)]
pub struct CompositeReporter {
    reporters: Vec<Box<dyn PipelineReporter>>,
}

impl CompositeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: impl PipelineReporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl PipelineReporter for CompositeReporter {
    fn channel_started(&self, ctx: &ChannelContext<'_>) {
        for reporter in &self.reporters {
            reporter.channel_started(ctx);
        }
    }

    fn onsets_detected(&self, ctx: &ChannelContext<'_>, count: usize) {
        for reporter in &self.reporters {
            reporter.onsets_detected(ctx, count);
        }
    }

    fn segment_skipped(
        &self,
        ctx: &ChannelContext<'_>,
        index: usize,
        total: usize,
        onset_time: f64,
        reason: SkipReason,
    ) {
        for reporter in &self.reporters {
            reporter.segment_skipped(ctx, index, total, onset_time, reason);
        }
    }

    fn channel_finished(&self, ctx: &ChannelContext<'_>, report: &ChannelReport) {
        for reporter in &self.reporters {
            reporter.channel_finished(ctx, report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingReporter {
        started: Arc<AtomicUsize>,
    }

    impl PipelineReporter for CountingReporter {
        fn channel_started(&self, _ctx: &ChannelContext<'_>) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ctx() -> ChannelContext<'static> {
        ChannelContext {
            recording: "song.wav",
            hand: Hand::Left,
            label: "left",
        }
    }

    #[test]
    fn test_record_skip_counters() {
        let mut report = ChannelReport::new(&ctx());
        report.record_skip(SkipReason::EmptySegment);
        report.record_skip(SkipReason::TooQuiet {
            normalized_loudness: 0.01,
        });
        report.record_skip(SkipReason::TooQuiet {
            normalized_loudness: 0.02,
        });
        report.record_skip(SkipReason::SpectrallySilent { max_energy: 0.0 });

        assert_eq!(report.segments_empty, 1);
        assert_eq!(report.segments_quiet, 2);
        assert_eq!(report.segments_silent, 1);
        assert_eq!(report.recording, "song.wav");
    }

    #[test]
    fn test_composite_reporter_fans_out() {
        let counter = Arc::new(AtomicUsize::new(0));
        let composite = CompositeReporter::new()
            .with(CountingReporter {
                started: counter.clone(),
            })
            .with(CountingReporter {
                started: counter.clone(),
            })
            .with(NullReporter);

        composite.channel_started(&ctx());
        assert_eq!(composite.len(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shared_reporter_forwards() {
        let counter = Arc::new(AtomicUsize::new(0));
        let shared = Arc::new(CountingReporter {
            started: counter.clone(),
        });
        let composite = CompositeReporter::new().with(shared.clone()).with(shared);

        composite.channel_started(&ctx());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_skip_reason_serialization() {
        let json = serde_json::to_value(SkipReason::TooQuiet {
            normalized_loudness: 0.5,
        })
        .unwrap();

        assert_eq!(json["reason"], "too_quiet");
        assert_eq!(json["normalized_loudness"], 0.5);
    }
}
