// Pipeline execution and monitoring module
// Runs the haptic analysis over the channels of a recording and reports progress

pub mod channel;
pub mod orchestrator;
pub mod report;
pub mod trace;

pub use channel::{process_channel, Channel, ChannelOutput};
pub use orchestrator::{
    finalize_events, generate_events, ChannelLayout, EmptyReason, RecordingEvents,
};
pub use report::{
    ChannelContext, ChannelReport, CompositeReporter, LogReporter, NullReporter, PipelineReporter,
    SkipReason,
};
pub use trace::{read_trace_file, TraceBuilder, TraceEntry, TraceError, TraceWriter};
