// Pipeline progress tracing
// Append-only JSONL trace file recording per-channel and per-recording progress

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

use crate::pipeline::report::{ChannelContext, ChannelReport, PipelineReporter, SkipReason};

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// A single trace entry in the pipeline execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// ISO 8601 timestamp of when this entry was created
    pub timestamp: String,

    /// Pipeline stage name (e.g., "onset_detection", "segment", "recording")
    pub stage: String,

    /// Progress percentage [0.0, 1.0]
    pub progress: f32,

    /// Human-readable message describing current operation
    pub message: String,

    /// Optional structured data (e.g., onset counts, skip reasons)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Create a new trace entry with current timestamp
    pub fn new(stage: String, progress: f32, message: String) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            progress: progress.clamp(0.0, 1.0),
            message,
            data: None,
        }
    }

    /// Create a trace entry with structured data
    pub fn with_data(
        stage: String,
        progress: f32,
        message: String,
        data: serde_json::Value,
    ) -> Self {
        TraceEntry {
            data: Some(data),
            ..TraceEntry::new(stage, progress, message)
        }
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Pipeline trace writer
/// Manages an append-only JSONL trace file shared by concurrent recordings
pub struct TraceWriter {
    file_path: PathBuf,
    lock: Mutex<()>,
}

impl TraceWriter {
    /// Create a new trace writer for a specific file
    pub fn new(file_path: PathBuf) -> Self {
        TraceWriter {
            file_path,
            lock: Mutex::new(()),
        }
    }

    /// Append a trace entry to the file
    /// Creates file if it doesn't exist
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.write_batch(std::slice::from_ref(entry))
    }

    /// Write multiple entries at once
    pub fn write_batch(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut buffer = String::new();
        for entry in entries {
            buffer.push_str(&entry.to_json_line()?);
        }

        // A poisoned lock only means another writer panicked mid-append
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.write_all(buffer.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Write an entry, logging instead of failing
    /// Tracing must never abort the pipeline
    pub fn write_or_warn(&self, entry: &TraceEntry) {
        if let Err(e) = self.write(entry) {
            log::warn!(
                "Failed to write trace entry to '{}': {}",
                self.file_path.display(),
                e
            );
        }
    }
}

impl PipelineReporter for TraceWriter {
    fn channel_started(&self, ctx: &ChannelContext<'_>) {
        let data = serde_json::json!({
            "recording": ctx.recording,
            "hand_id": ctx.hand.id(),
            "channel": ctx.label,
        });
        let entry = TraceBuilder::stage("onset_detection").with_data(
            0.0,
            format!("Processing {} channel of '{}'", ctx.label, ctx.recording),
            data,
        );
        self.write_or_warn(&entry);
    }

    fn onsets_detected(&self, ctx: &ChannelContext<'_>, count: usize) {
        let data = serde_json::json!({
            "recording": ctx.recording,
            "hand_id": ctx.hand.id(),
            "onsets_detected": count,
        });
        let entry = TraceBuilder::stage("onset_detection").with_data(
            0.3,
            format!("Detected {} onsets", count),
            data,
        );
        self.write_or_warn(&entry);
    }

    fn segment_skipped(
        &self,
        ctx: &ChannelContext<'_>,
        index: usize,
        total: usize,
        onset_time: f64,
        reason: SkipReason,
    ) {
        let progress = 0.3 + 0.6 * (index as f32 / total.max(1) as f32);
        let data = serde_json::json!({
            "recording": ctx.recording,
            "hand_id": ctx.hand.id(),
            "onset_time": onset_time,
            "skip": reason,
        });
        let entry = TraceBuilder::stage("segment").with_data(
            progress,
            format!("Skipped segment at {:.3}s", onset_time),
            data,
        );
        self.write_or_warn(&entry);
    }

    fn channel_finished(&self, ctx: &ChannelContext<'_>, report: &ChannelReport) {
        let data = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
        let entry = TraceBuilder::stage("event_synthesis").with_data(
            1.0,
            format!("Generated {} events for {} channel", report.events, ctx.label),
            data,
        );
        self.write_or_warn(&entry);
    }
}

/// Helper builder for creating trace entries
pub struct TraceBuilder {
    stage: String,
}

impl TraceBuilder {
    /// Start building a trace entry for a stage
    pub fn stage(stage: impl Into<String>) -> Self {
        TraceBuilder {
            stage: stage.into(),
        }
    }

    /// Create a start entry (progress = 0.0)
    pub fn start(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, 0.0, message.into())
    }

    /// Create an entry with data
    pub fn with_data(
        self,
        progress: f32,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> TraceEntry {
        TraceEntry::with_data(self.stage, progress, message.into(), data)
    }
}

/// Read trace entries from a JSONL file
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let entry: TraceEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haptics::Hand;
    use tempfile::TempDir;

    fn ctx() -> ChannelContext<'static> {
        ChannelContext {
            recording: "drums.wav",
            hand: Hand::Right,
            label: "right",
        }
    }

    #[test]
    fn test_trace_entry_with_data() {
        let data = serde_json::json!({
            "count": 42,
            "duration_ms": 123.45
        });

        let entry = TraceEntry::with_data(
            "detection".to_string(),
            0.8,
            "Detected onsets".to_string(),
            data,
        );

        assert!(entry.data.is_some());
        assert_eq!(entry.data.unwrap()["count"], 42);
    }

    #[test]
    fn test_progress_clamping() {
        let entry1 = TraceEntry::new("test".to_string(), -0.5, "test".to_string());
        assert_eq!(entry1.progress, 0.0);

        let entry2 = TraceEntry::new("test".to_string(), 1.5, "test".to_string());
        assert_eq!(entry2.progress, 1.0);
    }

    #[test]
    fn test_trace_builder_start() {
        let start = TraceBuilder::stage("batch").start("Converting 3 recordings");
        assert_eq!(start.progress, 0.0);
        assert_eq!(start.stage, "batch");
        assert!(start.data.is_none());
    }

    #[test]
    fn test_trace_writer_batch() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");

        let writer = TraceWriter::new(trace_path.clone());

        let entries = vec![
            TraceEntry::new("stage1".to_string(), 0.0, "Start".to_string()),
            TraceEntry::new("stage1".to_string(), 0.5, "Progress".to_string()),
            TraceEntry::new("stage1".to_string(), 1.0, "Done".to_string()),
        ];

        writer.write_batch(&entries).unwrap();
        writer.write(&entries[0]).unwrap();

        let read_entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(read_entries.len(), 4);
        assert_eq!(read_entries[1].progress, 0.5);
    }

    #[test]
    fn test_trace_writer_as_reporter() {
        let temp_dir = TempDir::new().unwrap();
        let trace_path = temp_dir.path().join("trace.jsonl");
        let writer = TraceWriter::new(trace_path.clone());

        let ctx = ctx();
        writer.channel_started(&ctx);
        writer.onsets_detected(&ctx, 12);
        writer.segment_skipped(
            &ctx,
            3,
            12,
            0.75,
            SkipReason::TooQuiet {
                normalized_loudness: 0.01,
            },
        );
        let mut report = ChannelReport::new(&ctx);
        report.onsets = 12;
        report.events = 7;
        writer.channel_finished(&ctx, &report);

        let entries = read_trace_file(&trace_path).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].stage, "onset_detection");
        assert_eq!(entries[1].data.as_ref().unwrap()["onsets_detected"], 12);
        assert_eq!(entries[2].stage, "segment");
        assert_eq!(entries[2].data.as_ref().unwrap()["skip"]["reason"], "too_quiet");
        assert!((entries[2].progress - 0.45).abs() < 1e-6);
        assert_eq!(entries[3].progress, 1.0);
        assert_eq!(entries[3].data.as_ref().unwrap()["events"], 7);
    }

    #[test]
    fn test_unwritable_trace_does_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        // Parent directory doesn't exist
        let writer = TraceWriter::new(temp_dir.path().join("missing").join("trace.jsonl"));

        writer.onsets_detected(&ctx(), 1);
        assert!(writer.write(&TraceBuilder::stage("x").start("y")).is_err());
    }

    #[test]
    fn test_json_line_format() {
        let entry = TraceEntry::new("test".to_string(), 0.5, "Testing".to_string());
        let json_line = entry.to_json_line().unwrap();

        assert!(json_line.ends_with('\n'));

        let parsed: TraceEntry = serde_json::from_str(json_line.trim()).unwrap();
        assert_eq!(parsed.stage, "test");
    }
}
