// Batch conversion
// Scans an input directory, converts every recording to haptic events and writes one JSON file each

use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::audio::{ingest_file, is_supported, AudioError, SpectralProvider};
use crate::haptics::{HapticConfig, HapticEvent};
use crate::pipeline::{generate_events, EmptyReason, PipelineReporter, TraceBuilder, TraceWriter};

/// Name of the output directory created next to the input directory
pub const OUTPUT_DIR_NAME: &str = "haptic_outputs";

/// Suffix appended to the input file stem
pub const OUTPUT_SUFFIX: &str = "_haptics.json";

/// Errors that stop a batch before any recording is processed
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Input path not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Input file has an unsupported extension: {0}")]
    UnsupportedInput(PathBuf),

    #[error("Failed to read input directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors persisting the events of one recording
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What happened to a single recording
#[derive(Debug)]
pub enum RecordingOutcome {
    /// Events were generated and written
    Written { path: PathBuf, events: usize },

    /// Decoded fine but produced no events; `path` is set when an empty file was written anyway
    Empty {
        reason: EmptyReason,
        path: Option<PathBuf>,
    },

    DecodeFailed { error: AudioError },

    WriteFailed { path: PathBuf, error: OutputError },

    /// The analysis task panicked
    Aborted { message: String },
}

impl RecordingOutcome {
    /// Short machine-readable outcome name
    pub fn kind(&self) -> &'static str {
        match self {
            RecordingOutcome::Written { .. } => "written",
            RecordingOutcome::Empty { .. } => "empty",
            RecordingOutcome::DecodeFailed { .. } => "decode_failed",
            RecordingOutcome::WriteFailed { .. } => "write_failed",
            RecordingOutcome::Aborted { .. } => "aborted",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RecordingOutcome::DecodeFailed { .. }
                | RecordingOutcome::WriteFailed { .. }
                | RecordingOutcome::Aborted { .. }
        )
    }
}

/// A processed input and its outcome
#[derive(Debug)]
pub struct RecordingResult {
    pub input: PathBuf,
    pub outcome: RecordingOutcome,
}

/// Counts reported at the end of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Supported files found in the input
    pub found: usize,

    /// Recordings whose events were written
    pub written: usize,

    /// Recordings that decoded but produced no events
    pub empty: usize,

    /// Recordings that failed to decode or write
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[RecordingResult]) -> Self {
        let mut summary = BatchSummary {
            found: results.len(),
            ..Default::default()
        };

        for result in results {
            match result.outcome {
                RecordingOutcome::Written { .. } => summary.written += 1,
                RecordingOutcome::Empty { .. } => summary.empty += 1,
                _ => summary.failed += 1,
            }
        }

        summary
    }

    /// Recordings that went through the pipeline without error
    pub fn processed(&self) -> usize {
        self.written + self.empty
    }
}

/// List the recordings to convert
///
/// A directory is scanned non-recursively for supported extensions and sorted by path.
/// A single file is accepted as-is when its extension is supported.
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>, BatchError> {
    if input.is_dir() {
        let read_dir_err = |source| BatchError::ReadDir {
            path: input.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(input).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            if path.is_file() && is_supported(&path) {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    } else if input.is_file() {
        if is_supported(input) {
            Ok(vec![input.to_path_buf()])
        } else {
            Err(BatchError::UnsupportedInput(input.to_path_buf()))
        }
    } else {
        Err(BatchError::InputNotFound(input.to_path_buf()))
    }
}

/// `haptic_outputs` next to the input directory (or next to a single file's directory)
pub fn default_output_dir(input: &Path) -> PathBuf {
    let input = fs::canonicalize(input).unwrap_or_else(|_| input.to_path_buf());
    let input_dir = if input.is_file() {
        input.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        input
    };

    match input_dir.parent() {
        Some(parent) => parent.join(OUTPUT_DIR_NAME),
        None => input_dir.join(OUTPUT_DIR_NAME),
    }
}

/// Create the output directory if it doesn't exist
pub fn prepare_output_dir(dir: &Path) -> Result<(), BatchError> {
    if !dir.exists() {
        log::info!("Creating output directory: '{}'", dir.display());
    }

    fs::create_dir_all(dir).map_err(|source| BatchError::OutputDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// `<stem>_haptics.json` inside the output directory
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    output_dir.join(format!("{}{}", stem, OUTPUT_SUFFIX))
}

/// Write events as a JSON array with 4-space indentation
pub fn write_events(events: &[HapticEvent], path: &Path) -> Result<(), OutputError> {
    let mut writer = BufWriter::new(File::create(path)?);

    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
    events.serialize(&mut serializer)?;

    writer.flush()?;
    Ok(())
}

/// Shared settings for every recording of a batch
pub struct BatchJob {
    pub output_dir: PathBuf,

    /// Write `[]` for recordings without events instead of skipping them
    pub write_empty: bool,

    pub config: HapticConfig,
    pub provider: Arc<dyn SpectralProvider>,
    pub reporter: Arc<dyn PipelineReporter>,

    /// Receives one "recording" entry per processed file
    pub trace: Option<Arc<TraceWriter>>,
}

impl BatchJob {
    /// Decode, analyse and persist one recording
    /// Never fails; every problem is folded into the outcome
    pub fn process(&self, input: &Path) -> RecordingOutcome {
        let recording = input
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.display().to_string());

        log::info!("Processing file: {}", recording);

        let outcome = self.convert(input, &recording);
        log_outcome(&recording, &outcome);
        self.trace_outcome(&recording, &outcome);

        outcome
    }

    fn convert(&self, input: &Path, recording: &str) -> RecordingOutcome {
        let audio = match ingest_file(input) {
            Ok(audio) => audio,
            Err(error) => return RecordingOutcome::DecodeFailed { error },
        };

        log::debug!(
            "Decoded '{}': {} Hz, {} channel(s), {:.2}s",
            recording,
            audio.sample_rate,
            audio.channels,
            audio.duration_secs()
        );

        let generated = generate_events(
            &audio,
            recording,
            self.provider.as_ref(),
            &self.config,
            self.reporter.as_ref(),
        );
        let path = output_path_for(input, &self.output_dir);

        match generated.empty_reason() {
            None => match write_events(&generated.events, &path) {
                Ok(()) => RecordingOutcome::Written {
                    path,
                    events: generated.events.len(),
                },
                Err(error) => RecordingOutcome::WriteFailed { path, error },
            },
            Some(reason) if self.write_empty => match write_events(&[], &path) {
                Ok(()) => RecordingOutcome::Empty {
                    reason,
                    path: Some(path),
                },
                Err(error) => RecordingOutcome::WriteFailed { path, error },
            },
            Some(reason) => RecordingOutcome::Empty { reason, path: None },
        }
    }

    fn trace_outcome(&self, recording: &str, outcome: &RecordingOutcome) {
        let Some(trace) = &self.trace else {
            return;
        };

        let mut data = serde_json::json!({
            "recording": recording,
            "outcome": outcome.kind(),
        });
        let message = match outcome {
            RecordingOutcome::Written { path, events } => {
                data["events"] = (*events).into();
                data["output"] = path.display().to_string().into();
                format!("Wrote {} events", events)
            }
            RecordingOutcome::Empty { reason, .. } => {
                data["reason"] = serde_json::to_value(reason).unwrap_or_default();
                "No haptic events generated".to_string()
            }
            RecordingOutcome::DecodeFailed { error } => format!("Decode failed: {}", error),
            RecordingOutcome::WriteFailed { error, .. } => format!("Write failed: {}", error),
            RecordingOutcome::Aborted { message } => format!("Aborted: {}", message),
        };

        trace.write_or_warn(&TraceBuilder::stage("recording").with_data(1.0, message, data));
    }
}

fn log_outcome(recording: &str, outcome: &RecordingOutcome) {
    match outcome {
        RecordingOutcome::Written { path, events } => {
            log::info!(
                "Generated {} haptic events for '{}', saved to '{}'",
                events,
                recording,
                path.display()
            );
        }
        RecordingOutcome::Empty { reason, path } => {
            let why = match reason {
                EmptyReason::NoOnsets => "no distinct onsets found",
                EmptyReason::AllSegmentsFiltered => "every segment too quiet or spectrally silent",
            };
            match path {
                Some(path) => log::warn!(
                    "No haptic events generated for '{}' ({}), wrote empty '{}'",
                    recording,
                    why,
                    path.display()
                ),
                None => log::warn!("No haptic events generated for '{}' ({})", recording, why),
            }
        }
        RecordingOutcome::DecodeFailed { error } => {
            log::error!("Error loading audio file '{}': {}", recording, error);
        }
        RecordingOutcome::WriteFailed { path, error } => {
            log::error!(
                "Error saving haptic file '{}' for '{}': {}",
                path.display(),
                recording,
                error
            );
        }
        RecordingOutcome::Aborted { message } => {
            log::error!("Processing '{}' aborted: {}", recording, message);
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Convert every input on the blocking pool, at most `max_jobs` at a time
///
/// Results come back in input order, one per input. A failing recording never stops the others.
pub async fn run_batch(
    inputs: Vec<PathBuf>,
    job: Arc<BatchJob>,
    max_jobs: usize,
) -> Vec<RecordingResult> {
    let semaphore = Arc::new(Semaphore::new(max_jobs.max(1)));
    let mut tasks = JoinSet::new();

    for (index, input) in inputs.iter().cloned().enumerate() {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let job = job.clone();

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| job.process(&input)))
                .unwrap_or_else(|payload| RecordingOutcome::Aborted {
                    message: panic_message(payload),
                });
            (index, RecordingResult { input, outcome })
        });
    }

    let mut completed = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => completed.push(result),
            Err(e) => log::error!("Recording task failed to complete: {}", e),
        }
    }

    assemble_results(inputs, completed)
}

/// Order completed results by input index
/// Inputs without a result are reported as aborted so every input is counted
fn assemble_results(
    inputs: Vec<PathBuf>,
    completed: Vec<(usize, RecordingResult)>,
) -> Vec<RecordingResult> {
    let mut slots: Vec<Option<RecordingResult>> = inputs.iter().map(|_| None).collect();
    for (index, result) in completed {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    inputs
        .into_iter()
        .zip(slots)
        .map(|(input, slot)| {
            slot.unwrap_or_else(|| {
                log::error!("No result for '{}'", input.display());
                RecordingResult {
                    input,
                    outcome: RecordingOutcome::Aborted {
                        message: "task did not complete".to_string(),
                    },
                }
            })
        })
        .collect()
}

/// Log the end-of-batch summary
pub fn log_summary(summary: &BatchSummary, output_dir: &Path) {
    log::info!(
        "Batch processing complete: {}/{} haptic files written ({} without events, {} failed)",
        summary.written,
        summary.found,
        summary.empty,
        summary.failed
    );
    log::info!("Haptic JSON files saved in '{}'", output_dir.display());
}
