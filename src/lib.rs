// Hapticbeat - music to haptic glove event converter
// Module declarations and the command-line entry point

use clap::Parser;
use std::sync::Arc;
use thiserror::Error;

pub mod audio;
pub mod batch;
pub mod cli;
pub mod haptics;
pub mod pipeline;

use audio::{RealFftProvider, SUPPORTED_EXTENSIONS};
use batch::{BatchError, BatchJob, BatchSummary};
use cli::Args;
use haptics::ConfigError;
use pipeline::{CompositeReporter, LogReporter, TraceBuilder, TraceWriter};

/// Setup failures that stop the converter before any recording is processed
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Failed to start async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // Already initialised when embedded in another binary
    let _ = builder.try_init();
}

/// Parse the command line and convert every recording it names
pub fn run() -> Result<BatchSummary, RunError> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.haptic_config()?;
    let inputs = batch::collect_inputs(&args.input)?;
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| batch::default_output_dir(&args.input));

    if inputs.is_empty() {
        log::warn!(
            "No audio files found in '{}'. Supported extensions: {}",
            args.input.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        );
        return Ok(BatchSummary::default());
    }

    batch::prepare_output_dir(&output_dir)?;
    log::info!(
        "Starting batch haptic conversion of {} file(s) from '{}'",
        inputs.len(),
        args.input.display()
    );
    log::info!("Output will be saved to '{}'", output_dir.display());

    let trace = args
        .trace
        .as_ref()
        .map(|path| Arc::new(TraceWriter::new(path.clone())));

    let mut reporter = CompositeReporter::new().with(LogReporter);
    if let Some(trace) = &trace {
        reporter = reporter.with(trace.clone());
        trace.write_or_warn(
            &TraceBuilder::stage("batch")
                .start(format!("Converting {} recordings", inputs.len())),
        );
    }

    let jobs = args.job_count();
    let job = Arc::new(BatchJob {
        output_dir: output_dir.clone(),
        write_empty: args.write_empty,
        config,
        provider: Arc::new(RealFftProvider::new()),
        reporter: Arc::new(reporter),
        trace: trace.clone(),
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .max_blocking_threads(jobs)
        .enable_all()
        .build()?;
    let results = runtime.block_on(batch::run_batch(inputs, job, jobs));

    let summary = BatchSummary::from_results(&results);
    batch::log_summary(&summary, &output_dir);

    if let Some(trace) = &trace {
        let data = serde_json::to_value(summary).unwrap_or_default();
        trace.write_or_warn(&TraceBuilder::stage("batch").with_data(
            1.0,
            format!("Processed {}/{} recordings", summary.processed(), summary.found),
            data,
        ));
    }

    Ok(summary)
}
