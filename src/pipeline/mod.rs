use metrics::{counter, histogram};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, instrument};

use crate::app::ports::{DatasetProvider, WarehouseConnector};
use crate::config::{DatasetParams, ProcessedParams, ProcessingOptions};
use crate::error::Result;

pub mod acquire;
pub mod load;
pub mod preprocess;

pub use acquire::RawDatasetHandle;
pub use load::SinkOutcome;

/// Summary of one ingestion run.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub dataset: String,
    /// False when the provider produced no dataset and the run stopped early.
    pub acquired: bool,
    pub rows: usize,
    pub columns: usize,
    pub sinks: Vec<SinkOutcome>,
}

impl PipelineReport {
    fn skipped(dataset: String) -> Self {
        Self {
            dataset,
            acquired: false,
            rows: 0,
            columns: 0,
            sinks: Vec::new(),
        }
    }

    pub fn failed_sinks(&self) -> Vec<&SinkOutcome> {
        self.sinks.iter().filter(|o| !o.succeeded()).collect()
    }
}

/// Runs the four pipeline stages in their fixed order: acquire, normalize,
/// coerce, load. A run that acquires nothing is a graceful stop, not an
/// error; every later stage failure propagates to the caller.
#[instrument(skip(base, options, provider, connector), fields(dataset = %base.dataset_name))]
pub async fn run(
    base: DatasetParams,
    options: ProcessingOptions,
    provider: &dyn DatasetProvider,
    connector: &dyn WarehouseConnector,
) -> Result<PipelineReport> {
    base.validate()?;
    counter!("ingest_runs_total").increment(1);
    let started = Instant::now();
    info!("Starting ingestion run for {}", base.dataset_name);

    let Some(handle) = acquire::acquire_dataset(provider, &base).await else {
        info!("No dataset acquired; stopping the run");
        return Ok(PipelineReport::skipped(base.dataset_name));
    };
    println!("📦 Dataset downloaded at: {}", handle.path().display());

    let params = ProcessedParams::derive(base, handle.path().to_path_buf(), options);

    let df = preprocess::normalize_columns(handle, &params)?;
    let df = preprocess::coerce_column_types(df, &params)?;
    let (rows, columns) = df.shape();
    counter!("ingest_rows_loaded_total").increment(rows as u64);

    let load_report = load::load_to_destinations(&df, &params, connector).await;

    let elapsed = started.elapsed().as_secs_f64();
    histogram!("ingest_pipeline_duration_seconds").record(elapsed);
    info!(
        "Run finished in {:.2}s ({} rows, {} columns)",
        elapsed, rows, columns
    );

    Ok(PipelineReport {
        dataset: params.dataset_name,
        acquired: true,
        rows,
        columns,
        sinks: load_report.outcomes,
    })
}
