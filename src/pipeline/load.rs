use metrics::counter;
use polars::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

use crate::app::ports::WarehouseConnector;
use crate::config::{ProcessedParams, SinkKind};
use crate::constants::TABLE_NAME;
use crate::error::{IngestError, Result};

/// Outcome of one sink attempt. Sinks are independent; a failure here never
/// prevents the remaining sinks from being tried.
#[derive(Debug, serde::Serialize)]
pub struct SinkOutcome {
    pub sink: SinkKind,
    pub error: Option<String>,
}

impl SinkOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of the load stage; partial success is possible.
#[derive(Debug, serde::Serialize)]
pub struct LoadReport {
    pub outcomes: Vec<SinkOutcome>,
}

impl LoadReport {
    pub fn failed(&self) -> Vec<&SinkOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded()).collect()
    }
}

/// Writes the normalized table to every configured sink, collecting a
/// per-sink outcome instead of aborting on the first failure.
#[instrument(skip(df, params, connector))]
pub async fn load_to_destinations(
    df: &DataFrame,
    params: &ProcessedParams,
    connector: &dyn WarehouseConnector,
) -> LoadReport {
    let mut outcomes = Vec::with_capacity(params.sinks.len());
    for sink in &params.sinks {
        counter!("ingest_sink_attempts_total", "sink" => sink.to_string()).increment(1);
        let result = match sink {
            SinkKind::Local => write_local_parquet(df, params),
            SinkKind::RemoteWarehouse => load_to_warehouse(df, params, connector).await,
        };
        match &result {
            Ok(()) => info!("Sink '{}' completed", sink),
            Err(e) => error!("Sink '{}' failed: {}", sink, e),
        }
        outcomes.push(SinkOutcome {
            sink: *sink,
            error: result.err().map(|e| e.to_string()),
        });
    }
    LoadReport { outcomes }
}

/// Local sink: the whole table as one Parquet file under the processed
/// folder, overwriting any previous run's output.
fn write_local_parquet(df: &DataFrame, params: &ProcessedParams) -> Result<()> {
    fs::create_dir_all(&params.processed_destination_folder)?;
    let parquet_path = params
        .processed_destination_folder
        .join(format!("{TABLE_NAME}.parquet"));
    info!("Writing dataset to {}", parquet_path.display());

    write_parquet(df, &parquet_path)?;

    info!("Dataset saved at {}", parquet_path.display());
    println!("💾 Dataset saved at: {}", parquet_path.display());
    Ok(())
}

/// Remote-warehouse sink: stages the table as Parquet, then creates-or-no-ops
/// the logical table over a dedicated connection. Always a full-table load;
/// there is no append or upsert mode.
async fn load_to_warehouse(
    df: &DataFrame,
    params: &ProcessedParams,
    connector: &dyn WarehouseConnector,
) -> Result<()> {
    let credentials_path = params.warehouse_credentials.as_ref().ok_or_else(|| {
        IngestError::Configuration(
            "warehouse_credentials: no credentials file configured for the remote-warehouse sink"
                .to_string(),
        )
    })?;
    let token = load_warehouse_token(credentials_path)?;

    fs::create_dir_all(&params.processed_destination_folder)?;
    let staging_path = params
        .processed_destination_folder
        .join(format!("{TABLE_NAME}.staging.parquet"));
    write_parquet(df, &staging_path)?;

    let uri = format!("md:?token={token}");
    let result = async {
        let connection = connector.connect(&uri).await?;
        let statement = format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} AS SELECT * FROM read_parquet('{}')",
            staging_path.display()
        );
        connection.execute(&statement)
    }
    .await;
    // The staging file is scratch space; remove it on success and failure alike.
    let _ = fs::remove_file(&staging_path);
    result?;

    info!("Table '{}' loaded into the remote warehouse", TABLE_NAME);
    println!("🦆 Table loaded into the remote warehouse.");
    Ok(())
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<()> {
    let file = fs::File::create(path)?;
    let mut staged = df.clone();
    ParquetWriter::new(file).finish(&mut staged)?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct WarehouseCredentials {
    token: String,
}

/// Reads the warehouse access token from the credentials JSON. A missing or
/// malformed file is a configuration error that aborts the sink.
pub fn load_warehouse_token(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path).map_err(|_| {
        IngestError::Configuration(format!(
            "warehouse credentials file not found at {}",
            path.display()
        ))
    })?;
    let credentials: WarehouseCredentials = serde_json::from_str(&raw).map_err(|e| {
        IngestError::Configuration(format!("invalid warehouse credentials JSON: {e}"))
    })?;
    if credentials.token.is_empty() {
        return Err(IngestError::Configuration(
            "warehouse credentials contain an empty token".to_string(),
        ));
    }
    Ok(credentials.token)
}
