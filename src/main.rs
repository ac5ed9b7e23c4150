use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use sales_ingest::app::ports::WarehouseConnector;
use sales_ingest::config::{DatasetParams, ProcessingOptions, RunConfig, SinkKind};
use sales_ingest::constants::{KAGGLE_CONFIG_DIR_ENV, WAREHOUSE_CREDENTIALS_ENV};
use sales_ingest::error::IngestError;
use sales_ingest::infra::kaggle::KaggleClient;
use sales_ingest::logging;
use sales_ingest::pipeline;

#[derive(Parser)]
#[command(name = "sales_ingest")]
#[command(about = "Kaggle sales dataset ingestion pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: acquire, normalize, coerce, load
    Run {
        /// Dataset identifier in <owner>/<dataset> form
        #[arg(long)]
        dataset: Option<String>,
        /// Folder to download the raw dataset into
        #[arg(long)]
        destination: Option<PathBuf>,
        /// Source column to expose as product_id
        #[arg(long)]
        product_id_field: Option<String>,
        /// Source column to expose as order_date
        #[arg(long)]
        order_date_field: Option<String>,
        /// Comma-separated sinks. Available: local, remote-warehouse
        #[arg(long)]
        sinks: Option<String>,
        /// TOML file with pipeline parameters (flags win over file values)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Download the raw dataset without processing it
    Fetch {
        /// Dataset identifier in <owner>/<dataset> form
        #[arg(long)]
        dataset: Option<String>,
        /// Folder to download the raw dataset into
        #[arg(long)]
        destination: Option<PathBuf>,
        /// TOML file with pipeline parameters (flags win over file values)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Merges CLI flags over config-file values and resolves the credential
/// locations from the environment. All env lookups live here, not in the
/// pipeline.
fn resolve_params(
    dataset: Option<String>,
    destination: Option<PathBuf>,
    product_id_field: Option<String>,
    order_date_field: Option<String>,
    sinks: Option<String>,
    config: Option<PathBuf>,
) -> Result<(DatasetParams, ProcessingOptions)> {
    let file = match config {
        Some(path) => RunConfig::load(&path)?,
        None => RunConfig::default(),
    };

    let sinks = match sinks {
        Some(list) => list
            .split(',')
            .map(|s| s.parse::<SinkKind>())
            .collect::<sales_ingest::error::Result<Vec<_>>>()?,
        None => file.sinks.unwrap_or_else(|| vec![SinkKind::Local]),
    };

    let params = DatasetParams {
        dataset_name: dataset.or(file.dataset_name).ok_or_else(|| {
            IngestError::Configuration(
                "dataset_name: required via --dataset or the config file".to_string(),
            )
        })?,
        destination_folder: destination
            .or(file.destination_folder)
            .unwrap_or_else(|| PathBuf::from("data/raw")),
        product_id_field: product_id_field.or(file.product_id_field),
        order_date_field: order_date_field.or(file.order_date_field),
        sinks,
    };
    params.validate()?;

    let mut options = file.processing;
    if options.warehouse_credentials.is_none() {
        options.warehouse_credentials = Some(default_warehouse_credentials());
    }
    Ok((params, options))
}

fn kaggle_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(KAGGLE_CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".kaggle"),
        Err(_) => PathBuf::from(".kaggle"),
    }
}

fn default_warehouse_credentials() -> PathBuf {
    if let Ok(path) = std::env::var(WAREHOUSE_CREDENTIALS_ENV) {
        return PathBuf::from(path);
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".motherduck/MotherDuck.json"),
        Err(_) => PathBuf::from("MotherDuck.json"),
    }
}

#[cfg(feature = "warehouse")]
fn warehouse_connector() -> Box<dyn WarehouseConnector> {
    Box::new(sales_ingest::infra::motherduck::MotherDuckConnector::new())
}

#[cfg(not(feature = "warehouse"))]
fn warehouse_connector() -> Box<dyn WarehouseConnector> {
    Box::new(sales_ingest::infra::UnsupportedWarehouseConnector)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            dataset,
            destination,
            product_id_field,
            order_date_field,
            sinks,
            config,
        } => {
            println!("🔄 Running ingestion pipeline...");
            let (params, options) = resolve_params(
                dataset,
                destination,
                product_id_field,
                order_date_field,
                sinks,
                config,
            )?;
            let provider = KaggleClient::new(kaggle_config_dir());
            let connector = warehouse_connector();

            let report = pipeline::run(params, options, &provider, connector.as_ref()).await?;

            if !report.acquired {
                println!("⚠️  No dataset acquired; nothing to do.");
                return Ok(());
            }

            println!("\n📊 Ingestion results for {}:", report.dataset);
            println!("   Rows: {}", report.rows);
            println!("   Columns: {}", report.columns);
            for outcome in &report.sinks {
                match &outcome.error {
                    None => println!("   Sink {}: ok", outcome.sink),
                    Some(e) => println!("   Sink {}: FAILED ({e})", outcome.sink),
                }
            }

            let failed = report.failed_sinks();
            if !failed.is_empty() {
                error!("{} sink(s) failed", failed.len());
                anyhow::bail!("{} of {} sink(s) failed", failed.len(), report.sinks.len());
            }
            info!("Ingestion completed successfully");
            println!("✅ Ingestion completed successfully");
        }
        Commands::Fetch {
            dataset,
            destination,
            config,
        } => {
            println!("📥 Fetching raw dataset...");
            let (params, _) = resolve_params(dataset, destination, None, None, None, config)?;
            let provider = KaggleClient::new(kaggle_config_dir());

            match pipeline::acquire::acquire_dataset(&provider, &params).await {
                Some(handle) => {
                    println!("📦 Dataset downloaded at: {}", handle.path().display())
                }
                None => println!("⚠️  No dataset acquired."),
            }
        }
    }
    Ok(())
}
