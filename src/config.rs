use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::constants::{DEFAULT_DATE_FORMAT, PROCESSED_FOLDER_SUFFIX};
use crate::error::{IngestError, Result};

/// Persistence destinations the loader knows how to drive. Unknown names are
/// rejected at configuration time rather than silently skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SinkKind {
    Local,
    RemoteWarehouse,
}

impl SinkKind {
    pub fn name(&self) -> &'static str {
        match self {
            SinkKind::Local => "local",
            SinkKind::RemoteWarehouse => "remote-warehouse",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SinkKind {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "local" => Ok(SinkKind::Local),
            "remote-warehouse" => Ok(SinkKind::RemoteWarehouse),
            other => Err(IngestError::Configuration(format!(
                "sinks: unknown sink name '{other}' (available: local, remote-warehouse)"
            ))),
        }
    }
}

/// Target type for the canonical identifier column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierType {
    String,
    Int,
}

impl fmt::Display for IdentifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierType::String => write!(f, "string"),
            IdentifierType::Int => write!(f, "int"),
        }
    }
}

/// Target type for the canonical date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateTargetType {
    Date,
    Datetime,
}

impl fmt::Display for DateTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTargetType::Date => write!(f, "date"),
            DateTargetType::Datetime => write!(f, "datetime"),
        }
    }
}

/// Base pipeline parameters, as supplied by the CLI or a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetParams {
    /// Dataset identifier in `<owner>/<dataset>` form.
    pub dataset_name: String,
    /// Folder the raw dataset is materialized into.
    pub destination_folder: PathBuf,
    /// Source column to expose as `product_id`, if any.
    #[serde(default)]
    pub product_id_field: Option<String>,
    /// Source column to expose as `order_date`, if any.
    #[serde(default)]
    pub order_date_field: Option<String>,
    #[serde(default = "default_sinks")]
    pub sinks: Vec<SinkKind>,
}

fn default_sinks() -> Vec<SinkKind> {
    vec![SinkKind::Local]
}

impl DatasetParams {
    /// Checks the invariants the rest of the pipeline relies on. Failures name
    /// the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.dataset_name.trim().is_empty() {
            return Err(IngestError::Configuration(
                "dataset_name: must not be empty".to_string(),
            ));
        }
        if !self.dataset_name.contains('/') {
            return Err(IngestError::Configuration(format!(
                "dataset_name: expected '<owner>/<dataset>' form, got '{}'",
                self.dataset_name
            )));
        }
        if self.destination_folder.as_os_str().is_empty() {
            return Err(IngestError::Configuration(
                "destination_folder: must not be empty".to_string(),
            ));
        }
        if self.sinks.is_empty() {
            return Err(IngestError::Configuration(
                "sinks: at least one sink must be configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// Knobs for the post-acquisition stages. Everything has a default so a bare
/// base configuration is enough to run the pipeline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Overrides the `<destination_folder>_processed` convention.
    pub processed_folder: Option<PathBuf>,
    pub date_format: String,
    pub product_id_type: IdentifierType,
    pub order_date_type: DateTargetType,
    pub remove_duplicates: bool,
    pub remove_nulls: bool,
    /// Resolved path to the warehouse credentials JSON. Filled in by the
    /// adapter layer; the pipeline itself never consults the environment.
    pub warehouse_credentials: Option<PathBuf>,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            processed_folder: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            product_id_type: IdentifierType::String,
            order_date_type: DateTargetType::Datetime,
            remove_duplicates: true,
            remove_nulls: true,
            warehouse_credentials: None,
        }
    }
}

/// Extended configuration for the stages that run after acquisition succeeds.
///
/// Built by the orchestrator from the base parameters plus the two derived
/// fields (raw dataset path, processed folder); callers never assemble one
/// directly.
#[derive(Debug, Clone)]
pub struct ProcessedParams {
    pub dataset_name: String,
    pub destination_folder: PathBuf,
    pub product_id_field: Option<String>,
    pub order_date_field: Option<String>,
    pub sinks: Vec<SinkKind>,
    pub processed_dataset_path: PathBuf,
    pub processed_destination_folder: PathBuf,
    pub date_format: String,
    pub product_id_type: IdentifierType,
    pub order_date_type: DateTargetType,
    pub remove_duplicates: bool,
    pub remove_nulls: bool,
    pub warehouse_credentials: Option<PathBuf>,
}

impl ProcessedParams {
    pub fn derive(
        base: DatasetParams,
        raw_dataset_path: PathBuf,
        options: ProcessingOptions,
    ) -> Self {
        let processed_destination_folder = options.processed_folder.unwrap_or_else(|| {
            let mut folder = base.destination_folder.clone().into_os_string();
            folder.push(PROCESSED_FOLDER_SUFFIX);
            PathBuf::from(folder)
        });

        Self {
            dataset_name: base.dataset_name,
            destination_folder: base.destination_folder,
            product_id_field: base.product_id_field,
            order_date_field: base.order_date_field,
            sinks: base.sinks,
            processed_dataset_path: raw_dataset_path,
            processed_destination_folder,
            date_format: options.date_format,
            product_id_type: options.product_id_type,
            order_date_type: options.order_date_type,
            remove_duplicates: options.remove_duplicates,
            remove_nulls: options.remove_nulls,
            warehouse_credentials: options.warehouse_credentials,
        }
    }
}

/// On-disk pipeline configuration (TOML). Every field is optional; CLI flags
/// win over file values.
#[derive(Debug, Default, Deserialize)]
pub struct RunConfig {
    pub dataset_name: Option<String>,
    pub destination_folder: Option<PathBuf>,
    pub product_id_field: Option<String>,
    pub order_date_field: Option<String>,
    pub sinks: Option<Vec<SinkKind>>,
    #[serde(default)]
    pub processing: ProcessingOptions,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            IngestError::Configuration(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;
        let config: RunConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}
