use metrics::histogram;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::app::ports::DatasetProvider;
use crate::config::DatasetParams;

/// Path to a locally materialized raw dataset file.
///
/// Produced by acquisition and consumed by value exactly once when the
/// normalizer reads the file.
#[derive(Debug)]
pub struct RawDatasetHandle {
    path: PathBuf,
}

impl RawDatasetHandle {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Downloads the configured dataset and returns a handle to the raw file.
///
/// Every provider-side failure is absorbed here: authentication and transfer
/// problems are logged and reported as "no handle", which callers must treat
/// as a terminal, non-retryable stop for this run.
#[instrument(skip(provider, params), fields(dataset = %params.dataset_name))]
pub async fn acquire_dataset(
    provider: &dyn DatasetProvider,
    params: &DatasetParams,
) -> Option<RawDatasetHandle> {
    if let Err(e) = provider.authenticate().await {
        warn!("Dataset provider authentication failed: {}", e);
        println!("⚠️  Could not authenticate against the dataset provider. Aborting download.");
        return None;
    }
    info!("Authenticated with the dataset provider");

    if let Err(e) = fs::create_dir_all(&params.destination_folder) {
        error!(
            "Failed to create destination folder {}: {}",
            params.destination_folder.display(),
            e
        );
        return None;
    }

    let start = Instant::now();
    let files = match provider
        .fetch(&params.dataset_name, &params.destination_folder, true)
        .await
    {
        Ok(files) => files,
        Err(e) => {
            error!("Failed to download dataset: {}", e);
            return None;
        }
    };
    let elapsed = start.elapsed().as_secs_f64();
    histogram!("ingest_fetch_duration_seconds").record(elapsed);
    info!("Download completed in {:.2} seconds", elapsed);
    println!("✅ Download completed in {elapsed:.2} seconds.");

    match files.split_first() {
        None => {
            warn!("Transfer finished but produced no files");
            None
        }
        Some((first, rest)) => {
            if !rest.is_empty() {
                warn!(
                    "Transfer produced {} files; using the first reported entry",
                    files.len()
                );
            }
            info!(
                "Dataset {} saved at {}",
                params.dataset_name,
                first.display()
            );
            Some(RawDatasetHandle::new(first.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkKind;
    use crate::error::{IngestError, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn params(destination: &Path) -> DatasetParams {
        DatasetParams {
            dataset_name: "acme/sales-history".to_string(),
            destination_folder: destination.to_path_buf(),
            product_id_field: None,
            order_date_field: None,
            sinks: vec![SinkKind::Local],
        }
    }

    /// Provider double with scriptable outcomes and call counters.
    struct ScriptedProvider {
        auth_ok: bool,
        files: Result<Vec<PathBuf>>,
        fetch_calls: Arc<AtomicUsize>,
    }

    impl ScriptedProvider {
        fn new(auth_ok: bool, files: Result<Vec<PathBuf>>) -> Self {
            Self {
                auth_ok,
                files,
                fetch_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl DatasetProvider for ScriptedProvider {
        async fn authenticate(&self) -> Result<()> {
            if self.auth_ok {
                Ok(())
            } else {
                Err(IngestError::Authentication("bad credentials".to_string()))
            }
        }

        async fn fetch(
            &self,
            _dataset: &str,
            _destination: &Path,
            _unpack: bool,
        ) -> Result<Vec<PathBuf>> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            match &self.files {
                Ok(files) => Ok(files.clone()),
                Err(_) => Err(IngestError::Transport("connection reset".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn authentication_failure_yields_no_handle_and_skips_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(false, Ok(vec![]));
        let handle = acquire_dataset(&provider, &params(dir.path())).await;
        assert!(handle.is_none());
        assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transfer_failure_yields_no_handle() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(
            true,
            Err(IngestError::Transport("connection reset".to_string())),
        );
        let handle = acquire_dataset(&provider, &params(dir.path())).await;
        assert!(handle.is_none());
        assert_eq!(provider.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_transfer_yields_no_handle() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider::new(true, Ok(vec![]));
        let handle = acquire_dataset(&provider, &params(dir.path())).await;
        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn first_reported_file_becomes_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("orders.csv");
        let second = dir.path().join("readme.txt");
        let provider = ScriptedProvider::new(true, Ok(vec![first.clone(), second]));
        let handle = acquire_dataset(&provider, &params(dir.path())).await.unwrap();
        assert_eq!(handle.path(), first.as_path());
    }

    #[tokio::test]
    async fn destination_folder_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("raw/sales");
        let file = nested.join("orders.csv");
        let provider = ScriptedProvider::new(true, Ok(vec![file]));
        let handle = acquire_dataset(&provider, &params(&nested)).await;
        assert!(handle.is_some());
        assert!(nested.is_dir());
    }
}
