use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// External service supplying raw datasets (Kaggle in production).
#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Verifies credentials before any transfer is attempted.
    async fn authenticate(&self) -> Result<()>;

    /// Materializes the named dataset into `destination` and reports the exact
    /// file paths produced, sorted. Directory listing order is never trusted.
    async fn fetch(&self, dataset: &str, destination: &Path, unpack: bool)
        -> Result<Vec<PathBuf>>;
}

/// A live connection to the analytical warehouse. Statement execution is
/// synchronous; the connection is released on drop.
pub trait WarehouseConnection: Send {
    fn execute(&self, statement: &str) -> Result<()>;
}

/// Opens dedicated warehouse connections from a URI carrying the access token.
#[async_trait]
pub trait WarehouseConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn WarehouseConnection>>;
}
