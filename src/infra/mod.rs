use async_trait::async_trait;

use crate::app::ports::{WarehouseConnection, WarehouseConnector};
use crate::error::{IngestError, Result};

pub mod kaggle;
#[cfg(feature = "warehouse")]
pub mod motherduck;

/// Stand-in connector for builds without the `warehouse` feature. Requesting
/// the remote-warehouse sink against it is a configuration error.
pub struct UnsupportedWarehouseConnector;

#[async_trait]
impl WarehouseConnector for UnsupportedWarehouseConnector {
    async fn connect(&self, _uri: &str) -> Result<Box<dyn WarehouseConnection>> {
        Err(IngestError::Configuration(
            "remote-warehouse sink requested, but this binary was built without the `warehouse` feature"
                .to_string(),
        ))
    }
}
