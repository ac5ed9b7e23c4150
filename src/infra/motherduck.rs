use async_trait::async_trait;
use tracing::debug;

use crate::app::ports::{WarehouseConnection, WarehouseConnector};
use crate::error::{IngestError, Result};

/// Warehouse connector backed by DuckDB. The URI carries the MotherDuck
/// token (`md:?token=...`); a plain file path works too, which the tests and
/// local smoke runs rely on.
#[derive(Default)]
pub struct MotherDuckConnector;

impl MotherDuckConnector {
    pub fn new() -> Self {
        Self
    }
}

struct MotherDuckConnection {
    conn: duckdb::Connection,
}

#[async_trait]
impl WarehouseConnector for MotherDuckConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn WarehouseConnection>> {
        debug!("Opening warehouse connection");
        let conn = duckdb::Connection::open(uri).map_err(|e| {
            IngestError::Warehouse(format!("failed to open warehouse connection: {e}"))
        })?;
        Ok(Box::new(MotherDuckConnection { conn }))
    }
}

impl WarehouseConnection for MotherDuckConnection {
    fn execute(&self, statement: &str) -> Result<()> {
        self.conn
            .execute_batch(statement)
            .map_err(|e| IngestError::Warehouse(format!("warehouse statement failed: {e}")))
    }
}
