/// Logical table name shared by every sink.
pub const TABLE_NAME: &str = "sales_dataset";

/// Canonical column names downstream stages depend on.
pub const PRODUCT_ID_COLUMN: &str = "product_id";
pub const ORDER_DATE_COLUMN: &str = "order_date";

/// Date format applied to `order_date` unless overridden.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Suffix appended to the destination folder for processed output.
pub const PROCESSED_FOLDER_SUFFIX: &str = "_processed";

pub const KAGGLE_API_BASE: &str = "https://www.kaggle.com/api/v1";

/// Environment overrides, resolved in the adapter layer only.
pub const KAGGLE_CONFIG_DIR_ENV: &str = "KAGGLE_CONFIG_DIR";
pub const WAREHOUSE_CREDENTIALS_ENV: &str = "MOTHERDUCK_CREDENTIALS_FILE";
