use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, info, instrument};

use crate::config::{DateTargetType, IdentifierType, ProcessedParams};
use crate::constants::{ORDER_DATE_COLUMN, PRODUCT_ID_COLUMN};
use crate::error::{IngestError, Result};
use crate::pipeline::acquire::RawDatasetHandle;

/// Standardizes a raw header into the canonical column-name shape: trimmed,
/// spaces and hyphens replaced with underscores, lowercased. Idempotent.
pub fn clean_column_name(name: &str) -> String {
    name.trim().replace(' ', "_").replace('-', "_").to_lowercase()
}

/// Loads the raw CSV and applies the normalization phase in its fixed order:
/// column-name cleanup, canonical renames, duplicate removal, null removal.
///
/// The order matters; deduping before the canonical rename could merge rows
/// differently, so it must stay as is.
#[instrument(skip(handle, params))]
pub fn normalize_columns(handle: RawDatasetHandle, params: &ProcessedParams) -> Result<DataFrame> {
    let path = handle.into_path();
    info!("Normalizing columns of {}", path.display());

    let mut df = CsvReader::from_path(&path)?.has_header(true).finish()?;

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for name in names {
        let cleaned = clean_column_name(&name);
        if cleaned != name {
            df.rename(&name, &cleaned)?;
        }
    }

    rename_to_canonical(&mut df, params.product_id_field.as_deref(), PRODUCT_ID_COLUMN)?;
    rename_to_canonical(&mut df, params.order_date_field.as_deref(), ORDER_DATE_COLUMN)?;

    if params.remove_duplicates {
        debug!("Dropping duplicate rows");
        df = df.unique_stable(None::<&[String]>, UniqueKeepStrategy::First, None)?;
    }
    if params.remove_nulls {
        debug!("Dropping rows with null values");
        df = df.drop_nulls(None::<&[String]>)?;
    }

    info!("Normalized table has {} rows, {} columns", df.height(), df.width());
    Ok(df)
}

/// Renames the column matching `source` (after the same cleanup applied to
/// every header) to its canonical role name. A missing source column is a
/// no-op, not an error.
fn rename_to_canonical(df: &mut DataFrame, source: Option<&str>, canonical: &str) -> Result<()> {
    let Some(source) = source else {
        return Ok(());
    };
    let source = clean_column_name(source);
    if source == canonical {
        return Ok(());
    }
    if df.get_column_names().iter().any(|c| *c == source) {
        df.rename(&source, canonical)?;
        debug!("Renamed column '{}' to '{}'", source, canonical);
    } else {
        debug!(
            "Source column '{}' not present; canonical role '{}' stays unmapped",
            source, canonical
        );
    }
    Ok(())
}

/// Applies the coercion phase to the normalized table.
///
/// The identifier column must fully convert to its target type or the run
/// aborts. Date values that do not match the configured format degrade to
/// null markers instead of failing the run.
#[instrument(skip(df, params))]
pub fn coerce_column_types(mut df: DataFrame, params: &ProcessedParams) -> Result<DataFrame> {
    info!("Coercing column types");

    if df.get_column_names().iter().any(|c| *c == PRODUCT_ID_COLUMN) {
        let target = identifier_dtype(params.product_id_type);
        let current = df.column(PRODUCT_ID_COLUMN)?;
        let casted = current.cast(&target)?;
        let failed = casted.null_count().saturating_sub(current.null_count());
        if failed > 0 {
            return Err(IngestError::Coercion {
                column: PRODUCT_ID_COLUMN.to_string(),
                target: params.product_id_type.to_string(),
                message: format!("{failed} value(s) could not be converted"),
            });
        }
        df.replace(PRODUCT_ID_COLUMN, casted)?;
        debug!(
            "Cast '{}' to {}",
            PRODUCT_ID_COLUMN, params.product_id_type
        );
    }

    if df.get_column_names().iter().any(|c| *c == ORDER_DATE_COLUMN) {
        let current = df.column(ORDER_DATE_COLUMN)?;
        if current.dtype() == &DataType::String {
            let parsed =
                parse_date_column(current, &params.date_format, params.order_date_type)?;
            let nulled = parsed.null_count().saturating_sub(current.null_count());
            if nulled > 0 {
                debug!(
                    "{} '{}' value(s) did not match format '{}' and were nulled",
                    nulled, ORDER_DATE_COLUMN, params.date_format
                );
            }
            df.replace(ORDER_DATE_COLUMN, parsed)?;
        } else {
            debug!(
                "Column '{}' already has type {}; skipping date parse",
                ORDER_DATE_COLUMN,
                current.dtype()
            );
        }
    }

    Ok(df)
}

fn identifier_dtype(target: IdentifierType) -> DataType {
    match target {
        IdentifierType::String => DataType::String,
        IdentifierType::Int => DataType::Int64,
    }
}

fn parse_date_column(series: &Series, format: &str, target: DateTargetType) -> Result<Series> {
    let ca = series.str()?;
    let parsed = match target {
        DateTargetType::Datetime => DatetimeChunked::from_naive_datetime_options(
            ORDER_DATE_COLUMN,
            ca.into_iter()
                .map(|opt| opt.and_then(|v| parse_instant(v.trim(), format))),
            TimeUnit::Microseconds,
        )
        .into_series(),
        DateTargetType::Date => DateChunked::from_naive_date_options(
            ORDER_DATE_COLUMN,
            ca.into_iter()
                .map(|opt| opt.and_then(|v| parse_civil_date(v.trim(), format))),
        )
        .into_series(),
    };
    Ok(parsed)
}

/// Parses with the configured format as a datetime first, then as a date at
/// midnight, so date-only formats like `%d/%m/%Y` work for both targets.
fn parse_instant(value: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, format).ok().or_else(|| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}

fn parse_civil_date(value: &str, format: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, format).ok().or_else(|| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|dt| dt.date())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetParams, ProcessingOptions, SinkKind};
    use std::io::Write;
    use std::path::PathBuf;

    fn write_csv(dir: &tempfile::TempDir, content: &str) -> RawDatasetHandle {
        let path = dir.path().join("raw.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        RawDatasetHandle::new(path)
    }

    fn params(
        product_id_field: Option<&str>,
        order_date_field: Option<&str>,
        options: ProcessingOptions,
    ) -> ProcessedParams {
        let base = DatasetParams {
            dataset_name: "acme/sales-history".to_string(),
            destination_folder: PathBuf::from("data/raw"),
            product_id_field: product_id_field.map(str::to_string),
            order_date_field: order_date_field.map(str::to_string),
            sinks: vec![SinkKind::Local],
        };
        ProcessedParams::derive(base, PathBuf::from("data/raw/raw.csv"), options)
    }

    #[test]
    fn column_name_cleanup_is_idempotent() {
        for raw in ["  Order Date ", "Ship-Mode", "qty", "Sub-Category Name"] {
            let once = clean_column_name(raw);
            assert_eq!(clean_column_name(&once), once);
        }
        assert_eq!(clean_column_name("  Order Date "), "order_date");
        assert_eq!(clean_column_name("Ship-Mode"), "ship_mode");
    }

    #[test]
    fn headers_are_standardized_and_roles_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let handle = write_csv(&dir, "Item Code,Ship Date,Qty Sold\nA1,01/02/2021,3\n");
        let params = params(
            Some("Item Code"),
            Some("Ship Date"),
            ProcessingOptions::default(),
        );
        let df = normalize_columns(handle, &params).unwrap();
        assert_eq!(
            df.get_column_names(),
            &["product_id", "order_date", "qty_sold"]
        );
    }

    #[test]
    fn normalization_is_a_noop_on_already_clean_headers() {
        let dir = tempfile::tempdir().unwrap();
        let handle = write_csv(&dir, "product_id,order_date,qty\nA1,01/02/2021,3\n");
        let params = params(None, None, ProcessingOptions::default());
        let df = normalize_columns(handle, &params).unwrap();
        assert_eq!(df.get_column_names(), &["product_id", "order_date", "qty"]);
    }

    #[test]
    fn missing_canonical_source_leaves_columns_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let handle = write_csv(&dir, "sku,shipped,qty\nA1,01/02/2021,3\n");
        let params = params(
            Some("No Such Column"),
            None,
            ProcessingOptions::default(),
        );
        let df = normalize_columns(handle, &params).unwrap();
        assert_eq!(df.get_column_names(), &["sku", "shipped", "qty"]);
    }

    #[test]
    fn duplicate_groups_collapse_to_single_rows() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "sku,qty\nA1,3\nA1,3\nA1,3\nB2,5\nB2,5\nC3,1\n";

        let handle = write_csv(&dir, csv);
        let df = normalize_columns(handle, &params(None, None, ProcessingOptions::default()))
            .unwrap();
        assert_eq!(df.height(), 3);

        let options = ProcessingOptions {
            remove_duplicates: false,
            ..ProcessingOptions::default()
        };
        let handle = write_csv(&dir, csv);
        let df = normalize_columns(handle, &params(None, None, options)).unwrap();
        assert_eq!(df.height(), 6);
    }

    #[test]
    fn rows_with_any_null_are_dropped_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let csv = "sku,region,qty\nA1,west,3\nA2,,5\n,east,2\nA4,north,7\n";

        let handle = write_csv(&dir, csv);
        let df = normalize_columns(handle, &params(None, None, ProcessingOptions::default()))
            .unwrap();
        assert_eq!(df.height(), 2);
        for column in df.get_columns() {
            assert_eq!(column.null_count(), 0);
        }

        let options = ProcessingOptions {
            remove_nulls: false,
            ..ProcessingOptions::default()
        };
        let handle = write_csv(&dir, csv);
        let df = normalize_columns(handle, &params(None, None, options)).unwrap();
        assert_eq!(df.height(), 4);
    }

    #[test]
    fn unparseable_dates_degrade_to_null() {
        let options = ProcessingOptions {
            date_format: "%Y-%m-%d".to_string(),
            ..ProcessingOptions::default()
        };
        let params = params(None, None, options);
        let df = df!(ORDER_DATE_COLUMN => &["2020-01-01", "not-a-date"]).unwrap();

        let df = coerce_column_types(df, &params).unwrap();
        let column = df.column(ORDER_DATE_COLUMN).unwrap();
        assert_eq!(column.dtype(), &DataType::Datetime(TimeUnit::Microseconds, None));
        assert_eq!(column.null_count(), 1);
        assert!(!matches!(column.get(0).unwrap(), AnyValue::Null));
        assert!(matches!(column.get(1).unwrap(), AnyValue::Null));
    }

    #[test]
    fn date_target_type_date_produces_date_column() {
        let options = ProcessingOptions {
            date_format: "%d/%m/%Y".to_string(),
            order_date_type: DateTargetType::Date,
            ..ProcessingOptions::default()
        };
        let params = params(None, None, options);
        let df = df!(ORDER_DATE_COLUMN => &["01/02/2021"]).unwrap();

        let df = coerce_column_types(df, &params).unwrap();
        assert_eq!(
            df.column(ORDER_DATE_COLUMN).unwrap().dtype(),
            &DataType::Date
        );
    }

    #[test]
    fn identifier_cast_failure_is_fatal() {
        let options = ProcessingOptions {
            product_id_type: IdentifierType::Int,
            ..ProcessingOptions::default()
        };
        let params = params(None, None, options);
        let df = df!(PRODUCT_ID_COLUMN => &["12", "P1"]).unwrap();

        let err = coerce_column_types(df, &params).unwrap_err();
        assert!(matches!(err, IngestError::Coercion { .. }));
        assert!(err.to_string().contains(PRODUCT_ID_COLUMN));
    }

    #[test]
    fn identifier_casts_to_int_when_all_values_convert() {
        let options = ProcessingOptions {
            product_id_type: IdentifierType::Int,
            ..ProcessingOptions::default()
        };
        let params = params(None, None, options);
        let df = df!(PRODUCT_ID_COLUMN => &["12", "34"]).unwrap();

        let df = coerce_column_types(df, &params).unwrap();
        assert_eq!(
            df.column(PRODUCT_ID_COLUMN).unwrap().dtype(),
            &DataType::Int64
        );
    }

    #[test]
    fn coercion_skips_unmapped_columns() {
        let params = params(None, None, ProcessingOptions::default());
        let df = df!("sku" => &["A1"], "qty" => &[3i64]).unwrap();
        let df = coerce_column_types(df, &params).unwrap();
        assert_eq!(df.get_column_names(), &["sku", "qty"]);
    }
}
