//! Record Sources
//!
//! The engine reads rows through the [`RecordSource`] capability and is
//! agnostic to how a source is implemented. [`CsvDirectorySource`] is the
//! built-in binding for file-based legacy stores: each table is a delimited
//! file `<data_dir>/<table>.csv` with a header row, and the file's mtime
//! stands in for the table's last-modified time.

use crate::error::{source_error, MonitorError, MonitorResult};
use crate::record::{FieldValue, Record};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};

/// Exact-equality row filter, parsed from a `field=value` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub field: String,
    pub value: String,
}

impl RowFilter {
    pub fn parse(expr: &str) -> MonitorResult<Self> {
        let (field, value) = expr.split_once('=').ok_or_else(|| {
            MonitorError::Config(format!("Invalid filter '{}' (expected field=value)", expr))
        })?;
        let field = field.trim();
        if field.is_empty() {
            return Err(MonitorError::Config(format!(
                "Invalid filter '{}' (empty field name)",
                expr
            )));
        }
        Ok(Self {
            field: field.to_string(),
            value: value.trim().to_string(),
        })
    }

    pub fn matches(&self, record: &Record) -> bool {
        record
            .get(&self.field)
            .map(|v| v.canonical() == self.value)
            .unwrap_or(false)
    }
}

/// Capability to read rows of a named table.
///
/// `read_table` returns all rows (optionally filtered), `read_one` looks up
/// at most one row by exact key equality, and `last_modified` reports the
/// table's backing-storage modification time when the source can provide one.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn read_table(&self, table: &str, filter: Option<&RowFilter>)
        -> MonitorResult<Vec<Record>>;

    async fn read_one(
        &self,
        table: &str,
        key_field: &str,
        key: &FieldValue,
    ) -> MonitorResult<Option<Record>>;

    async fn last_modified(&self, table: &str) -> MonitorResult<Option<DateTime<Utc>>>;
}

/// File-based source: one CSV file per table under a data directory.
pub struct CsvDirectorySource {
    data_dir: PathBuf,
}

impl CsvDirectorySource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", table))
    }

    fn parse_rows(path: &Path, contents: &str, filter: Option<&RowFilter>) -> MonitorResult<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(contents.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| source_error(format!("{}: {}", path.display(), e)))?
            .clone();

        let mut rows = Vec::new();
        for result in reader.records() {
            let raw = result.map_err(|e| source_error(format!("{}: {}", path.display(), e)))?;
            let record: Record = headers
                .iter()
                .zip(raw.iter())
                .map(|(name, cell)| (name.to_string(), sniff_value(cell)))
                .collect();
            if filter.map(|f| f.matches(&record)).unwrap_or(true) {
                rows.push(record);
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl RecordSource for CsvDirectorySource {
    async fn read_table(
        &self,
        table: &str,
        filter: Option<&RowFilter>,
    ) -> MonitorResult<Vec<Record>> {
        let path = self.table_path(table);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| source_error(format!("{}: {}", path.display(), e)))?;
        Self::parse_rows(&path, &contents, filter)
    }

    async fn read_one(
        &self,
        table: &str,
        key_field: &str,
        key: &FieldValue,
    ) -> MonitorResult<Option<Record>> {
        let rows = self.read_table(table, None).await?;
        Ok(rows.into_iter().find(|r| r.get(key_field) == Some(key)))
    }

    async fn last_modified(&self, table: &str) -> MonitorResult<Option<DateTime<Utc>>> {
        let path = self.table_path(table);
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| source_error(format!("{}: {}", path.display(), e)))?;
        Ok(meta.modified().ok().map(DateTime::<Utc>::from))
    }
}

/// Map a raw cell to a typed scalar.
///
/// Empty cells are null. Numeric-looking cells become numbers (non-finite
/// parses like "NaN" stay text so equality stays well-behaved). Two common
/// legacy date layouts are recognized; everything else is text.
pub fn sniff_value(raw: &str) -> FieldValue {
    if raw.is_empty() {
        return FieldValue::Null;
    }
    if let Ok(n) = raw.parse::<f64>() {
        if n.is_finite() {
            return FieldValue::Number(n);
        }
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, format) {
            return FieldValue::Date(d);
        }
    }
    FieldValue::Text(raw.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory source double used by unit tests across the crate.

    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MemorySource {
        tables: Mutex<HashMap<String, Vec<Record>>>,
        failing: Mutex<HashSet<String>>,
        modified: Mutex<HashMap<String, DateTime<Utc>>>,
    }

    impl MemorySource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_table(&self, table: &str, rows: Vec<Record>) {
            self.tables.lock().unwrap().insert(table.to_string(), rows);
        }

        pub fn set_modified(&self, table: &str, at: DateTime<Utc>) {
            self.modified.lock().unwrap().insert(table.to_string(), at);
        }

        /// Make every read of `table` fail with SourceUnavailable.
        pub fn fail_table(&self, table: &str) {
            self.failing.lock().unwrap().insert(table.to_string());
        }

        pub fn heal_table(&self, table: &str) {
            self.failing.lock().unwrap().remove(table);
        }

        fn check(&self, table: &str) -> MonitorResult<()> {
            if self.failing.lock().unwrap().contains(table) {
                Err(source_error(format!("table {} is unreachable", table)))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RecordSource for MemorySource {
        async fn read_table(
            &self,
            table: &str,
            filter: Option<&RowFilter>,
        ) -> MonitorResult<Vec<Record>> {
            self.check(table)?;
            let rows = self
                .tables
                .lock()
                .unwrap()
                .get(table)
                .cloned()
                .unwrap_or_default();
            Ok(rows
                .into_iter()
                .filter(|r| filter.map(|f| f.matches(r)).unwrap_or(true))
                .collect())
        }

        async fn read_one(
            &self,
            table: &str,
            key_field: &str,
            key: &FieldValue,
        ) -> MonitorResult<Option<Record>> {
            self.check(table)?;
            let rows = self.read_table(table, None).await?;
            Ok(rows.into_iter().find(|r| r.get(key_field) == Some(key)))
        }

        async fn last_modified(&self, table: &str) -> MonitorResult<Option<DateTime<Utc>>> {
            self.check(table)?;
            Ok(self.modified.lock().unwrap().get(table).copied())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sniff_value_scalars() {
        assert_eq!(sniff_value(""), FieldValue::Null);
        assert_eq!(sniff_value("7"), FieldValue::Number(7.0));
        assert_eq!(sniff_value("7.5"), FieldValue::Number(7.5));
        assert_eq!(
            sniff_value("2024-03-01"),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(
            sniff_value("01/03/2024"),
            FieldValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(sniff_value("Acme"), FieldValue::from("Acme"));
        assert_eq!(sniff_value("NaN"), FieldValue::from("NaN"));
    }

    #[test]
    fn test_filter_parse() {
        let filter = RowFilter::parse("status=open").unwrap();
        assert_eq!(filter.field, "status");
        assert_eq!(filter.value, "open");

        assert!(RowFilter::parse("no-equals-sign").is_err());
        assert!(RowFilter::parse("=value").is_err());
    }

    #[test]
    fn test_parse_rows_with_header() {
        let csv = "id,name,issued\n1,Acme,2024-03-01\n2,Bolt,\n";
        let rows =
            CsvDirectorySource::parse_rows(Path::new("t.csv"), csv, None).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&FieldValue::Number(1.0)));
        assert_eq!(rows[0].get("name"), Some(&FieldValue::from("Acme")));
        assert_eq!(rows[1].get("issued"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_parse_rows_applies_filter() {
        let csv = "id,status\n1,open\n2,closed\n3,open\n";
        let filter = RowFilter::parse("status=open").unwrap();
        let rows =
            CsvDirectorySource::parse_rows(Path::new("t.csv"), csv, Some(&filter)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("id"), Some(&FieldValue::Number(3.0)));
    }

    #[tokio::test]
    async fn test_read_table_from_directory() {
        let dir = std::env::temp_dir().join(format!("tablewatch-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("orders.csv"), "id,total\n1,10.5\n")
            .await
            .unwrap();

        let source = CsvDirectorySource::new(&dir);
        let rows = source.read_table("orders", None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("total"), Some(&FieldValue::Number(10.5)));

        let modified = source.last_modified("orders").await.unwrap();
        assert!(modified.is_some());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_table_is_source_unavailable() {
        let source = CsvDirectorySource::new("/nonexistent-tablewatch-dir");
        let err = source.read_table("orders", None).await.unwrap_err();
        assert!(matches!(err, MonitorError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_read_one_matches_by_key() {
        let dir = std::env::temp_dir().join(format!("tablewatch-test-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("customers.csv"), "code,name\n7,Acme\n9,Bolt\n")
            .await
            .unwrap();

        let source = CsvDirectorySource::new(&dir);
        let found = source
            .read_one("customers", "code", &FieldValue::Number(7.0))
            .await
            .unwrap();
        assert_eq!(found.unwrap().get("name"), Some(&FieldValue::from("Acme")));

        let missing = source
            .read_one("customers", "code", &FieldValue::Number(8.0))
            .await
            .unwrap();
        assert!(missing.is_none());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
