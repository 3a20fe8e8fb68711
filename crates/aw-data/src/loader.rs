use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use aw_types::{AwError, AwResult, DataError, LABEL_COLUMN};

/// Header the raw transaction exports use for the label.
const RAW_LABEL_HEADER: &str = "Is Laundering";

/// A headered table of raw string cells, as read from disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// All cells of one column, in row order.
    pub fn column(&self, name: &str) -> AwResult<Vec<&str>> {
        let idx = self.column_index(name).ok_or_else(|| DataError::ColumnNotFound {
            column: name.to_string(),
        })?;
        (0..self.rows.len()).map(|r| self.cell(r, idx)).collect()
    }

    /// Cell `idx` of row `r`. A row shorter than the header is a format error.
    pub fn cell(&self, r: usize, idx: usize) -> AwResult<&str> {
        let row = self.rows.get(r).ok_or_else(|| DataError::InvalidFormat {
            message: format!("row {r} out of range for {} rows", self.rows.len()),
        })?;
        row.get(idx).map(String::as_str).ok_or_else(|| {
            DataError::InvalidFormat {
                message: format!(
                    "row {r} has {} fields, header has {}",
                    row.len(),
                    self.headers.len()
                ),
            }
            .into()
        })
    }
}

/// Normalise header names: trims, renames the label column and suffixes
/// repeated names (`Account`, `Account.1`, ...).
fn normalise_headers(raw: &csv::StringRecord) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.iter()
        .map(|h| {
            let h = h.trim();
            let base = if h == RAW_LABEL_HEADER { LABEL_COLUMN } else { h }.to_string();
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// CSV loader for transaction exports.
#[derive(Debug, Clone)]
pub struct TransactionLoader {
    delimiter: u8,
    max_rows: Option<usize>,
}

impl Default for TransactionLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionLoader {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            max_rows: None,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Stop after this many data rows.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Load a headered CSV file.
    pub fn load_csv<P: AsRef<Path>>(&self, path: P) -> AwResult<RawTable> {
        let path = path.as_ref();
        tracing::info!("Loading transactions from: {}", path.display());

        if !path.exists() {
            return Err(DataError::SourceNotFound(path.display().to_string()).into());
        }
        let file = std::fs::File::open(path)?;
        let table = self.load_reader(file)?;

        tracing::info!(
            "Loaded {} rows x {} columns from {}",
            table.n_rows(),
            table.headers.len(),
            path.display()
        );
        Ok(table)
    }

    /// Load a file on the blocking pool so async callers are not stalled.
    pub async fn load_csv_async(&self, path: PathBuf) -> AwResult<RawTable> {
        let loader = self.clone();
        tokio::task::spawn_blocking(move || loader.load_csv(path))
            .await
            .map_err(|e| AwError::Internal(format!("CSV loader task failed: {e}")))?
    }

    /// Load headered CSV from any reader.
    pub fn load_reader<R: Read>(&self, reader: R) -> AwResult<RawTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = normalise_headers(rdr.headers().map_err(|e| DataError::LoadingFailed {
            message: format!("Failed to read CSV headers: {e}"),
        })?);
        tracing::debug!("CSV headers: {:?}", headers);

        let mut rows = Vec::new();
        for (line_num, result) in rdr.records().enumerate() {
            if self.max_rows.is_some_and(|max| rows.len() >= max) {
                break;
            }
            let record = result.map_err(|e| DataError::LoadingFailed {
                message: format!("Failed to read CSV record at line {}: {e}", line_num + 2),
            })?;
            if record.len() != headers.len() {
                return Err(DataError::ParseError {
                    message: format!(
                        "CSV record at line {} has {} fields, expected {}",
                        line_num + 2,
                        record.len(),
                        headers.len()
                    ),
                }
                .into());
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(RawTable { headers, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
Timestamp,From Bank,Account,To Bank,Account,Amount Paid,Payment Format,Is Laundering
2022/09/01 00:20,10,8000EBD30,10,8000EBD30,3697.34,Reinvestment,0
2022/09/01 00:20,3208,8000F4580,1,8000F5340,0.01,Cheque,0
2022/09/01 00:00,3209,8000F4670,3209,8000F4670,14675.57,ACH,1
";

    #[test]
    fn headers_are_normalised() {
        let table = TransactionLoader::new().load_reader(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.headers[2], "Account");
        assert_eq!(table.headers[4], "Account.1");
        assert_eq!(table.headers.last().unwrap(), LABEL_COLUMN);
        assert_eq!(table.column(LABEL_COLUMN).unwrap(), vec!["0", "0", "1"]);
        assert!(table.column("Missing").is_err());
    }

    #[test]
    fn max_rows_truncates() {
        let table = TransactionLoader::new()
            .with_max_rows(2)
            .load_reader(SAMPLE.as_bytes())
            .unwrap();
        assert_eq!(table.n_rows(), 2);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let ragged = "a,b\n1,2\n3\n";
        let result = TransactionLoader::new().load_reader(ragged.as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn short_rows_in_a_built_table_are_format_errors() {
        let table = RawTable::new(
            vec!["Amount".into(), LABEL_COLUMN.into()],
            vec![vec!["1.0".into(), "0".into()], vec!["2.0".into()]],
        );
        assert_eq!(table.cell(0, 1).unwrap(), "0");
        assert!(matches!(
            table.column(LABEL_COLUMN),
            Err(AwError::Data(DataError::InvalidFormat { .. }))
        ));
        assert_eq!(table.column("Amount").unwrap(), vec!["1.0", "2.0"]);
        assert!(table.cell(5, 0).is_err());
    }

    #[test]
    fn missing_file_is_source_not_found() {
        let err = TransactionLoader::new().load_csv("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, AwError::Data(DataError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn loads_from_disk_async() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let table = TransactionLoader::new()
            .load_csv_async(file.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column("Payment Format").unwrap()[2], "ACH");
    }
}
