//! CSV file data adapter.
//!
//! One file per symbol, `<base_path>/<SYMBOL>.csv`, with a header row. The
//! first column is the `YYYY-MM-DD` date; every other column is numeric and
//! becomes a frame column under its lowercased header name. Empty cells are
//! read as NaN.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::domain::error::RuletraderError;
use crate::domain::frame::HistoricalFrame;
use crate::domain::signals::{ENTRY_CHANNEL, EXIT_CHANNEL, SignalTable};
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn data_err(reason: String) -> RuletraderError {
    RuletraderError::Data { reason }
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<csv::StringRecord>), RuletraderError> {
    let content = fs::read_to_string(path)
        .map_err(|e| data_err(format!("failed to read {}: {}", path.display(), e)))?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| data_err(format!("{}: CSV header error: {}", path.display(), e)))?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    if headers.first().map(String::as_str) != Some("date") {
        return Err(data_err(format!(
            "{}: first column must be 'date'",
            path.display()
        )));
    }

    let records = rdr
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| data_err(format!("{}: CSV parse error: {}", path.display(), e)))?;
    Ok((headers, records))
}

fn parse_date(value: &str, path: &Path, line: usize) -> Result<NaiveDate, RuletraderError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        data_err(format!(
            "{}: row {}: invalid date '{}': {}",
            path.display(),
            line,
            value,
            e
        ))
    })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" | "" => Some(false),
        _ => None,
    }
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Load an externally produced `date,entry,exit` signal file.
    ///
    /// Missing `entry` or `exit` columns are a validation error; flag cells
    /// accept `true/false`, `yes/no`, `1/0`, and empty for false.
    pub fn read_signals(path: &Path) -> Result<SignalTable, RuletraderError> {
        let (headers, records) = read_csv(path)?;

        let mut index = Vec::with_capacity(records.len());
        let mut channels: BTreeMap<String, Vec<bool>> = BTreeMap::new();
        let wanted: Vec<(usize, &str)> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.as_str() == ENTRY_CHANNEL || h.as_str() == EXIT_CHANNEL)
            .map(|(i, h)| (i, h.as_str()))
            .collect();

        for (row, record) in records.iter().enumerate() {
            let line = row + 2;
            index.push(parse_date(record.get(0).unwrap_or(""), path, line)?);
            for &(col, name) in &wanted {
                let cell = record.get(col).unwrap_or("");
                let flag = parse_flag(cell).ok_or_else(|| {
                    data_err(format!(
                        "{}: row {}: invalid {} flag '{}'",
                        path.display(),
                        line,
                        name,
                        cell
                    ))
                })?;
                channels.entry(name.to_string()).or_default().push(flag);
            }
        }

        if records.is_empty() {
            for &(_, name) in &wanted {
                channels.entry(name.to_string()).or_default();
            }
        }

        SignalTable::from_channels(index, channels)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_frame(
        &self,
        symbol: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<HistoricalFrame, RuletraderError> {
        let path = self.csv_path(symbol);
        let (headers, records) = read_csv(&path)?;

        let mut rows: Vec<(NaiveDate, Vec<f64>)> = Vec::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            let line = row + 2;
            let date = parse_date(record.get(0).unwrap_or(""), &path, line)?;
            if start_date.is_some_and(|s| date < s) || end_date.is_some_and(|e| date > e) {
                continue;
            }

            let mut values = Vec::with_capacity(headers.len() - 1);
            for (col, name) in headers.iter().enumerate().skip(1) {
                let cell = record.get(col).unwrap_or("");
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse::<f64>().map_err(|e| {
                        data_err(format!(
                            "{}: row {}: invalid {} value '{}': {}",
                            path.display(),
                            line,
                            name,
                            cell,
                            e
                        ))
                    })?
                };
                values.push(value);
            }
            rows.push((date, values));
        }

        rows.sort_by_key(|(date, _)| *date);

        let index = rows.iter().map(|(date, _)| *date).collect();
        let columns = headers
            .iter()
            .enumerate()
            .skip(1)
            .map(|(col, name)| {
                let values: Vec<f64> = rows.iter().map(|(_, v)| v[col - 1]).collect();
                (name.clone(), values)
            })
            .collect();

        let frame = HistoricalFrame::new(index, columns)
            .map_err(|e| data_err(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(symbol, bars = frame.len(), path = %path.display(), "loaded frame");
        Ok(frame)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RuletraderError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            data_err(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| data_err(format!("directory entry error: {}", e)))?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(".csv") {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume,vwap\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000,112.5\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000,101.0\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000,\n";

        fs::write(path.join("BHP.csv"), csv_content).unwrap();
        fs::write(path.join("CBA.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "not data").unwrap();
        fs::write(path.join("BAD.csv"), "date,close\n2024-01-01,1.0\n").unwrap();

        (dir, path)
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn fetch_frame_returns_sorted_columns() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let frame = adapter.fetch_frame("BHP", None, None).unwrap();

        assert_eq!(frame.len(), 3);
        assert_eq!(frame.index(), &[d(15), d(16), d(17)]);
        assert_eq!(frame.column("open").unwrap()[0], 100.0);
        assert_eq!(frame.column("high").unwrap()[0], 110.0);
        assert_eq!(frame.column("low").unwrap()[0], 90.0);
        assert_eq!(frame.column("close").unwrap()[0], 105.0);
        assert_eq!(frame.column("volume").unwrap()[0], 50000.0);
    }

    #[test]
    fn fetch_frame_keeps_extra_columns() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let frame = adapter.fetch_frame("BHP", None, None).unwrap();
        let vwap = frame.column("vwap").unwrap();
        assert_eq!(vwap[0], 101.0);
        assert!(vwap[1].is_nan());
    }

    #[test]
    fn fetch_frame_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let frame = adapter.fetch_frame("BHP", Some(d(16)), Some(d(16))).unwrap();
        assert_eq!(frame.index(), &[d(16)]);

        let frame = adapter.fetch_frame("BHP", Some(d(16)), None).unwrap();
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn fetch_frame_header_only_is_empty() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let frame = adapter.fetch_frame("CBA", None, None).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn fetch_frame_errors_for_missing_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_frame("XYZ", None, None).unwrap_err();
        assert!(matches!(err, RuletraderError::Data { .. }));
    }

    #[test]
    fn fetch_frame_errors_for_missing_ohlcv_column() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_frame("BAD", None, None).unwrap_err();
        assert!(err.to_string().contains("missing required column"));
    }

    #[test]
    fn fetch_frame_errors_for_bad_number() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("X.csv"),
            "date,open,high,low,close,volume\n2024-01-01,1,1,1,abc,1\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter.fetch_frame("X", None, None).unwrap_err();
        assert!(err.to_string().contains("invalid close value"));
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let symbols = adapter.list_symbols().unwrap();
        assert_eq!(symbols, vec!["BAD", "BHP", "CBA"]);
    }

    #[test]
    fn read_signals_parses_flags() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signals.csv");
        fs::write(
            &path,
            "date,entry,exit,note\n2024-01-15,true,0,x\n2024-01-16,no,1,y\n2024-01-17,,FALSE,z\n",
        )
        .unwrap();

        let table = CsvAdapter::read_signals(&path).unwrap();
        assert_eq!(table.index(), &[d(15), d(16), d(17)]);
        assert_eq!(table.entry(), &[true, false, false]);
        assert_eq!(table.exit(), &[false, true, false]);
    }

    #[test]
    fn read_signals_requires_channels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signals.csv");
        fs::write(&path, "date,entry\n2024-01-15,true\n").unwrap();

        let err = CsvAdapter::read_signals(&path).unwrap_err();
        assert!(matches!(err, RuletraderError::SignalValidation { .. }));
    }

    #[test]
    fn read_signals_rejects_bad_flag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signals.csv");
        fs::write(&path, "date,entry,exit\n2024-01-15,maybe,false\n").unwrap();

        let err = CsvAdapter::read_signals(&path).unwrap_err();
        assert!(err.to_string().contains("invalid entry flag"));
    }
}
