//! Header-keyed reading of delimited definition files.
//!
//! The first row of a file is its header; every following row is zipped
//! against the header into a key→value record with surrounding whitespace
//! trimmed from both sides. Reading is sequential and non-restartable: it
//! ends at end-of-file or at the first malformed row.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};

/// A single data row keyed by header column name.
pub type Record = HashMap<String, String>;

/// Reads a delimited file as a sequence of header-keyed records.
pub struct RecordReader<R: Read> {
    header: Vec<String>,
    rows: csv::Reader<R>,
}

impl RecordReader<File> {
    /// Open a file and read its header row.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open definition file: {}", path.display()))?;
        Self::new(file)
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap a reader and consume its header row.
    ///
    /// The default row terminator treats `\r`, `\n`, and `\r\n` alike, so
    /// files with bare carriage returns still delimit correctly.
    pub fn new(reader: R) -> Result<Self> {
        let mut rows = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let header = rows
            .headers()
            .context("failed to read header row")?
            .iter()
            .map(str::to_string)
            .collect();

        Ok(Self { header, rows })
    }

    /// The trimmed header columns, in file order.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Read the next data row, zipped against the header.
    ///
    /// Rows shorter than the header produce records with the trailing keys
    /// absent; extra values beyond the header are dropped.
    pub fn next_record(&mut self) -> Option<Result<Record>> {
        let mut row = csv::StringRecord::new();

        match self.rows.read_record(&mut row) {
            Ok(true) => {
                let record = self
                    .header
                    .iter()
                    .zip(row.iter())
                    .map(|(key, value)| (key.clone(), value.to_string()))
                    .collect();
                Some(Ok(record))
            }
            Ok(false) => None,
            Err(e) => Some(Err(e).context("malformed row")),
        }
    }

    /// Read every remaining row.
    ///
    /// Returns an error on the first malformed row; callers treat that as
    /// the whole file being unreadable and skip it.
    pub fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();

        while let Some(record) = self.next_record() {
            records.push(record?);
        }

        Ok(records)
    }
}
