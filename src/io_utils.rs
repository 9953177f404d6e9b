//! I/O utilities for CSV ingestion, CSV/binary table output, and encodings.
//!
//! All file I/O in orders-etl flows through this module:
//!
//! - **Ingestion**: [`read_csv_table`] decodes every field via `encoding_rs`
//!   and maps configured null tokens to null, producing an all-string table.
//! - **CSV output**: [`write_csv_table`] renders nulls as empty fields.
//! - **Binary tables**: processed tables persist as versioned `bincode`
//!   blobs of the columnar [`Table`] model.
//! - **Delimiters**: extension-based detection (`.tsv` → tab) with override.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::table::{Column, Table};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const TABLE_FORMAT_VERSION: u32 = 1;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
) -> Result<Vec<String>>
where
    R: Read,
{
    let headers = reader.byte_headers()?.clone();
    decode_record(&headers, encoding)
}

/// Options controlling raw CSV ingestion.
#[derive(Debug, Clone, Copy)]
pub struct CsvReadOptions<'a> {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub null_tokens: &'a [&'a str],
}

impl<'a> CsvReadOptions<'a> {
    pub fn new(null_tokens: &'a [&'a str]) -> Self {
        Self {
            delimiter: DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
            null_tokens,
        }
    }

    fn is_null(&self, value: &str) -> bool {
        let trimmed = value.trim();
        self.null_tokens.iter().any(|token| *token == trimmed)
    }
}

/// Reads a CSV file into an all-string table, mapping null tokens to null.
pub fn read_csv_table(path: &Path, options: &CsvReadOptions<'_>) -> Result<Table> {
    let reader = open_csv_reader_from_path(path, options.delimiter)?;
    parse_csv(reader, options).with_context(|| format!("Reading CSV {path:?}"))
}

/// Parses CSV text already held in memory.
pub fn parse_csv_str(text: &str, options: &CsvReadOptions<'_>) -> Result<Table> {
    parse_csv(open_csv_reader(text.as_bytes(), options.delimiter), options)
}

fn parse_csv<R: Read>(mut reader: csv::Reader<R>, options: &CsvReadOptions<'_>) -> Result<Table> {
    let headers = reader_headers(&mut reader, options.encoding)?;
    if headers.is_empty() {
        bail!("CSV input has no header row");
    }
    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        for (column, value) in cells.iter_mut().zip(decoded) {
            column.push((!options.is_null(&value)).then_some(value));
        }
    }
    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column::from_strings(name, values))
        .collect();
    Table::from_columns(columns)
}

pub fn open_csv_writer(path: &Path) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = if is_dash(path) {
        Box::new(std::io::stdout())
    } else {
        Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
        ))
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(DEFAULT_CSV_DELIMITER)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn write_csv_table(table: &Table, path: &Path) -> Result<()> {
    let mut writer = open_csv_writer(path)?;
    writer
        .write_record(table.headers())
        .context("Writing CSV headers")?;
    for row in 0..table.row_count() {
        writer
            .write_record(table.row_strings(row))
            .with_context(|| format!("Writing row {}", row + 2))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

#[derive(Serialize)]
struct StoredTableRef<'a> {
    version: u32,
    table: &'a Table,
}

#[derive(Deserialize)]
struct StoredTable {
    version: u32,
    table: Table,
}

pub fn write_table_binary(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {parent:?}"))?;
    }
    let file = File::create(path).with_context(|| format!("Creating table file {path:?}"))?;
    let mut writer = BufWriter::new(file);
    let stored = StoredTableRef {
        version: TABLE_FORMAT_VERSION,
        table,
    };
    bincode::serde::encode_into_std_write(&stored, &mut writer, bincode::config::standard())
        .context("Encoding table")?;
    writer.flush().context("Flushing table file")?;
    Ok(())
}

pub fn read_table_binary(path: &Path) -> Result<Table> {
    let bytes = fs::read(path).with_context(|| format!("Opening table file {path:?}"))?;
    let (stored, _): (StoredTable, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .with_context(|| format!("Decoding table file {path:?}"))?;
    if stored.version != TABLE_FORMAT_VERSION {
        bail!(
            "Unsupported table format version {} (expected {TABLE_FORMAT_VERSION})",
            stored.version
        );
    }
    Ok(stored.table)
}

/// Loads either a binary table (`.tbl`) or a CSV file as an all-string table.
pub fn read_any_table(path: &Path, null_tokens: &[&str]) -> Result<Table> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tbl") => read_table_binary(path),
        _ => {
            let mut options = CsvReadOptions::new(null_tokens);
            options.delimiter = resolve_input_delimiter(path, None);
            read_csv_table(path, &options)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NULL_TOKENS;
    use crate::data::Value;
    use tempfile::tempdir;

    #[test]
    fn null_tokens_become_null_and_identifiers_stay_strings() {
        let text = "order_id,amount\n0001,NA\n0002, N/A \n0003,null\n0004,12.5\n0005,\n";
        let table = parse_csv_str(text, &CsvReadOptions::new(DEFAULT_NULL_TOKENS)).unwrap();
        assert_eq!(table.row_count(), 5);
        let ids = table.column("order_id").unwrap();
        assert_eq!(ids.get(0), Some(&Value::String("0001".into())));
        assert_eq!(table.column("amount").unwrap().null_count(), 4);
    }

    #[test]
    fn custom_null_tokens_replace_defaults() {
        let text = "status\nNA\n-\n";
        let table = parse_csv_str(text, &CsvReadOptions::new(&["-"])).unwrap();
        let status = table.column("status").unwrap();
        assert_eq!(status.get(0), Some(&Value::String("NA".into())));
        assert_eq!(status.get(1), None);
    }

    #[test]
    fn binary_tables_round_trip() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("t.tbl");
        let table = Table::from_columns(vec![
            Column::from_strings("id", [Some("a"), None]),
            Column::from_floats("x", [Some(1.5), None]),
        ])
        .unwrap();
        write_table_binary(&table, &path).unwrap();
        assert_eq!(read_table_binary(&path).unwrap(), table);
    }

    #[test]
    fn tsv_extension_selects_tab_delimiter() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), Some(b';')), b';');
    }
}
