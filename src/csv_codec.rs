// src/csv_codec.rs
//! Delimited-text codec for lead files, on top of the `csv` crate.
//!
//! The reader is flexible about row width; a post-pass drops blank rows, trims
//! values and pads short rows with empty strings. The writer quotes only the
//! cells that need it.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};

/// One header-keyed row. Values are trimmed.
pub type CsvRecord = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub records: Vec<CsvRecord>,
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

/// Parse delimited text into headers + header-keyed records.
///
/// `\n`, `\r\n` and a lone `\r` all end a row. Fewer than two non-blank rows
/// yields an empty result, not an error. Duplicate header names keep the
/// right-most column's value.
pub fn parse(text: &str) -> ParsedCsv {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    // Input is already UTF-8, so records never fail to decode.
    let mut rows = reader
        .records()
        .filter_map(|r| r.ok())
        .filter(|r| !is_blank(r));

    let Some(header_row) = rows.next() else {
        return ParsedCsv::default();
    };
    let body: Vec<StringRecord> = rows.collect();
    if body.is_empty() {
        return ParsedCsv::default();
    }

    let headers: Vec<String> = header_row.iter().map(|h| h.trim().to_string()).collect();
    let records = body
        .iter()
        .map(|line| {
            headers
                .iter()
                .enumerate()
                .map(|(idx, h)| {
                    let v = line.get(idx).map(str::trim).unwrap_or_default();
                    (h.clone(), v.to_string())
                })
                .collect::<CsvRecord>()
        })
        .collect();

    ParsedCsv { headers, records }
}

/// Header line followed by one line per row, `\n`-separated, no trailing newline.
pub fn serialize<H, R, C>(headers: &[H], rows: R) -> Result<String>
where
    H: AsRef<[u8]>,
    R: IntoIterator,
    R::Item: IntoIterator<Item = C>,
    C: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(headers).context("writing csv header")?;
    for row in rows {
        writer.write_record(row).context("writing csv row")?;
    }
    let bytes = writer.into_inner().context("flushing csv writer")?;
    let mut text = String::from_utf8(bytes).context("csv output is not utf-8")?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}
