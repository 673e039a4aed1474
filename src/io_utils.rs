//! CSV export of fetched tables.
//!
//! Output goes to a file or, for `-` or no path, to stdout. Non-UTF-8 output
//! encodings are transcoded through `encoding_rs`.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::table::Table;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn open_csv_writer(
    path: Option<&Path>,
    encoding: &'static Encoding,
) -> Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout()),
    };
    let writer: Box<dyn Write> = if encoding == UTF_8 {
        base
    } else {
        Box::new(TranscodingWriter::new(base, encoding))
    };
    Ok(csv::WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(writer))
}

/// Writes the header and every row; null cells become empty fields.
pub fn write_table<W: Write>(writer: &mut csv::Writer<W>, table: &Table) -> Result<()> {
    writer
        .write_record(table.columns())
        .context("Writing CSV header")?;
    for (idx, row) in table.display_rows().iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("Writing row {}", idx + 1))?;
    }
    writer.flush().context("Flushing CSV output")?;
    Ok(())
}

pub fn export_table(table: &Table, path: Option<&Path>, encoding: &'static Encoding) -> Result<()> {
    let mut writer = open_csv_writer(path, encoding)?;
    write_table(&mut writer, table)
}

/// Buffers UTF-8 from the CSV writer and re-encodes complete characters.
struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    pending: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            pending: Vec::new(),
        }
    }

    fn drain_complete(&mut self, at_end: bool) -> io::Result<()> {
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_some() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid UTF-8 sequence in output stream",
                ));
            }
            Err(err) => err.valid_up_to(),
        };
        if at_end && valid_up_to < self.pending.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete UTF-8 sequence at end of output stream",
            ));
        }
        if valid_up_to == 0 {
            return Ok(());
        }
        let complete: Vec<u8> = self.pending.drain(..valid_up_to).collect();
        let text = std::str::from_utf8(&complete)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let (encoded, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Output contains characters not representable in {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(&encoded)
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_complete(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_complete(true)?;
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use std::fs;

    fn sample() -> Table {
        Table::from_rows(
            vec!["borough".to_string(), "note".to_string()],
            vec![
                vec![Some(Value::from("Manhattan")), Some(Value::from("café, rooftop"))],
                vec![Some(Value::from("Bronx")), None],
            ],
        )
    }

    #[test]
    fn export_writes_header_and_empty_nulls() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.csv");
        export_table(&sample(), Some(&path), UTF_8).expect("export");
        let written = fs::read_to_string(&path).expect("read output");
        assert_eq!(
            written,
            "borough,note\nManhattan,\"café, rooftop\"\nBronx,\n"
        );
    }

    #[test]
    fn export_transcodes_to_requested_encoding() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out.csv");
        let encoding = resolve_encoding(Some("windows-1252")).expect("known label");
        export_table(&sample(), Some(&path), encoding).expect("export");
        let bytes = fs::read(&path).expect("read output");
        assert!(bytes.contains(&0xE9));
        let (decoded, _, had_errors) = encoding.decode(&bytes);
        assert!(!had_errors);
        assert!(decoded.contains("café"));
    }

    #[test]
    fn unknown_encoding_label_is_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
    }
}
