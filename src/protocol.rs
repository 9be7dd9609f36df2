//! Line protocol spoken by a worker process on stdout.
//!
//! ```text
//! ROW\t<path>\t<size>\t<mtime or ->
//! TOTAL\t<bytes>
//! ```
//!
//! Backslash, tab and newline inside a path are escaped so any filename
//! fits on one line. Lines that are not records are ignored by readers.

use std::io::{self, BufRead, Write};

use crate::cleaner::{ProgressRow, RowSink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Row(ProgressRow),
    Total(u64),
}

fn escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '\t' => out.push_str(r"\t"),
            '\n' => out.push_str(r"\n"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

pub fn encode_row(row: &ProgressRow) -> String {
    format!(
        "ROW\t{}\t{}\t{}",
        escape(&row.path),
        row.size_bytes,
        row.modified
    )
}

pub fn encode_total(total: u64) -> String {
    format!("TOTAL\t{total}")
}

/// Decode one line. Anything that is not a well-formed record is `None`.
/// An unparsable size in an otherwise valid row decodes as 0.
pub fn decode_line(line: &str) -> Option<Record> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    if let Some(rest) = line.strip_prefix("ROW\t") {
        let mut fields = rest.splitn(3, '\t');
        let (path, size, modified) = (fields.next()?, fields.next()?, fields.next()?);
        return Some(Record::Row(ProgressRow {
            path: unescape(path),
            size_bytes: size.parse().unwrap_or(0),
            modified: modified.to_string(),
        }));
    }
    if let Some(rest) = line.strip_prefix("TOTAL\t") {
        let total = rest.split('\t').next()?;
        return total.parse().ok().map(Record::Total);
    }
    None
}

/// Feed every row from `reader` to `sink` and return the last `TOTAL` seen,
/// if any. Stops early when `keep_going` returns false.
pub fn relay(
    reader: impl BufRead,
    sink: &dyn RowSink,
    mut keep_going: impl FnMut() -> bool,
) -> io::Result<Option<u64>> {
    let mut total = None;
    for line in reader.lines() {
        let line = line?;
        match decode_line(&line) {
            Some(Record::Row(row)) => {
                if keep_going() {
                    sink.emit(row);
                }
            }
            Some(Record::Total(t)) => total = Some(t),
            None => {}
        }
    }
    Ok(total)
}

/// Writes rows to a stream as protocol lines, flushing after each one so
/// the reader sees progress live.
pub struct LineSink<W: Write + Send> {
    out: std::sync::Mutex<W>,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: std::sync::Mutex::new(out),
        }
    }

    pub fn write_total(&self, total: u64) -> io::Result<()> {
        self.write_line(&encode_total(total))
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::other("output lock poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> RowSink for LineSink<W> {
    fn emit(&self, row: ProgressRow) {
        // a closed pipe means the reader went away; nothing left to report to
        let _ = self.write_line(&encode_row(&row));
    }
}
