//! File I/O: trace output and recorded event logs.
//!
//! Trace documents go to `<base>.trace.json` next to the compiled unit.
//! Event logs come in three encodings, picked by extension:
//!
//! - `.json`: a pretty-printed [`EventLog`];
//! - `.cbor`: the same envelope in CBOR;
//! - `.jsonl` / `.ndjson`: one [`LoggedEvent`] per line, streamed.

use crate::log::{EventLog, LoggedEvent};
use crate::names::{DeclNames, Verbosity};
use crate::session::TraceSession;
use crate::writer::WriterStats;
use anyhow::{anyhow, bail, Context, Result};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Suffix appended to the unit's base name.
pub const TRACE_SUFFIX: &str = ".trace.json";

/// `<base>.trace.json` (the suffix is appended, not substituted).
#[must_use]
pub fn trace_path_for(base: &Path) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(TRACE_SUFFIX);
    PathBuf::from(name)
}

/// Ensure the parent directory for a file exists (no-op if none).
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

/* ---------------- Trace output ---------------- */

/// Correlate `session` and write the trace document to `path`.
pub fn write_trace_file<N: DeclNames>(
    path: &Path,
    session: TraceSession,
    names: N,
    verbosity: Verbosity,
) -> Result<WriterStats> {
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    session
        .dump(BufWriter::new(f), names, verbosity)
        .with_context(|| format!("writing trace to {}", path.display()))
}

/* ---------------- Event logs: JSON / CBOR ---------------- */

/// Read an [`EventLog`] from JSON.
pub fn read_event_log_json(path: &Path) -> Result<EventLog> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).context("deserialize JSON event log")
}

/// Write an [`EventLog`] as pretty JSON.
pub fn write_event_log_json(path: &Path, log: &EventLog) -> Result<()> {
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, log).context("serialize JSON event log")?;
    w.flush().context("flush JSON writer")?;
    Ok(())
}

/// Read an [`EventLog`] from CBOR.
pub fn read_event_log_cbor(path: &Path) -> Result<EventLog> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut rdr = BufReader::new(f);
    ciborium::de::from_reader(&mut rdr).context("deserialize CBOR event log")
}

/// Write an [`EventLog`] as CBOR.
pub fn write_event_log_cbor(path: &Path, log: &EventLog) -> Result<()> {
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(log, &mut w).context("serialize CBOR event log")?;
    w.flush().context("flush CBOR writer")?;
    Ok(())
}

/* ---------------- Event logs: JSON Lines ---------------- */

/// Owning line-by-line reader of [`LoggedEvent`]s.
///
/// Blank lines are skipped; a malformed line yields an `Err` carrying its
/// line number.
pub struct JsonlEventIter<R> {
    rdr: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> JsonlEventIter<R> {
    /// Wrap a buffered reader.
    pub fn new(rdr: R) -> Self {
        Self { rdr, buf: String::with_capacity(256), line_no: 0 }
    }
}

impl<R: BufRead> Iterator for JsonlEventIter<R> {
    type Item = Result<LoggedEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.rdr.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let line = self.buf.trim_end_matches(['\n', '\r']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(
                        serde_json::from_str(line)
                            .with_context(|| format!("parse jsonl line {}", self.line_no)),
                    );
                }
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("read line {}", self.line_no + 1)),
                    )
                }
            }
        }
    }
}

/// Open a JSONL event log for streaming.
pub fn stream_event_log_jsonl(path: &Path) -> Result<JsonlEventIter<BufReader<File>>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(JsonlEventIter::new(BufReader::new(f)))
}

/// Write events as JSON Lines.
pub fn write_event_log_jsonl(path: &Path, events: &[LoggedEvent]) -> Result<()> {
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for ev in events {
        serde_json::to_writer(&mut w, ev).context("serialize event to json")?;
        w.write_all(b"\n").context("write newline")?;
    }
    w.flush().context("flush writer")?;
    Ok(())
}

/* --------------- Auto-detect by extension --------------- */

/// Stream events from any supported log, by extension. JSON/CBOR logs are
/// loaded whole, then iterated.
pub fn stream_event_log_auto(
    path: &Path,
) -> Result<Box<dyn Iterator<Item = Result<LoggedEvent>>>> {
    match ext_lower(path).as_deref() {
        Some("jsonl" | "ndjson") => Ok(Box::new(stream_event_log_jsonl(path)?)),
        Some("json") => Ok(Box::new(read_event_log_json(path)?.events.into_iter().map(Ok))),
        Some("cbor") => Ok(Box::new(read_event_log_cbor(path)?.events.into_iter().map(Ok))),
        Some(other) => Err(anyhow!(
            "unsupported event log extension: {other} (supported: .json, .jsonl, .ndjson, .cbor)"
        )),
        None => bail!("path has no extension (expected .json, .jsonl, .ndjson or .cbor)"),
    }
}

/// Write events in the encoding matching the extension (JSON if unknown).
pub fn write_event_log_auto(path: &Path, events: Vec<LoggedEvent>) -> Result<()> {
    match ext_lower(path).as_deref() {
        Some("jsonl" | "ndjson") => write_event_log_jsonl(path, &events),
        Some("cbor") => write_event_log_cbor(path, &EventLog::new(events)),
        _ => write_event_log_json(path, &EventLog::new(events)),
    }
}

#[inline]
fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Timestamp, UnitKind};
    use std::io::Cursor;

    #[test]
    fn trace_path_appends_suffix() {
        assert_eq!(trace_path_for(Path::new("build/foo.c")), PathBuf::from("build/foo.c.trace.json"));
        assert_eq!(trace_path_for(Path::new("foo")), PathBuf::from("foo.trace.json"));
    }

    #[test]
    fn jsonl_skips_blank_lines_and_numbers_errors() {
        let src = "{\"family\":\"unit\",\"ts\":1,\"kind\":\"start\"}\n\n{\"family\":\"bogus\"}\r\n";
        let mut it = JsonlEventIter::new(Cursor::new(src));
        assert_eq!(
            it.next().unwrap().unwrap(),
            LoggedEvent::Unit { ts: Timestamp::from_nanos(1), kind: UnitKind::Start }
        );
        let err = it.next().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "parse jsonl line 3");
        assert!(it.next().is_none());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = stream_event_log_auto(Path::new("run.txt")).err().unwrap();
        assert!(err.to_string().contains("unsupported event log extension"));
    }
}
