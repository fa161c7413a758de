//! Chrome trace-event writer.
//!
//! Streams a single JSON array of complete (`"ph":"X"`) and instant
//! (`"ph":"i"`) events. The array is opened by [`TraceWriter::open`] and
//! closed by [`TraceWriter::close`] (or on drop), so the document is
//! well-formed whatever number of entries was written.
//!
//! Entry shape:
//!
//! ```text
//! {"name":"parse","ts":12.345,"ph":"X","dur":6.001,"pid":0,"tid":0,"args":{"function":"main"}}
//! ```
//!
//! `ts` is relative to the run epoch; `ts` and `dur` are microseconds with a
//! truncated three-digit fraction (nanosecond resolution).
//!
//! I/O errors never interrupt correlation: the first one is latched, later
//! writes are skipped, and [`TraceWriter::close`] reports it. Nothing is
//! written once the array is closed.

use crate::event::{
    EventRecord, IncludeEvent, IncludeKind, ParseEvent, ParseKind, PassEvent, PassKind,
    Timestamp, UnitEvent, UnitKind,
};
use crate::names::{escape_json, DeclNameCache, DeclNames, Verbosity};
use crate::tracker::OutcomeSink;
use std::fmt;
use std::io::{self, Write};
use tracing::debug;

/// Microsecond rendering of a signed nanosecond count: `<us>.<ns:03>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Micros(pub i64);

impl fmt::Display for Micros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:03}", abs / 1000, abs % 1000)
    }
}

/// Counters reported when the document is closed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Entries written to the document.
    pub entries: usize,
    /// Matched pairs received.
    pub matches: usize,
    /// Mismatches received (rendered or not).
    pub mismatches: usize,
}

/// Array framing and entry serialization over the output sink.
struct Document<W> {
    out: W,
    epoch: Timestamp,
    stats: WriterStats,
    error: Option<io::Error>,
    closed: bool,
}

impl<W: Write> Document<W> {
    fn latch(&mut self, res: io::Result<()>) {
        if let Err(e) = res {
            debug!(error = %e, "trace sink failed; further entries are skipped");
            self.error.get_or_insert(e);
        }
    }

    fn entry(&mut self, name: &str, start: Timestamp, end: Timestamp, args: &[(&str, &str)]) {
        if self.closed || self.error.is_some() {
            return;
        }
        let first = self.stats.entries == 0;
        let ts = Micros(start.nanos_since(self.epoch));
        let dur = end.nanos_since(start);
        let res = write_entry(&mut self.out, first, name, ts, dur, args);
        if res.is_ok() {
            self.stats.entries += 1;
        }
        self.latch(res);
    }
}

fn write_entry<W: Write>(
    out: &mut W,
    first: bool,
    name: &str,
    ts: Micros,
    dur: i64,
    args: &[(&str, &str)],
) -> io::Result<()> {
    if !first {
        out.write_all(b",")?;
    }
    write!(out, "{{\"name\":\"{name}\",\"ts\":{ts},")?;
    if dur > 0 {
        write!(out, "\"ph\":\"X\",\"dur\":{},", Micros(dur))?;
    } else {
        out.write_all(b"\"ph\":\"i\",")?;
    }
    out.write_all(b"\"pid\":0,\"tid\":0")?;
    if !args.is_empty() {
        out.write_all(b",\"args\":{")?;
        for (i, (key, value)) in args.iter().enumerate() {
            if i > 0 {
                out.write_all(b",")?;
            }
            write!(out, "\"{key}\":\"{value}\"")?;
        }
        out.write_all(b"}")?;
    }
    out.write_all(b"}")
}

/// Renders correlation outcomes as Chrome trace events.
///
/// Implements [`OutcomeSink`] for every event family, so it can be handed to
/// an [`EventTracker`](crate::tracker::EventTracker) directly.
pub struct TraceWriter<W: Write, N: DeclNames> {
    doc: Document<W>,
    names: DeclNameCache<N>,
}

impl<W: Write, N: DeclNames> TraceWriter<W, N> {
    /// Start a document on `out`; timestamps are rendered relative to `epoch`.
    pub fn open(out: W, epoch: Timestamp, names: N, verbosity: Verbosity) -> Self {
        let mut doc = Document {
            out,
            epoch,
            stats: WriterStats::default(),
            error: None,
            closed: false,
        };
        let res = doc.out.write_all(b"[");
        doc.latch(res);
        Self { doc, names: DeclNameCache::new(names, verbosity) }
    }

    /// Render an arbitrary named interval (used for self-instrumentation).
    pub fn render_named_interval(&mut self, name: &str, start: Timestamp, end: Timestamp) {
        self.doc.entry(&escape_json(name), start, end, &[]);
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> WriterStats {
        self.doc.stats
    }

    /// Terminate the array and flush. Idempotent; every call after a sink
    /// failure reports the first error, which stays latched.
    pub fn close(&mut self) -> io::Result<WriterStats> {
        if !self.doc.closed {
            self.doc.closed = true;
            if self.doc.error.is_none() {
                let res = self.doc.out.write_all(b"]").and_then(|()| self.doc.out.flush());
                self.doc.latch(res);
            }
        }
        match &self.doc.error {
            Some(e) => Err(io::Error::new(e.kind(), e.to_string())),
            None => Ok(self.doc.stats),
        }
    }

    fn instant(&mut self, name: &str, at: Timestamp, args: &[(&str, &str)]) {
        self.doc.stats.mismatches += 1;
        self.doc.entry(name, at, at, args);
    }
}

impl<W: Write, N: DeclNames> Drop for TraceWriter<W, N> {
    fn drop(&mut self) {
        if !self.doc.closed {
            let _ = self.close();
        }
    }
}

impl<W: Write, N: DeclNames> OutcomeSink<UnitEvent> for TraceWriter<W, N> {
    fn on_match(&mut self, start: EventRecord<UnitEvent>, end: EventRecord<UnitEvent>) {
        self.doc.stats.matches += 1;
        self.doc.entry("unit", start.timestamp, end.timestamp, &[]);
    }

    fn on_mismatch(&mut self, orphan: EventRecord<UnitEvent>) {
        let name = match orphan.event.kind {
            UnitKind::Start => "unit (start)",
            UnitKind::End => "unit (end)",
        };
        self.instant(name, orphan.timestamp, &[]);
    }
}

impl<W: Write, N: DeclNames> OutcomeSink<IncludeEvent> for TraceWriter<W, N> {
    fn on_match(&mut self, start: EventRecord<IncludeEvent>, end: EventRecord<IncludeEvent>) {
        self.doc.stats.matches += 1;
        let file = escape_json(&start.event.filename);
        self.doc
            .entry("include", start.timestamp, end.timestamp, &[("file", &file)]);
    }

    fn on_mismatch(&mut self, orphan: EventRecord<IncludeEvent>) {
        match orphan.event.kind {
            IncludeKind::Enter => {
                let file = escape_json(&orphan.event.filename);
                self.instant("include (enter)", orphan.timestamp, &[("file", &file)]);
            }
            IncludeKind::Leave => self.instant("include (leave)", orphan.timestamp, &[]),
        }
    }
}

impl<W: Write, N: DeclNames> OutcomeSink<ParseEvent> for TraceWriter<W, N> {
    fn on_match(&mut self, start: EventRecord<ParseEvent>, end: EventRecord<ParseEvent>) {
        self.doc.stats.matches += 1;
        let name = match start.event.kind {
            ParseKind::Start => "parse",
            ParseKind::PreGenericize | ParseKind::Finish => "genericize",
        };
        let function = self.names.get(start.event.decl, start.event.uid);
        self.doc
            .entry(name, start.timestamp, end.timestamp, &[("function", function)]);
    }

    fn on_mismatch(&mut self, orphan: EventRecord<ParseEvent>) {
        let name = match orphan.event.kind {
            ParseKind::Start => {
                // A parse that never finished has no meaningful extent.
                debug!(uid = orphan.event.uid, "unfinished parse start not rendered");
                self.doc.stats.mismatches += 1;
                return;
            }
            ParseKind::PreGenericize => "genericize (start)",
            ParseKind::Finish => "parse (finish)",
        };
        self.doc.stats.mismatches += 1;
        let function = self.names.get(orphan.event.decl, orphan.event.uid);
        self.doc
            .entry(name, orphan.timestamp, orphan.timestamp, &[("function", function)]);
    }
}

impl<W: Write, N: DeclNames> OutcomeSink<PassEvent> for TraceWriter<W, N> {
    fn on_match(&mut self, start: EventRecord<PassEvent>, end: EventRecord<PassEvent>) {
        self.doc.stats.matches += 1;
        let name = escape_json(&start.event.name);
        match start.event.decl {
            Some(decl) => {
                let function = self.names.get(decl, start.event.uid);
                self.doc
                    .entry(&name, start.timestamp, end.timestamp, &[("function", function)]);
            }
            None => self.doc.entry(&name, start.timestamp, end.timestamp, &[]),
        }
    }

    fn on_mismatch(&mut self, orphan: EventRecord<PassEvent>) {
        self.doc.stats.mismatches += 1;
        let suffix = match orphan.event.kind {
            PassKind::Start => "(start)",
            PassKind::End => "(cancelled)",
        };
        let name = escape_json(&format!("{} {suffix}", orphan.event.name));
        match orphan.event.decl {
            Some(decl) => {
                let function = self.names.get(decl, orphan.event.uid);
                self.doc
                    .entry(&name, orphan.timestamp, orphan.timestamp, &[("function", function)]);
            }
            None => self.doc.entry(&name, orphan.timestamp, orphan.timestamp, &[]),
        }
    }
}
