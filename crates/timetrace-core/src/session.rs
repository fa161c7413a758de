//! Run session: per-family event buffers filled during compilation and
//! correlated once, at end of run.
//!
//! Buffers store records newest-first; [`EventBuffer::into_chronological`]
//! restores replay order with a single reversal. [`TraceSession::dump`] then
//! feeds the families in the fixed order Unit, Include, Parse, Pass into an
//! [`EventTracker`] backed by a [`TraceWriter`].

use crate::event::{
    DeclId, EventClock, EventRecord, IncludeEvent, ParseEvent, ParseKind, PassEvent, Timestamp,
    UnitEvent, UnitKind,
};
use crate::names::{DeclNames, Verbosity};
use crate::tracker::EventTracker;
use crate::writer::{TraceWriter, WriterStats};
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::io::Write;
use tracing::info;

/// Name of the interval covering the session's own correlation + rendering.
pub const DUMP_SLICE: &str = "plugin_dump";

/// Append-only buffer of one family's records, newest first.
#[derive(Clone, Debug)]
pub struct EventBuffer<E> {
    newest_first: VecDeque<EventRecord<E>>,
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self { newest_first: VecDeque::new() }
    }
}

impl<E> EventBuffer<E> {
    /// Record a new (most recent) event.
    pub fn push(&mut self, record: EventRecord<E>) {
        self.newest_first.push_front(record);
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.newest_first.len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.newest_first.is_empty()
    }

    /// Timestamp of the earliest buffered record.
    #[must_use]
    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.newest_first.back().map(|r| r.timestamp)
    }

    /// Records in the order they were pushed (oldest first).
    #[must_use]
    pub fn into_chronological(self) -> Vec<EventRecord<E>> {
        let mut records = Vec::from(self.newest_first);
        records.reverse();
        records
    }
}

/// All events collected during one compilation run.
#[derive(Debug)]
pub struct TraceSession {
    clock: EventClock,
    self_timed: bool,
    units: EventBuffer<UnitEvent>,
    includes: EventBuffer<IncludeEvent>,
    parses: EventBuffer<ParseEvent>,
    passes: EventBuffer<PassEvent>,
}

impl Default for TraceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceSession {
    /// Live session: events are stamped from a fresh clock and the dump
    /// reports its own cost as a [`DUMP_SLICE`] interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(EventClock::start(), true)
    }

    /// Session for replaying recorded timestamps; no dump interval is added
    /// since the live clock is unrelated to the recorded one.
    #[must_use]
    pub fn replay() -> Self {
        Self::with_clock(EventClock::start(), false)
    }

    fn with_clock(clock: EventClock, self_timed: bool) -> Self {
        Self {
            clock,
            self_timed,
            units: EventBuffer::default(),
            includes: EventBuffer::default(),
            parses: EventBuffer::default(),
            passes: EventBuffer::default(),
        }
    }

    /// Clock used for injection-time stamps.
    #[must_use]
    pub const fn clock(&self) -> &EventClock {
        &self.clock
    }

    /// Record a translation-unit event now.
    pub fn unit(&mut self, kind: UnitKind) {
        let record = EventRecord::now(&self.clock, UnitEvent::new(kind));
        self.units.push(record);
    }

    /// Record a file inclusion event now.
    pub fn include(&mut self, event: IncludeEvent) {
        let record = EventRecord::now(&self.clock, event);
        self.includes.push(record);
    }

    /// Record a function parsing event now.
    pub fn parse(&mut self, kind: ParseKind, decl: DeclId, uid: u32) {
        let record = EventRecord::now(&self.clock, ParseEvent::new(kind, decl, uid));
        self.parses.push(record);
    }

    /// Record a pass event now.
    pub fn pass(&mut self, event: PassEvent) {
        let record = EventRecord::now(&self.clock, event);
        self.passes.push(record);
    }

    /// Record a pre-stamped translation-unit event.
    pub fn record_unit(&mut self, record: EventRecord<UnitEvent>) {
        self.units.push(record);
    }

    /// Record a pre-stamped file inclusion event.
    pub fn record_include(&mut self, record: EventRecord<IncludeEvent>) {
        self.includes.push(record);
    }

    /// Record a pre-stamped parse event.
    pub fn record_parse(&mut self, record: EventRecord<ParseEvent>) {
        self.parses.push(record);
    }

    /// Record a pre-stamped pass event.
    pub fn record_pass(&mut self, record: EventRecord<PassEvent>) {
        self.passes.push(record);
    }

    /// Total buffered events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len() + self.includes.len() + self.parses.len() + self.passes.len()
    }

    /// Whether no event was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest first-event timestamp across families (`None` if all empty).
    #[must_use]
    pub fn epoch(&self) -> Option<Timestamp> {
        [
            self.units.oldest_timestamp(),
            self.includes.oldest_timestamp(),
            self.parses.oldest_timestamp(),
            self.passes.oldest_timestamp(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Correlate everything and stream the trace document to `out`.
    ///
    /// # Errors
    /// Only sink I/O failures are reported; unmatched events are rendered,
    /// not rejected.
    pub fn dump<W, N>(self, out: W, names: N, verbosity: Verbosity) -> Result<WriterStats>
    where
        W: Write,
        N: DeclNames,
    {
        let dump_start = self.clock.now();
        let events = self.len();
        let epoch = self.epoch().unwrap_or(dump_start);

        let Self { clock, self_timed, units, includes, parses, passes } = self;
        let mut writer = TraceWriter::open(out, epoch, names, verbosity);
        {
            let mut tracker = EventTracker::new(&mut writer);
            for record in units.into_chronological() {
                tracker.push_unit(record);
            }
            for record in includes.into_chronological() {
                tracker.push_include(record);
            }
            for record in parses.into_chronological() {
                tracker.push_parse(record);
            }
            for record in passes.into_chronological() {
                tracker.push_pass(record);
            }
            tracker.finish();
        }

        if self_timed {
            writer.render_named_interval(DUMP_SLICE, dump_start, clock.now());
        }
        let stats = writer.close().context("write trace document")?;
        info!(
            events,
            entries = stats.entries,
            matches = stats.matches,
            mismatches = stats.mismatches,
            "trace written"
        );
        Ok(stats)
    }
}
