//! Event correlation: pair start/end events per family into spans.
//!
//! Each family has its own matching scope discipline:
//!
//! - **Unit**, **Include**: one global LIFO stack.
//! - **Pass**: one LIFO stack per pass name; emptied names are dropped.
//! - **Parse**: per uid, two LIFO stacks (`starts`, `genericized`). A
//!   `PreGenericize` is always parked in `genericized` *and* closes the newest
//!   open `Start`. A `Finish` prefers an open `Start`, otherwise falls back to
//!   the newest parked `PreGenericize`.
//!
//! Outcomes go to an [`OutcomeSink`]. Nothing here can fail: an orphan end or
//! an unclosed start is reported as a mismatch, never as an error.
//!
//! ## Invariants
//! - An end always closes the most recently opened, still-open start in its scope.
//! - Every pushed event yields exactly one outcome, except `PreGenericize`,
//!   which may be matched twice (once as an end, once as a start).
//! - After [`EventTracker::finish`] every scope is empty.

use crate::event::{
    EventRecord, IncludeEvent, IncludeKind, ParseEvent, ParseKind, PassEvent, PassKind,
    TraceEvent, UnitEvent, UnitKind,
};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use tracing::debug;

/// Receiver of correlation outcomes for one family.
pub trait OutcomeSink<E> {
    /// `start` and `end` were paired.
    fn on_match(&mut self, start: EventRecord<E>, end: EventRecord<E>);

    /// `orphan` has no counterpart in its scope.
    fn on_mismatch(&mut self, orphan: EventRecord<E>);
}

/// A sink accepting outcomes of all four families.
pub trait Sink:
    OutcomeSink<UnitEvent>
    + OutcomeSink<IncludeEvent>
    + OutcomeSink<ParseEvent>
    + OutcomeSink<PassEvent>
{
}

impl<T> Sink for T where
    T: OutcomeSink<UnitEvent>
        + OutcomeSink<IncludeEvent>
        + OutcomeSink<ParseEvent>
        + OutcomeSink<PassEvent>
{
}

type Stack<E> = Vec<EventRecord<E>>;

/// Open parse events for one uid.
#[derive(Debug, Default)]
struct ParseScope {
    /// `Start` events not yet closed.
    starts: Stack<ParseEvent>,
    /// `PreGenericize` events waiting for a `Finish`.
    genericized: Stack<ParseEvent>,
}

impl ParseScope {
    fn is_empty(&self) -> bool {
        self.starts.is_empty() && self.genericized.is_empty()
    }

    /// Partner for a `Finish`: an open start wins over a genericize point.
    fn close_for_finish(&mut self) -> Option<EventRecord<ParseEvent>> {
        self.starts.pop().or_else(|| self.genericized.pop())
    }
}

/// Correlates per-family event streams and forwards outcomes to a [`Sink`].
///
/// Dropping the tracker runs [`finish`](Self::finish), so pending starts are
/// never lost.
pub struct EventTracker<'a, S: Sink> {
    units: Stack<UnitEvent>,
    includes: Stack<IncludeEvent>,
    parses: BTreeMap<u32, ParseScope>,
    passes: BTreeMap<String, Stack<PassEvent>>,
    sink: &'a mut S,
}

impl<'a, S: Sink> EventTracker<'a, S> {
    /// Create a tracker reporting into `sink`.
    pub fn new(sink: &'a mut S) -> Self {
        Self {
            units: Vec::new(),
            includes: Vec::new(),
            parses: BTreeMap::new(),
            passes: BTreeMap::new(),
            sink,
        }
    }

    /// Feed a translation-unit event.
    pub fn push_unit(&mut self, record: EventRecord<UnitEvent>) {
        match record.event.kind {
            UnitKind::Start => self.units.push(record),
            UnitKind::End => close(self.units.pop(), record, &mut *self.sink),
        }
    }

    /// Feed a file inclusion event.
    pub fn push_include(&mut self, record: EventRecord<IncludeEvent>) {
        match record.event.kind {
            IncludeKind::Enter => self.includes.push(record),
            IncludeKind::Leave => close(self.includes.pop(), record, &mut *self.sink),
        }
    }

    /// Feed a function parsing event.
    pub fn push_parse(&mut self, record: EventRecord<ParseEvent>) {
        let uid = record.event.uid;
        match record.event.kind {
            ParseKind::Start => self.parses.entry(uid).or_default().starts.push(record),
            ParseKind::PreGenericize => {
                let scope = self.parses.entry(uid).or_default();
                scope.genericized.push(record.clone());
                // No open start is not a mismatch: the parked copy may still
                // pair with a later Finish.
                if let Some(start) = scope.starts.pop() {
                    OutcomeSink::<ParseEvent>::on_match(&mut *self.sink, start, record);
                }
            }
            ParseKind::Finish => {
                let partner = match self.parses.get_mut(&uid) {
                    Some(scope) => {
                        let partner = scope.close_for_finish();
                        if scope.is_empty() {
                            self.parses.remove(&uid);
                        }
                        partner
                    }
                    None => None,
                };
                close(partner, record, &mut *self.sink);
            }
        }
    }

    /// Feed a pass execution event.
    pub fn push_pass(&mut self, record: EventRecord<PassEvent>) {
        match record.event.kind {
            PassKind::Start => self
                .passes
                .entry(record.event.name.clone())
                .or_default()
                .push(record),
            PassKind::End => {
                let start = pop_keyed(&mut self.passes, record.event.name.as_str());
                close(start, record, &mut *self.sink);
            }
        }
    }

    /// Report every still-open event as a mismatch and clear all scopes.
    ///
    /// Order: unit, include, parse starts, parse genericize points, passes;
    /// keyed scopes in ascending key order, each stack newest first.
    /// Calling it again is a no-op.
    pub fn finish(&mut self) {
        flush(&mut self.units, &mut *self.sink);
        flush(&mut self.includes, &mut *self.sink);
        for scope in self.parses.values_mut() {
            flush(&mut scope.starts, &mut *self.sink);
        }
        for scope in self.parses.values_mut() {
            flush(&mut scope.genericized, &mut *self.sink);
        }
        self.parses.clear();
        for stack in self.passes.values_mut() {
            flush(stack, &mut *self.sink);
        }
        self.passes.clear();
    }

    /// Number of events still waiting for a partner, across all scopes.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.units.len()
            + self.includes.len()
            + self
                .parses
                .values()
                .map(|s| s.starts.len() + s.genericized.len())
                .sum::<usize>()
            + self.passes.values().map(Vec::len).sum::<usize>()
    }
}

impl<S: Sink> Drop for EventTracker<'_, S> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Deliver `end` either paired with `start` or as a mismatch.
fn close<E, K>(start: Option<EventRecord<E>>, end: EventRecord<E>, sink: &mut K)
where
    E: TraceEvent,
    K: OutcomeSink<E> + ?Sized,
{
    match start {
        Some(start) => sink.on_match(start, end),
        None => {
            debug!(family = %E::FAMILY, ts = end.timestamp.as_nanos(), "end event without open start");
            sink.on_mismatch(end);
        }
    }
}

/// Pop the newest entry for `key`, dropping the key once its stack empties.
fn pop_keyed<K, Q, E>(map: &mut BTreeMap<K, Stack<E>>, key: &Q) -> Option<EventRecord<E>>
where
    K: Ord + Borrow<Q>,
    Q: Ord + ?Sized,
{
    let stack = map.get_mut(key)?;
    let top = stack.pop();
    if stack.is_empty() {
        map.remove(key);
    }
    top
}

/// Report the whole stack as mismatches, newest first.
fn flush<E, K>(stack: &mut Stack<E>, sink: &mut K)
where
    E: TraceEvent,
    K: OutcomeSink<E> + ?Sized,
{
    while let Some(open) = stack.pop() {
        debug!(family = %E::FAMILY, ts = open.timestamp.as_nanos(), "start event never closed");
        sink.on_mismatch(open);
    }
}
