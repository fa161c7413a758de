//! Recorded event logs: a serializable form of one run, for offline replay.
//!
//! Each line (JSONL) or array element (JSON/CBOR [`EventLog`]) is one
//! [`LoggedEvent`], internally tagged by `family`:
//!
//! ```text
//! {"family":"unit","ts":0,"kind":"start"}
//! {"family":"include","ts":1200,"kind":"enter","filename":"stdio.h"}
//! {"family":"parse","ts":5000,"kind":"start","decl":7,"uid":7}
//! {"family":"pass","ts":9000,"kind":"end","name":"cfg","decl":7,"uid":7}
//! {"family":"decl","id":7,"names":["main","main","int main()"]}
//! ```
//!
//! `decl` lines carry display names per verbosity level; they feed a
//! [`NameTable`] instead of the session.

use crate::event::{
    DeclId, EventRecord, IncludeEvent, IncludeKind, ParseEvent, ParseKind, PassEvent, PassKind,
    Timestamp, UnitEvent, UnitKind, NO_UID,
};
use crate::names::NameTable;
use crate::session::TraceSession;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Current [`EventLog`] format version.
pub const EVENT_LOG_VERSION: u16 = 1;

const fn no_uid() -> u32 {
    NO_UID
}

/// One recorded event (or declaration name entry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum LoggedEvent {
    /// Translation-unit event.
    Unit {
        /// Timestamp.
        ts: Timestamp,
        /// Kind.
        kind: UnitKind,
    },
    /// File inclusion event.
    Include {
        /// Timestamp.
        ts: Timestamp,
        /// Kind.
        kind: IncludeKind,
        /// Entered file (omitted on leave).
        #[serde(default, skip_serializing_if = "String::is_empty")]
        filename: String,
    },
    /// Function parsing event.
    Parse {
        /// Timestamp.
        ts: Timestamp,
        /// Kind.
        kind: ParseKind,
        /// Function declaration.
        decl: DeclId,
        /// Function uid.
        uid: u32,
    },
    /// Pass event.
    Pass {
        /// Timestamp.
        ts: Timestamp,
        /// Kind.
        kind: PassKind,
        /// Pass or pass-list name.
        name: String,
        /// Function, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        decl: Option<DeclId>,
        /// Function uid (sentinel when absent; required with `decl`).
        #[serde(default = "no_uid")]
        uid: u32,
    },
    /// Display names of a declaration, indexed by verbosity level.
    Decl {
        /// Declaration handle.
        id: DeclId,
        /// Names for levels 0, 1, 2 (shorter lists reuse the last entry).
        names: Vec<String>,
    },
}

impl LoggedEvent {
    /// Timestamp of an event line (`None` for `decl` lines).
    #[must_use]
    pub const fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Unit { ts, .. }
            | Self::Include { ts, .. }
            | Self::Parse { ts, .. }
            | Self::Pass { ts, .. } => Some(*ts),
            Self::Decl { .. } => None,
        }
    }
}

/// Whole-file container for JSON/CBOR logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    /// Format version.
    pub version: u16,
    /// Events in recording order.
    pub events: Vec<LoggedEvent>,
}

impl EventLog {
    /// Wrap `events` with the current version tag.
    #[must_use]
    pub const fn new(events: Vec<LoggedEvent>) -> Self {
        Self { version: EVENT_LOG_VERSION, events }
    }
}

/// Rebuilds a [`TraceSession`] and [`NameTable`] from logged events.
#[derive(Debug)]
pub struct Replay {
    session: TraceSession,
    names: NameTable,
}

impl Default for Replay {
    fn default() -> Self {
        Self::new()
    }
}

impl Replay {
    /// Empty replay.
    #[must_use]
    pub fn new() -> Self {
        Self { session: TraceSession::replay(), names: NameTable::new() }
    }

    /// Apply one logged event.
    ///
    /// A pass carrying a `decl` must carry its `uid` too: names are cached
    /// per uid, so a missing one would merge distinct functions.
    pub fn apply(&mut self, event: LoggedEvent) -> Result<()> {
        match event {
            LoggedEvent::Unit { ts, kind } => {
                self.session.record_unit(EventRecord::at(ts, UnitEvent::new(kind)));
            }
            LoggedEvent::Include { ts, kind, filename } => {
                let event = IncludeEvent { kind, filename };
                self.session.record_include(EventRecord::at(ts, event));
            }
            LoggedEvent::Parse { ts, kind, decl, uid } => {
                self.session
                    .record_parse(EventRecord::at(ts, ParseEvent::new(kind, decl, uid)));
            }
            LoggedEvent::Pass { ts, kind, name, decl, uid } => {
                if let (Some(decl), NO_UID) = (decl, uid) {
                    bail!("pass '{name}' at {} ns names {decl} but has no uid", ts.as_nanos());
                }
                self.session
                    .record_pass(EventRecord::at(ts, PassEvent::new(kind, name, decl, uid)));
            }
            LoggedEvent::Decl { id, names } => self.names.insert(id, names),
        }
        Ok(())
    }

    /// Apply a fallible stream of events, stopping at the first error.
    pub fn apply_all<I>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<LoggedEvent>>,
    {
        for event in events {
            self.apply(event?)?;
        }
        Ok(())
    }

    /// The rebuilt session and name table.
    #[must_use]
    pub fn finish(self) -> (TraceSession, NameTable) {
        (self.session, self.names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::{DeclNames, Verbosity};

    #[test]
    fn lines_use_family_tag() {
        let line = r#"{"family":"pass","ts":10,"kind":"start","name":"cfg"}"#;
        let ev: LoggedEvent = serde_json::from_str(line).unwrap();
        assert_eq!(
            ev,
            LoggedEvent::Pass {
                ts: Timestamp::from_nanos(10),
                kind: PassKind::Start,
                name: "cfg".into(),
                decl: None,
                uid: NO_UID,
            }
        );
        let leave = LoggedEvent::Include {
            ts: Timestamp::from_nanos(3),
            kind: IncludeKind::Leave,
            filename: String::new(),
        };
        assert_eq!(
            serde_json::to_string(&leave).unwrap(),
            r#"{"family":"include","ts":3,"kind":"leave"}"#
        );
    }

    #[test]
    fn replay_splits_events_and_names() {
        let mut r = Replay::new();
        r.apply_all([
            Ok(LoggedEvent::Decl { id: DeclId(7), names: vec!["main".into()] }),
            Ok(LoggedEvent::Unit { ts: Timestamp::from_nanos(0), kind: UnitKind::Start }),
            Ok(LoggedEvent::Unit { ts: Timestamp::from_nanos(9), kind: UnitKind::End }),
        ])
        .unwrap();
        let (session, names) = r.finish();
        assert_eq!(session.len(), 2);
        assert_eq!(names.printable_name(DeclId(7), Verbosity::Full), "main");
    }

    #[test]
    fn pass_with_decl_requires_uid() {
        let lines = [
            r#"{"family":"decl","id":7,"names":["alpha"]}"#,
            r#"{"family":"decl","id":8,"names":["beta"]}"#,
            r#"{"family":"pass","ts":1,"kind":"start","name":"all_passes","decl":7}"#,
        ];
        let mut r = Replay::new();
        let err = r
            .apply_all(lines.iter().map(|l| serde_json::from_str(l).map_err(anyhow::Error::from)))
            .unwrap_err();
        assert_eq!(err.to_string(), "pass 'all_passes' at 1 ns names decl#7 but has no uid");
    }

    #[test]
    fn passes_with_uids_keep_their_own_names() {
        let mut r = Replay::new();
        r.apply_all([
            Ok(LoggedEvent::Decl { id: DeclId(7), names: vec!["alpha".into()] }),
            Ok(LoggedEvent::Decl { id: DeclId(8), names: vec!["beta".into()] }),
        ])
        .unwrap();
        for (base, decl) in [(0, 7u64), (10, 8u64)] {
            for (dt, kind) in [(0, PassKind::Start), (5, PassKind::End)] {
                r.apply(LoggedEvent::Pass {
                    ts: Timestamp::from_nanos(base + dt),
                    kind,
                    name: "all_passes".into(),
                    decl: Some(DeclId(decl)),
                    uid: u32::try_from(decl).unwrap(),
                })
                .unwrap();
            }
        }
        let (session, names) = r.finish();
        let mut out = Vec::new();
        session.dump(&mut out, names, Verbosity::Name).unwrap();
        let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(v[0]["args"]["function"], "alpha");
        assert_eq!(v[1]["args"]["function"], "beta");
    }

    #[test]
    fn pass_without_decl_defaults_uid() {
        let mut r = Replay::new();
        let line = r#"{"family":"pass","ts":1,"kind":"start","name":"cfg"}"#;
        r.apply(serde_json::from_str(line).unwrap()).unwrap();
        assert_eq!(r.finish().0.len(), 1);
    }

    #[test]
    fn replay_stops_at_first_error() {
        let mut r = Replay::new();
        let err = r
            .apply_all([
                Ok(LoggedEvent::Unit { ts: Timestamp::from_nanos(0), kind: UnitKind::Start }),
                Err(anyhow::anyhow!("parse jsonl line 2")),
            ])
            .unwrap_err();
        assert_eq!(err.to_string(), "parse jsonl line 2");
    }
}
