//! Event model: the four compile-phase event families and their timestamped records.
//!
//! Every family has a closed set of kinds. Records carry a monotonic
//! [`Timestamp`]; ordering within and across families is defined solely by it.
//!
//! | Family  | Kinds                           | Scope key  |
//! |---------|---------------------------------|------------|
//! | Unit    | `Start`, `End`                  | global     |
//! | Include | `Enter`, `Leave`                | global     |
//! | Parse   | `Start`, `PreGenericize`, `Finish` | `uid`   |
//! | Pass    | `Start`, `End`                  | pass name  |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Monotonic clock reading, in nanoseconds since the owning [`EventClock`]'s origin.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Construct from a raw nanosecond count.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Raw nanosecond count.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Signed distance `self - earlier` in nanoseconds (saturating at `i64` bounds).
    #[must_use]
    pub fn nanos_since(self, earlier: Self) -> i64 {
        if self.0 >= earlier.0 {
            i64::try_from(self.0 - earlier.0).unwrap_or(i64::MAX)
        } else {
            i64::try_from(earlier.0 - self.0).map_or(i64::MIN, |d| -d)
        }
    }
}

/// Source of monotonic [`Timestamp`]s for one run.
#[derive(Clone, Copy, Debug)]
pub struct EventClock {
    origin: Instant,
}

impl EventClock {
    /// Start a clock whose origin is "now".
    #[must_use]
    pub fn start() -> Self {
        Self { origin: Instant::now() }
    }

    /// Current reading.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        let nanos = self.origin.elapsed().as_nanos();
        Timestamp(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

impl Default for EventClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Opaque declaration handle supplied by the host (resolved through
/// [`DeclNames`](crate::names::DeclNames)).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeclId(pub u64);

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl#{}", self.0)
    }
}

/// The four event families, in the order they are fed to the correlator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Family {
    /// Whole translation unit.
    Unit,
    /// File inclusion.
    Include,
    /// Per-function parsing.
    Parse,
    /// Optimization pass execution.
    Pass,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unit => "unit",
            Self::Include => "include",
            Self::Parse => "parse",
            Self::Pass => "pass",
        })
    }
}

/// Common surface of the four payload types.
pub trait TraceEvent: Clone + fmt::Debug {
    /// Family this payload belongs to.
    const FAMILY: Family;

    /// Whether this event opens a scope (a start-like kind).
    fn is_start(&self) -> bool;
}

/* ---------------- Unit ---------------- */

/// Translation-unit lifecycle kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Compilation of the unit began.
    Start,
    /// Compilation of the unit finished.
    End,
}

/// Translation-unit event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitEvent {
    /// Kind.
    pub kind: UnitKind,
}

impl UnitEvent {
    /// Construct a unit event.
    #[must_use]
    pub const fn new(kind: UnitKind) -> Self {
        Self { kind }
    }
}

impl TraceEvent for UnitEvent {
    const FAMILY: Family = Family::Unit;

    fn is_start(&self) -> bool {
        self.kind == UnitKind::Start
    }
}

/* ---------------- Include ---------------- */

/// File inclusion kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeKind {
    /// The preprocessor entered a file.
    Enter,
    /// The preprocessor returned to the including file.
    Leave,
}

/// File inclusion event. `filename` is only meaningful on `Enter`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeEvent {
    /// Kind.
    pub kind: IncludeKind,
    /// Entered file (empty for `Leave`).
    pub filename: String,
}

impl IncludeEvent {
    /// Entering `filename`.
    #[must_use]
    pub fn enter(filename: impl Into<String>) -> Self {
        Self { kind: IncludeKind::Enter, filename: filename.into() }
    }

    /// Leaving the current file.
    #[must_use]
    pub const fn leave() -> Self {
        Self { kind: IncludeKind::Leave, filename: String::new() }
    }
}

impl TraceEvent for IncludeEvent {
    const FAMILY: Family = Family::Include;

    fn is_start(&self) -> bool {
        self.kind == IncludeKind::Enter
    }
}

/* ---------------- Parse ---------------- */

/// Function parsing kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseKind {
    /// Parsing of a function body began.
    Start,
    /// The front end is about to genericize the parsed body.
    PreGenericize,
    /// Parsing of the function finished.
    Finish,
}

/// Function parsing event, keyed by `uid`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseEvent {
    /// Kind.
    pub kind: ParseKind,
    /// Function declaration.
    pub decl: DeclId,
    /// Small integer identity of `decl`.
    pub uid: u32,
}

impl ParseEvent {
    /// Construct a parse event.
    #[must_use]
    pub const fn new(kind: ParseKind, decl: DeclId, uid: u32) -> Self {
        Self { kind, decl, uid }
    }
}

impl TraceEvent for ParseEvent {
    const FAMILY: Family = Family::Parse;

    fn is_start(&self) -> bool {
        self.kind != ParseKind::Finish
    }
}

/* ---------------- Pass ---------------- */

/// Pass execution kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Pass (or pass list) started.
    Start,
    /// Pass (or pass list) ended.
    End,
}

/// Sentinel uid used when a pass event has no current function.
pub const NO_UID: u32 = u32::MAX;

/// Pass execution event, keyed by `name`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassEvent {
    /// Kind.
    pub kind: PassKind,
    /// Pass or pass-list name.
    pub name: String,
    /// Function the pass ran on, when known.
    pub decl: Option<DeclId>,
    /// Identity of `decl`, or [`NO_UID`].
    pub uid: u32,
}

impl PassEvent {
    /// Construct a pass event.
    #[must_use]
    pub fn new(kind: PassKind, name: impl Into<String>, decl: Option<DeclId>, uid: u32) -> Self {
        Self { kind, name: name.into(), decl, uid }
    }

    /// Pass event with no associated function.
    #[must_use]
    pub fn global(kind: PassKind, name: impl Into<String>) -> Self {
        Self::new(kind, name, None, NO_UID)
    }
}

impl TraceEvent for PassEvent {
    const FAMILY: Family = Family::Pass;

    fn is_start(&self) -> bool {
        self.kind == PassKind::Start
    }
}

/* ---------------- Records ---------------- */

/// A payload stamped with the moment it was observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord<E> {
    /// Observation time.
    pub timestamp: Timestamp,
    /// Payload.
    pub event: E,
}

impl<E> EventRecord<E> {
    /// Stamp `event` with the clock's current reading.
    #[must_use]
    pub fn now(clock: &EventClock, event: E) -> Self {
        Self { timestamp: clock.now(), event }
    }

    /// Stamp `event` with an explicit timestamp (replay, tests).
    #[must_use]
    pub const fn at(timestamp: Timestamp, event: E) -> Self {
        Self { timestamp, event }
    }
}
