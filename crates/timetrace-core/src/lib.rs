//! timetrace-core: compile-phase timeline: event model, correlation engine,
//! and Chrome trace-event writer.
//!
//! A host compiler fires lifecycle events (unit, include, parse, pass) into a
//! [`TraceSession`]. At end of run the session replays each family in order
//! through an [`EventTracker`], which pairs starts with ends under per-family
//! scope rules, and a [`TraceWriter`] streams the result as a JSON array
//! loadable by `chrome://tracing` or Perfetto.
//!
//! ```no_run
//! use timetrace_core::prelude::*;
//!
//! let mut session = TraceSession::new();
//! session.unit(UnitKind::Start);
//! session.include(IncludeEvent::enter("stdio.h"));
//! session.include(IncludeEvent::leave());
//! session.unit(UnitKind::End);
//!
//! let names = |decl: DeclId, _: Verbosity| decl.to_string();
//! session.dump(std::io::stdout(), names, Verbosity::Scoped)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

/// Plugin options (`verbose-decl`, `disable-version-check`).
pub mod config;
/// Event families, kinds, timestamps and records.
pub mod event;
/// Deterministic synthetic compile runs.
pub mod generator;
/// Host lifecycle hooks mapped onto session events.
pub mod hooks;
/// Trace output and event-log file I/O.
pub mod io;
/// Recorded event-log format and replay.
pub mod log;
/// Declaration display-name lookup and cache.
pub mod names;
/// Run session: buffering and the end-of-run dump.
pub mod session;
/// Start/end correlation engine.
pub mod tracker;
/// Chrome trace-event writer.
pub mod writer;

pub use event::{
    DeclId, EventClock, EventRecord, Family, IncludeEvent, IncludeKind, ParseEvent, ParseKind,
    PassEvent, PassKind, Timestamp, TraceEvent, UnitEvent, UnitKind, NO_UID,
};
pub use names::{DeclNames, NameTable, Verbosity};
pub use session::TraceSession;
pub use tracker::{EventTracker, OutcomeSink, Sink};
pub use writer::{TraceWriter, WriterStats};

/// Commonly-used items for quick imports.
///
/// ```rust
/// use timetrace_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::TraceOptions;
    pub use crate::event::*;
    pub use crate::hooks::{CurrentFunction, FileChange, Hooks, Marker};
    pub use crate::names::{DeclNames, NameTable, Verbosity};
    pub use crate::session::TraceSession;
    pub use crate::tracker::{EventTracker, OutcomeSink};
    pub use crate::writer::{TraceWriter, WriterStats};
}
