//! Host lifecycle hooks mapped onto session events.
//!
//! The host compiler calls these at fixed points. Nothing is correlated here;
//! each hook appends one timestamped event to the owning [`TraceSession`].
//!
//! Pass timing relies on two host mechanisms:
//! - a *pass execution* notification fired when any pass starts, recorded as
//!   a pass `Start` with no function;
//! - *marker passes* the host inserts into its pipeline. A [`Marker::Single`]
//!   placed after a pass closes it; [`Marker::ListStart`] / [`Marker::ListEnd`]
//!   bracket a whole pass list and carry the current function, if any.

use crate::config::TraceOptions;
use crate::event::{
    DeclId, IncludeEvent, ParseKind, PassEvent, PassKind, UnitKind, NO_UID,
};
use crate::io::{trace_path_for, write_trace_file};
use crate::names::DeclNames;
use crate::session::TraceSession;
use crate::writer::WriterStats;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Named pass lists the host announces through dedicated start/end hooks.
pub const EARLY_GIMPLE_PASSES: &str = "early_gimple_passes";
/// See [`EARLY_GIMPLE_PASSES`].
pub const ALL_IPA_PASSES: &str = "all_ipa_passes";

/// Preprocessor file change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileChange<'a> {
    /// Entered `file`.
    Enter(&'a str),
    /// Returned to the includer.
    Leave,
    /// Any other line-map change (renames, line directives); ignored.
    Other,
}

/// Function the host is currently compiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentFunction {
    /// Declaration handle.
    pub decl: DeclId,
    /// Its uid.
    pub uid: u32,
}

/// Marker pass flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Marker {
    /// Inserted after a single pass; ends it.
    Single,
    /// Inserted before the first pass of a list.
    ListStart,
    /// Inserted after the last pass of a list.
    ListEnd,
}

/// Event-recording side of the plugin.
#[derive(Debug, Default)]
pub struct Hooks {
    options: TraceOptions,
    session: TraceSession,
}

impl Hooks {
    /// Live hooks with the given activation options.
    #[must_use]
    pub fn new(options: TraceOptions) -> Self {
        Self { options, session: TraceSession::new() }
    }

    /// Activation options.
    #[must_use]
    pub const fn options(&self) -> &TraceOptions {
        &self.options
    }

    /// Events recorded so far.
    #[must_use]
    pub const fn session(&self) -> &TraceSession {
        &self.session
    }

    /// Translation unit compilation begins.
    pub fn start_unit(&mut self) {
        self.session.unit(UnitKind::Start);
    }

    /// Translation unit compilation ends.
    pub fn finish_unit(&mut self) {
        self.session.unit(UnitKind::End);
    }

    /// Preprocessor moved to another file.
    pub fn file_change(&mut self, change: FileChange<'_>) {
        match change {
            FileChange::Enter(file) => self.session.include(IncludeEvent::enter(file)),
            FileChange::Leave => self.session.include(IncludeEvent::leave()),
            FileChange::Other => {}
        }
    }

    /// Front end starts parsing a function body.
    pub fn start_parse_function(&mut self, f: CurrentFunction) {
        self.session.parse(ParseKind::Start, f.decl, f.uid);
    }

    /// Front end is about to genericize a function.
    pub fn pre_genericize(&mut self, f: CurrentFunction) {
        self.session.parse(ParseKind::PreGenericize, f.decl, f.uid);
    }

    /// Front end finished a function.
    pub fn finish_parse_function(&mut self, f: CurrentFunction) {
        self.session.parse(ParseKind::Finish, f.decl, f.uid);
    }

    /// Start of the early GIMPLE pass list.
    pub fn early_gimple_passes_start(&mut self) {
        self.session.pass(PassEvent::global(PassKind::Start, EARLY_GIMPLE_PASSES));
    }

    /// End of the early GIMPLE pass list.
    pub fn early_gimple_passes_end(&mut self) {
        self.session.pass(PassEvent::global(PassKind::End, EARLY_GIMPLE_PASSES));
    }

    /// Start of the IPA pass list.
    pub fn all_ipa_passes_start(&mut self) {
        self.session.pass(PassEvent::global(PassKind::Start, ALL_IPA_PASSES));
    }

    /// End of the IPA pass list.
    pub fn all_ipa_passes_end(&mut self) {
        self.session.pass(PassEvent::global(PassKind::End, ALL_IPA_PASSES));
    }

    /// A pass is about to execute.
    pub fn pass_execution(&mut self, pass: &str) {
        self.session.pass(PassEvent::global(PassKind::Start, pass));
    }

    /// One of our marker passes was reached; `name` is the pass or list it tracks.
    pub fn marker(&mut self, marker: Marker, name: &str, current: Option<CurrentFunction>) {
        let decl = current.map(|f| f.decl);
        let uid = current.map_or(NO_UID, |f| f.uid);
        let event = match marker {
            Marker::Single => PassEvent::global(PassKind::End, name),
            Marker::ListStart => PassEvent::new(PassKind::Start, name, decl, uid),
            Marker::ListEnd => PassEvent::new(PassKind::End, name, decl, uid),
        };
        self.session.pass(event);
    }

    /// End of compilation: write `<base>.trace.json` and return its path.
    pub fn finish<N: DeclNames>(self, base: &Path, names: N) -> Result<(PathBuf, WriterStats)> {
        let path = trace_path_for(base);
        let stats = write_trace_file(&path, self.session, names, self.options.decl_verbosity)?;
        Ok((path, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::Verbosity;

    fn f(uid: u32) -> CurrentFunction {
        CurrentFunction { decl: DeclId(u64::from(uid) + 100), uid }
    }

    fn dump(hooks: Hooks) -> serde_json::Value {
        let mut out = Vec::new();
        let verbosity = hooks.options().decl_verbosity;
        hooks
            .session
            .dump(&mut out, |d: DeclId, _: Verbosity| format!("fn{}", d.0), verbosity)
            .unwrap();
        serde_json::from_slice(&out).unwrap()
    }

    fn names(v: &serde_json::Value) -> Vec<String> {
        v.as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn compile_run_produces_expected_slices() {
        let mut h = Hooks::new(TraceOptions::default());
        h.start_unit();
        h.file_change(FileChange::Enter("a.h"));
        h.file_change(FileChange::Other);
        h.file_change(FileChange::Leave);
        h.start_parse_function(f(1));
        h.pre_genericize(f(1));
        h.finish_parse_function(f(1));
        h.all_ipa_passes_start();
        h.pass_execution("inline");
        h.marker(Marker::Single, "inline", None);
        h.all_ipa_passes_end();
        h.marker(Marker::ListStart, "all_passes", Some(f(1)));
        h.marker(Marker::ListEnd, "all_passes", Some(f(1)));
        h.finish_unit();
        assert_eq!(h.session().len(), 13);

        let v = dump(h);
        assert_eq!(
            names(&v),
            [
                "unit",
                "include",
                "parse",
                "genericize",
                "inline",
                "all_ipa_passes",
                "all_passes",
                "plugin_dump",
            ]
        );
        assert_eq!(v[6]["args"]["function"], "fn101");
        assert!(v[4].get("args").is_none());
    }

    #[test]
    fn pass_started_without_marker_is_reported() {
        let mut h = Hooks::new(TraceOptions::default());
        h.pass_execution("gimple_lowering");
        h.marker(Marker::Single, "ssa", None);
        let v = dump(h);
        // The orphan end is reported when seen; the open start at flush time.
        assert_eq!(names(&v)[..2], ["ssa (cancelled)", "gimple_lowering (start)"]);
    }
}
