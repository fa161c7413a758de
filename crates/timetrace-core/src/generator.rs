//! Deterministic synthetic compile runs, for benches and the CLI `simulate`
//! subcommand.
//!
//! The shape follows a real front end + middle end: nested header includes,
//! then per-function parse (genericized or not), then per-function pass lists
//! bracketed by the IPA list. Timestamps advance by random nanosecond steps.

use crate::event::{DeclId, IncludeKind, ParseKind, PassKind, Timestamp, UnitKind, NO_UID};
use crate::hooks::{ALL_IPA_PASSES, EARLY_GIMPLE_PASSES};
use crate::log::LoggedEvent;
use rand::{rngs::StdRng, Rng as _, SeedableRng};

/// Per-function passes emitted by the generator.
const PASSES: [&str; 5] = ["cfg", "ssa", "ccp", "dce", "expand"];

/// Pass list bracketing each function's passes.
const FUNCTION_LIST: &str = "all_passes";

struct Run {
    rng: StdRng,
    now: u64,
    events: Vec<LoggedEvent>,
}

impl Run {
    fn tick(&mut self) -> Timestamp {
        self.now += self.rng.random_range(500..=50_000);
        Timestamp::from_nanos(self.now)
    }

    fn unit(&mut self, kind: UnitKind) {
        let ts = self.tick();
        self.events.push(LoggedEvent::Unit { ts, kind });
    }

    fn include(&mut self, kind: IncludeKind, filename: String) {
        let ts = self.tick();
        self.events.push(LoggedEvent::Include { ts, kind, filename });
    }

    fn parse(&mut self, kind: ParseKind, uid: u32) {
        let ts = self.tick();
        let decl = decl_of(uid);
        self.events.push(LoggedEvent::Parse { ts, kind, decl, uid });
    }

    fn pass(&mut self, kind: PassKind, name: &str, uid: Option<u32>) {
        let ts = self.tick();
        self.events.push(LoggedEvent::Pass {
            ts,
            kind,
            name: name.to_owned(),
            decl: uid.map(decl_of),
            uid: uid.unwrap_or(NO_UID),
        });
    }

    fn headers(&mut self, prefix: &str, depth: u8) {
        let n = self.rng.random_range(1..=3);
        for i in 0..n {
            let name = format!("{prefix}{i}.h");
            self.include(IncludeKind::Enter, name.clone());
            if depth > 1 && self.rng.random_bool(0.5) {
                self.headers(&format!("{}/", name.trim_end_matches(".h")), depth - 1);
            }
            self.include(IncludeKind::Leave, String::new());
        }
    }
}

fn decl_of(uid: u32) -> DeclId {
    DeclId(1_000 + u64::from(uid))
}

/// Generate a well-formed run with `functions` functions and headers nested
/// up to `include_depth` levels.
#[must_use]
pub fn generate_run(functions: u32, include_depth: u8, seed: u64) -> Vec<LoggedEvent> {
    let mut run = Run { rng: StdRng::seed_from_u64(seed), now: 0, events: Vec::new() };

    for uid in 1..=functions {
        run.events.push(LoggedEvent::Decl {
            id: decl_of(uid),
            names: vec![format!("f{uid}"), format!("ns::f{uid}"), format!("int ns::f{uid}(int)")],
        });
    }

    run.unit(UnitKind::Start);
    if include_depth > 0 {
        run.headers("include/h", include_depth);
    }

    for uid in 1..=functions {
        run.parse(ParseKind::Start, uid);
        if run.rng.random_bool(0.7) {
            run.parse(ParseKind::PreGenericize, uid);
        }
        run.parse(ParseKind::Finish, uid);
    }

    run.pass(PassKind::Start, EARLY_GIMPLE_PASSES, None);
    run.pass(PassKind::End, EARLY_GIMPLE_PASSES, None);
    run.pass(PassKind::Start, ALL_IPA_PASSES, None);
    run.pass(PassKind::End, ALL_IPA_PASSES, None);

    for uid in 1..=functions {
        run.pass(PassKind::Start, FUNCTION_LIST, Some(uid));
        for pass in PASSES {
            run.pass(PassKind::Start, pass, None);
            run.pass(PassKind::End, pass, None);
        }
        run.pass(PassKind::End, FUNCTION_LIST, Some(uid));
    }

    run.unit(UnitKind::End);
    run.events
}
