//! Correlation invariants over arbitrary event sequences.
//!
//! Every event gets a unique timestamp (its index), so outcomes can be traced
//! back to the events they consumed:
//! - **no loss**: every event appears in exactly one outcome, except a
//!   `PreGenericize` that closed a parse start, which appears twice;
//! - **LIFO**: matched unit/include intervals never cross;
//! - **keyed isolation**: pass matches never pair different names;
//! - **flush**: after `finish()` nothing is open and a second call is silent.

use proptest::prelude::*;
use std::collections::HashMap;
use timetrace_core::{
    DeclId, EventRecord, EventTracker, IncludeEvent, OutcomeSink, ParseEvent, ParseKind,
    PassEvent, PassKind, Timestamp, TraceEvent, UnitEvent, UnitKind,
};

#[derive(Default)]
struct Outcomes {
    matches: Vec<(u64, u64)>,
    orphans: Vec<u64>,
}

impl<E: TraceEvent> OutcomeSink<E> for Outcomes {
    fn on_match(&mut self, start: EventRecord<E>, end: EventRecord<E>) {
        self.matches
            .push((start.timestamp.as_nanos(), end.timestamp.as_nanos()));
    }

    fn on_mismatch(&mut self, orphan: EventRecord<E>) {
        self.orphans.push(orphan.timestamp.as_nanos());
    }
}

impl Outcomes {
    fn appearances(&self) -> HashMap<u64, usize> {
        let mut seen = HashMap::new();
        for &(s, e) in &self.matches {
            *seen.entry(s).or_default() += 1;
            *seen.entry(e).or_default() += 1;
        }
        for &o in &self.orphans {
            *seen.entry(o).or_default() += 1;
        }
        seen
    }
}

fn at<E>(i: usize, e: E) -> EventRecord<E> {
    EventRecord::at(Timestamp::from_nanos(i as u64), e)
}

fn crossing(a: (u64, u64), b: (u64, u64)) -> bool {
    (a.0 < b.0 && b.0 < a.1 && a.1 < b.1) || (b.0 < a.0 && a.0 < b.1 && b.1 < a.1)
}

fn parse_kind() -> impl Strategy<Value = ParseKind> {
    prop_oneof![
        Just(ParseKind::Start),
        Just(ParseKind::PreGenericize),
        Just(ParseKind::Finish),
    ]
}

proptest! {
    #[test]
    fn unit_events_are_never_lost_and_never_cross(starts in prop::collection::vec(any::<bool>(), 0..64)) {
        let mut out = Outcomes::default();
        {
            let mut t = EventTracker::new(&mut out);
            for (i, &s) in starts.iter().enumerate() {
                let kind = if s { UnitKind::Start } else { UnitKind::End };
                t.push_unit(at(i, UnitEvent::new(kind)));
            }
            t.finish();
            prop_assert_eq!(t.open_count(), 0);
        }
        let seen = out.appearances();
        prop_assert_eq!(seen.len(), starts.len());
        prop_assert!(seen.values().all(|&n| n == 1));
        for (i, a) in out.matches.iter().enumerate() {
            prop_assert!(starts[a.0 as usize] && !starts[a.1 as usize]);
            for b in &out.matches[i + 1..] {
                prop_assert!(!crossing(*a, *b), "{:?} crosses {:?}", a, b);
            }
        }
    }

    #[test]
    fn include_matches_pair_enter_with_leave(enters in prop::collection::vec(any::<bool>(), 0..64)) {
        let mut out = Outcomes::default();
        {
            let mut t = EventTracker::new(&mut out);
            for (i, &e) in enters.iter().enumerate() {
                let ev = if e { IncludeEvent::enter(format!("h{i}.h")) } else { IncludeEvent::leave() };
                t.push_include(at(i, ev));
            }
        }
        let leaves = enters.iter().filter(|e| !**e).count();
        let matched_leaves = out.matches.len();
        prop_assert_eq!(out.appearances().len(), enters.len());
        prop_assert_eq!(out.orphans.len(), enters.len() - 2 * matched_leaves);
        prop_assert!(matched_leaves <= leaves);
    }

    #[test]
    fn pass_matches_stay_within_their_name(
        ops in prop::collection::vec((any::<bool>(), 0usize..4), 0..64)
    ) {
        let names = ["cfg", "ssa", "dce", "ccp"];
        let mut out = Outcomes::default();
        {
            let mut t = EventTracker::new(&mut out);
            for (i, &(start, n)) in ops.iter().enumerate() {
                let kind = if start { PassKind::Start } else { PassKind::End };
                t.push_pass(at(i, PassEvent::global(kind, names[n])));
            }
        }
        for &(s, e) in &out.matches {
            let (s, e) = (s as usize, e as usize);
            prop_assert_eq!(ops[s].1, ops[e].1);
            prop_assert!(ops[s].0 && !ops[e].0);
        }
        let seen = out.appearances();
        prop_assert_eq!(seen.len(), ops.len());
        prop_assert!(seen.values().all(|&n| n == 1));
    }

    #[test]
    fn parse_events_appear_once_except_bridging_genericize(
        ops in prop::collection::vec((parse_kind(), 0u32..3), 0..64)
    ) {
        let mut out = Outcomes::default();
        {
            let mut t = EventTracker::new(&mut out);
            for (i, &(kind, uid)) in ops.iter().enumerate() {
                t.push_parse(at(i, ParseEvent::new(kind, DeclId(u64::from(uid)), uid)));
            }
            t.finish();
            t.finish();
        }
        let seen = out.appearances();
        prop_assert_eq!(seen.len(), ops.len());
        for (i, &(kind, uid)) in ops.iter().enumerate() {
            let n = seen[&(i as u64)];
            if kind == ParseKind::PreGenericize {
                let closed_start = out.matches.iter().any(|&(_, e)| e == i as u64);
                prop_assert_eq!(n, if closed_start { 2 } else { 1 });
            } else {
                prop_assert_eq!(n, 1);
            }
            // Matches stay within one uid.
            for &(s, e) in out.matches.iter().filter(|m| m.0 == i as u64) {
                prop_assert_eq!(ops[s as usize].1, uid);
                prop_assert_eq!(ops[e as usize].1, uid);
            }
        }
    }
}
