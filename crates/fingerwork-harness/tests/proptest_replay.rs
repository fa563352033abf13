//! Property tests for scripted replay.
//!
//! 1. Replaying the same script twice yields the same gestures.
//! 2. Every gesture a recorder receives only names contacts it claimed.
//! 3. A script survives a JSON round trip unchanged.

use std::collections::BTreeSet;

use fingerwork_core::GestureKind;
use fingerwork_harness::{ClaimRule, Recorder, Replayer, TouchScript};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Step {
    Add(u32, f32, f32),
    Move(u32, f32, f32),
    Remove(u32, f32, f32),
    Frame,
}

fn step_strategy() -> impl Strategy<Value = (u64, Step)> {
    let coord = -50i16..650;
    let step = prop_oneof![
        1 => (0u32..5, coord.clone(), coord.clone())
            .prop_map(|(id, x, y)| Step::Add(id, f32::from(x), f32::from(y))),
        3 => (0u32..5, coord.clone(), coord.clone())
            .prop_map(|(id, x, y)| Step::Move(id, f32::from(x), f32::from(y))),
        1 => (0u32..5, coord.clone(), coord)
            .prop_map(|(id, x, y)| Step::Remove(id, f32::from(x), f32::from(y))),
        2 => Just(Step::Frame),
    ];
    (0u64..90, step)
}

fn script_strategy() -> impl Strategy<Value = TouchScript> {
    prop::collection::vec(step_strategy(), 1..80).prop_map(|steps| {
        let mut script = TouchScript::new("generated");
        let mut at = 0;
        for (dt, step) in steps {
            at += dt;
            script = match step {
                Step::Add(id, x, y) => script.add(at, id, (x, y)),
                Step::Move(id, x, y) => script.moved(at, id, (x, y)),
                Step::Remove(id, x, y) => script.remove(at, id, (x, y)),
                Step::Frame => script.frame(at),
            };
        }
        script
    })
}

fn summary(script: &TouchScript) -> Vec<(GestureKind, Vec<u32>)> {
    let mut replayer = Replayer::for_script(script).unwrap();
    replayer.run(script).unwrap().summary()
}

// ═══════════════════════════════════════════════════════════════════════
// 1. Determinism
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn replay_is_deterministic(script in script_strategy()) {
        prop_assert_eq!(summary(&script), summary(&script));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 2. Ownership
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn recorders_only_hear_about_claimed_contacts(script in script_strategy()) {
        let mut replayer = Replayer::for_script(&script).unwrap();
        let (odd, odd_log) = Recorder::new(ClaimRule::only(&[1, 3]));
        let (low, low_log) = Recorder::new(ClaimRule::only(&[0, 1, 2]));
        replayer.register(odd);
        replayer.register(low);
        let outcome = replayer.run(&script).unwrap();
        prop_assert_eq!(outcome.diagnostics.internal_errors, 0);

        for (log, claimed) in [(odd_log, vec![1u32, 3]), (low_log, vec![0, 1, 2])] {
            let claimed: BTreeSet<u32> = claimed.into_iter().collect();
            for (kind, ids) in log.summary() {
                prop_assert!(!kind.is_raw());
                prop_assert!(!ids.is_empty());
                prop_assert!(
                    ids.iter().all(|id| claimed.contains(id)),
                    "{} carried {:?}, claimed {:?}", kind, ids, claimed
                );
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// 3. JSON round trip
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn script_survives_json(script in script_strategy()) {
        let json = script.to_json_pretty().unwrap();
        let back = TouchScript::from_json_str(&json).unwrap();
        prop_assert_eq!(back, script);
    }
}
