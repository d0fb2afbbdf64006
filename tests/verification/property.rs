//! Property-based tests for the State Algebra laws, replay through prediction and
//! end-to-end convergence.
//!
//! Case counts are kept low because every convergence case drives a whole scenario.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::collections::BTreeMap;

use predictive_sync::games::side_scroller::{
    Heading, SideScroller, SideScrollerAction, SideScrollerConfig,
};
use predictive_sync::games::top_down::{
    Direction, Player, TopDown, TopDownAction, TopDownConfig, TopDownState,
};
use predictive_sync::{
    AlgebraicProtocol, ChaosConfig, CompoundAction, Config, OverrideProtocol, PlayerId, Protocol,
    RollbackProtocol, Scenario, Simulation, StateAlgebra, Structural,
};
use proptest::prelude::*;

use crate::common::stubs::{Tally, TallyConfig};

const CASES: u32 = 32;
const SETTLE_TICKS: usize = 30;

/// Whole-number coordinates keep float sums exact.
fn coordinate() -> impl Strategy<Value = f64> {
    (-500i32..500).prop_map(f64::from)
}

fn player() -> impl Strategy<Value = Player> {
    (coordinate(), coordinate(), -5i32..=5, -5i32..=5).prop_map(|(x, y, vx, vy)| Player {
        x,
        y,
        vx: f64::from(vx),
        vy: f64::from(vy),
        radius: Structural(25.0),
    })
}

/// Two states over the same player set.
fn state_pair() -> impl Strategy<Value = (TopDownState, TopDownState)> {
    prop::collection::vec((player(), player()), 1..5).prop_map(|pairs| {
        let mut base = TopDownState::new();
        let mut target = TopDownState::new();
        for (index, (from, to)) in pairs.into_iter().enumerate() {
            let id = PlayerId::from(format!("P{index}"));
            base.players.insert(id.clone(), from);
            target.players.insert(id, to);
        }
        (base, target)
    })
}

fn tally_inputs() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec((-50i64..50, -50i64..50), 1..30)
}

/// Feeds the scripted inputs, lets the links drain, and reports any client still off.
fn desynced_after<P>(protocol: P, inputs: &[(i64, i64)], latency: u64) -> Vec<PlayerId>
where
    P: Protocol<TallyConfig, Tally>,
{
    let mut scenario = Scenario::<TallyConfig, _, _>::builder(protocol)
        .with_players(["A", "B"])
        .with_chaos(ChaosConfig::high_latency(latency))
        .start(Tally::default)
        .unwrap();

    for &(a, b) in inputs {
        let mut actions = CompoundAction::new();
        actions.insert(PlayerId::from("A"), a);
        actions.insert(PlayerId::from("B"), b);
        scenario.tick(&actions);
    }
    scenario.run(SETTLE_TICKS, &CompoundAction::new());
    scenario.desynced_clients().unwrap()
}

fn top_down_action() -> impl Strategy<Value = TopDownAction> {
    prop_oneof![
        Just(TopDownAction::idle()),
        Just(TopDownAction::moving(Direction::Up)),
        Just(TopDownAction::moving(Direction::Down)),
        Just(TopDownAction::moving(Direction::Left)),
        Just(TopDownAction::moving(Direction::Right)),
    ]
}

fn side_scroller_action() -> impl Strategy<Value = SideScrollerAction> {
    (
        prop_oneof![Just(None), Just(Some(Heading::Left)), Just(Some(Heading::Right))],
        any::<bool>(),
    )
        .prop_map(|(movement, jump)| SideScrollerAction { movement, jump })
}

/// Top-down compounds where either player may be absent.
fn top_down_script() -> impl Strategy<Value = Vec<CompoundAction<TopDownAction>>> {
    let compound = (prop::option::of(top_down_action()), prop::option::of(top_down_action()))
        .prop_map(|(a, b)| {
            let mut actions = CompoundAction::new();
            if let Some(a) = a {
                actions.insert(PlayerId::from("A"), a);
            }
            if let Some(b) = b {
                actions.insert(PlayerId::from("B"), b);
            }
            actions
        });
    prop::collection::vec(compound, 1..40)
}

/// Side-scroller compounds with an action for every player, since prediction freezes
/// anyone left out.
fn side_scroller_script() -> impl Strategy<Value = Vec<CompoundAction<SideScrollerAction>>> {
    let compound = (side_scroller_action(), side_scroller_action()).prop_map(|(a, b)| {
        let mut actions = CompoundAction::new();
        actions.insert(PlayerId::from("A"), a);
        actions.insert(PlayerId::from("B"), b);
        actions
    });
    prop::collection::vec(compound, 1..40)
}

/// Replays `script` from the snapshot `warmup` ticks in, once through `predict` and
/// once through `update`, and returns both results.
fn replay_both_ways<T, S>(
    mut factory: impl FnMut() -> S,
    script: &[CompoundAction<T::Action>],
    warmup: usize,
) -> (T::State, T::State)
where
    T: Config,
    S: Simulation<T>,
{
    let mut origin = factory();
    for id in ["A", "B"] {
        origin.spawn_player(&PlayerId::from(id)).unwrap();
    }
    for actions in script.iter().take(warmup) {
        origin.update(actions);
    }
    let start = origin.state();

    let mut predicted = factory();
    let mut authoritative = factory();
    predicted.set_state(start.clone());
    authoritative.set_state(start);
    for actions in script {
        predicted.predict(actions);
        authoritative.update(actions);
    }
    (predicted.state(), authoritative.state())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(CASES))]

    #[test]
    fn prop_difference_reconstructs_target((base, target) in state_pair()) {
        let delta = target.difference(&base);
        prop_assert_eq!(base.add(&delta), target);
    }

    #[test]
    fn prop_negation_is_an_involution((state, _) in state_pair()) {
        prop_assert_eq!(state.negate().negate(), state);
    }

    #[test]
    fn prop_map_add_commutes(
        a in prop::collection::btree_map(0u8..8, -1000i64..1000, 0..6),
        b in prop::collection::btree_map(0u8..8, -1000i64..1000, 0..6),
    ) {
        let a: BTreeMap<u8, i64> = a;
        prop_assert_eq!(a.add(&b), b.add(&a));
    }

    #[test]
    fn prop_top_down_replay_through_predict_matches_update(
        script in top_down_script(),
        warmup in 0usize..10,
    ) {
        let (predicted, authoritative) = replay_both_ways::<TopDownConfig, _>(
            || TopDown::new().with_static_entities_in_prediction(false),
            &script,
            warmup,
        );
        prop_assert_eq!(predicted, authoritative);
    }

    #[test]
    fn prop_side_scroller_replay_through_predict_matches_update(
        script in side_scroller_script(),
        warmup in 0usize..10,
    ) {
        let (predicted, authoritative) =
            replay_both_ways::<SideScrollerConfig, _>(SideScroller::new, &script, warmup);
        prop_assert_eq!(predicted, authoritative);
    }

    #[test]
    fn prop_override_converges(inputs in tally_inputs(), latency in 0u64..6) {
        prop_assert!(desynced_after(OverrideProtocol::default(), &inputs, latency).is_empty());
    }

    #[test]
    fn prop_rollback_converges(inputs in tally_inputs(), latency in 0u64..6) {
        prop_assert!(desynced_after(RollbackProtocol::default(), &inputs, latency).is_empty());
    }

    #[test]
    fn prop_algebraic_converges(inputs in tally_inputs(), latency in 0u64..6) {
        prop_assert!(desynced_after(AlgebraicProtocol::default(), &inputs, latency).is_empty());
    }
}
