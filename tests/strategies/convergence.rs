//! Every protocol must bring every client back to the server's snapshot once players
//! stop sending input. One test per protocol and link is stamped out by `protocol_suite!`.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use predictive_sync::games::top_down::{TopDown, TopDownConfig, TopDownState};
use predictive_sync::{
    AlgebraicProtocol, ChaosConfig, CompoundAction, OverrideProtocol, PlayerId, RollbackProtocol,
    Scenario, Simulation, StrategyConfig,
};

use crate::common::{assert_converged, move_then_idle, top_down_inputs, MOVE_TICKS};

/// What the server must have applied after `ticks` scenario ticks over lossless
/// in-memory links: one empty update, then every client's input one tick late.
fn expected_server_state(ticks: usize) -> TopDownState {
    let mut reference = TopDown::new();
    for id in ["A", "B"] {
        reference.spawn_player(&PlayerId::from(id)).unwrap();
    }
    reference.update(&CompoundAction::new());
    for tick in 0..ticks - 1 {
        let script = top_down_inputs(tick);
        let inputs: CompoundAction<_> = ["A", "B"]
            .into_iter()
            .map(PlayerId::from)
            .map(|id| {
                let action = script.get(&id).copied().unwrap_or_default();
                (id, action)
            })
            .collect();
        reference.update(&inputs);
    }
    reference.state()
}

macro_rules! protocol_suite {
    ($($name:ident => $protocol:expr),* $(,)?) => {
        pastey::paste! {
            $(
                #[test]
                fn [<$name _clients_converge_once_input_stops>]() {
                    let mut scenario = Scenario::<TopDownConfig, _, _>::builder($protocol)
                        .with_players(["A", "B"])
                        .start(TopDown::new)
                        .unwrap();
                    move_then_idle(&mut scenario);
                    assert_converged(&scenario);
                }

                #[test]
                fn [<$name _server_applies_every_input_once>]() {
                    let mut scenario = Scenario::<TopDownConfig, _, _>::builder($protocol)
                        .with_players(["A", "B"])
                        .start(TopDown::new)
                        .unwrap();
                    for tick in 0..MOVE_TICKS {
                        scenario.tick(&top_down_inputs(tick));
                    }
                    assert_eq!(scenario.server_state(), expected_server_state(MOVE_TICKS));
                }

                #[test]
                fn [<$name _converges_under_fixed_latency>]() {
                    let mut scenario = Scenario::<TopDownConfig, _, _>::builder($protocol)
                        .with_players(["A", "B"])
                        .with_chaos(ChaosConfig::high_latency(4))
                        .start(TopDown::new)
                        .unwrap();
                    move_then_idle(&mut scenario);
                    assert_converged(&scenario);
                }

                #[test]
                fn [<$name _converges_under_jitter>]() {
                    let chaos = ChaosConfig::builder().latency(3).jitter(2).seed(7).build();
                    let mut scenario = Scenario::<TopDownConfig, _, _>::builder($protocol)
                        .with_players(["A", "B"])
                        .with_chaos(chaos)
                        .start(TopDown::new)
                        .unwrap();
                    move_then_idle(&mut scenario);
                    assert_converged(&scenario);
                }

                #[test]
                fn [<$name _single_player_converges>]() {
                    let mut scenario = Scenario::<TopDownConfig, _, _>::builder($protocol)
                        .with_players(["A"])
                        .start(TopDown::new)
                        .unwrap();
                    move_then_idle(&mut scenario);
                    assert_converged(&scenario);
                }
            )*
        }
    };
}

protocol_suite! {
    override_sync => OverrideProtocol::default(),
    rollback => RollbackProtocol::default(),
    algebraic => AlgebraicProtocol::default(),
}

#[test]
fn clients_agree_with_each_other_while_moving_under_override() {
    let mut scenario = Scenario::<TopDownConfig, _, _>::builder(OverrideProtocol::default())
        .with_players(["A", "B"])
        .start(TopDown::new)
        .unwrap();
    for tick in 0..MOVE_TICKS {
        scenario.tick(&top_down_inputs(tick));
        let a = scenario.client_state(&PlayerId::from("A")).unwrap();
        let b = scenario.client_state(&PlayerId::from("B")).unwrap();
        assert_eq!(a, b, "tick {tick}");
    }
}

#[test]
fn prediction_shows_own_input_immediately() {
    let mut scenario = Scenario::<TopDownConfig, _, _>::builder(RollbackProtocol::default())
        .with_players(["A", "B"])
        .start(TopDown::new)
        .unwrap();
    scenario.tick(&CompoundAction::new());
    scenario.tick(&top_down_inputs(0));

    let id = PlayerId::from("A");
    let predicted = scenario.client_state(&id).unwrap();
    let authoritative = scenario.server_state();
    assert_eq!(predicted.players[&id].x, 5.0);
    assert_eq!(authoritative.players[&id].x, 0.0);
}

#[test]
fn algebraic_converges_when_deltas_arrive_out_of_order() {
    for seed in 1..=8 {
        let chaos = ChaosConfig::builder()
            .latency(2)
            .jitter(3)
            .reordering(4, 0.5)
            .seed(seed)
            .build();
        let mut scenario = Scenario::<TopDownConfig, _, _>::builder(AlgebraicProtocol::default())
            .with_players(["A", "B"])
            .with_chaos(chaos)
            .start(TopDown::new)
            .unwrap();
        move_then_idle(&mut scenario);
        assert!(
            scenario.desynced_clients().unwrap().is_empty(),
            "seed {seed} diverged"
        );
    }
}

#[test]
fn algebraic_converges_with_a_capped_drift_history() {
    let config = StrategyConfig::builder()
        .with_max_pending_actions(2)
        .unwrap()
        .build();
    let mut scenario =
        Scenario::<TopDownConfig, _, _>::builder(AlgebraicProtocol::new().with_config(config))
            .with_players(["A", "B"])
            .with_chaos(ChaosConfig::high_latency(4))
            .start(TopDown::new)
            .unwrap();
    move_then_idle(&mut scenario);
    assert_converged(&scenario);
}
