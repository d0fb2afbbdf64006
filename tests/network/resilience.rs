//! Whole scenarios over faulty links.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use predictive_sync::checksum::compute_checksum;
use predictive_sync::games::side_scroller::{Heading, SideScroller, SideScrollerAction, SideScrollerConfig};
use predictive_sync::games::top_down::{TopDown, TopDownConfig};
use predictive_sync::{
    AlgebraicProtocol, ChaosConfig, CompoundAction, PlayerId, Protocol, RollbackProtocol, Scenario,
};

use crate::common::{assert_converged, init_tracing, move_then_idle, top_down_inputs, MOVE_TICKS};

/// Checksums of the server and every client after each tick.
fn trace<P>(protocol: P, chaos: ChaosConfig) -> Vec<Vec<u64>>
where
    P: Protocol<TopDownConfig, TopDown>,
{
    let mut scenario = Scenario::<TopDownConfig, _, _>::builder(protocol)
        .with_players(["A", "B", "C"])
        .with_chaos(chaos)
        .start(TopDown::new)
        .unwrap();

    (0..MOVE_TICKS * 2)
        .map(|tick| {
            scenario.tick(&top_down_inputs(tick));
            let mut sums = vec![compute_checksum(&scenario.server_state()).unwrap()];
            let ids: Vec<PlayerId> = scenario.client_ids().cloned().collect();
            for id in &ids {
                sums.push(compute_checksum(&scenario.client_state(id).unwrap()).unwrap());
            }
            sums
        })
        .collect()
}

#[test]
fn same_seed_reproduces_every_snapshot() {
    let chaos = ChaosConfig::terrible_network().with_seed(42);
    assert_eq!(
        trace(RollbackProtocol::default(), chaos.clone()),
        trace(RollbackProtocol::default(), chaos.clone())
    );
    assert_eq!(
        trace(AlgebraicProtocol::default(), chaos.clone()),
        trace(AlgebraicProtocol::default(), chaos)
    );
}

#[test]
fn different_seeds_change_what_clients_see() {
    let first = trace(RollbackProtocol::default(), ChaosConfig::terrible_network().with_seed(1));
    let second = trace(RollbackProtocol::default(), ChaosConfig::terrible_network().with_seed(2));
    assert_ne!(first, second);
}

#[test]
fn rollback_converges_over_a_terrible_network() {
    init_tracing();
    let mut scenario = Scenario::<TopDownConfig, _, _>::builder(RollbackProtocol::default())
        .with_players(["A", "B"])
        .with_chaos(ChaosConfig::terrible_network().with_seed(3))
        .start(TopDown::new)
        .unwrap();
    move_then_idle(&mut scenario);
    scenario.run(100, &CompoundAction::new());
    assert_converged(&scenario);
}

#[test]
fn side_scroller_rollback_converges_under_latency() {
    let mut scenario = Scenario::<SideScrollerConfig, _, _>::builder(RollbackProtocol::default())
        .with_players(["A", "B"])
        .with_chaos(ChaosConfig::high_latency(5))
        .start(SideScroller::new)
        .unwrap();

    let mut run_and_jump = CompoundAction::new();
    run_and_jump.insert(PlayerId::from("A"), SideScrollerAction::running(Heading::Right));
    run_and_jump.insert(PlayerId::from("B"), SideScrollerAction::jumping());
    scenario.run(30, &run_and_jump);
    scenario.run(80, &CompoundAction::new());

    assert!(scenario.desynced_clients().unwrap().is_empty());
}
