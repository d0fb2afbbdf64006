//! Identical runs must produce identical snapshots, bit for bit.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use predictive_sync::checksum::compute_checksum;
use predictive_sync::games::side_scroller::{Heading, SideScroller, SideScrollerAction, SideScrollerState};
use predictive_sync::games::top_down::{TopDown, TopDownConfig};
use predictive_sync::{CompoundAction, PlayerId, RollbackProtocol, Scenario, Simulation};

use crate::common::{move_then_idle, top_down_inputs, MOVE_TICKS};

fn side_scroller_run(ticks: usize) -> SideScrollerState {
    let mut game = SideScroller::new();
    for id in ["A", "B", "C"] {
        game.spawn_player(&PlayerId::from(id)).unwrap();
    }
    for tick in 0..ticks {
        let mut actions = CompoundAction::new();
        let heading = if (tick / 15) % 2 == 0 { Heading::Right } else { Heading::Left };
        actions.insert(PlayerId::from("A"), SideScrollerAction::running(heading));
        actions.insert(
            PlayerId::from("B"),
            SideScrollerAction {
                movement: Some(Heading::Left),
                jump: tick % 11 == 0,
            },
        );
        game.update(&actions);
    }
    game.state()
}

#[test]
fn side_scroller_runs_are_identical() {
    let first = side_scroller_run(500);
    let second = side_scroller_run(500);
    assert_eq!(compute_checksum(&first).unwrap(), compute_checksum(&second).unwrap());
    assert_eq!(first, second);
}

#[test]
fn snapshot_round_trip_through_set_state_is_lossless() {
    let mut original = TopDown::new();
    original.spawn_player(&PlayerId::from("A")).unwrap();
    for tick in 0..MOVE_TICKS {
        original.update(&top_down_inputs(tick));
    }

    let mut copy = TopDown::new();
    copy.set_state(original.state());
    for tick in 0..MOVE_TICKS {
        original.update(&top_down_inputs(tick));
        copy.update(&top_down_inputs(tick));
    }
    assert_eq!(original.state(), copy.state());
}

#[test]
fn scenario_runs_are_identical() {
    let run = || {
        let mut scenario = Scenario::<TopDownConfig, _, _>::builder(RollbackProtocol::default())
            .with_players(["A", "B"])
            .start(TopDown::new)
            .unwrap();
        move_then_idle(&mut scenario);
        compute_checksum(&scenario.server_state()).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn checksums_distinguish_player_positions() {
    let mut moved = TopDown::new();
    let mut still = TopDown::new();
    for game in [&mut moved, &mut still] {
        game.spawn_player(&PlayerId::from("A")).unwrap();
    }
    moved.update(&top_down_inputs(0));
    assert_ne!(
        compute_checksum(&moved.state()).unwrap(),
        compute_checksum(&still.state()).unwrap()
    );
}
