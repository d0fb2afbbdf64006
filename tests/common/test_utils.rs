//! Shared test utilities for integration tests.
//!
//! Scenario helpers that drive the top-down reference game with a fixed input script,
//! plus tracing setup for debugging a failing test with `RUST_LOG`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use predictive_sync::games::top_down::{Direction, TopDown, TopDownAction, TopDownConfig};
use predictive_sync::{CompoundAction, PlayerId, Protocol, Scenario};

/// Ticks of scripted movement in [`move_then_idle`].
pub const MOVE_TICKS: usize = 24;

/// Ticks of idle input after the script, enough for any tested latency to drain.
pub const IDLE_TICKS: usize = 60;

/// Installs a test-writer subscriber once per binary. Later calls are no-ops.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// The input script: `A` walks a square, `B` zigzags, and both are busy at once.
#[must_use]
pub fn top_down_inputs(tick: usize) -> CompoundAction<TopDownAction> {
    let square = [Direction::Right, Direction::Up, Direction::Left, Direction::Down];
    let zigzag = [Direction::Left, Direction::Up];

    let mut inputs = CompoundAction::new();
    inputs.insert(
        PlayerId::from("A"),
        TopDownAction::moving(square[(tick / 6) % square.len()]),
    );
    if tick % 3 != 0 {
        inputs.insert(
            PlayerId::from("B"),
            TopDownAction::moving(zigzag[(tick / 4) % zigzag.len()]),
        );
    }
    inputs
}

/// Plays [`top_down_inputs`] for [`MOVE_TICKS`], then idles for [`IDLE_TICKS`].
pub fn move_then_idle<P>(scenario: &mut Scenario<TopDownConfig, P, TopDown>)
where
    P: Protocol<TopDownConfig, TopDown>,
{
    for tick in 0..MOVE_TICKS {
        scenario.tick(&top_down_inputs(tick));
    }
    scenario.run(IDLE_TICKS, &CompoundAction::new());
}

/// Asserts every client's snapshot equals the server's.
#[allow(dead_code)]
pub fn assert_converged<P>(scenario: &Scenario<TopDownConfig, P, TopDown>)
where
    P: Protocol<TopDownConfig, TopDown>,
{
    let desynced = scenario.desynced_clients().expect("snapshots encode");
    assert!(
        desynced.is_empty(),
        "{} clients diverged after {} ticks: {:?}",
        scenario.kind(),
        scenario.ticks(),
        desynced
    );
    let server = scenario.server_state();
    for id in scenario.client_ids() {
        assert_eq!(scenario.client_state(id).as_ref(), Some(&server), "client {id}");
    }
}
