//! What a client shows relative to the authoritative snapshot, tick by tick.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use predictive_sync::{
    AlgebraicMessage, AlgebraicProtocol, ClientStrategy, CompoundAction, MemorySocket,
    OverrideProtocol, PlayerId, Protocol, RollbackMessage, RollbackProtocol, Scenario,
    ServerStrategy, Socket,
};

use crate::common::stubs::{Tally, TallyConfig, TallyState};

fn both(a: i64, b: i64) -> CompoundAction<i64> {
    [(PlayerId::from("A"), a), (PlayerId::from("B"), b)]
        .into_iter()
        .collect()
}

#[test]
fn override_client_mirrors_server_every_tick() {
    let mut scenario = Scenario::<TallyConfig, _, _>::builder(OverrideProtocol::default())
        .with_players(["A", "B"])
        .start(Tally::default)
        .unwrap();

    for step in 1..=10 {
        scenario.tick(&both(step, -step));
        let server = scenario.server_state();
        for id in ["A", "B"] {
            assert_eq!(scenario.client_state(&PlayerId::from(id)), Some(server.clone()));
        }
    }
}

#[test]
fn rollback_client_is_server_plus_own_current_input() {
    let mut scenario = Scenario::<TallyConfig, _, _>::builder(RollbackProtocol::default())
        .with_players(["A", "B"])
        .start(Tally::default)
        .unwrap();

    let mut previous_b = 0;
    for step in 1..=10 {
        scenario.tick(&both(step, 2 * step));
        let server = scenario.server_state();
        let client = scenario.client_state(&PlayerId::from("A")).unwrap();
        // own input lands one tick before the server sees it
        assert_eq!(client.total("A"), server.total("A") + step);
        // B's last echoed input is repeated for the tick the server has not run yet
        assert_eq!(client.total("B"), server.total("B") + previous_b);
        previous_b = 2 * step;
    }
}

#[test]
fn algebraic_client_is_server_plus_own_current_input() {
    let mut scenario = Scenario::<TallyConfig, _, _>::builder(AlgebraicProtocol::default())
        .with_players(["A", "B"])
        .start(Tally::default)
        .unwrap();

    for step in 1..=10 {
        scenario.tick(&both(step, 3));
        let server = scenario.server_state();
        let client = scenario.client_state(&PlayerId::from("A")).unwrap();
        assert_eq!(client.total("A"), server.total("A") + step);
        // only the local player is predicted
        assert_eq!(client.total("B"), server.total("B"));
    }
}

#[test]
fn rollback_coalesces_unread_inputs_and_snaps_to_the_server() {
    type Message = RollbackMessage<i64, TallyState>;
    let protocol = RollbackProtocol::default();
    let (client_end, server_end) = MemorySocket::<Message>::pair("A");
    let mut server = Protocol::<TallyConfig, Tally>::wrap_server(
        &protocol,
        Tally::default(),
        vec![Box::new(server_end)],
    )
    .unwrap();
    let mut client =
        Protocol::<TallyConfig, Tally>::wrap_client(&protocol, Tally::default(), Box::new(client_end));

    server.update();
    for input in [1, 2, 3] {
        client.update(input);
    }
    assert_eq!(client.state().total("A"), 6);
    assert_eq!(client.pending(), 3);

    // only the newest input survives drain-to-latest
    server.update();
    assert_eq!(server.state().total("A"), 3);
    assert_eq!(server.ack_for(&PlayerId::from("A")).map(|t| t.as_u64()), Some(3));

    client.update(0);
    assert_eq!(client.state(), server.state());
    assert_eq!(client.pending(), 1);
}

#[test]
fn algebraic_baseline_populates_a_fresh_client() {
    type Message = AlgebraicMessage<i64, TallyState>;
    let protocol = AlgebraicProtocol::default();
    let (client_end, server_end) = MemorySocket::<Message>::pair("A");
    let mut server = Protocol::<TallyConfig, Tally>::wrap_server(
        &protocol,
        Tally::default(),
        vec![Box::new(server_end)],
    )
    .unwrap();
    let mut client =
        Protocol::<TallyConfig, Tally>::wrap_client(&protocol, Tally::default(), Box::new(client_end));

    assert!(client.state().totals.is_empty());
    client.update(0);
    assert_eq!(client.state(), server.state());

    server.update();
    client.update(0);
    assert_eq!(client.state(), server.state());
    assert_eq!(client.id(), &PlayerId::from("A"));
}

#[test]
fn sockets_report_player_ids() {
    let (client_end, server_end) = MemorySocket::<u8>::pair("B");
    assert_eq!(client_end.id(), server_end.id());
    assert_eq!(client_end.id().as_str(), "B");
}
