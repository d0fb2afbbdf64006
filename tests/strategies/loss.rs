//! Dropped messages: snapshots heal, deltas do not.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use predictive_sync::games::top_down::{TopDown, TopDownConfig};
use predictive_sync::{
    AlgebraicMessage, AlgebraicProtocol, ChaosConfig, ClientStrategy, MemorySocket,
    OverrideProtocol, Protocol, RollbackMessage, RollbackProtocol, Scenario, ServerStrategy,
};

use crate::common::stubs::{DroppingSocket, Tally, TallyConfig, TallyState};
use crate::common::{assert_converged, move_then_idle};

#[test]
fn dropped_delta_offsets_the_client_permanently() {
    type Message = AlgebraicMessage<i64, TallyState>;
    let protocol = AlgebraicProtocol::default();
    let (client_end, server_end) = MemorySocket::<Message>::pair("A");
    // message 0 is the baseline, message n the delta of server update n
    let server_end = DroppingSocket::new(server_end, [2]);
    let mut server = Protocol::<TallyConfig, Tally>::wrap_server(
        &protocol,
        Tally::default(),
        vec![Box::new(server_end)],
    )
    .unwrap();
    let mut client =
        Protocol::<TallyConfig, Tally>::wrap_client(&protocol, Tally::default(), Box::new(client_end));

    client.update(5);
    server.update();
    client.update(7);
    server.update(); // +7 is lost on the way back
    for _ in 0..10 {
        client.update(0);
        server.update();
    }
    client.update(0);

    assert_eq!(server.state().total("A"), 12);
    assert_eq!(client.state().total("A"), 12 - 7);
}

#[test]
fn dropped_snapshot_is_healed_by_the_next_one() {
    type Message = RollbackMessage<i64, TallyState>;
    let protocol = RollbackProtocol::default();
    let (client_end, server_end) = MemorySocket::<Message>::pair("A");
    let server_end = DroppingSocket::new(server_end, [1]);
    let mut server = Protocol::<TallyConfig, Tally>::wrap_server(
        &protocol,
        Tally::default(),
        vec![Box::new(server_end)],
    )
    .unwrap();
    let mut client =
        Protocol::<TallyConfig, Tally>::wrap_client(&protocol, Tally::default(), Box::new(client_end));

    client.update(5);
    server.update();
    client.update(7);
    server.update(); // snapshot with A = 12 is lost
    client.update(0);
    assert_eq!(client.state().total("A"), 12);

    server.update();
    client.update(0);
    assert_eq!(client.state(), server.state());
}

#[test]
fn dropped_input_is_never_applied_but_clients_still_agree() {
    type Message = RollbackMessage<i64, TallyState>;
    let protocol = RollbackProtocol::default();
    let (client_end, server_end) = MemorySocket::<Message>::pair("A");
    let client_end = DroppingSocket::new(client_end, [0]);
    let mut server = Protocol::<TallyConfig, Tally>::wrap_server(
        &protocol,
        Tally::default(),
        vec![Box::new(server_end)],
    )
    .unwrap();
    let mut client =
        Protocol::<TallyConfig, Tally>::wrap_client(&protocol, Tally::default(), Box::new(client_end));

    server.update();
    client.update(5); // lost
    assert_eq!(client.state().total("A"), 5);

    server.update();
    client.update(0);
    server.update();
    client.update(0);

    assert_eq!(server.state().total("A"), 0);
    assert_eq!(client.state(), server.state());
}

macro_rules! lossy_suite {
    ($($name:ident => $protocol:expr),* $(,)?) => {
        pastey::paste! {
            $(
                #[test]
                fn [<$name _converges_over_lossy_links>]() {
                    let mut scenario = Scenario::<TopDownConfig, _, _>::builder($protocol)
                        .with_players(["A", "B"])
                        .with_chaos(ChaosConfig::lossy(0.2).with_seed(11))
                        .start(TopDown::new)
                        .unwrap();
                    move_then_idle(&mut scenario);
                    assert_converged(&scenario);
                }

                #[test]
                fn [<$name _converges_over_a_poor_network>]() {
                    let mut scenario = Scenario::<TopDownConfig, _, _>::builder($protocol)
                        .with_players(["A", "B"])
                        .with_chaos(ChaosConfig::poor_network())
                        .start(TopDown::new)
                        .unwrap();
                    move_then_idle(&mut scenario);
                    assert_converged(&scenario);
                }
            )*
        }
    };
}

// Algebraic is left out on purpose: a lost delta is never resent.
lossy_suite! {
    override_sync => OverrideProtocol::default(),
    rollback => RollbackProtocol::default(),
}
