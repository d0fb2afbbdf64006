//! Protocols over real UDP sockets on the loopback interface.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::net::{Ipv4Addr, SocketAddr};
use std::thread;
use std::time::Duration;

use predictive_sync::games::top_down::{TopDown, TopDownConfig};
use predictive_sync::{
    AlgebraicProtocol, ClientStrategy, CompoundAction, PlayerId, Protocol, RollbackProtocol,
    ServerStrategy, Socket, UdpSocket,
};
use serial_test::serial;

use crate::common::{top_down_inputs, IDLE_TICKS, MOVE_TICKS};

const SETTLE: Duration = Duration::from_millis(2);

fn any_local_port() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
}

/// One bound socket pair per player: `(client end, server end)`.
fn udp_links<M>(ids: &[&str]) -> Vec<(UdpSocket<M>, UdpSocket<M>)> {
    ids.iter()
        .map(|id| {
            let mut client = UdpSocket::bind(*id, any_local_port(), any_local_port()).unwrap();
            let server = UdpSocket::bind(*id, any_local_port(), client.local_addr().unwrap()).unwrap();
            client.set_peer(server.local_addr().unwrap());
            (client, server)
        })
        .collect()
}

/// Drives one server and its clients over UDP until input stops, then returns whether
/// every client ended on the server's snapshot.
fn run_over_udp<P>(protocol: P) -> bool
where
    P: Protocol<TopDownConfig, TopDown>,
    UdpSocket<P::Message>: Socket<P::Message> + 'static,
{
    let ids = ["A", "B"];
    let mut server_sockets: Vec<Box<dyn Socket<P::Message>>> = Vec::new();
    let mut clients = Vec::new();
    for (client_end, server_end) in udp_links::<P::Message>(&ids) {
        server_sockets.push(Box::new(server_end));
        clients.push(protocol.wrap_client(TopDown::new(), Box::new(client_end)));
    }
    let mut server = protocol.wrap_server(TopDown::new(), server_sockets).unwrap();

    for tick in 0..MOVE_TICKS + IDLE_TICKS {
        let inputs = if tick < MOVE_TICKS {
            top_down_inputs(tick)
        } else {
            CompoundAction::new()
        };
        thread::sleep(SETTLE);
        server.update();
        thread::sleep(SETTLE);
        for client in &mut clients {
            let input = inputs.get(client.id()).copied().unwrap_or_default();
            client.update(input);
        }
    }

    let server_state = server.state();
    clients.iter().all(|client| client.state() == server_state)
}

#[test]
#[serial]
#[cfg(not(miri))]
fn rollback_converges_over_loopback() {
    assert!(run_over_udp(RollbackProtocol::default()));
}

#[test]
#[serial]
#[cfg(not(miri))]
fn algebraic_converges_over_loopback() {
    assert!(run_over_udp(AlgebraicProtocol::default()));
}

#[test]
#[serial]
#[cfg(not(miri))]
fn datagrams_from_strangers_are_ignored() {
    let mut links = udp_links::<u32>(&["A"]);
    let (mut client, mut server) = links.pop().unwrap();
    let mut stranger = UdpSocket::<u32>::bind("Z", any_local_port(), server.local_addr().unwrap()).unwrap();

    stranger.send(13);
    client.send(7);
    thread::sleep(Duration::from_millis(20));

    assert_eq!(server.receive(), Some(7));
    assert_eq!(server.receive(), None);
    assert_eq!(client.id(), &PlayerId::from("A"));
}
