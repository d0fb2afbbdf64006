//! Non-blocking UDP transport.
//!
//! One [`UdpSocket`] per client on each side: the server binds one per player and the
//! client binds one towards the server. There is no handshake; the peer address is given
//! up front.

use std::{
    io::ErrorKind,
    marker::PhantomData,
    net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket as StdUdpSocket},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::network::codec;
use crate::report_violation;
use crate::telemetry::{ViolationKind, ViolationSeverity};
use crate::{PlayerId, Socket, SyncError};

/// Largest payload a single UDP datagram can carry over IPv4.
const RECV_BUFFER_SIZE: usize = 65_507;
/// Initial send buffer. Larger messages fall back to an allocating encode.
const SEND_BUFFER_SIZE: usize = 1024;
/// Datagrams above this size may be fragmented on the way.
/// Source: <https://stackoverflow.com/a/35697810/775982>
const IDEAL_MAX_UDP_PACKET_SIZE: usize = 508;

/// A non-blocking UDP [`Socket`] connected to exactly one peer.
///
/// Messages are encoded with [`codec`](crate::network::codec). Datagrams from any other
/// address, and datagrams that fail to decode, are reported and skipped. Full snapshots
/// must fit in one datagram; larger messages are still sent, but may not arrive.
#[derive(Debug)]
pub struct UdpSocket<M> {
    id: PlayerId,
    socket: StdUdpSocket,
    peer: SocketAddr,
    recv_buffer: Vec<u8>,
    send_buffer: Vec<u8>,
    _message: PhantomData<fn(M) -> M>,
}

impl<M> UdpSocket<M> {
    /// Binds to `local` in non-blocking mode and talks to `peer`.
    pub fn bind(id: impl Into<PlayerId>, local: SocketAddr, peer: SocketAddr) -> Result<Self, SyncError> {
        let socket = StdUdpSocket::bind(local).map_err(|err| SyncError::SocketError {
            context: format!("failed to bind {local}: {err}"),
        })?;
        socket
            .set_nonblocking(true)
            .map_err(|err| SyncError::SocketError {
                context: format!("failed to make {local} non-blocking: {err}"),
            })?;
        Ok(Self {
            id: id.into(),
            socket,
            peer,
            recv_buffer: vec![0; RECV_BUFFER_SIZE],
            send_buffer: vec![0; SEND_BUFFER_SIZE],
            _message: PhantomData,
        })
    }

    /// Binds to `0.0.0.0:port` and talks to `peer`. Port 0 lets the OS choose.
    pub fn bind_to_port(id: impl Into<PlayerId>, port: u16, peer: SocketAddr) -> Result<Self, SyncError> {
        Self::bind(id, SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port), peer)
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr, SyncError> {
        self.socket.local_addr().map_err(|err| SyncError::SocketError {
            context: format!("failed to read local address: {err}"),
        })
    }

    /// The address messages are sent to.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Changes the peer, for example once the remote end's port is known.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = peer;
    }

    fn send_encoded(&self, buf: &[u8]) {
        if buf.len() > IDEAL_MAX_UDP_PACKET_SIZE {
            report_violation!(
                ViolationSeverity::Warning,
                ViolationKind::Transport,
                "sending {} byte datagram to {}, larger than ideal ({})",
                buf.len(),
                self.peer,
                IDEAL_MAX_UDP_PACKET_SIZE
            );
        }
        if let Err(err) = self.socket.send_to(buf, self.peer) {
            report_violation!(
                ViolationSeverity::Warning,
                ViolationKind::Transport,
                "failed to send datagram to {}: {}",
                self.peer,
                err
            );
        }
    }
}

impl<M: Serialize + DeserializeOwned> UdpSocket<M> {
    fn encode_and_send(&mut self, message: &M) {
        match codec::encode_into(message, &mut self.send_buffer) {
            Ok(len) => {
                let buf = self.send_buffer.get(..len).unwrap_or_default();
                self.send_encoded(buf);
            },
            Err(codec::CodecError::BufferTooSmall { .. }) => match codec::encode(message) {
                Ok(buf) => {
                    if buf.len() > self.send_buffer.len() {
                        self.send_buffer.resize(buf.len(), 0);
                    }
                    self.send_encoded(&buf);
                },
                Err(err) => report_violation!(
                    ViolationSeverity::Error,
                    ViolationKind::Transport,
                    "failed to encode message: {}",
                    err
                ),
            },
            Err(err) => report_violation!(
                ViolationSeverity::Error,
                ViolationKind::Transport,
                "failed to encode message: {}",
                err
            ),
        }
    }

    /// Reads datagrams until one decodes or the socket would block.
    fn next_message(&mut self) -> Option<M> {
        loop {
            match self.socket.recv_from(&mut self.recv_buffer) {
                Ok((len, from)) => {
                    if from.port() != self.peer.port() {
                        report_violation!(
                            ViolationSeverity::Warning,
                            ViolationKind::UnknownPlayer,
                            "ignoring datagram from unexpected address {}",
                            from
                        );
                        continue;
                    }
                    let Some(bytes) = self.recv_buffer.get(..len) else {
                        continue;
                    };
                    match codec::decode_value(bytes) {
                        Ok(message) => return Some(message),
                        Err(err) => report_violation!(
                            ViolationSeverity::Warning,
                            ViolationKind::Transport,
                            "dropping undecodable datagram from {}: {}",
                            from,
                            err
                        ),
                    }
                },
                Err(ref err) if err.kind() == ErrorKind::WouldBlock => return None,
                // datagram sockets sometimes see this after a send to a closed port
                Err(ref err) if err.kind() == ErrorKind::ConnectionReset => continue,
                Err(err) => {
                    report_violation!(
                        ViolationSeverity::Error,
                        ViolationKind::Transport,
                        "unexpected socket error: {:?}: {}",
                        err.kind(),
                        err
                    );
                    return None;
                },
            }
        }
    }

    fn latest_message(&mut self) -> Option<M> {
        let mut latest = None;
        while let Some(message) = self.next_message() {
            latest = Some(message);
        }
        latest
    }
}

#[cfg(feature = "sync-send")]
impl<M> Socket<M> for UdpSocket<M>
where
    M: Serialize + DeserializeOwned + Send + Sync,
{
    fn id(&self) -> &PlayerId {
        &self.id
    }

    fn send(&mut self, message: M) {
        self.encode_and_send(&message);
    }

    fn receive(&mut self) -> Option<M> {
        self.next_message()
    }

    fn receive_latest(&mut self) -> Option<M> {
        self.latest_message()
    }
}

#[cfg(not(feature = "sync-send"))]
impl<M> Socket<M> for UdpSocket<M>
where
    M: Serialize + DeserializeOwned,
{
    fn id(&self) -> &PlayerId {
        &self.id
    }

    fn send(&mut self, message: M) {
        self.encode_and_send(&message);
    }

    fn receive(&mut self) -> Option<M> {
        self.next_message()
    }

    fn receive_latest(&mut self) -> Option<M> {
        self.latest_message()
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::network::messages::RollbackMessage;
    use crate::{CompoundAction, Tick};
    use serial_test::serial;

    type Msg = RollbackMessage<u8, Vec<i32>>;

    fn loopback(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Two sockets bound to OS-chosen ports and pointed at each other.
    #[cfg(not(miri))]
    fn connected_pair() -> (UdpSocket<Msg>, UdpSocket<Msg>) {
        let mut a = UdpSocket::bind("A", loopback(0), loopback(1)).unwrap();
        let mut b = UdpSocket::bind("A", loopback(0), loopback(1)).unwrap();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        a.set_peer(b_addr);
        b.set_peer(a_addr);
        (a, b)
    }

    // UDP delivery on loopback is fast but not synchronous.
    #[cfg(not(miri))]
    fn wait_for(socket: &mut UdpSocket<Msg>, count: usize) -> Vec<Msg> {
        let mut received = Vec::new();
        for _ in 0..40 {
            while let Some(message) = socket.receive() {
                received.push(message);
            }
            if received.len() >= count {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(25));
        }
        received
    }

    #[test]
    #[serial]
    #[cfg(not(miri))] // Miri cannot execute foreign functions like socket()
    fn bind_to_os_port() {
        let socket = UdpSocket::<Msg>::bind_to_port("A", 0, loopback(9)).unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
        assert_eq!(socket.id().as_str(), "A");
    }

    #[test]
    #[serial]
    #[cfg(not(miri))]
    fn empty_socket_does_not_block() {
        let (mut a, _b) = connected_pair();
        assert!(a.receive().is_none());
        assert!(a.receive_latest().is_none());
    }

    #[test]
    #[serial]
    #[cfg(not(miri))]
    fn send_and_receive_message() {
        let (mut a, mut b) = connected_pair();
        let message = Msg::Server {
            ack_tick: Tick::new(3),
            actions: CompoundAction::single("A".into(), 1),
            state: vec![1, 2, 3],
        };
        a.send(message.clone());
        assert_eq!(wait_for(&mut b, 1), vec![message]);
    }

    #[test]
    #[serial]
    #[cfg(not(miri))]
    fn large_message_falls_back_to_allocation() {
        let (mut a, mut b) = connected_pair();
        let message = Msg::Server {
            ack_tick: Tick::ZERO,
            actions: CompoundAction::new(),
            state: (0..2000).collect(),
        };
        a.send(message.clone());
        assert_eq!(wait_for(&mut b, 1), vec![message]);
    }

    #[test]
    #[serial]
    #[cfg(not(miri))]
    fn garbage_datagrams_are_skipped() {
        let (mut a, mut b) = connected_pair();
        a.socket.send_to(&[0xff; 3], b.local_addr().unwrap()).unwrap();
        let message = Msg::Client {
            tick: Tick::new(1),
            action: 4,
        };
        a.send(message.clone());
        assert_eq!(wait_for(&mut b, 1), vec![message]);
    }

    #[test]
    #[serial]
    #[cfg(not(miri))]
    fn bind_failure_is_socket_error() {
        let a = UdpSocket::<Msg>::bind("A", loopback(0), loopback(1)).unwrap();
        let taken = a.local_addr().unwrap();
        let err = UdpSocket::<Msg>::bind("B", taken, loopback(1)).unwrap_err();
        assert!(matches!(err, SyncError::SocketError { .. }));
    }

    #[test]
    #[allow(clippy::assertions_on_constants)]
    fn buffer_sizes_relationship() {
        assert!(SEND_BUFFER_SIZE > IDEAL_MAX_UDP_PACKET_SIZE);
        assert!(RECV_BUFFER_SIZE > SEND_BUFFER_SIZE);
    }
}
