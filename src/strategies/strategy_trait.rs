//! Traits every protocol implements.
//!
//! A protocol is a factory ([`Protocol`]) for a matched pair of strategies: one
//! [`ServerStrategy`] wrapping the authoritative simulation and one [`ClientStrategy`]
//! per player.

use std::collections::BTreeSet;
use std::fmt::Debug;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Config, PlayerId, Simulation, Socket, SyncError, Tick};

/// The server half of a protocol.
///
/// Owns the authoritative simulation and one socket per connected player. Call
/// [`update`](ServerStrategy::update) once per tick.
///
/// | Protocol | Reads per socket | Sends per socket |
/// |----------|------------------|------------------|
/// | [`OverrideProtocol`](crate::OverrideProtocol) | oldest message | full snapshot |
/// | [`RollbackProtocol`](crate::RollbackProtocol) | newest message | ack, echoed actions, snapshot |
/// | [`AlgebraicProtocol`](crate::AlgebraicProtocol) | newest message | ack, delta |
pub trait ServerStrategy<T: Config> {
    /// Reads client input, advances the simulation one tick and broadcasts the result.
    fn update(&mut self);

    /// The authoritative snapshot.
    #[must_use]
    fn state(&self) -> T::State;

    /// Number of updates performed.
    #[must_use]
    fn tick(&self) -> Tick;
}

/// The client half of a protocol, one per player.
///
/// Owns a local simulation and a socket to the server. Call
/// [`update`](ClientStrategy::update) once per tick with the local player's input.
pub trait ClientStrategy<T: Config> {
    /// The local player's id, taken from the socket.
    #[must_use]
    fn id(&self) -> &PlayerId;

    /// Sends `input`, reconciles with whatever the server sent and advances locally.
    fn update(&mut self, input: T::Action);

    /// The local snapshot.
    #[must_use]
    fn state(&self) -> T::State;

    /// The local tick: how many times `update` has run.
    #[must_use]
    fn tick(&self) -> Tick;
}

/// Builds matched server and client strategies for a simulation type.
///
/// A protocol value carries configuration only; it can wire any number of servers and
/// clients.
///
/// ```
/// use predictive_sync::games::top_down::{TopDown, TopDownAction, TopDownConfig, TopDownState};
/// use predictive_sync::prelude::*;
///
/// type Message = OverrideMessage<TopDownAction, TopDownState>;
///
/// let protocol = OverrideProtocol::default();
/// let (client_end, server_end) = MemorySocket::<Message>::pair("A");
///
/// let mut server = Protocol::<TopDownConfig, TopDown>::wrap_server(
///     &protocol,
///     TopDown::new(),
///     vec![Box::new(server_end)],
/// )?;
/// let mut client = Protocol::<TopDownConfig, TopDown>::wrap_client(
///     &protocol,
///     TopDown::new(),
///     Box::new(client_end),
/// );
///
/// client.update(Default::default());
/// server.update();
/// client.update(Default::default());
/// assert_eq!(client.state(), server.state());
/// # Ok::<(), predictive_sync::SyncError>(())
/// ```
#[cfg(feature = "sync-send")]
pub trait Protocol<T: Config, S: Simulation<T>> {
    /// The message type exchanged over each socket.
    type Message: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Server strategy produced by [`wrap_server`](Protocol::wrap_server).
    type Server: ServerStrategy<T>;
    /// Client strategy produced by [`wrap_client`](Protocol::wrap_client).
    type Client: ClientStrategy<T>;

    /// Which protocol this is.
    fn kind(&self) -> ProtocolKind;

    /// Wraps the authoritative simulation. Spawns one player per socket id.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PlayerAlreadyExists`] if two sockets share an id or the
    /// simulation already contains one of them.
    fn wrap_server(
        &self,
        sim: S,
        sockets: Vec<Box<dyn Socket<Self::Message>>>,
    ) -> Result<Self::Server, SyncError>;

    /// Wraps a client's local simulation.
    fn wrap_client(&self, sim: S, socket: Box<dyn Socket<Self::Message>>) -> Self::Client;
}

/// Builds matched server and client strategies for a simulation type.
///
/// A protocol value carries configuration only; it can wire any number of servers and
/// clients.
///
/// ```
/// use predictive_sync::games::top_down::{TopDown, TopDownAction, TopDownConfig, TopDownState};
/// use predictive_sync::prelude::*;
///
/// type Message = OverrideMessage<TopDownAction, TopDownState>;
///
/// let protocol = OverrideProtocol::default();
/// let (client_end, server_end) = MemorySocket::<Message>::pair("A");
///
/// let mut server = Protocol::<TopDownConfig, TopDown>::wrap_server(
///     &protocol,
///     TopDown::new(),
///     vec![Box::new(server_end)],
/// )?;
/// let mut client = Protocol::<TopDownConfig, TopDown>::wrap_client(
///     &protocol,
///     TopDown::new(),
///     Box::new(client_end),
/// );
///
/// client.update(Default::default());
/// server.update();
/// client.update(Default::default());
/// assert_eq!(client.state(), server.state());
/// # Ok::<(), predictive_sync::SyncError>(())
/// ```
#[cfg(not(feature = "sync-send"))]
pub trait Protocol<T: Config, S: Simulation<T>> {
    /// The message type exchanged over each socket.
    type Message: Clone + Debug + Serialize + DeserializeOwned + 'static;
    /// Server strategy produced by [`wrap_server`](Protocol::wrap_server).
    type Server: ServerStrategy<T>;
    /// Client strategy produced by [`wrap_client`](Protocol::wrap_client).
    type Client: ClientStrategy<T>;

    /// Which protocol this is.
    fn kind(&self) -> ProtocolKind;

    /// Wraps the authoritative simulation. Spawns one player per socket id.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PlayerAlreadyExists`] if two sockets share an id or the
    /// simulation already contains one of them.
    fn wrap_server(
        &self,
        sim: S,
        sockets: Vec<Box<dyn Socket<Self::Message>>>,
    ) -> Result<Self::Server, SyncError>;

    /// Wraps a client's local simulation.
    fn wrap_client(&self, sim: S, socket: Box<dyn Socket<Self::Message>>) -> Self::Client;
}

/// Names the three protocols, for logs and configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolKind {
    /// Full snapshots, no prediction.
    Override,
    /// Snapshots plus acknowledged action replay.
    Rollback,
    /// Deltas merged through the state algebra.
    Algebraic,
}

impl ProtocolKind {
    /// Every protocol, in order of increasing sophistication.
    pub const ALL: [ProtocolKind; 3] = [Self::Override, Self::Rollback, Self::Algebraic];

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Override => "override",
            Self::Rollback => "rollback",
            Self::Algebraic => "algebraic",
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProtocolKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SyncError::InvalidRequest {
                info: format!("unknown protocol '{s}', expected override, rollback or algebraic"),
            })
    }
}

/// Spawns one player per socket, rejecting duplicate ids before touching the simulation.
pub(crate) fn spawn_players<T, S, M>(
    sim: &mut S,
    sockets: &[Box<dyn Socket<M>>],
) -> Result<(), SyncError>
where
    T: Config,
    S: Simulation<T>,
{
    let mut seen = BTreeSet::new();
    for socket in sockets {
        if !seen.insert(socket.id()) {
            return Err(SyncError::PlayerAlreadyExists {
                player: socket.id().clone(),
            });
        }
    }
    for socket in sockets {
        sim.spawn_player(socket.id())?;
    }
    Ok(())
}
