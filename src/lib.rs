//! # predictive-sync
//!
//! Client-side prediction and server reconciliation for multiplayer simulations.
//!
//! A server owns the authoritative copy of a deterministic simulation and advances it from
//! every player's actions. Each client owns a local copy that it keeps responsive to the
//! local player, and reconciles against whatever the server sends. Three interchangeable
//! protocols are provided, each as a matched [`ServerStrategy`]/[`ClientStrategy`] pair:
//!
//! - [`OverrideProtocol`]: the server broadcasts full snapshots and clients overwrite
//!   their state. No prediction; the baseline everything else must agree with.
//! - [`RollbackProtocol`]: clients predict locally, and on every authoritative snapshot
//!   they drop acknowledged actions and replay the rest on top of it.
//! - [`AlgebraicProtocol`]: the server broadcasts per-tick deltas and clients merge them
//!   with the [`StateAlgebra`], cancelling their own earlier predictions instead of
//!   re-simulating.
//!
//! None of the protocols assume ordered or complete delivery. The transport is any
//! [`Socket`]; [`MemorySocket`], [`ChaosSocket`] and [`UdpSocket`] ship with the crate.
//!
//! ```
//! use predictive_sync::games::top_down::{TopDown, TopDownAction, TopDownConfig, Direction};
//! use predictive_sync::prelude::*;
//!
//! let mut scenario = Scenario::<TopDownConfig, _, _>::builder(RollbackProtocol::default())
//!     .with_players(["A", "B"])
//!     .start(TopDown::new)
//!     .expect("player ids are unique");
//!
//! let mut inputs = CompoundAction::new();
//! inputs.insert(PlayerId::from("A"), TopDownAction::moving(Direction::Right));
//! for _ in 0..10 {
//!     scenario.tick(&inputs);
//! }
//! assert!(scenario.client_state(&PlayerId::from("A")).is_some());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use algebra::{StateAlgebra, Structural};
pub use compound_action::CompoundAction;
pub use error::{SyncError, SyncResult};
pub use network::chaos_socket::{ChaosConfig, ChaosConfigBuilder, ChaosSocket, ChaosStats, LinkClock};
pub use network::memory_socket::MemorySocket;
pub use network::messages::{AlgebraicMessage, OverrideMessage, RollbackMessage};
pub use network::udp_socket::UdpSocket;
pub use prediction::{OwnInputOnly, RemoteActionPrediction, RepeatLastEchoed};
pub use scenario::{FixedTimestep, Scenario, ScenarioBuilder};
pub use simulation::Simulation;
pub use strategies::algebraic::{AlgebraicClient, AlgebraicProtocol, AlgebraicServer};
pub use strategies::builder::{StrategyConfig, StrategyConfigBuilder};
pub use strategies::override_sync::{OverrideClient, OverrideProtocol, OverrideServer};
pub use strategies::rollback::{RollbackClient, RollbackProtocol, RollbackServer};
pub use strategies::strategy_trait::{ClientStrategy, Protocol, ProtocolKind, ServerStrategy};
pub use tick_buffer::TickBuffer;

pub mod algebra;
pub mod checksum;
mod compound_action;
#[doc(hidden)]
pub mod error;
pub mod prediction;
pub mod prelude;
/// Internal random number generator based on PCG32, used for fault injection.
pub mod rng;
pub mod scenario;
pub mod simulation;
#[doc(hidden)]
pub mod sync;
pub mod telemetry;
#[cfg(test)]
pub(crate) mod test_config;
pub mod tick_buffer;

/// Reference simulations used to exercise the protocols end to end.
pub mod games {
    pub mod side_scroller;
    pub mod top_down;
}

/// Transports and the wire-level message types of each protocol.
pub mod network {
    pub mod chaos_socket;
    /// Binary codec for message serialization.
    ///
    /// Wraps bincode with a single fixed configuration so every peer produces the
    /// same bytes for the same message.
    pub mod codec;
    pub mod memory_socket;
    pub mod messages;
    pub mod udp_socket;
}

/// The three reconciliation protocols and their shared traits.
pub mod strategies {
    pub mod algebraic;
    pub mod builder;
    pub mod override_sync;
    pub mod rollback;
    pub mod strategy_trait;
    #[cfg(test)]
    pub(crate) mod test_support;
}

// #############
// #   TICKS   #
// #############

/// A logical timestamp: one step of the simulation.
///
/// The server keeps one authoritative tick; every client keeps its own local tick. Client
/// ticks are what the server acknowledges, and what client-side buffers are trimmed by.
///
/// Ticks start at [`Tick::ZERO`] and only ever increase. No wraparound handling exists:
/// at 60 ticks per second a `u64` outlasts any plausible session by billions of years.
///
/// # Examples
///
/// ```
/// use predictive_sync::Tick;
///
/// let tick = Tick::ZERO.next();
/// assert_eq!(tick.as_u64(), 1);
/// assert!(tick > Tick::ZERO);
/// assert_eq!((tick + 4).as_u64(), 5);
/// ```
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Tick(u64);

impl Tick {
    /// The tick before anything has happened. Servers acknowledge `ZERO` until they
    /// have consumed a client message.
    pub const ZERO: Tick = Tick(0);

    /// Creates a tick from a raw counter value.
    #[inline]
    #[must_use]
    pub const fn new(tick: u64) -> Self {
        Tick(tick)
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the tick that follows this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Tick(self.0 + 1)
    }

    /// Number of ticks from `earlier` to `self`, or zero if `earlier` is not earlier.
    #[inline]
    #[must_use]
    pub const fn ticks_since(self, earlier: Tick) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Tick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add<u64> for Tick {
    type Output = Tick;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Tick(self.0 + rhs)
    }
}

impl std::ops::AddAssign<u64> for Tick {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl From<u64> for Tick {
    #[inline]
    fn from(value: u64) -> Self {
        Tick(value)
    }
}

impl From<Tick> for u64 {
    #[inline]
    fn from(tick: Tick) -> Self {
        tick.0
    }
}

// ###############
// #   PLAYERS   #
// ###############

/// Stable identifier of a connected player.
///
/// A player is identified by the id of the socket it connects through, so the server can
/// map every incoming message to the entity it controls without any lookup table.
///
/// # Examples
///
/// ```
/// use predictive_sync::PlayerId;
///
/// let a = PlayerId::from("A");
/// assert_eq!(a.as_str(), "A");
/// assert!(PlayerId::from("A") < PlayerId::from("B"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PlayerId(String);

impl PlayerId {
    /// Creates a player id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        PlayerId(value.to_owned())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        PlayerId(value)
    }
}

// #############
// #  TRAITS   #
// #############

/// Compile time parameterization for strategies.
///
/// Bundles the two types a simulation is made of. Implement this on a marker struct.
///
/// # Example
///
/// ```
/// use predictive_sync::Config;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
/// struct Input {
///     thrust: bool,
/// }
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// struct World {
///     position: f64,
/// }
///
/// struct ShipConfig;
///
/// impl Config for ShipConfig {
///     type Action = Input;
///     type State = World;
/// }
/// ```
#[cfg(feature = "sync-send")]
pub trait Config: 'static + Send + Sync {
    /// One player's input for one tick.
    ///
    /// [`Default`] is "no input" and is what a driver submits for idle players.
    type Action: Clone + PartialEq + Default + Debug + Serialize + DeserializeOwned + Send + Sync;

    /// A full snapshot of the simulation. Always handled as a value: reads return copies
    /// and writes replace the whole snapshot.
    type State: Clone + PartialEq + Debug + Serialize + DeserializeOwned + Send + Sync;
}

/// A bidirectional, non-blocking message pipe between one client and the server.
///
/// Delivery may be lossy, reordered or coalesced; the strategies tolerate all three.
/// The [`id`](Socket::id) is stable for the lifetime of the connection and doubles as
/// the player id of whoever is on the other end.
#[cfg(feature = "sync-send")]
pub trait Socket<M>: Send + Sync {
    /// The stable id of this connection.
    fn id(&self) -> &PlayerId;

    /// Queues a message for the peer. Never blocks and never fails observably.
    fn send(&mut self, message: M);

    /// Pops the oldest buffered message, if any.
    fn receive(&mut self) -> Option<M>;

    /// Pops the newest buffered message and discards everything older, if any.
    fn receive_latest(&mut self) -> Option<M>;
}

/// Compile time parameterization for strategies.
#[cfg(not(feature = "sync-send"))]
pub trait Config: 'static {
    /// One player's input for one tick.
    ///
    /// [`Default`] is "no input" and is what a driver submits for idle players.
    type Action: Clone + PartialEq + Default + Debug + Serialize + DeserializeOwned;

    /// A full snapshot of the simulation. Always handled as a value: reads return copies
    /// and writes replace the whole snapshot.
    type State: Clone + PartialEq + Debug + Serialize + DeserializeOwned;
}

/// A bidirectional, non-blocking message pipe between one client and the server.
///
/// Delivery may be lossy, reordered or coalesced; the strategies tolerate all three.
/// The [`id`](Socket::id) is stable for the lifetime of the connection and doubles as
/// the player id of whoever is on the other end.
#[cfg(not(feature = "sync-send"))]
pub trait Socket<M> {
    /// The stable id of this connection.
    fn id(&self) -> &PlayerId;

    /// Queues a message for the peer. Never blocks and never fails observably.
    fn send(&mut self, message: M);

    /// Pops the oldest buffered message, if any.
    fn receive(&mut self) -> Option<M>;

    /// Pops the newest buffered message and discards everything older, if any.
    fn receive_latest(&mut self) -> Option<M>;
}

// ###################
// # UNIT TESTS      #
// ###################
