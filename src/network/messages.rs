//! Wire messages of the three protocols.
//!
//! Each protocol has one enum with a `Client` variant (client to server) and a `Server`
//! variant (server to client). A strategy that receives the variant travelling the wrong
//! way reports an [`UnexpectedDirection`](crate::telemetry::ViolationKind) violation and
//! ignores it.
//!
//! All messages are plain values; sending one moves it into the transport.

use serde::{Deserialize, Serialize};

use crate::{CompoundAction, Tick};

/// Messages of the [`OverrideProtocol`](crate::OverrideProtocol).
///
/// `A` is the action type and `S` the snapshot type of the simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OverrideMessage<A, S> {
    /// The client's input for its current tick. Carries no tick stamp.
    Client {
        /// The local player's action.
        action: A,
    },
    /// The complete authoritative snapshot.
    Server {
        /// Snapshot after the server's latest update.
        state: S,
    },
}

/// Messages of the [`RollbackProtocol`](crate::RollbackProtocol).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RollbackMessage<A, S> {
    /// The client's input, stamped with the client tick it was produced at.
    Client {
        /// Client tick of this input.
        tick: Tick,
        /// The local player's action.
        action: A,
    },
    /// The authoritative snapshot, with the actions that produced it.
    Server {
        /// Tick of the latest client message the server consumed.
        ack_tick: Tick,
        /// Every action folded into the update, keyed by player.
        actions: CompoundAction<A>,
        /// Snapshot after the update.
        state: S,
    },
}

/// Messages of the [`AlgebraicProtocol`](crate::AlgebraicProtocol).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AlgebraicMessage<A, S> {
    /// The client's input, stamped with the client tick it was produced at.
    Client {
        /// Client tick of this input.
        tick: Tick,
        /// The local player's action.
        action: A,
    },
    /// The change of one server update, `after - before`.
    ///
    /// The very first message after wiring carries the full snapshot as its delta and
    /// an ack of [`Tick::ZERO`].
    Server {
        /// Tick of the latest client message the server consumed.
        ack_tick: Tick,
        /// Snapshot delta produced by the update.
        delta: S,
    },
}

macro_rules! impl_direction {
    ($($name:ident),*) => {
        $(
            impl<A, S> $name<A, S> {
                /// Whether this message travels from server to client.
                #[must_use]
                pub const fn is_server(&self) -> bool {
                    matches!(self, Self::Server { .. })
                }

                /// `"client"` or `"server"`, for logs.
                #[must_use]
                pub const fn direction(&self) -> &'static str {
                    match self {
                        Self::Client { .. } => "client",
                        Self::Server { .. } => "server",
                    }
                }
            }
        )*
    };
}

impl_direction!(OverrideMessage, RollbackMessage, AlgebraicMessage);
