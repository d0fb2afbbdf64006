use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::PlayerId;

/// Convenience alias for results returned by this crate.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// This enum contains all error messages this library can return.
///
/// Most fallible operations happen while wiring a protocol up. Once the tick loop is
/// running, nothing returns an error: invariant violations are reported through the
/// [`telemetry`](crate::telemetry) module instead and the loop carries on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncError {
    /// A simulation was asked to spawn a player it already contains. Raised at wiring
    /// time, usually because two sockets share an id.
    PlayerAlreadyExists {
        /// The id that was spawned twice.
        player: PlayerId,
    },
    /// You made an invalid request, usually by using wrong parameters for function calls.
    InvalidRequest {
        /// Further specifies why the request was invalid.
        info: String,
    },
    /// Serialization or deserialization of data failed.
    SerializationError {
        /// A description of what failed to serialize/deserialize.
        context: String,
    },
    /// A network socket operation failed.
    SocketError {
        /// A description of the socket error.
        context: String,
    },
}

impl Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::PlayerAlreadyExists { player } => {
                write!(f, "Player {} already exists in the simulation", player)
            }
            SyncError::InvalidRequest { info } => {
                write!(f, "Invalid Request: {}", info)
            }
            SyncError::SerializationError { context } => {
                write!(f, "Serialization error: {}", context)
            }
            SyncError::SocketError { context } => {
                write!(f, "Socket error: {}", context)
            }
        }
    }
}

impl Error for SyncError {}
