//! What a rollback client assumes the other players are doing.
//!
//! A rollback client predicts every tick with a [`CompoundAction`]: its own input plus
//! a guess for everyone else. The guess only affects how the local copy looks until
//! the server's snapshot arrives, never the authoritative state. A good guess means
//! smaller corrections on replay.
//!
//! # Built-in Strategies
//!
//! - [`RepeatLastEchoed`]: assume every other player keeps doing what the server last
//!   reported (default)
//! - [`OwnInputOnly`]: assume nothing about other players
//!
//! # Custom Strategies
//!
//! ```
//! use predictive_sync::{CompoundAction, PlayerId, RemoteActionPrediction};
//!
//! /// Assumes remote players stand still.
//! struct Idle;
//!
//! impl<A: Clone + Default> RemoteActionPrediction<A> for Idle {
//!     fn remote_actions(&self, own: &PlayerId, last_echoed: &CompoundAction<A>) -> CompoundAction<A> {
//!         last_echoed
//!             .player_ids()
//!             .filter(|id| *id != own)
//!             .map(|id| (id.clone(), A::default()))
//!             .collect()
//!     }
//! }
//! ```

use crate::{CompoundAction, PlayerId};

/// Chooses the actions of other players for a client-side prediction.
///
/// Implementations must not include `own` in their result; the client inserts its own
/// input afterwards, replacing anything under that id.
pub trait RemoteActionPrediction<A>: Send + Sync {
    /// Returns the predicted actions of every player except `own`.
    ///
    /// `last_echoed` is the compound action the server reported with its most recent
    /// snapshot, or empty before the first snapshot arrives.
    fn remote_actions(&self, own: &PlayerId, last_echoed: &CompoundAction<A>) -> CompoundAction<A>;
}

/// Repeats the most recently echoed action of every other player.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepeatLastEchoed;

impl<A: Clone> RemoteActionPrediction<A> for RepeatLastEchoed {
    fn remote_actions(&self, own: &PlayerId, last_echoed: &CompoundAction<A>) -> CompoundAction<A> {
        last_echoed.without(own)
    }
}

/// Predicts with the local player's input only.
///
/// Simulations that freeze players without an action during
/// [`predict`](crate::Simulation::predict) will then hold remote players still until the
/// next snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnInputOnly;

impl<A> RemoteActionPrediction<A> for OwnInputOnly {
    fn remote_actions(&self, _own: &PlayerId, _last_echoed: &CompoundAction<A>) -> CompoundAction<A> {
        CompoundAction::new()
    }
}
