//! Simulation and socket stubs for integration tests.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::use_self
)]

use std::collections::{BTreeMap, BTreeSet};

use predictive_sync::{
    CompoundAction, Config, MemorySocket, PlayerId, Simulation, Socket, StateAlgebra, SyncError,
};
use serde::{Deserialize, Serialize};

/// Binds `i64` actions to [`TallyState`].
#[derive(Debug)]
pub struct TallyConfig;

impl Config for TallyConfig {
    type Action = i64;
    type State = TallyState;
}

/// Every player's running total.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyState {
    pub totals: BTreeMap<PlayerId, i64>,
}

impl TallyState {
    #[allow(dead_code)]
    #[must_use]
    pub fn total(&self, id: &str) -> i64 {
        self.totals.get(&PlayerId::from(id)).copied().unwrap_or_default()
    }
}

impl StateAlgebra for TallyState {
    fn add(&self, other: &Self) -> Self {
        TallyState {
            totals: self.totals.add(&other.totals),
        }
    }

    fn negate(&self) -> Self {
        TallyState {
            totals: self.totals.negate(),
        }
    }
}

/// Adds each player's action to its total. `predict` behaves exactly like `update`.
#[derive(Debug, Default)]
pub struct Tally {
    pub state: TallyState,
}

impl Simulation<TallyConfig> for Tally {
    fn state(&self) -> TallyState {
        self.state.clone()
    }

    fn set_state(&mut self, state: TallyState) {
        self.state = state;
    }

    fn predict(&mut self, actions: &CompoundAction<i64>) {
        self.update(actions);
    }

    fn update(&mut self, actions: &CompoundAction<i64>) {
        for (id, value) in actions.iter() {
            if let Some(total) = self.state.totals.get_mut(id) {
                *total += value;
            }
        }
    }

    fn spawn_player(&mut self, id: &PlayerId) -> Result<(), SyncError> {
        if self.state.totals.contains_key(id) {
            return Err(SyncError::PlayerAlreadyExists { player: id.clone() });
        }
        self.state.totals.insert(id.clone(), 0);
        Ok(())
    }
}

/// A [`MemorySocket`] end that silently drops chosen outgoing messages.
///
/// Messages are counted from zero in the order `send` is called.
pub struct DroppingSocket<M> {
    inner: MemorySocket<M>,
    drop: BTreeSet<usize>,
    sent: usize,
}

impl<M> DroppingSocket<M> {
    #[allow(dead_code)]
    #[must_use]
    pub fn new(inner: MemorySocket<M>, drop: impl IntoIterator<Item = usize>) -> Self {
        DroppingSocket {
            inner,
            drop: drop.into_iter().collect(),
            sent: 0,
        }
    }
}

impl<M: Clone + Send + Sync + 'static> Socket<M> for DroppingSocket<M> {
    fn id(&self) -> &PlayerId {
        self.inner.id()
    }

    fn send(&mut self, message: M) {
        let index = self.sent;
        self.sent += 1;
        if !self.drop.contains(&index) {
            self.inner.send(message);
        }
    }

    fn receive(&mut self) -> Option<M> {
        self.inner.receive()
    }

    fn receive_latest(&mut self) -> Option<M> {
        self.inner.receive_latest()
    }
}
