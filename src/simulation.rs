//! The simulation contract every protocol drives.
//!
//! A simulation holds exactly one snapshot. Everything a strategy does to it goes
//! through the five methods below; the strategies never look inside a snapshot except
//! through the [`StateAlgebra`](crate::StateAlgebra) when the algebraic protocol is used.

use crate::{CompoundAction, Config, PlayerId, SyncError};

/// A deterministic simulation over one snapshot.
///
/// # Determinism
///
/// [`update`](Simulation::update) must be a pure function of the current snapshot and the
/// compound action: two instances holding equal snapshots that are updated with equal
/// actions must end up with equal snapshots. Every protocol relies on this.
///
/// [`predict`](Simulation::predict) is allowed to differ from `update`. The usual use is
/// to treat players without an action as frozen, so a client does not extrapolate remote
/// entities it knows nothing about.
///
/// # Snapshots
///
/// [`state`](Simulation::state) returns a copy and [`set_state`](Simulation::set_state)
/// takes one. Implementations that cache anything derived from the snapshot (collision
/// structures, lookup tables, flags computed from geometry) must rebuild it in
/// `set_state`.
#[cfg(feature = "sync-send")]
pub trait Simulation<T: Config>: Send + Sync {
    /// Returns a copy of the current snapshot.
    fn state(&self) -> T::State;

    /// Replaces the current snapshot and resynchronizes anything derived from it.
    fn set_state(&mut self, state: T::State);

    /// Advances one tick speculatively on a client.
    fn predict(&mut self, actions: &CompoundAction<T::Action>);

    /// Advances one tick authoritatively.
    fn update(&mut self, actions: &CompoundAction<T::Action>);

    /// Adds a player entity. Fails with [`SyncError::PlayerAlreadyExists`] when `id` is
    /// already present.
    fn spawn_player(&mut self, id: &PlayerId) -> Result<(), SyncError>;
}

/// A deterministic simulation over one snapshot.
///
/// # Determinism
///
/// [`update`](Simulation::update) must be a pure function of the current snapshot and the
/// compound action: two instances holding equal snapshots that are updated with equal
/// actions must end up with equal snapshots. Every protocol relies on this.
///
/// [`predict`](Simulation::predict) is allowed to differ from `update`. The usual use is
/// to treat players without an action as frozen, so a client does not extrapolate remote
/// entities it knows nothing about.
///
/// # Snapshots
///
/// [`state`](Simulation::state) returns a copy and [`set_state`](Simulation::set_state)
/// takes one. Implementations that cache anything derived from the snapshot (collision
/// structures, lookup tables, flags computed from geometry) must rebuild it in
/// `set_state`.
#[cfg(not(feature = "sync-send"))]
pub trait Simulation<T: Config> {
    /// Returns a copy of the current snapshot.
    fn state(&self) -> T::State;

    /// Replaces the current snapshot and resynchronizes anything derived from it.
    fn set_state(&mut self, state: T::State);

    /// Advances one tick speculatively on a client.
    fn predict(&mut self, actions: &CompoundAction<T::Action>);

    /// Advances one tick authoritatively.
    fn update(&mut self, actions: &CompoundAction<T::Action>);

    /// Adds a player entity. Fails with [`SyncError::PlayerAlreadyExists`] when `id` is
    /// already present.
    fn spawn_player(&mut self, id: &PlayerId) -> Result<(), SyncError>;
}

impl<T: Config, S: Simulation<T> + ?Sized> Simulation<T> for Box<S> {
    fn state(&self) -> T::State {
        (**self).state()
    }

    fn set_state(&mut self, state: T::State) {
        (**self).set_state(state);
    }

    fn predict(&mut self, actions: &CompoundAction<T::Action>) {
        (**self).predict(actions);
    }

    fn update(&mut self, actions: &CompoundAction<T::Action>) {
        (**self).update(actions);
    }

    fn spawn_player(&mut self, id: &PlayerId) -> Result<(), SyncError> {
        (**self).spawn_player(id)
    }
}
