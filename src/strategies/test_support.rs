//! A tiny simulation for strategy unit tests: every player accumulates its actions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{CompoundAction, Config, PlayerId, Simulation, StateAlgebra, SyncError};

pub(crate) struct CounterConfig;

impl Config for CounterConfig {
    type Action = i64;
    type State = CounterState;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct CounterState {
    pub totals: BTreeMap<PlayerId, i64>,
    pub last_action_count: i64,
}

impl StateAlgebra for CounterState {
    fn add(&self, other: &Self) -> Self {
        Self {
            totals: self.totals.add(&other.totals),
            last_action_count: self.last_action_count.add(&other.last_action_count),
        }
    }

    fn negate(&self) -> Self {
        Self {
            totals: self.totals.negate(),
            last_action_count: self.last_action_count.negate(),
        }
    }
}

/// `update` adds each action to its player's total. `predict` does the same, so a
/// client that predicts with the same actions as the server matches it exactly.
#[derive(Debug, Default)]
pub(crate) struct Counter {
    state: CounterState,
    pub predictions: usize,
}

impl Counter {
    fn step(&mut self, actions: &CompoundAction<i64>) {
        for (id, action) in actions.iter() {
            if let Some(total) = self.state.totals.get_mut(id) {
                *total += action;
            }
        }
        self.state.last_action_count = actions.len() as i64;
    }
}

impl Simulation<CounterConfig> for Counter {
    fn state(&self) -> CounterState {
        self.state.clone()
    }

    fn set_state(&mut self, state: CounterState) {
        self.state = state;
    }

    fn predict(&mut self, actions: &CompoundAction<i64>) {
        self.predictions += 1;
        self.step(actions);
    }

    fn update(&mut self, actions: &CompoundAction<i64>) {
        self.step(actions);
    }

    fn spawn_player(&mut self, id: &PlayerId) -> Result<(), SyncError> {
        if self.state.totals.contains_key(id) {
            return Err(SyncError::PlayerAlreadyExists { player: id.clone() });
        }
        self.state.totals.insert(id.clone(), 0);
        Ok(())
    }
}
