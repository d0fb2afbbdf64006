//! Convenient re-exports for common usage.
//!
//! ```rust
//! use predictive_sync::prelude::*;
//! ```
//!
//! # What's Included
//!
//! - **Protocols**: [`OverrideProtocol`], [`RollbackProtocol`], [`AlgebraicProtocol`]
//! - **Strategy traits**: [`Protocol`], [`ServerStrategy`], [`ClientStrategy`]
//! - **Simulation traits**: [`Config`], [`Simulation`], [`StateAlgebra`], [`Socket`]
//! - **Transports**: [`MemorySocket`], [`ChaosSocket`], [`UdpSocket`]
//! - **Fundamental types**: [`Tick`], [`PlayerId`], [`CompoundAction`], [`Structural`]
//! - **Messages**: [`OverrideMessage`], [`RollbackMessage`], [`AlgebraicMessage`]
//! - **Driving**: [`Scenario`], [`FixedTimestep`]
//! - **Configuration**: [`StrategyConfig`], [`ChaosConfig`]
//! - **Error handling**: [`SyncError`], [`SyncResult`]
//!
//! # Example
//!
//! ```rust
//! use predictive_sync::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Push(i32);
//!
//! #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct World {
//!     positions: std::collections::BTreeMap<PlayerId, i32>,
//! }
//!
//! struct PushConfig;
//!
//! impl Config for PushConfig {
//!     type Action = Push;
//!     type State = World;
//! }
//!
//! #[derive(Default)]
//! struct PushGame(World);
//!
//! impl Simulation<PushConfig> for PushGame {
//!     fn state(&self) -> World {
//!         self.0.clone()
//!     }
//!     fn set_state(&mut self, state: World) {
//!         self.0 = state;
//!     }
//!     fn predict(&mut self, actions: &CompoundAction<Push>) {
//!         self.update(actions);
//!     }
//!     fn update(&mut self, actions: &CompoundAction<Push>) {
//!         for (id, push) in actions.iter() {
//!             *self.0.positions.entry(id.clone()).or_default() += push.0;
//!         }
//!     }
//!     fn spawn_player(&mut self, id: &PlayerId) -> SyncResult<()> {
//!         if self.0.positions.insert(id.clone(), 0).is_some() {
//!             return Err(SyncError::PlayerAlreadyExists { player: id.clone() });
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut scenario = Scenario::<PushConfig, _, _>::builder(RollbackProtocol::default())
//!     .with_players(["A", "B"])
//!     .start(PushGame::default)?;
//! scenario.tick(&CompoundAction::single(PlayerId::from("A"), Push(3)));
//! scenario.run(2, &CompoundAction::new());
//! assert_eq!(scenario.server_state().positions[&PlayerId::from("A")], 3);
//! # Ok::<(), SyncError>(())
//! ```

// Protocols and their strategy traits
pub use crate::strategies::algebraic::AlgebraicProtocol;
pub use crate::strategies::override_sync::OverrideProtocol;
pub use crate::strategies::rollback::RollbackProtocol;
pub use crate::strategies::strategy_trait::{ClientStrategy, Protocol, ProtocolKind, ServerStrategy};

// Core traits
pub use crate::{Config, Simulation, Socket, StateAlgebra};

// Transports
pub use crate::{ChaosSocket, MemorySocket, UdpSocket};

// Fundamental types
pub use crate::{CompoundAction, PlayerId, Structural, Tick};

// Wire messages
pub use crate::{AlgebraicMessage, OverrideMessage, RollbackMessage};

// Driving a session
pub use crate::{FixedTimestep, Scenario};

// Configuration
pub use crate::{ChaosConfig, StrategyConfig};

// Error handling
pub use crate::{SyncError, SyncResult};
