//! Full-state override: the baseline protocol.
//!
//! The server pops at most one input per socket each tick, updates once and broadcasts
//! the complete snapshot. Clients do not simulate at all; they send their input and
//! replace their state with the newest snapshot they have. The local player therefore
//! sees its own input one round trip late, but nothing can diverge for longer than the
//! next delivered snapshot.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::network::messages::OverrideMessage;
use crate::strategies::builder::StrategyConfig;
use crate::strategies::strategy_trait::{
    spawn_players, ClientStrategy, Protocol, ProtocolKind, ServerStrategy,
};
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{report_violation_to, CompoundAction, Config, PlayerId, Simulation, Socket, SyncError, Tick};

type Message<T> = OverrideMessage<<T as Config>::Action, <T as Config>::State>;
type BoxedSocket<T> = Box<dyn Socket<Message<T>>>;

/// Factory for [`OverrideServer`] and [`OverrideClient`].
#[derive(Debug, Clone, Default)]
pub struct OverrideProtocol {
    config: StrategyConfig,
}

impl OverrideProtocol {
    /// Creates the protocol with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the settings.
    #[must_use]
    pub fn with_config(mut self, config: StrategyConfig) -> Self {
        self.config = config;
        self
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

impl<T: Config, S: Simulation<T>> Protocol<T, S> for OverrideProtocol {
    type Message = Message<T>;
    type Server = OverrideServer<T, S>;
    type Client = OverrideClient<T, S>;

    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Override
    }

    fn wrap_server(&self, mut sim: S, sockets: Vec<BoxedSocket<T>>) -> Result<Self::Server, SyncError> {
        spawn_players::<T, S, _>(&mut sim, &sockets)?;
        debug!(players = sockets.len(), "override server wired");
        Ok(OverrideServer {
            sim,
            sockets,
            tick: Tick::ZERO,
            observer: self.config.violation_observer().cloned(),
        })
    }

    fn wrap_client(&self, sim: S, socket: BoxedSocket<T>) -> Self::Client {
        debug!(player = %socket.id(), "override client wired");
        OverrideClient {
            sim,
            socket,
            tick: Tick::ZERO,
            observer: self.config.violation_observer().cloned(),
        }
    }
}

/// Authoritative side of the override protocol.
pub struct OverrideServer<T: Config, S> {
    sim: S,
    sockets: Vec<BoxedSocket<T>>,
    tick: Tick,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config, S> std::fmt::Debug for OverrideServer<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideServer")
            .field("players", &self.sockets.iter().map(|s| s.id()).collect::<Vec<_>>())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<T: Config, S: Simulation<T>> ServerStrategy<T> for OverrideServer<T, S> {
    fn update(&mut self) {
        let mut actions = CompoundAction::new();
        for socket in &mut self.sockets {
            match socket.receive() {
                Some(OverrideMessage::Client { action }) => {
                    actions.insert(socket.id().clone(), action);
                },
                Some(OverrideMessage::Server { .. }) => {
                    report_violation_to!(
                        &self.observer,
                        self.tick,
                        ViolationSeverity::Warning,
                        ViolationKind::UnexpectedDirection,
                        "server received a snapshot from {}",
                        socket.id()
                    );
                },
                None => {},
            }
        }

        self.sim.update(&actions);
        self.tick = self.tick.next();
        trace!(tick = %self.tick, inputs = actions.len(), "override server updated");

        let state = self.sim.state();
        for socket in &mut self.sockets {
            socket.send(OverrideMessage::Server {
                state: state.clone(),
            });
        }
    }

    fn state(&self) -> T::State {
        self.sim.state()
    }

    fn tick(&self) -> Tick {
        self.tick
    }
}

/// Client side of the override protocol.
pub struct OverrideClient<T: Config, S> {
    sim: S,
    socket: BoxedSocket<T>,
    tick: Tick,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config, S> std::fmt::Debug for OverrideClient<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideClient")
            .field("id", self.socket.id())
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<T: Config, S: Simulation<T>> ClientStrategy<T> for OverrideClient<T, S> {
    fn id(&self) -> &PlayerId {
        self.socket.id()
    }

    fn update(&mut self, input: T::Action) {
        self.socket.send(OverrideMessage::Client { action: input });
        self.tick = self.tick.next();

        match self.socket.receive_latest() {
            Some(OverrideMessage::Server { state }) => {
                self.sim.set_state(state);
                trace!(player = %self.socket.id(), tick = %self.tick, "snapshot applied");
            },
            Some(OverrideMessage::Client { .. }) => {
                report_violation_to!(
                    &self.observer,
                    self.tick,
                    ViolationSeverity::Warning,
                    ViolationKind::UnexpectedDirection,
                    "client {} received a client input",
                    self.socket.id()
                );
            },
            // keep the last known snapshot
            None => {},
        }
    }

    fn state(&self) -> T::State {
        self.sim.state()
    }

    fn tick(&self) -> Tick {
        self.tick
    }
}
