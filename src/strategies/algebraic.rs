//! Delta merging through the [`StateAlgebra`].
//!
//! After the join-time baseline the server never sends a full snapshot again. Each tick it
//! broadcasts `after - before`, the change its update made, with each client's ack.
//! Clients sum those deltas into a running estimate of the authoritative state instead of
//! replaying anything.
//!
//! What makes that work is drift. Each time a client predicts, it records how far the
//! prediction moved it from the estimate it started from. When a delta acknowledging that
//! tick arrives, the delta already contains the authoritative version of the same step,
//! so the client subtracts its own earlier contribution:
//!
//! ```text
//! epsilon  = delta - sum(drift[t] for t <= ack)
//! running  = running + epsilon
//! ```
//!
//! Each drift entry is consumed exactly once. With no entry at or below the ack
//! (the baseline, or a duplicate ack) the delta is applied verbatim. When acks arrive
//! consecutively, as they do on a loss-free link, exactly one entry is at or below each
//! ack and this is the plain `delta - drift[ack]` rule. Summing everything up to the ack
//! also covers acks that skip ticks, and a repeated ack cannot cancel the same drift
//! twice.
//!
//! Deltas may arrive in any order. Addition commutes, so the reconstructed state does
//! not depend on arrival order: a late delta whose drift was already cancelled by a
//! newer ack is simply added.
//!
//! With [`max_pending_actions`](StrategyConfig::max_pending_actions) set, a full drift
//! history folds its oldest entry into the next one instead of dropping it. That entry is
//! then cancelled by the later ack, so the cap bounds memory without leaving an offset.
//!
//! # Limitations
//!
//! Deltas are not replaceable. A delta lost in transit is never recovered and leaves the
//! client permanently offset by exactly that delta. Pair this protocol with a transport
//! that does not drop server messages, or accept the offset.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::network::messages::AlgebraicMessage;
use crate::strategies::builder::StrategyConfig;
use crate::strategies::strategy_trait::{
    spawn_players, ClientStrategy, Protocol, ProtocolKind, ServerStrategy,
};
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{
    report_violation_to, CompoundAction, Config, PlayerId, Simulation, Socket, StateAlgebra,
    SyncError, Tick, TickBuffer,
};

type Message<T> = AlgebraicMessage<<T as Config>::Action, <T as Config>::State>;
type BoxedSocket<T> = Box<dyn Socket<Message<T>>>;

/// Factory for [`AlgebraicServer`] and [`AlgebraicClient`].
///
/// Only simulations whose state implements [`StateAlgebra`] can be wired.
#[derive(Debug, Clone, Default)]
pub struct AlgebraicProtocol {
    config: StrategyConfig,
}

impl AlgebraicProtocol {
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

impl<T, S> Protocol<T, S> for AlgebraicProtocol
where
    T: Config,
    T::State: StateAlgebra,
    S: Simulation<T>,
{
    type Message = Message<T>;
    type Server = AlgebraicServer<T, S>;
    type Client = AlgebraicClient<T, S>;

    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Algebraic
    }

    fn wrap_server(&self, mut sim: S, mut sockets: Vec<BoxedSocket<T>>) -> Result<Self::Server, SyncError> {
        spawn_players::<T, S, _>(&mut sim, &sockets)?;

        let baseline = sim.state();
        for socket in &mut sockets {
            socket.send(AlgebraicMessage::Server {
                ack_tick: Tick::ZERO,
                delta: baseline.clone(),
            });
        }
        debug!(players = sockets.len(), "algebraic server wired, baseline sent");

        Ok(AlgebraicServer {
            sim,
            connections: sockets
                .into_iter()
                .map(|socket| Connection {
                    socket,
                    ack: Tick::ZERO,
                })
                .collect(),
            tick: Tick::ZERO,
            observer: self.config.violation_observer().cloned(),
        })
    }

    fn wrap_client(&self, sim: S, socket: BoxedSocket<T>) -> Self::Client {
        debug!(player = %socket.id(), "algebraic client wired");
        AlgebraicClient {
            sim,
            socket,
            tick: Tick::ZERO,
            drift: TickBuffer::new(),
            last_ack: Tick::ZERO,
            max_pending: self.config.max_pending_actions(),
            max_deltas: self.config.max_deltas_per_tick(),
            observer: self.config.violation_observer().cloned(),
        }
    }
}

// ###############
// #   SERVER    #
// ###############

struct Connection<T: Config> {
    socket: BoxedSocket<T>,
    ack: Tick,
}

/// Authoritative side of the algebraic protocol.
pub struct AlgebraicServer<T: Config, S> {
    sim: S,
    connections: Vec<Connection<T>>,
    tick: Tick,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config, S> std::fmt::Debug for AlgebraicServer<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let acks: Vec<(&PlayerId, Tick)> = self
            .connections
            .iter()
            .map(|c| (c.socket.id(), c.ack))
            .collect();
        f.debug_struct("AlgebraicServer")
            .field("acks", &acks)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<T: Config, S> AlgebraicServer<T, S> {
    /// The ack currently sent to `player`, if connected.
    #[must_use]
    pub fn ack_for(&self, player: &PlayerId) -> Option<Tick> {
        self.connections
            .iter()
            .find(|c| c.socket.id() == player)
            .map(|c| c.ack)
    }
}

impl<T, S> ServerStrategy<T> for AlgebraicServer<T, S>
where
    T: Config,
    T::State: StateAlgebra,
    S: Simulation<T>,
{
    fn update(&mut self) {
        let mut actions = CompoundAction::new();
        for connection in &mut self.connections {
            match connection.socket.receive_latest() {
                Some(AlgebraicMessage::Client { tick, action }) => {
                    if tick <= connection.ack {
                        report_violation_to!(
                            &self.observer,
                            self.tick,
                            ViolationSeverity::Warning,
                            ViolationKind::TickOrdering,
                            "input {} from {} is not newer than ack {}",
                            tick,
                            connection.socket.id(),
                            connection.ack
                        );
                        continue;
                    }
                    connection.ack = tick;
                    actions.insert(connection.socket.id().clone(), action);
                },
                Some(AlgebraicMessage::Server { .. }) => {
                    report_violation_to!(
                        &self.observer,
                        self.tick,
                        ViolationSeverity::Warning,
                        ViolationKind::UnexpectedDirection,
                        "server received a delta from {}",
                        connection.socket.id()
                    );
                },
                None => {},
            }
        }

        let before = self.sim.state();
        self.sim.update(&actions);
        let after = self.sim.state();
        let delta = after.difference(&before);
        self.tick = self.tick.next();
        trace!(tick = %self.tick, inputs = actions.len(), "algebraic server updated");

        for connection in &mut self.connections {
            connection.socket.send(AlgebraicMessage::Server {
                ack_tick: connection.ack,
                delta: delta.clone(),
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

// ###############
// #   CLIENT    #
// ###############

/// Client side of the algebraic protocol.
pub struct AlgebraicClient<T: Config, S> {
    sim: S,
    socket: BoxedSocket<T>,
    tick: Tick,
    /// `predicted - running` for every unacknowledged tick.
    drift: TickBuffer<T::State>,
    last_ack: Tick,
    max_pending: Option<usize>,
    max_deltas: Option<usize>,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config, S> std::fmt::Debug for AlgebraicClient<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgebraicClient")
            .field("id", self.socket.id())
            .field("tick", &self.tick)
            .field("last_ack", &self.last_ack)
            .field("pending", &self.drift.len())
            .finish_non_exhaustive()
    }
}

impl<T, S> AlgebraicClient<T, S>
where
    T: Config,
    T::State: StateAlgebra,
    S: Simulation<T>,
{
    /// Number of drift entries waiting for an ack.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.drift.len()
    }

    /// The newest ack received.
    #[must_use]
    pub fn last_ack(&self) -> Tick {
        self.last_ack
    }

    /// Folds one server delta into `running`, cancelling drift up to `ack_tick`.
    fn merge(&mut self, running: T::State, ack_tick: Tick, delta: T::State) -> T::State {
        if ack_tick < self.last_ack {
            report_violation_to!(
                &self.observer,
                self.tick,
                ViolationSeverity::Warning,
                ViolationKind::StaleAcknowledgement,
                "delta with ack {} arrived after ack {}",
                ack_tick,
                self.last_ack
            );
        } else {
            self.last_ack = ack_tick;
        }

        let cancelled = self
            .drift
            .take_acknowledged(ack_tick)
            .map(|(_, drift)| drift)
            .reduce(|sum, drift| sum.add(&drift));
        let epsilon = match cancelled {
            Some(drift) => delta.difference(&drift),
            None => delta,
        };
        running.add(&epsilon)
    }

    /// Stores this tick's drift. At the cap the oldest entry is folded into its
    /// successor, never discarded, so its drift is still cancelled exactly once.
    fn remember(&mut self, mut drift: T::State) {
        if let Some(cap) = self.max_pending {
            if self.drift.len() >= cap {
                if let Some((evicted, oldest)) = self.drift.pop_oldest() {
                    match self.drift.front_mut() {
                        Some(next) => {
                            let folded = oldest.add(next);
                            *next = folded;
                        },
                        None => drift = oldest.add(&drift),
                    }
                    report_violation_to!(
                        &self.observer,
                        self.tick,
                        ViolationSeverity::Warning,
                        ViolationKind::PendingOverflow,
                        "drift history full ({}), folded tick {} into its successor",
                        cap,
                        evicted
                    );
                }
            }
        }
        if let Err(err) = self.drift.push(self.tick, drift) {
            report_violation_to!(
                &self.observer,
                self.tick,
                ViolationSeverity::Error,
                ViolationKind::TickOrdering,
                "{}",
                err
            );
        }
    }
}

impl<T, S> ClientStrategy<T> for AlgebraicClient<T, S>
where
    T: Config,
    T::State: StateAlgebra,
    S: Simulation<T>,
{
    fn id(&self) -> &PlayerId {
        self.socket.id()
    }

    fn update(&mut self, input: T::Action) {
        self.tick = self.tick.next();
        self.socket.send(AlgebraicMessage::Client {
            tick: self.tick,
            action: input.clone(),
        });

        let mut running = self.sim.state();
        let mut merged = 0_usize;
        while self.max_deltas.map_or(true, |cap| merged < cap) {
            match self.socket.receive() {
                Some(AlgebraicMessage::Server { ack_tick, delta }) => {
                    running = self.merge(running, ack_tick, delta);
                    merged += 1;
                },
                Some(AlgebraicMessage::Client { .. }) => {
                    report_violation_to!(
                        &self.observer,
                        self.tick,
                        ViolationSeverity::Warning,
                        ViolationKind::UnexpectedDirection,
                        "client {} received a client input",
                        self.socket.id()
                    );
                },
                None => break,
            }
        }
        if merged > 0 {
            trace!(player = %self.socket.id(), merged, ack = %self.last_ack, "deltas merged");
        }

        self.sim.set_state(running.clone());
        self.sim
            .predict(&CompoundAction::single(self.socket.id().clone(), input));
        let drift = self.sim.state().difference(&running);
        self.remember(drift);
    }

    fn state(&self) -> T::State {
        self.sim.state()
    }

    fn tick(&self) -> Tick {
        self.tick
    }
}
