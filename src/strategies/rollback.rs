//! Snapshot plus replay: classic rollback netcode, server-authoritative.
//!
//! The client predicts every tick and remembers the compound action it predicted with.
//! Each server message carries a full snapshot and the tick of the newest input the
//! server has consumed from that client. On arrival the client drops every buffered
//! entry up to that tick, adopts the snapshot and replays what is left through
//! [`predict`](crate::Simulation::predict). The visible state is always "authoritative as
//! of the last ack, plus local inputs since".
//!
//! # Acknowledgements
//!
//! The server reads each socket with `receive_latest`, so inputs overtaken by a newer
//! one are never applied. The ack is the tick of the input actually consumed; entries up
//! to it are trimmed on the client whether or not the server applied them, since the
//! snapshot is the truth about them either way.
//!
//! A snapshot whose ack is older than the newest ack already seen is ignored as a whole,
//! not only its trim: it predates a snapshot the client has already adopted. The client
//! reports a [`StaleAcknowledgement`](crate::telemetry::ViolationKind) and keeps
//! its current state.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::network::messages::RollbackMessage;
use crate::prediction::{RemoteActionPrediction, RepeatLastEchoed};
use crate::strategies::builder::StrategyConfig;
use crate::strategies::strategy_trait::{
    spawn_players, ClientStrategy, Protocol, ProtocolKind, ServerStrategy,
};
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{
    report_violation_to, CompoundAction, Config, PlayerId, Simulation, Socket, SyncError, Tick,
    TickBuffer,
};

type Message<T> = RollbackMessage<<T as Config>::Action, <T as Config>::State>;
type BoxedSocket<T> = Box<dyn Socket<Message<T>>>;

/// Factory for [`RollbackServer`] and [`RollbackClient`].
///
/// `P` decides what a client assumes about the other players while predicting.
#[derive(Debug, Clone)]
pub struct RollbackProtocol<P = RepeatLastEchoed> {
    config: StrategyConfig,
    prediction: Arc<P>,
}

impl Default for RollbackProtocol<RepeatLastEchoed> {
    fn default() -> Self {
        Self {
            config: StrategyConfig::default(),
            prediction: Arc::new(RepeatLastEchoed),
        }
    }
}

impl RollbackProtocol<RepeatLastEchoed> {
    /// Creates the protocol with default settings, repeating echoed remote actions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P> RollbackProtocol<P> {
    /// Replaces the settings.
    #[must_use]
    pub fn with_config(mut self, config: StrategyConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the remote-action prediction.
    #[must_use]
    pub fn with_prediction<Q>(self, prediction: Q) -> RollbackProtocol<Q> {
        RollbackProtocol {
            config: self.config,
            prediction: Arc::new(prediction),
        }
    }

    /// Current settings.
    #[must_use]
    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }
}

impl<T, S, P> Protocol<T, S> for RollbackProtocol<P>
where
    T: Config,
    S: Simulation<T>,
    P: RemoteActionPrediction<T::Action> + 'static,
{
    type Message = Message<T>;
    type Server = RollbackServer<T, S>;
    type Client = RollbackClient<T, S, P>;

    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Rollback
    }

    fn wrap_server(&self, mut sim: S, sockets: Vec<BoxedSocket<T>>) -> Result<Self::Server, SyncError> {
        spawn_players::<T, S, _>(&mut sim, &sockets)?;
        debug!(players = sockets.len(), "rollback server wired");
        Ok(RollbackServer {
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
        debug!(player = %socket.id(), "rollback client wired");
        RollbackClient {
            sim,
            socket,
            tick: Tick::ZERO,
            pending: TickBuffer::new(),
            last_ack: Tick::ZERO,
            last_echoed: CompoundAction::new(),
            prediction: Arc::clone(&self.prediction),
            max_pending: self.config.max_pending_actions(),
            observer: self.config.violation_observer().cloned(),
        }
    }
}

// ###############
// #   SERVER    #
// ###############

struct Connection<T: Config> {
    socket: BoxedSocket<T>,
    /// Tick of the newest client input consumed.
    ack: Tick,
}

/// Authoritative side of the rollback protocol.
pub struct RollbackServer<T: Config, S> {
    sim: S,
    connections: Vec<Connection<T>>,
    tick: Tick,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config, S> std::fmt::Debug for RollbackServer<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let acks: Vec<(&PlayerId, Tick)> = self
            .connections
            .iter()
            .map(|c| (c.socket.id(), c.ack))
            .collect();
        f.debug_struct("RollbackServer")
            .field("acks", &acks)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

impl<T: Config, S> RollbackServer<T, S> {
    /// The ack currently sent to `player`, if connected.
    #[must_use]
    pub fn ack_for(&self, player: &PlayerId) -> Option<Tick> {
        self.connections
            .iter()
            .find(|c| c.socket.id() == player)
            .map(|c| c.ack)
    }
}

impl<T: Config, S: Simulation<T>> ServerStrategy<T> for RollbackServer<T, S> {
    fn update(&mut self) {
        let mut actions = CompoundAction::new();
        for connection in &mut self.connections {
            match connection.socket.receive_latest() {
                Some(RollbackMessage::Client { tick, action }) => {
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
                Some(RollbackMessage::Server { .. }) => {
                    report_violation_to!(
                        &self.observer,
                        self.tick,
                        ViolationSeverity::Warning,
                        ViolationKind::UnexpectedDirection,
                        "server received a snapshot from {}",
                        connection.socket.id()
                    );
                },
                None => {},
            }
        }

        self.sim.update(&actions);
        self.tick = self.tick.next();
        trace!(tick = %self.tick, inputs = actions.len(), "rollback server updated");

        let state = self.sim.state();
        for connection in &mut self.connections {
            connection.socket.send(RollbackMessage::Server {
                ack_tick: connection.ack,
                actions: actions.clone(),
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

// ###############
// #   CLIENT    #
// ###############

/// Client side of the rollback protocol.
pub struct RollbackClient<T: Config, S, P = RepeatLastEchoed> {
    sim: S,
    socket: BoxedSocket<T>,
    tick: Tick,
    /// Compound action predicted at each unacknowledged tick.
    pending: TickBuffer<CompoundAction<T::Action>>,
    last_ack: Tick,
    last_echoed: CompoundAction<T::Action>,
    prediction: Arc<P>,
    max_pending: Option<usize>,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config, S, P> std::fmt::Debug for RollbackClient<T, S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackClient")
            .field("id", self.socket.id())
            .field("tick", &self.tick)
            .field("last_ack", &self.last_ack)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T, S, P> RollbackClient<T, S, P>
where
    T: Config,
    S: Simulation<T>,
    P: RemoteActionPrediction<T::Action>,
{
    /// Number of predicted ticks not yet acknowledged.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// The newest ack received.
    #[must_use]
    pub fn last_ack(&self) -> Tick {
        self.last_ack
    }

    fn reconcile(&mut self, ack_tick: Tick, actions: CompoundAction<T::Action>, state: T::State) {
        if ack_tick < self.last_ack {
            report_violation_to!(
                &self.observer,
                self.tick,
                ViolationSeverity::Warning,
                ViolationKind::StaleAcknowledgement,
                "snapshot with ack {} arrived after ack {}",
                ack_tick,
                self.last_ack
            );
            return;
        }
        self.last_ack = ack_tick;

        let trimmed = self.pending.acknowledge(ack_tick);
        self.sim.set_state(state);
        for (_, compound) in self.pending.iter() {
            self.sim.predict(compound);
        }
        self.last_echoed = actions;

        trace!(
            player = %self.socket.id(),
            ack = %ack_tick,
            trimmed,
            replayed = self.pending.len(),
            "rolled back to snapshot"
        );
    }

    fn remember(&mut self, compound: CompoundAction<T::Action>) {
        if let Some(cap) = self.max_pending {
            if self.pending.len() >= cap {
                if let Some((evicted, _)) = self.pending.pop_oldest() {
                    report_violation_to!(
                        &self.observer,
                        self.tick,
                        ViolationSeverity::Warning,
                        ViolationKind::PendingOverflow,
                        "pending buffer full ({}), evicted tick {}",
                        cap,
                        evicted
                    );
                }
            }
        }
        if let Err(err) = self.pending.push(self.tick, compound) {
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

impl<T, S, P> ClientStrategy<T> for RollbackClient<T, S, P>
where
    T: Config,
    S: Simulation<T>,
    P: RemoteActionPrediction<T::Action>,
{
    fn id(&self) -> &PlayerId {
        self.socket.id()
    }

    fn update(&mut self, input: T::Action) {
        self.tick = self.tick.next();
        self.socket.send(RollbackMessage::Client {
            tick: self.tick,
            action: input.clone(),
        });

        match self.socket.receive_latest() {
            Some(RollbackMessage::Server {
                ack_tick,
                actions,
                state,
            }) => self.reconcile(ack_tick, actions, state),
            Some(RollbackMessage::Client { .. }) => {
                report_violation_to!(
                    &self.observer,
                    self.tick,
                    ViolationSeverity::Warning,
                    ViolationKind::UnexpectedDirection,
                    "client {} received a client input",
                    self.socket.id()
                );
            },
            None => {},
        }

        let id = self.socket.id().clone();
        let mut compound = self.prediction.remote_actions(&id, &self.last_echoed);
        compound.insert(id, input);
        self.sim.predict(&compound);
        self.remember(compound);
    }

    fn state(&self) -> T::State {
        self.sim.state()
    }

    fn tick(&self) -> Tick {
        self.tick
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::prediction::OwnInputOnly;
    use crate::strategies::test_support::{Counter, CounterConfig, CounterState};
    use crate::telemetry::CollectingObserver;
    use crate::MemorySocket;

    fn counter_with(ids: &[&str]) -> Counter {
        let mut counter = Counter::default();
        for id in ids {
            counter.spawn_player(&PlayerId::from(*id)).unwrap();
        }
        counter
    }

    fn total(state: &CounterState, id: &str) -> i64 {
        state.totals[&PlayerId::from(id)]
    }

    fn state_of(totals: &[(&str, i64)]) -> CounterState {
        CounterState {
            totals: totals.iter().map(|(id, v)| (PlayerId::from(*id), *v)).collect(),
            last_action_count: 0,
        }
    }

    /// A client wired to a bare socket end, so tests can play the server by hand.
    fn lone_client<P: RemoteActionPrediction<i64> + 'static>(
        protocol: &RollbackProtocol<P>,
        ids: &[&str],
    ) -> (RollbackClient<CounterConfig, Counter, P>, MemorySocket<Message<CounterConfig>>) {
        let (client_end, server_end) = MemorySocket::<Message<CounterConfig>>::pair("A");
        let client =
            Protocol::<CounterConfig, Counter>::wrap_client(protocol, counter_with(ids), Box::new(client_end));
        (client, server_end)
    }

    #[test]
    fn client_predicts_immediately() {
        let (mut client, mut server_end) = lone_client(&RollbackProtocol::new(), &["A"]);
        client.update(3);
        assert_eq!(total(&client.state(), "A"), 3);
        assert_eq!(client.pending(), 1);
        assert_eq!(
            server_end.receive(),
            Some(RollbackMessage::Client {
                tick: Tick::new(1),
                action: 3
            })
        );
    }

    #[test]
    fn snapshot_trims_acknowledged_and_replays_the_rest() {
        let (mut client, mut server_end) = lone_client(&RollbackProtocol::new(), &["A"]);
        for input in 1..=3 {
            client.update(input);
        }
        assert_eq!(total(&client.state(), "A"), 6);

        server_end.send(RollbackMessage::Server {
            ack_tick: Tick::new(1),
            actions: CompoundAction::single("A".into(), 1),
            state: state_of(&[("A", 10)]),
        });
        client.update(0);

        // 10 from the snapshot, replayed 2 and 3, then 0
        assert_eq!(total(&client.state(), "A"), 15);
        assert_eq!(client.pending(), 3);
        assert_eq!(client.last_ack(), Tick::new(1));
    }

    #[test]
    fn stale_ack_is_reported_and_ignored() {
        let observer = Arc::new(CollectingObserver::new());
        let protocol = RollbackProtocol::new().with_config(
            StrategyConfig::builder()
                .with_violation_observer(observer.clone())
                .build(),
        );
        let (mut client, server_end) = lone_client(&protocol, &["A"]);
        let mut server_end = server_end;
        client.update(1);
        client.update(1);
        server_end.send(RollbackMessage::Server {
            ack_tick: Tick::new(2),
            actions: CompoundAction::new(),
            state: state_of(&[("A", 2)]),
        });
        client.update(0);
        assert_eq!(client.pending(), 1);

        server_end.send(RollbackMessage::Server {
            ack_tick: Tick::new(1),
            actions: CompoundAction::new(),
            state: state_of(&[("A", 100)]),
        });
        client.update(0);

        assert_eq!(total(&client.state(), "A"), 2);
        assert_eq!(client.pending(), 2);
        crate::assert_violation!(observer, ViolationKind::StaleAcknowledgement);
    }

    #[test]
    fn echoed_actions_predict_remote_players() {
        let (mut client, mut server_end) = lone_client(&RollbackProtocol::new(), &["A", "B"]);
        server_end.send(RollbackMessage::Server {
            ack_tick: Tick::ZERO,
            actions: CompoundAction::single("B".into(), 5),
            state: state_of(&[("A", 0), ("B", 0)]),
        });
        client.update(0);
        client.update(0);
        assert_eq!(total(&client.state(), "B"), 10);
    }

    #[test]
    fn own_input_only_leaves_remote_players_alone() {
        let protocol = RollbackProtocol::new().with_prediction(OwnInputOnly);
        let (mut client, mut server_end) = lone_client(&protocol, &["A", "B"]);
        server_end.send(RollbackMessage::Server {
            ack_tick: Tick::ZERO,
            actions: CompoundAction::single("B".into(), 5),
            state: state_of(&[("A", 0), ("B", 0)]),
        });
        client.update(1);
        assert_eq!(total(&client.state(), "B"), 0);
        assert_eq!(total(&client.state(), "A"), 1);
    }

    #[test]
    fn pending_cap_evicts_oldest() {
        let observer = Arc::new(CollectingObserver::new());
        let config = StrategyConfig::builder()
            .with_max_pending_actions(2)
            .unwrap()
            .with_violation_observer(observer.clone())
            .build();
        let (mut client, _server_end) = lone_client(&RollbackProtocol::new().with_config(config), &["A"]);
        for _ in 0..3 {
            client.update(1);
        }
        assert_eq!(client.pending(), 2);
        crate::assert_violation!(observer, ViolationKind::PendingOverflow);
    }

    #[test]
    fn server_acks_the_consumed_tick() {
        let protocol = RollbackProtocol::new();
        let (client_end, server_end) = MemorySocket::<Message<CounterConfig>>::pair("A");
        let mut server = Protocol::<CounterConfig, Counter>::wrap_server(
            &protocol,
            Counter::default(),
            vec![Box::new(server_end) as BoxedSocket<CounterConfig>],
        )
        .unwrap();
        let mut client: RollbackClient<CounterConfig, Counter> =
            Protocol::<CounterConfig, Counter>::wrap_client(&protocol, counter_with(&["A"]), Box::new(client_end));

        client.update(1);
        client.update(2);
        server.update();
        assert_eq!(server.ack_for(&PlayerId::from("A")), Some(Tick::new(2)));
        // the overtaken input is never applied
        assert_eq!(total(&server.state(), "A"), 2);

        client.update(5);
        assert_eq!(client.pending(), 1);
        assert_eq!(total(&client.state(), "A"), 7);

        server.update();
        client.update(0);
        assert_eq!(client.state().totals, server.state().totals);
    }
}
