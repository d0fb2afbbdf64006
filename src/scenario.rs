//! An in-process driver that wires one server and N clients together and ticks them.
//!
//! The driver is not part of reconciliation. It exists so a whole session can run
//! inside one process: tests, benchmarks and demos build a [`Scenario`], feed it
//! inputs and compare snapshots. Every client is connected to the server through a
//! [`MemorySocket`] pair, optionally wrapped in a [`ChaosSocket`] on both ends.
//!
//! ```
//! use predictive_sync::games::top_down::{Direction, TopDown, TopDownAction, TopDownConfig};
//! use predictive_sync::prelude::*;
//!
//! let mut scenario = Scenario::<TopDownConfig, _, _>::builder(AlgebraicProtocol::default())
//!     .with_players(["A"])
//!     .start(TopDown::new)?;
//!
//! let up = CompoundAction::single(PlayerId::from("A"), TopDownAction::moving(Direction::Up));
//! scenario.tick(&up);
//! for _ in 0..3 {
//!     scenario.tick(&CompoundAction::new());
//! }
//! assert!(scenario.desynced_clients()?.is_empty());
//! # Ok::<(), predictive_sync::SyncError>(())
//! ```

use std::marker::PhantomData;
use std::time::Duration;

use tracing::{debug, trace, warn};
use web_time::Instant;

use crate::checksum::compute_checksum;
use crate::network::chaos_socket::{ChaosConfig, ChaosSocket, LinkClock};
use crate::network::memory_socket::MemorySocket;
use crate::strategies::strategy_trait::{ClientStrategy, Protocol, ProtocolKind, ServerStrategy};
use crate::{CompoundAction, Config, PlayerId, Simulation, Socket, SyncError, SyncResult, Tick};

type BoxedSocket<M> = Box<dyn Socket<M>>;

/// Collects the settings of a [`Scenario`]. Created by [`Scenario::builder`].
pub struct ScenarioBuilder<T, P, S> {
    protocol: P,
    players: Vec<PlayerId>,
    chaos: Option<ChaosConfig>,
    _marker: PhantomData<fn() -> (T, S)>,
}

impl<T, P: std::fmt::Debug, S> std::fmt::Debug for ScenarioBuilder<T, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioBuilder")
            .field("protocol", &self.protocol)
            .field("players", &self.players)
            .field("chaos", &self.chaos)
            .finish()
    }
}

impl<T, P, S> ScenarioBuilder<T, P, S>
where
    T: Config,
    S: Simulation<T>,
    P: Protocol<T, S>,
{
    /// Adds one client per id, in order.
    #[must_use]
    pub fn with_players<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PlayerId>,
    {
        self.players.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Wraps both ends of every link in a [`ChaosSocket`].
    ///
    /// Each end gets its own seed derived from `config.seed`, so two links never share
    /// a fault pattern while the whole scenario stays reproducible.
    #[must_use]
    pub fn with_chaos(mut self, config: ChaosConfig) -> Self {
        self.chaos = Some(config);
        self
    }

    /// Wires the server and every client, creating each simulation with `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PlayerAlreadyExists`] if a player id was given twice.
    pub fn start<F>(self, mut factory: F) -> SyncResult<Scenario<T, P, S>>
    where
        F: FnMut() -> S,
    {
        let clock = LinkClock::new();
        let mut server_sockets: Vec<BoxedSocket<P::Message>> = Vec::with_capacity(self.players.len());
        let mut clients = Vec::with_capacity(self.players.len());

        for (index, id) in self.players.iter().enumerate() {
            let (client_end, server_end) = MemorySocket::<P::Message>::pair(id.clone());
            let (client_socket, server_socket): (BoxedSocket<P::Message>, BoxedSocket<P::Message>) =
                match &self.chaos {
                    Some(config) => {
                        let seed = config.seed ^ ((index as u64) << 1);
                        (
                            Box::new(ChaosSocket::new(
                                client_end,
                                config.clone().with_seed(seed),
                                clock.clone(),
                            )),
                            Box::new(ChaosSocket::new(
                                server_end,
                                config.clone().with_seed(seed | 1),
                                clock.clone(),
                            )),
                        )
                    },
                    None => (Box::new(client_end), Box::new(server_end)),
                };
            server_sockets.push(server_socket);
            clients.push(self.protocol.wrap_client(factory(), client_socket));
        }

        let server = self.protocol.wrap_server(factory(), server_sockets)?;
        debug!(
            protocol = %self.protocol.kind(),
            players = clients.len(),
            chaos = self.chaos.is_some(),
            "scenario started"
        );

        Ok(Scenario {
            kind: self.protocol.kind(),
            server,
            clients,
            clock,
            ticks: Tick::ZERO,
            _marker: PhantomData,
        })
    }
}

/// One server and its clients, ticked in lockstep.
pub struct Scenario<T, P, S>
where
    T: Config,
    S: Simulation<T>,
    P: Protocol<T, S>,
{
    kind: ProtocolKind,
    server: P::Server,
    clients: Vec<P::Client>,
    clock: LinkClock,
    ticks: Tick,
    _marker: PhantomData<fn() -> (T, S)>,
}

impl<T, P, S> std::fmt::Debug for Scenario<T, P, S>
where
    T: Config,
    S: Simulation<T>,
    P: Protocol<T, S>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("protocol", &self.kind)
            .field("clients", &self.client_ids().collect::<Vec<_>>())
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl<T, P, S> Scenario<T, P, S>
where
    T: Config,
    S: Simulation<T>,
    P: Protocol<T, S>,
{
    /// Starts configuring a scenario for `protocol`.
    #[must_use]
    pub fn builder(protocol: P) -> ScenarioBuilder<T, P, S> {
        ScenarioBuilder {
            protocol,
            players: Vec::new(),
            chaos: None,
            _marker: PhantomData,
        }
    }

    /// Runs one tick: advance the link clock, update the server, then update every
    /// client in order with its entry of `inputs`. Clients without an entry submit
    /// the default action.
    pub fn tick(&mut self, inputs: &CompoundAction<T::Action>) {
        self.clock.advance();
        self.server.update();
        for client in &mut self.clients {
            let input = inputs.get(client.id()).cloned().unwrap_or_default();
            client.update(input);
        }
        self.ticks = self.ticks.next();
        trace!(tick = %self.ticks, "scenario ticked");
    }

    /// Runs `count` ticks with the same inputs.
    pub fn run(&mut self, count: usize, inputs: &CompoundAction<T::Action>) {
        for _ in 0..count {
            self.tick(inputs);
        }
    }

    /// Which protocol is being driven.
    #[must_use]
    pub fn kind(&self) -> ProtocolKind {
        self.kind
    }

    /// The authoritative snapshot.
    #[must_use]
    pub fn server_state(&self) -> T::State {
        self.server.state()
    }

    /// A client's snapshot, or `None` for an unknown id.
    #[must_use]
    pub fn client_state(&self, id: &PlayerId) -> Option<T::State> {
        self.client(id).map(ClientStrategy::state)
    }

    /// The server strategy.
    #[must_use]
    pub fn server(&self) -> &P::Server {
        &self.server
    }

    /// A client strategy by player id.
    #[must_use]
    pub fn client(&self, id: &PlayerId) -> Option<&P::Client> {
        self.clients.iter().find(|client| client.id() == id)
    }

    /// Player ids in the order they were added.
    pub fn client_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.clients.iter().map(ClientStrategy::id)
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn ticks(&self) -> Tick {
        self.ticks
    }

    /// Ids of the clients whose snapshot checksum differs from the server's.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SerializationError`] if a snapshot cannot be encoded.
    pub fn desynced_clients(&self) -> SyncResult<Vec<PlayerId>> {
        let server_checksum = compute_checksum(&self.server.state())?;
        let mut desynced = Vec::new();
        for client in &self.clients {
            let checksum = compute_checksum(&client.state())?;
            if checksum != server_checksum {
                warn!(
                    player = %client.id(),
                    tick = %self.ticks,
                    server = format_args!("{server_checksum:#018x}"),
                    client = format_args!("{checksum:#018x}"),
                    "client diverged from server"
                );
                desynced.push(client.id().clone());
            }
        }
        Ok(desynced)
    }
}

// ####################
// #  FIXED TIMESTEP  #
// ####################

/// Turns wall-clock time into a whole number of due ticks.
///
/// Feed it the current time once per frame and run [`Scenario::tick`] as many times as
/// [`advance`](FixedTimestep::advance) returns. After a long stall at most
/// `max_catch_up` ticks are returned and the rest of the backlog is dropped.
///
/// ```
/// use std::time::Duration;
/// use predictive_sync::FixedTimestep;
/// use web_time::Instant;
///
/// let mut timestep = FixedTimestep::default();
/// let start = Instant::now();
/// assert_eq!(timestep.advance(start), 0);
/// assert_eq!(timestep.advance(start + timestep.step() * 2), 2);
/// ```
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    max_catch_up: u32,
    accumulator: Duration,
    last: Option<Instant>,
}

impl FixedTimestep {
    /// Ticks per second when none is given.
    pub const DEFAULT_HZ: u32 = 60;

    /// Largest number of ticks a single `advance` returns by default.
    pub const DEFAULT_MAX_CATCH_UP: u32 = 5;

    /// A timestep running at `hz` ticks per second.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidRequest`] if `hz` is zero.
    pub fn new(hz: u32) -> SyncResult<Self> {
        if hz == 0 {
            return Err(SyncError::InvalidRequest {
                info: "tick rate must be at least 1 Hz".to_owned(),
            });
        }
        Ok(Self {
            step: Duration::from_secs(1) / hz,
            max_catch_up: Self::DEFAULT_MAX_CATCH_UP,
            accumulator: Duration::ZERO,
            last: None,
        })
    }

    /// Caps the ticks returned by one `advance`. Zero is treated as one.
    #[must_use]
    pub fn with_max_catch_up(mut self, ticks: u32) -> Self {
        self.max_catch_up = ticks.max(1);
        self
    }

    /// Duration of one tick.
    #[must_use]
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Accounts for the time elapsed since the previous call and returns how many ticks
    /// are due. The first call only starts the clock.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let Some(last) = self.last.replace(now) else {
            return 0;
        };
        self.accumulator += now.checked_duration_since(last).unwrap_or(Duration::ZERO);

        let step_nanos = self.step.as_nanos();
        let accumulated = self.accumulator.as_nanos();
        let due = accumulated / step_nanos;
        let remainder = Duration::from_nanos((accumulated % step_nanos) as u64);

        if due > u128::from(self.max_catch_up) {
            debug!(
                due = %due,
                max = self.max_catch_up,
                "timestep fell behind, dropping backlog"
            );
            self.accumulator = remainder;
            return self.max_catch_up;
        }
        self.accumulator = remainder;
        due as u32
    }

    /// Forgets the accumulated time; the next `advance` starts the clock again.
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
        self.last = None;
    }
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(1) / Self::DEFAULT_HZ,
            max_catch_up: Self::DEFAULT_MAX_CATCH_UP,
            accumulator: Duration::ZERO,
            last: None,
        }
    }
}
