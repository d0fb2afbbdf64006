//! Fault injection for any [`Socket`].
//!
//! [`ChaosSocket`] wraps a transport and makes it misbehave: latency and jitter counted
//! in ticks of a shared [`LinkClock`], loss on either side, burst loss, duplication and
//! reordering. Every decision is drawn from a seeded [`Pcg32`], so a run is fully
//! reproducible from its seed.
//!
//! ```
//! use predictive_sync::{ChaosConfig, ChaosSocket, LinkClock, MemorySocket, Socket};
//!
//! let clock = LinkClock::new();
//! let (client, server) = MemorySocket::<u32>::pair("A");
//! let config = ChaosConfig::builder().latency(2).seed(7).build();
//! let mut client = ChaosSocket::new(client, config, clock.clone());
//! let mut server = server;
//!
//! server.send(1);
//! assert_eq!(client.receive(), None);
//! clock.advance();
//! assert_eq!(client.receive(), None);
//! clock.advance();
//! assert_eq!(client.receive(), Some(1));
//! ```
//!
//! Faults are applied in the order the wrapped socket sees them:
//!
//! - on `send`: burst loss, then send loss, then forward, then maybe a duplicate;
//! - on `receive`: pull everything from the inner socket, apply receive loss, hold each
//!   message until its delivery tick, then release ready messages (possibly reordered).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::rng::{Pcg32, Rng, SeedableRng};
use crate::{PlayerId, Socket, Tick};

/// Seed used when none is configured.
pub const DEFAULT_CHAOS_SEED: u64 = 0x5eed_c4a0_5eed_c4a0;

// ###############
// #   CLOCK     #
// ###############

/// A tick counter shared by every [`ChaosSocket`] of a link.
///
/// Clones observe the same counter. Whoever drives the simulation advances it once per
/// tick; sockets only read it.
#[derive(Debug, Clone, Default)]
pub struct LinkClock {
    ticks: Arc<AtomicU64>,
}

impl LinkClock {
    /// Creates a clock at [`Tick::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current tick.
    #[must_use]
    pub fn now(&self) -> Tick {
        Tick::new(self.ticks.load(Ordering::Acquire))
    }

    /// Moves the clock one tick forward and returns the new tick.
    pub fn advance(&self) -> Tick {
        Tick::new(self.ticks.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

// ###############
// #   CONFIG    #
// ###############

/// Fault injection settings.
///
/// Use [`ChaosConfig::builder()`] for a fluent configuration API. Every rate is a
/// probability in `0.0..=1.0` and defaults to `0.0`; latency and jitter default to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosConfig {
    /// Ticks every message is held before delivery.
    pub latency_ticks: u64,

    /// Maximum deviation from `latency_ticks`, drawn uniformly from `-jitter..=jitter`.
    /// Delivery is never scheduled before the tick a message arrived.
    pub jitter_ticks: u32,

    /// Probability of dropping a message on send.
    pub send_loss_rate: f64,

    /// Probability of dropping a message on receive.
    pub receive_loss_rate: f64,

    /// Probability of sending a message twice.
    pub duplication_rate: f64,

    /// Messages held back before a reordering pass releases them. Zero disables
    /// reordering.
    pub reorder_buffer_size: usize,

    /// Probability of swapping each held message with a random other one.
    pub reorder_rate: f64,

    /// Probability of starting a burst loss on send.
    pub burst_loss_probability: f64,

    /// Consecutive sends dropped by one burst.
    pub burst_loss_length: usize,

    /// Seed of the fault generator.
    pub seed: u64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            latency_ticks: 0,
            jitter_ticks: 0,
            send_loss_rate: 0.0,
            receive_loss_rate: 0.0,
            duplication_rate: 0.0,
            reorder_buffer_size: 0,
            reorder_rate: 0.0,
            burst_loss_probability: 0.0,
            burst_loss_length: 0,
            seed: DEFAULT_CHAOS_SEED,
        }
    }
}

impl ChaosConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> ChaosConfigBuilder {
        ChaosConfigBuilder::new()
    }

    /// No faults at all.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// A fixed delay and nothing else.
    #[must_use]
    pub fn high_latency(latency_ticks: u64) -> Self {
        Self {
            latency_ticks,
            ..Self::default()
        }
    }

    /// Symmetric loss and nothing else.
    #[must_use]
    pub fn lossy(loss_rate: f64) -> Self {
        let rate = loss_rate.clamp(0.0, 1.0);
        Self {
            send_loss_rate: rate,
            receive_loss_rate: rate,
            ..Self::default()
        }
    }

    /// About 100ms of latency at 60 Hz with jitter and 5% loss each way.
    #[must_use]
    pub fn poor_network() -> Self {
        Self {
            latency_ticks: 6,
            jitter_ticks: 3,
            send_loss_rate: 0.05,
            receive_loss_rate: 0.05,
            ..Self::default()
        }
    }

    /// Heavy latency, loss, duplication and reordering.
    #[must_use]
    pub fn terrible_network() -> Self {
        Self {
            latency_ticks: 15,
            jitter_ticks: 6,
            send_loss_rate: 0.15,
            receive_loss_rate: 0.15,
            duplication_rate: 0.02,
            reorder_buffer_size: 5,
            reorder_rate: 0.1,
            ..Self::default()
        }
    }

    /// Same settings with a different seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Builder for [`ChaosConfig`].
#[derive(Debug, Clone, Default)]
pub struct ChaosConfigBuilder {
    config: ChaosConfig,
}

impl ChaosConfigBuilder {
    /// Creates a builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay in ticks.
    #[must_use]
    pub fn latency(mut self, ticks: u64) -> Self {
        self.config.latency_ticks = ticks;
        self
    }

    /// Sets the maximum jitter in ticks.
    #[must_use]
    pub fn jitter(mut self, ticks: u32) -> Self {
        self.config.jitter_ticks = ticks;
        self
    }

    /// Sets the loss rate of both directions.
    #[must_use]
    pub fn packet_loss_rate(mut self, rate: f64) -> Self {
        self.config.send_loss_rate = rate.clamp(0.0, 1.0);
        self.config.receive_loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the loss rate on send.
    #[must_use]
    pub fn send_loss_rate(mut self, rate: f64) -> Self {
        self.config.send_loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the loss rate on receive.
    #[must_use]
    pub fn receive_loss_rate(mut self, rate: f64) -> Self {
        self.config.receive_loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the duplication rate.
    #[must_use]
    pub fn duplication_rate(mut self, rate: f64) -> Self {
        self.config.duplication_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Enables reordering over batches of `buffer_size` messages.
    #[must_use]
    pub fn reordering(mut self, buffer_size: usize, rate: f64) -> Self {
        self.config.reorder_buffer_size = buffer_size;
        self.config.reorder_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets burst loss: with `probability` per send, drop `length` consecutive sends.
    #[must_use]
    pub fn burst_loss(mut self, probability: f64, length: usize) -> Self {
        self.config.burst_loss_probability = probability.clamp(0.0, 1.0);
        self.config.burst_loss_length = length;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ChaosConfig {
        self.config
    }
}

// ###############
// #   SOCKET    #
// ###############

/// Counters of what a [`ChaosSocket`] did to its traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChaosStats {
    /// Messages handed to `send`.
    pub packets_sent: u64,
    /// Messages dropped by send loss.
    pub packets_dropped_send: u64,
    /// Extra copies sent.
    pub packets_duplicated: u64,
    /// Messages released to the caller.
    pub packets_received: u64,
    /// Messages dropped by receive loss.
    pub packets_dropped_receive: u64,
    /// Swaps made by reordering.
    pub packets_reordered: u64,
    /// Bursts started.
    pub burst_loss_events: u64,
    /// Messages dropped inside bursts.
    pub packets_dropped_burst: u64,
}

#[derive(Debug)]
struct InFlight<M> {
    message: M,
    deliver_at: Tick,
}

/// A [`Socket`] wrapper that injects configurable faults.
pub struct ChaosSocket<M, S> {
    inner: S,
    config: ChaosConfig,
    clock: LinkClock,
    rng: Pcg32,
    in_flight: VecDeque<InFlight<M>>,
    reorder_buffer: Vec<M>,
    ready: VecDeque<M>,
    latest_delivery: Tick,
    burst_loss_remaining: usize,
    stats: ChaosStats,
}

impl<M, S: std::fmt::Debug> std::fmt::Debug for ChaosSocket<M, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosSocket")
            .field("inner", &self.inner)
            .field("config", &self.config)
            .field("now", &self.clock.now())
            .field("in_flight", &self.in_flight.len())
            .field("ready", &self.ready.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<M: Clone, S: Socket<M>> ChaosSocket<M, S> {
    /// Wraps `inner`, timing delivery against `clock`.
    pub fn new(inner: S, config: ChaosConfig, clock: LinkClock) -> Self {
        let rng = Pcg32::seed_from_u64(config.seed);
        Self {
            inner,
            config,
            clock,
            rng,
            in_flight: VecDeque::new(),
            reorder_buffer: Vec::new(),
            ready: VecDeque::new(),
            latest_delivery: Tick::ZERO,
            burst_loss_remaining: 0,
            stats: ChaosStats::default(),
        }
    }

    /// The wrapped socket.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwraps the socket, discarding anything in flight.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Current settings.
    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Counters so far.
    pub fn stats(&self) -> &ChaosStats {
        &self.stats
    }

    /// Messages pulled from the inner socket but not yet due.
    pub fn packets_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn delivery_tick(&mut self) -> Tick {
        let now = self.clock.now();
        let jitter = u64::from(self.config.jitter_ticks);
        if jitter == 0 {
            return now + self.config.latency_ticks;
        }
        let span = self.config.jitter_ticks.saturating_mul(2).saturating_add(1);
        let offset = u64::from(self.rng.gen_range(0..span));
        // offset - jitter, applied without going below `now`
        let delay = (self.config.latency_ticks + offset).saturating_sub(jitter);
        now + delay
    }

    fn roll(&mut self, rate: f64) -> bool {
        if rate <= 0.0 {
            false
        } else if rate >= 1.0 {
            true
        } else {
            self.rng.gen_bool(rate)
        }
    }

    fn drop_in_burst(&mut self) -> bool {
        if self.burst_loss_remaining > 0 {
            self.burst_loss_remaining -= 1;
            self.stats.packets_dropped_burst += 1;
            return true;
        }
        if self.config.burst_loss_length > 0 && self.roll(self.config.burst_loss_probability) {
            self.stats.burst_loss_events += 1;
            self.stats.packets_dropped_burst += 1;
            self.burst_loss_remaining = self.config.burst_loss_length - 1;
            return true;
        }
        false
    }

    fn chaotic_send(&mut self, message: M) {
        self.stats.packets_sent += 1;

        if self.drop_in_burst() {
            trace!(socket = %self.inner.id(), "dropped message in burst");
            return;
        }
        if self.roll(self.config.send_loss_rate) {
            self.stats.packets_dropped_send += 1;
            trace!(socket = %self.inner.id(), "dropped message on send");
            return;
        }

        if self.roll(self.config.duplication_rate) {
            self.stats.packets_duplicated += 1;
            self.inner.send(message.clone());
        }
        self.inner.send(message);
    }

    /// Pulls new messages from the inner socket and moves every due one to `ready`.
    fn pump(&mut self) {
        while let Some(message) = self.inner.receive() {
            if self.roll(self.config.receive_loss_rate) {
                self.stats.packets_dropped_receive += 1;
                continue;
            }
            let mut deliver_at = self.delivery_tick();
            // jitter alone never reorders
            if self.config.reorder_rate <= 0.0 {
                deliver_at = deliver_at.max(self.latest_delivery);
                self.latest_delivery = deliver_at;
            }
            self.in_flight.push_back(InFlight {
                message,
                deliver_at,
            });
        }

        let now = self.clock.now();
        let mut due = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.in_flight.len());
        for packet in self.in_flight.drain(..) {
            if packet.deliver_at <= now {
                due.push(packet.message);
            } else {
                waiting.push_back(packet);
            }
        }
        self.in_flight = waiting;

        self.release(due);
    }

    fn release(&mut self, mut due: Vec<M>) {
        if self.config.reorder_buffer_size == 0 || self.config.reorder_rate <= 0.0 {
            self.stats.packets_received += due.len() as u64;
            self.ready.extend(due);
            return;
        }

        self.reorder_buffer.append(&mut due);
        if self.reorder_buffer.len() < self.config.reorder_buffer_size {
            return;
        }

        let len = self.reorder_buffer.len();
        let bound = u32::try_from(len).unwrap_or(u32::MAX);
        for i in 0..len {
            if self.roll(self.config.reorder_rate) {
                let j = self.rng.gen_range(0..bound) as usize;
                if i != j && j < len {
                    self.reorder_buffer.swap(i, j);
                    self.stats.packets_reordered += 1;
                }
            }
        }
        self.stats.packets_received += len as u64;
        self.ready.extend(self.reorder_buffer.drain(..));
    }

    fn chaotic_receive(&mut self) -> Option<M> {
        self.pump();
        self.ready.pop_front()
    }

    fn chaotic_receive_latest(&mut self) -> Option<M> {
        self.pump();
        let newest = self.ready.pop_back();
        self.ready.clear();
        newest
    }
}

#[cfg(feature = "sync-send")]
impl<M, S> Socket<M> for ChaosSocket<M, S>
where
    M: Clone + Send + Sync,
    S: Socket<M>,
{
    fn id(&self) -> &PlayerId {
        self.inner.id()
    }

    fn send(&mut self, message: M) {
        self.chaotic_send(message);
    }

    fn receive(&mut self) -> Option<M> {
        self.chaotic_receive()
    }

    fn receive_latest(&mut self) -> Option<M> {
        self.chaotic_receive_latest()
    }
}

#[cfg(not(feature = "sync-send"))]
impl<M, S> Socket<M> for ChaosSocket<M, S>
where
    M: Clone,
    S: Socket<M>,
{
    fn id(&self) -> &PlayerId {
        self.inner.id()
    }

    fn send(&mut self, message: M) {
        self.chaotic_send(message);
    }

    fn receive(&mut self) -> Option<M> {
        self.chaotic_receive()
    }

    fn receive_latest(&mut self) -> Option<M> {
        self.chaotic_receive_latest()
    }
}
