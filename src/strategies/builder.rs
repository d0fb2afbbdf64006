//! Settings shared by every protocol.
//!
//! All three protocols are configured through one [`StrategyConfig`]. Most settings only
//! matter to some of them; the others ignore them.

use std::sync::Arc;

use crate::telemetry::ViolationObserver;
use crate::SyncError;

/// Default cap on unacknowledged client entries: unbounded.
///
/// Under permanent loss a predicting client's buffer grows by one entry per tick. That
/// is accepted by default; set a cap to trade correctness of the oldest replayed inputs
/// for bounded memory.
pub const DEFAULT_MAX_PENDING_ACTIONS: Option<usize> = None;

/// Default for draining server messages on an algebraic client: all of them.
pub const DEFAULT_MAX_DELTAS_PER_TICK: Option<usize> = None;

/// Protocol settings. Build with [`StrategyConfig::builder`].
///
/// ```
/// use predictive_sync::{RollbackProtocol, StrategyConfig};
/// use predictive_sync::telemetry::CollectingObserver;
/// use std::sync::Arc;
///
/// let observer = Arc::new(CollectingObserver::new());
/// let config = StrategyConfig::builder()
///     .with_max_pending_actions(120)?
///     .with_violation_observer(observer.clone())
///     .build();
/// let protocol = RollbackProtocol::default().with_config(config);
/// assert_eq!(protocol.config().max_pending_actions(), Some(120));
/// # Ok::<(), predictive_sync::SyncError>(())
/// ```
#[derive(Clone, Default)]
pub struct StrategyConfig {
    max_pending_actions: Option<usize>,
    max_deltas_per_tick: Option<usize>,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for StrategyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure so a new field cannot be forgotten here.
        let Self {
            max_pending_actions,
            max_deltas_per_tick,
            observer,
        } = self;

        f.debug_struct("StrategyConfig")
            .field("max_pending_actions", max_pending_actions)
            .field("max_deltas_per_tick", max_deltas_per_tick)
            .field("has_violation_observer", &observer.is_some())
            .finish()
    }
}

impl StrategyConfig {
    /// Starts a builder with every setting at its default.
    #[must_use]
    pub fn builder() -> StrategyConfigBuilder {
        StrategyConfigBuilder::new()
    }

    /// Cap on buffered unacknowledged entries of a predicting client, if any.
    #[must_use]
    pub fn max_pending_actions(&self) -> Option<usize> {
        self.max_pending_actions
    }

    /// Cap on server messages an algebraic client merges per tick, if any. Messages
    /// beyond the cap stay queued for the next tick.
    #[must_use]
    pub fn max_deltas_per_tick(&self) -> Option<usize> {
        self.max_deltas_per_tick
    }

    /// The observer violations are reported to. `None` means [`TracingObserver`].
    ///
    /// [`TracingObserver`]: crate::telemetry::TracingObserver
    #[must_use]
    pub fn violation_observer(&self) -> Option<&Arc<dyn ViolationObserver>> {
        self.observer.as_ref()
    }
}

/// Fluent builder for [`StrategyConfig`].
#[derive(Clone, Default)]
pub struct StrategyConfigBuilder {
    config: StrategyConfig,
}

impl std::fmt::Debug for StrategyConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl StrategyConfigBuilder {
    /// Creates a builder with every setting at its default.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: StrategyConfig {
                max_pending_actions: DEFAULT_MAX_PENDING_ACTIONS,
                max_deltas_per_tick: DEFAULT_MAX_DELTAS_PER_TICK,
                observer: None,
            },
        }
    }

    /// Caps the unacknowledged entries a predicting client keeps. When the cap is
    /// reached the oldest entry is evicted and a warning is reported.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidRequest`] for a cap of zero: a client must be able
    /// to remember at least the tick it just predicted.
    pub fn with_max_pending_actions(mut self, cap: usize) -> Result<Self, SyncError> {
        if cap == 0 {
            return Err(SyncError::InvalidRequest {
                info: "max_pending_actions must be at least 1".to_owned(),
            });
        }
        self.config.max_pending_actions = Some(cap);
        Ok(self)
    }

    /// Caps how many queued server messages an algebraic client merges per tick.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidRequest`] for a cap of zero, which would never merge
    /// anything.
    pub fn with_max_deltas_per_tick(mut self, cap: usize) -> Result<Self, SyncError> {
        if cap == 0 {
            return Err(SyncError::InvalidRequest {
                info: "max_deltas_per_tick must be at least 1".to_owned(),
            });
        }
        self.config.max_deltas_per_tick = Some(cap);
        Ok(self)
    }

    /// Sends protocol violations to `observer` instead of `tracing`.
    #[must_use]
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> StrategyConfig {
        self.config
    }
}
