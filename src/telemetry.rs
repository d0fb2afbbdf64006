//! Structured telemetry for protocol violations.
//!
//! Once a protocol is wired up its tick loop never fails. Anything unexpected on the
//! way (a message travelling in the wrong direction, an acknowledgement older than one
//! already seen, a buffer overflowing its cap) is recorded as a [`ProtocolViolation`] and
//! handed to a [`ViolationObserver`], and the loop carries on.
//!
//! - [`TracingObserver`] logs through `tracing` and is used when nothing else is set.
//! - [`CollectingObserver`] keeps every violation in memory for tests.
//!
//! # Example
//!
//! ```
//! use predictive_sync::telemetry::{CollectingObserver, ViolationKind};
//! use std::sync::Arc;
//!
//! let observer = Arc::new(CollectingObserver::new());
//! // ... hand `observer.clone()` to a StrategyConfig and run some ticks ...
//! assert!(!observer.has_violation(ViolationKind::TickOrdering));
//! ```

use crate::Tick;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Severity of a protocol violation, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Unexpected but recoverable; the operation continued with a fallback.
    Warning,
    /// The operation was skipped and behavior may degrade.
    Error,
    /// An internal invariant is broken and state may be inconsistent.
    Critical,
}

impl ViolationSeverity {
    /// Returns a string representation suitable for logging/metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of protocol violations.
///
/// This enum is `#[non_exhaustive]`; include a wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ViolationKind {
    /// A server acknowledged a tick older than one it already acknowledged.
    StaleAcknowledgement,
    /// A client received a client message or the server received a server message.
    UnexpectedDirection,
    /// A tick buffer was asked to store a tick that is not newer than its tail.
    TickOrdering,
    /// A pending buffer hit its configured cap and evicted or folded its oldest entry.
    PendingOverflow,
    /// A message or action referenced a player the simulation does not know.
    UnknownPlayer,
    /// The transport failed to send or decode a message.
    Transport,
    /// A runtime invariant check failed.
    Invariant,
}

impl ViolationKind {
    /// Returns a string representation suitable for logging/metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StaleAcknowledgement => "stale_acknowledgement",
            Self::UnexpectedDirection => "unexpected_direction",
            Self::TickOrdering => "tick_ordering",
            Self::PendingOverflow => "pending_overflow",
            Self::UnknownPlayer => "unknown_player",
            Self::Transport => "transport",
            Self::Invariant => "invariant",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded protocol violation.
///
/// # Example
///
/// ```
/// use predictive_sync::telemetry::{ProtocolViolation, ViolationKind, ViolationSeverity};
/// use predictive_sync::Tick;
///
/// let violation = ProtocolViolation::new(
///     ViolationSeverity::Warning,
///     ViolationKind::StaleAcknowledgement,
///     "ack went backwards",
///     "rollback.rs:42",
/// )
/// .with_tick(Tick::new(12))
/// .with_context("previous", "14");
///
/// assert_eq!(violation.tick, Some(Tick::new(12)));
/// assert!(violation.to_string().contains("stale_acknowledgement"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ProtocolViolation {
    /// The severity level of this violation.
    pub severity: ViolationSeverity,
    /// The category of this violation.
    pub kind: ViolationKind,
    /// Human-readable description of what went wrong.
    pub message: String,
    /// Source location where the violation was detected (file:line).
    pub location: &'static str,
    /// The local tick at which the violation occurred, if applicable.
    pub tick: Option<Tick>,
    /// Additional structured context as key-value pairs.
    pub context: BTreeMap<String, String>,
}

impl ProtocolViolation {
    /// Creates a new protocol violation.
    #[must_use]
    pub fn new(
        severity: ViolationSeverity,
        kind: ViolationKind,
        message: impl Into<String>,
        location: &'static str,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location,
            tick: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the tick at which this violation occurred.
    #[must_use]
    pub fn with_tick(mut self, tick: Tick) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Adds a context key-value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Serializes this violation to a JSON string.
    ///
    /// Returns `None` if serialization fails, which does not happen for well-formed
    /// violations.
    ///
    /// ```
    /// use predictive_sync::telemetry::{ProtocolViolation, ViolationKind, ViolationSeverity};
    /// use predictive_sync::Tick;
    ///
    /// let violation = ProtocolViolation::new(
    ///     ViolationSeverity::Error,
    ///     ViolationKind::UnexpectedDirection,
    ///     "test",
    ///     "test.rs:1",
    /// )
    /// .with_tick(Tick::new(42));
    ///
    /// let json = violation.to_json().unwrap();
    /// assert!(json.contains(r#""tick":42"#));
    /// assert!(json.contains(r#""kind":"unexpected_direction""#));
    /// ```
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Serializes this violation to a pretty-printed JSON string.
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json_pretty(&self) -> Option<String> {
        serde_json::to_string_pretty(self).ok()
    }
}

impl std::fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {} (at {}",
            self.severity, self.kind, self.message, self.location
        )?;
        if let Some(tick) = self.tick {
            write!(f, ", tick={tick}")?;
        }
        if !self.context.is_empty() {
            write!(f, ", context={:?}", self.context)?;
        }
        write!(f, ")")
    }
}

/// Trait for observing protocol violations.
///
/// With the `sync-send` feature, observers must be `Send + Sync`.
///
/// ```
/// use predictive_sync::telemetry::{ProtocolViolation, ViolationObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Counter(AtomicUsize);
///
/// impl ViolationObserver for Counter {
///     fn on_violation(&self, _violation: &ProtocolViolation) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
#[cfg(feature = "sync-send")]
pub trait ViolationObserver: Send + Sync {
    /// Called when a protocol violation is detected. Runs inside the tick loop, so keep
    /// it quick.
    fn on_violation(&self, violation: &ProtocolViolation);
}

#[cfg(not(feature = "sync-send"))]
/// Trait for observing protocol violations.
pub trait ViolationObserver {
    /// Called when a protocol violation is detected. Runs inside the tick loop, so keep
    /// it quick.
    fn on_violation(&self, violation: &ProtocolViolation);
}

/// Observer that logs violations via `tracing`.
///
/// `Warning` maps to `tracing::warn!`; `Error` and `Critical` map to `tracing::error!`.
/// Severity, kind, location, tick and context are emitted as structured fields.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates a new tracing observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn format_tick(tick: Option<Tick>) -> String {
        tick.map_or_else(|| "null".to_owned(), |t| t.to_string())
    }
}

impl ViolationObserver for TracingObserver {
    fn on_violation(&self, violation: &ProtocolViolation) {
        let severity = violation.severity.as_str();
        let kind = violation.kind.as_str();
        let location = violation.location;
        let tick = Self::format_tick(violation.tick);

        let context = if violation.context.is_empty() {
            "{}".to_owned()
        } else {
            let pairs: Vec<String> = violation
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{{{}}}", pairs.join(", "))
        };

        match violation.severity {
            ViolationSeverity::Warning => {
                tracing::warn!(
                    severity,
                    kind,
                    location,
                    tick = %tick,
                    context = %context,
                    "{}",
                    violation.message
                );
            },
            ViolationSeverity::Error | ViolationSeverity::Critical => {
                tracing::error!(
                    severity,
                    kind,
                    location,
                    tick = %tick,
                    context = %context,
                    "{}",
                    violation.message
                );
            },
        }
    }
}

/// Observer that collects violations for tests.
///
/// ```
/// use predictive_sync::telemetry::{
///     CollectingObserver, ProtocolViolation, ViolationKind, ViolationObserver, ViolationSeverity,
/// };
///
/// let observer = CollectingObserver::new();
/// observer.on_violation(&ProtocolViolation::new(
///     ViolationSeverity::Warning,
///     ViolationKind::PendingOverflow,
///     "buffer full",
///     "test.rs:1",
/// ));
///
/// assert_eq!(observer.len(), 1);
/// assert!(observer.has_violation(ViolationKind::PendingOverflow));
/// ```
#[derive(Debug, Default)]
pub struct CollectingObserver {
    violations: Mutex<Vec<ProtocolViolation>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer with an empty violation list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all collected violations.
    #[must_use]
    pub fn violations(&self) -> Vec<ProtocolViolation> {
        self.violations.lock().clone()
    }

    /// Returns the number of collected violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.lock().len()
    }

    /// Returns true if no violations have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.lock().is_empty()
    }

    /// Checks if any violation of the specified kind has been collected.
    #[must_use]
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.lock().iter().any(|v| v.kind == kind)
    }

    /// Returns all violations matching the specified kind.
    #[must_use]
    pub fn violations_of_kind(&self, kind: ViolationKind) -> Vec<ProtocolViolation> {
        self.violations
            .lock()
            .iter()
            .filter(|v| v.kind == kind)
            .cloned()
            .collect()
    }

    /// Clears all collected violations.
    pub fn clear(&self) {
        self.violations.lock().clear();
    }
}

impl ViolationObserver for CollectingObserver {
    fn on_violation(&self, violation: &ProtocolViolation) {
        self.violations.lock().push(violation.clone());
    }
}

/// Reports a violation to an optional observer, falling back to [`TracingObserver`].
pub fn report_to_observer<O: ViolationObserver + ?Sized>(
    observer: Option<&Arc<O>>,
    violation: &ProtocolViolation,
) {
    match observer {
        Some(obs) => obs.on_violation(violation),
        None => TracingObserver.on_violation(violation),
    }
}

/// Reports a violation through [`TracingObserver`], stamped with the call site.
///
/// ```
/// use predictive_sync::{report_violation, telemetry::{ViolationKind, ViolationSeverity}};
///
/// report_violation!(
///     ViolationSeverity::Warning,
///     ViolationKind::Transport,
///     "dropped {} bytes",
///     12
/// );
/// ```
#[macro_export]
macro_rules! report_violation {
    ($severity:expr, $kind:expr, $msg:literal) => {{
        use $crate::telemetry::ViolationObserver as _;
        let violation = $crate::telemetry::ProtocolViolation::new(
            $severity,
            $kind,
            $msg,
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::TracingObserver.on_violation(&violation);
    }};

    ($severity:expr, $kind:expr, $fmt:literal, $($arg:tt)+) => {{
        use $crate::telemetry::ViolationObserver as _;
        let violation = $crate::telemetry::ProtocolViolation::new(
            $severity,
            $kind,
            format!($fmt, $($arg)+),
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::TracingObserver.on_violation(&violation);
    }};
}

/// Reports a violation, stamped with the call site and a tick, to an
/// `Option<Arc<dyn ViolationObserver>>`, falling back to [`TracingObserver`].
///
/// ```
/// use predictive_sync::{report_violation_to, telemetry::*, Tick};
/// use std::sync::Arc;
///
/// let collector = Arc::new(CollectingObserver::new());
/// let observer: Option<Arc<dyn ViolationObserver>> = Some(collector.clone());
///
/// report_violation_to!(
///     &observer,
///     Tick::new(3),
///     ViolationSeverity::Warning,
///     ViolationKind::StaleAcknowledgement,
///     "ack {} is older than {}",
///     2,
///     5
/// );
/// assert_eq!(collector.violations()[0].tick, Some(Tick::new(3)));
/// ```
#[macro_export]
macro_rules! report_violation_to {
    ($observer:expr, $tick:expr, $severity:expr, $kind:expr, $msg:literal) => {{
        let violation = $crate::telemetry::ProtocolViolation::new(
            $severity,
            $kind,
            $msg,
            concat!(file!(), ":", line!()),
        )
        .with_tick($tick);
        $crate::telemetry::report_to_observer($observer.as_ref(), &violation);
    }};

    ($observer:expr, $tick:expr, $severity:expr, $kind:expr, $fmt:literal, $($arg:tt)+) => {{
        let violation = $crate::telemetry::ProtocolViolation::new(
            $severity,
            $kind,
            format!($fmt, $($arg)+),
            concat!(file!(), ":", line!()),
        )
        .with_tick($tick);
        $crate::telemetry::report_to_observer($observer.as_ref(), &violation);
    }};
}

/// Asserts that an observer collected no violations.
///
/// # Panics
///
/// Panics if the observer contains any violations, printing them for debugging.
#[macro_export]
macro_rules! assert_no_violations {
    ($observer:expr) => {{
        let violations = $observer.violations();
        assert!(
            violations.is_empty(),
            "Expected no violations, but found {}:\n{:#?}",
            violations.len(),
            violations
        );
    }};

    ($observer:expr, $msg:expr) => {{
        let violations = $observer.violations();
        assert!(
            violations.is_empty(),
            "{}\nExpected no violations, but found {}:\n{:#?}",
            $msg,
            violations.len(),
            violations
        );
    }};
}

/// Asserts that an observer collected a violation of the given kind.
///
/// # Panics
///
/// Panics if no violation of the specified kind was found.
#[macro_export]
macro_rules! assert_violation {
    ($observer:expr, $kind:expr) => {{
        assert!(
            $observer.has_violation($kind),
            "Expected violation of kind {:?}, but found: {:#?}",
            $kind,
            $observer.violations()
        );
    }};
}

// ==========================================
// Runtime Invariant Checking
// ==========================================

/// Description of a broken type invariant.
#[derive(Debug, Clone, Serialize)]
pub struct InvariantViolation {
    /// Name of the type whose invariant was violated.
    pub type_name: &'static str,
    /// Description of the violated invariant.
    pub invariant: String,
    /// Additional diagnostic context.
    pub details: Option<String>,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    #[must_use]
    pub fn new(type_name: &'static str, invariant: impl Into<String>) -> Self {
        Self {
            type_name,
            invariant: invariant.into(),
            details: None,
        }
    }

    /// Adds additional details to the violation.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.invariant)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Types that maintain internal invariants and can check them at runtime.
///
/// Checks run in debug builds, or in any build with the `paranoid` feature, through
/// [`debug_check_invariants!`](crate::debug_check_invariants).
pub trait InvariantChecker {
    /// Returns the first broken invariant, if any.
    fn check_invariants(&self) -> Result<(), InvariantViolation>;
}

/// Checks invariants in debug builds (or with `paranoid`) and reports a `Critical`
/// violation when one is broken.
#[macro_export]
#[cfg(any(debug_assertions, feature = "paranoid"))]
macro_rules! debug_check_invariants {
    ($expr:expr, $context:expr) => {{
        use $crate::telemetry::InvariantChecker as _;
        if let Err(violation) = $expr.check_invariants() {
            $crate::report_violation!(
                $crate::telemetry::ViolationSeverity::Critical,
                $crate::telemetry::ViolationKind::Invariant,
                "{} [context: {}]",
                violation,
                $context
            );
        }
    }};
}

/// No-op version for release builds without `paranoid` feature.
#[macro_export]
#[cfg(not(any(debug_assertions, feature = "paranoid")))]
macro_rules! debug_check_invariants {
    ($expr:expr, $context:expr) => {{}};
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn sample(kind: ViolationKind, severity: ViolationSeverity) -> ProtocolViolation {
        ProtocolViolation::new(severity, kind, "sample", "test.rs:1")
    }

    #[test]
    fn severity_ordering() {
        assert!(ViolationSeverity::Warning < ViolationSeverity::Error);
        assert!(ViolationSeverity::Error < ViolationSeverity::Critical);
    }

    #[test]
    fn kind_labels_are_snake_case() {
        assert_eq!(
            ViolationKind::StaleAcknowledgement.as_str(),
            "stale_acknowledgement"
        );
        assert_eq!(
            ViolationKind::UnexpectedDirection.as_str(),
            "unexpected_direction"
        );
        assert_eq!(ViolationKind::TickOrdering.as_str(), "tick_ordering");
        assert_eq!(ViolationKind::PendingOverflow.as_str(), "pending_overflow");
        assert_eq!(ViolationKind::UnknownPlayer.as_str(), "unknown_player");
        assert_eq!(ViolationKind::Transport.as_str(), "transport");
        assert_eq!(ViolationKind::Invariant.as_str(), "invariant");
    }

    #[test]
    fn builder_sets_tick_and_context() {
        let violation = sample(ViolationKind::TickOrdering, ViolationSeverity::Error)
            .with_tick(Tick::new(9))
            .with_context("tail", "10");
        assert_eq!(violation.tick, Some(Tick::new(9)));
        assert_eq!(violation.context.get("tail"), Some(&"10".to_owned()));

        let display = violation.to_string();
        assert!(display.contains("error"));
        assert!(display.contains("tick_ordering"));
        assert!(display.contains("tick=9"));
        assert!(display.contains("tail"));
    }

    #[test]
    fn collecting_observer_filters() {
        let observer = CollectingObserver::new();
        observer.on_violation(&sample(
            ViolationKind::PendingOverflow,
            ViolationSeverity::Warning,
        ));
        observer.on_violation(&sample(
            ViolationKind::UnexpectedDirection,
            ViolationSeverity::Error,
        ));

        assert_eq!(observer.len(), 2);
        assert!(observer.has_violation(ViolationKind::PendingOverflow));
        assert!(!observer.has_violation(ViolationKind::Transport));
        assert_eq!(
            observer
                .violations_of_kind(ViolationKind::UnexpectedDirection)
                .len(),
            1
        );

        observer.clear();
        assert!(observer.is_empty());
        crate::assert_no_violations!(observer);
    }

    #[test]
    fn report_to_none_falls_back_to_tracing() {
        // Must not panic without a subscriber installed.
        report_to_observer(
            None::<&Arc<CollectingObserver>>,
            &sample(ViolationKind::Invariant, ViolationSeverity::Critical),
        );
    }

    #[test]
    fn report_violation_to_stamps_location() {
        let collector = Arc::new(CollectingObserver::new());
        let observer: Option<Arc<dyn ViolationObserver>> = Some(collector.clone());
        crate::report_violation_to!(
            &observer,
            Tick::new(1),
            ViolationSeverity::Warning,
            ViolationKind::UnknownPlayer,
            "no player {}",
            "Z"
        );
        let violations = collector.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].message, "no player Z");
        assert!(violations[0].location.contains("telemetry.rs"));
        crate::assert_violation!(collector, ViolationKind::UnknownPlayer);
    }

    #[test]
    fn invariant_violation_display() {
        let violation = InvariantViolation::new("TickBuffer", "ticks out of order")
            .with_details("4 then 3");
        assert_eq!(
            violation.to_string(),
            "TickBuffer: ticks out of order (4 then 3)"
        );
    }
}
