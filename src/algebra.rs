//! The State Algebra: addition and negation over simulation snapshots.
//!
//! The algebraic protocol ships per-tick deltas instead of full snapshots. A delta is
//! `after.add(&before.negate())`, and a client reconstructs the server's snapshot by
//! adding deltas onto what it already has. For that to work the snapshot type must form
//! an abelian group:
//!
//! - `a.add(&b)` equals `b.add(&a)`
//! - `a.add(&b).add(&c)` equals `a.add(&b.add(&c))`
//! - `a.add(&a.negate())` is the zero element
//!
//! # Structural fields
//!
//! Some fields are not quantities: wall geometry, ground contact flags, names. Wrap them
//! in [`Structural`], which makes `add` keep the right-hand value and `negate` a no-op.
//! This is the one deliberate exception to commutativity, and it is what lets static
//! geometry ride along in a delta unchanged.
//!
//! # Maps
//!
//! [`BTreeMap`] merges by key: a key present on one side only is copied, a key present
//! on both sides is merged recursively. Newly spawned entities therefore appear in a
//! delta verbatim and are copied into the receiving snapshot.
//!
//! ```
//! use std::collections::BTreeMap;
//! use predictive_sync::StateAlgebra;
//!
//! let before: BTreeMap<&str, f64> = [("a", 1.0)].into_iter().collect();
//! let after: BTreeMap<&str, f64> = [("a", 3.5)].into_iter().collect();
//!
//! let delta = after.difference(&before);
//! assert_eq!(delta["a"], 2.5);
//! assert_eq!(before.add(&delta), after);
//! ```

use std::collections::BTreeMap;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Addition and negation over snapshots. See the [module docs](self) for the laws.
///
/// Both operations take their operands by reference and return a new value; neither
/// mutates an input.
pub trait StateAlgebra: Sized {
    /// Combines two values. Quantities add, structural fields keep `other`'s value.
    #[must_use]
    fn add(&self, other: &Self) -> Self;

    /// Returns the additive inverse. Structural fields are returned unchanged.
    #[must_use]
    fn negate(&self) -> Self;

    /// Returns `self - base`, the delta that takes `base` to `self`.
    #[must_use]
    fn difference(&self, base: &Self) -> Self {
        self.add(&base.negate())
    }
}

macro_rules! impl_float_algebra {
    ($($t:ty),*) => {
        $(
            impl StateAlgebra for $t {
                #[inline]
                fn add(&self, other: &Self) -> Self {
                    *self + *other
                }

                #[inline]
                fn negate(&self) -> Self {
                    -*self
                }
            }
        )*
    };
}

// Integers wrap: a snapshot near the edge of its range must not panic the tick loop, and
// wrapping addition is still an abelian group.
macro_rules! impl_int_algebra {
    ($($t:ty),*) => {
        $(
            impl StateAlgebra for $t {
                #[inline]
                fn add(&self, other: &Self) -> Self {
                    self.wrapping_add(*other)
                }

                #[inline]
                fn negate(&self) -> Self {
                    self.wrapping_neg()
                }
            }
        )*
    };
}

impl_float_algebra!(f32, f64);
impl_int_algebra!(i8, i16, i32, i64);

impl<K, V> StateAlgebra for BTreeMap<K, V>
where
    K: Ord + Clone,
    V: StateAlgebra + Clone,
{
    fn add(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (key, value) in other {
            let merged = match self.get(key) {
                Some(existing) => existing.add(value),
                None => value.clone(),
            };
            result.insert(key.clone(), merged);
        }
        result
    }

    fn negate(&self) -> Self {
        self.iter()
            .map(|(key, value)| (key.clone(), value.negate()))
            .collect()
    }
}

impl<V> StateAlgebra for Option<V>
where
    V: StateAlgebra + Clone,
{
    fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (Some(left), Some(right)) => Some(left.add(right)),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }

    fn negate(&self) -> Self {
        self.as_ref().map(StateAlgebra::negate)
    }
}

impl<A, B> StateAlgebra for (A, B)
where
    A: StateAlgebra,
    B: StateAlgebra,
{
    fn add(&self, other: &Self) -> Self {
        (self.0.add(&other.0), self.1.add(&other.1))
    }

    fn negate(&self) -> Self {
        (self.0.negate(), self.1.negate())
    }
}

impl<A, B, C> StateAlgebra for (A, B, C)
where
    A: StateAlgebra,
    B: StateAlgebra,
    C: StateAlgebra,
{
    fn add(&self, other: &Self) -> Self {
        (
            self.0.add(&other.0),
            self.1.add(&other.1),
            self.2.add(&other.2),
        )
    }

    fn negate(&self) -> Self {
        (self.0.negate(), self.1.negate(), self.2.negate())
    }
}

impl<V, const N: usize> StateAlgebra for [V; N]
where
    V: StateAlgebra,
{
    fn add(&self, other: &Self) -> Self {
        std::array::from_fn(|i| self[i].add(&other[i]))
    }

    fn negate(&self) -> Self {
        std::array::from_fn(|i| self[i].negate())
    }
}

/// A field that is copied, never summed.
///
/// `add` keeps the right-hand operand and `negate` is the identity. Use it for geometry,
/// flags and anything else a delta should carry verbatim.
///
/// ```
/// use predictive_sync::{StateAlgebra, Structural};
///
/// let old = Structural(false);
/// let new = Structural(true);
/// assert_eq!(old.add(&new), new);
/// assert_eq!(new.negate(), new);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Structural<T>(pub T);

impl<T> Structural<T> {
    /// Unwraps the inner value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Structural<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> From<T> for Structural<T> {
    #[inline]
    fn from(value: T) -> Self {
        Structural(value)
    }
}

impl<T: Clone> StateAlgebra for Structural<T> {
    #[inline]
    fn add(&self, other: &Self) -> Self {
        other.clone()
    }

    #[inline]
    fn negate(&self) -> Self {
        self.clone()
    }
}
