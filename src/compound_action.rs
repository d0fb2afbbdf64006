use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::PlayerId;

/// The actions of several players for a single tick.
///
/// Holds at most one action per [`PlayerId`]. Inserting for an id that is already present
/// replaces its action. Entries are kept sorted by id, so iteration order is the same on
/// every peer regardless of insertion order.
///
/// A player without an entry simply has no input this tick. That is different from an
/// entry holding `A::default()`: simulations may treat absent players specially, for
/// example by freezing them during prediction.
///
/// ```
/// use predictive_sync::{CompoundAction, PlayerId};
///
/// let mut actions = CompoundAction::new();
/// actions.insert(PlayerId::from("B"), 2);
/// actions.insert(PlayerId::from("A"), 1);
/// actions.insert(PlayerId::from("B"), 3);
///
/// let ids: Vec<&str> = actions.player_ids().map(PlayerId::as_str).collect();
/// assert_eq!(ids, ["A", "B"]);
/// assert_eq!(actions.get(&PlayerId::from("B")), Some(&3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundAction<A> {
    // sorted by id, unique ids
    entries: SmallVec<[(PlayerId, A); 4]>,
}

impl<A> Default for CompoundAction<A> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<A> CompoundAction<A> {
    /// Creates an empty compound action.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a compound action holding one player's action.
    #[must_use]
    pub fn single(player: PlayerId, action: A) -> Self {
        let mut entries = SmallVec::new();
        entries.push((player, action));
        Self { entries }
    }

    /// Sets `player`'s action, returning the action it replaced.
    pub fn insert(&mut self, player: PlayerId, action: A) -> Option<A> {
        match self.position(&player) {
            Ok(index) => self
                .entries
                .get_mut(index)
                .map(|entry| std::mem::replace(&mut entry.1, action)),
            Err(index) => {
                self.entries.insert(index, (player, action));
                None
            }
        }
    }

    /// Removes `player`'s action, if present.
    pub fn remove(&mut self, player: &PlayerId) -> Option<A> {
        let index = self.position(player).ok()?;
        Some(self.entries.remove(index).1)
    }

    /// Returns `player`'s action, if present.
    #[must_use]
    pub fn get(&self, player: &PlayerId) -> Option<&A> {
        let index = self.position(player).ok()?;
        self.entries.get(index).map(|(_, action)| action)
    }

    /// Whether `player` has an action.
    #[must_use]
    pub fn contains(&self, player: &PlayerId) -> bool {
        self.position(player).is_ok()
    }

    /// Number of players with an action.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no player has an action.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(player, action)` pairs in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &A)> {
        self.entries.iter().map(|(id, action)| (id, action))
    }

    /// Iterates player ids in ascending order.
    pub fn player_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.entries.iter().map(|(id, _)| id)
    }

    fn position(&self, player: &PlayerId) -> Result<usize, usize> {
        self.entries.binary_search_by(|(id, _)| id.cmp(player))
    }
}

impl<A: Clone> CompoundAction<A> {
    /// Returns a copy without `player`'s entry.
    #[must_use]
    pub fn without(&self, player: &PlayerId) -> Self {
        let mut copy = self.clone();
        copy.remove(player);
        copy
    }
}

impl<A> FromIterator<(PlayerId, A)> for CompoundAction<A> {
    fn from_iter<I: IntoIterator<Item = (PlayerId, A)>>(iter: I) -> Self {
        let mut actions = Self::new();
        for (player, action) in iter {
            actions.insert(player, action);
        }
        actions
    }
}

impl<A> Extend<(PlayerId, A)> for CompoundAction<A> {
    fn extend<I: IntoIterator<Item = (PlayerId, A)>>(&mut self, iter: I) {
        for (player, action) in iter {
            self.insert(player, action);
        }
    }
}

// On the wire this is a plain sequence of pairs. Decoding goes through `insert`, so a
// peer cannot smuggle in duplicate or unsorted ids.
impl<A: Serialize> Serialize for CompoundAction<A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.as_slice().serialize(serializer)
    }
}

impl<'de, A: Deserialize<'de>> Deserialize<'de> for CompoundAction<A> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<(PlayerId, A)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}

impl<A> IntoIterator for CompoundAction<A> {
    type Item = (PlayerId, A);
    type IntoIter = smallvec::IntoIter<[(PlayerId, A); 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
