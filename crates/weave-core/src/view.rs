//! Bounded peer table shared by every protocol variant.
//!
//! A [`View`] keeps its entries in insertion order. Most protocols treat it as
//! a plain map, the healer/swapper sampling variant relies on the order to
//! pick which entries to send and which to evict.

use indexmap::IndexMap;
use rand::{seq::SliceRandom, thread_rng};
use serde::{Deserialize, Serialize};

use crate::{Item, PeerId};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct View {
    entries: IndexMap<PeerId, Item>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.entries.contains_key(peer)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&Item> {
        self.entries.get(peer)
    }

    pub fn get_mut(&mut self, peer: &PeerId) -> Option<&mut Item> {
        self.entries.get_mut(peer)
    }

    /// Insert or replace the entry of `peer`, keeping its position if it was known
    pub fn insert(&mut self, peer: PeerId, item: Item) -> Option<Item> {
        self.entries.insert(peer, item)
    }

    /// Remove the entry of `peer`, preserving the order of the remaining ones
    pub fn remove(&mut self, peer: &PeerId) -> Option<Item> {
        self.entries.shift_remove(peer)
    }

    pub fn keys(&self) -> impl Iterator<Item = &PeerId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &Item)> {
        self.entries.iter()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.entries.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Increase the age of every entry by exactly one
    pub fn increase_age(&mut self) {
        for item in self.entries.values_mut() {
            item.age = item.age.saturating_add(1);
        }
    }

    /// Key with the largest age, ties broken uniformly at random.
    ///
    /// Returns `None` when the view is empty.
    pub fn oldest_key(&self) -> Option<PeerId> {
        self.oldest_key_among(self.entries.keys())
    }

    /// Same as [`View::oldest_key`] restricted to `candidates`, unknown candidates are ignored
    pub fn oldest_key_among<'a, I>(&self, candidates: I) -> Option<PeerId>
    where
        I: IntoIterator<Item = &'a PeerId>,
    {
        let mut oldest: Vec<&PeerId> = Vec::new();
        let mut max_age = 0;

        for peer in candidates {
            let Some(item) = self.entries.get(peer) else {
                continue;
            };

            if oldest.is_empty() || item.age > max_age {
                max_age = item.age;
                oldest.clear();
                oldest.push(peer);
            } else if item.age == max_age {
                oldest.push(peer);
            }
        }

        oldest.choose(&mut thread_rng()).map(|peer| (*peer).clone())
    }

    /// Uniformly random key of the view
    pub fn random_key(&self) -> Option<PeerId> {
        let index = rand::random::<usize>().checked_rem(self.entries.len())?;

        self.entries.get_index(index).map(|(peer, _)| peer.clone())
    }

    /// Uniformly random subset of `min(n, len)` entries.
    ///
    /// When `n` covers the whole view the result is an exact copy of it.
    pub fn random_subset(&self, n: usize) -> View {
        if n == 0 {
            return View::new();
        }

        if n >= self.entries.len() {
            return self.clone();
        }

        let mut indices = rand::seq::index::sample(&mut thread_rng(), self.entries.len(), n)
            .into_vec();
        indices.sort_unstable();

        indices
            .into_iter()
            .filter_map(|index| self.entries.get_index(index))
            .map(|(peer, item)| (peer.clone(), item.clone()))
            .collect()
    }

    /// Union of both views, keeping the fresher item for keys present in both.
    ///
    /// On equal ages the item of `self` is kept.
    pub fn merge(&self, other: &View) -> View {
        let mut merged = self.clone();

        for (peer, item) in other.iter() {
            match merged.entries.get_mut(peer) {
                Some(current) if item.is_fresher_than(current) => *current = item.clone(),
                Some(_) => {}
                None => {
                    merged.entries.insert(peer.clone(), item.clone());
                }
            }
        }

        merged
    }

    /// Merge `incoming` into the view and bring it back under `view_size`.
    ///
    /// `local` is never inserted. Keys known on both sides keep the fresher
    /// item. When every incoming entry fits, they are appended and nothing is
    /// evicted. Otherwise the view is rebuilt by priority: keys refreshed by
    /// `incoming`, then keys only present in `incoming`, then the previously
    /// known keys. Inside each group entries are ordered by ascending age and
    /// then by peer id.
    pub fn merge_and_trim(&mut self, mut incoming: View, view_size: usize, local: &PeerId) {
        incoming.remove(local);

        let mut refreshed: Vec<PeerId> = Vec::new();
        let mut candidates: Vec<(PeerId, Item)> = Vec::new();

        for (peer, item) in incoming.entries {
            match self.entries.get_mut(&peer) {
                Some(current) => {
                    if item.is_fresher_than(current) {
                        *current = item;
                    }
                    refreshed.push(peer);
                }
                None => candidates.push((peer, item)),
            }
        }

        if self.entries.len() + candidates.len() <= view_size {
            self.entries.extend(candidates);

            return;
        }

        let mut previous = std::mem::take(&mut self.entries);

        let mut refreshed: Vec<(PeerId, Item)> = refreshed
            .iter()
            .filter_map(|peer| previous.shift_remove_entry(peer))
            .collect();
        let mut known: Vec<(PeerId, Item)> = previous.into_iter().collect();

        sort_by_freshness(&mut refreshed);
        sort_by_freshness(&mut candidates);
        sort_by_freshness(&mut known);

        self.entries = refreshed
            .into_iter()
            .chain(candidates)
            .chain(known)
            .take(view_size)
            .collect();
    }

    /// Keep only the first `len` entries
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Entry at `index` in insertion order
    pub fn get_index(&self, index: usize) -> Option<(&PeerId, &Item)> {
        self.entries.get_index(index)
    }

    /// Remove and return the entry at `index`, preserving the order of the others
    pub fn shift_remove_index(&mut self, index: usize) -> Option<(PeerId, Item)> {
        self.entries.shift_remove_index(index)
    }

    /// Entries sorted by descending age, ties by peer id
    pub fn by_descending_age(&self) -> Vec<(PeerId, Item)> {
        let mut entries: Vec<(PeerId, Item)> = self
            .entries
            .iter()
            .map(|(peer, item)| (peer.clone(), item.clone()))
            .collect();

        entries.sort_by(|(a_peer, a), (b_peer, b)| b.age.cmp(&a.age).then(a_peer.cmp(b_peer)));

        entries
    }
}

fn sort_by_freshness(entries: &mut [(PeerId, Item)]) {
    entries.sort_by(|(a_peer, a), (b_peer, b)| a.age.cmp(&b.age).then(a_peer.cmp(b_peer)));
}

impl FromIterator<(PeerId, Item)> for View {
    fn from_iter<T: IntoIterator<Item = (PeerId, Item)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for View {
    type Item = (PeerId, Item);
    type IntoIter = indexmap::map::IntoIter<PeerId, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Extend<(PeerId, Item)> for View {
    fn extend<T: IntoIterator<Item = (PeerId, Item)>>(&mut self, iter: T) {
        self.entries.extend(iter);
    }
}
