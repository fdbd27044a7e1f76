use std::collections::HashSet;

use indexmap::IndexSet;
use rand::{seq::SliceRandom, thread_rng, Rng};
use weave_config::{ConfigError, ProtocolConfig, SelectionPolicy};
use weave_core::{Direction, Item, PeerId, SimilarityRegistry, View};

use crate::{format_entries, initialize_view, DependencyViews, ProtocolEngine};

/// Peer sampling service with healer and swapper eviction.
///
/// The view is ordered: before every send it is shuffled and its `healer`
/// oldest entries are moved to the tail, so the head holds the entries to
/// advertise. On merge, the `healer` oldest entries are dropped first, then
/// `swapper` entries from the head, then random entries until the view fits.
///
/// Peer selection walks through the view without repetition until every peer
/// has been contacted once.
pub struct SamplingService {
    config: ProtocolConfig,
    local: PeerId,
    view: View,
    pending: IndexSet<PeerId>,
    already_chosen: HashSet<PeerId>,
}

impl SamplingService {
    pub fn new(config: ProtocolConfig, local: PeerId) -> Result<Self, ConfigError> {
        if !matches!(
            config.selection_policy,
            SelectionPolicy::Random | SelectionPolicy::Oldest
        ) {
            return Err(ConfigError::UnsupportedSelectionPolicy {
                id: config.id,
                class: config.class,
                policy: config.selection_policy.to_string(),
            });
        }

        Ok(Self {
            config,
            local,
            view: View::new(),
            pending: IndexSet::new(),
            already_chosen: HashSet::new(),
        })
    }

    pub(crate) fn create(
        config: ProtocolConfig,
        local: PeerId,
        _: &SimilarityRegistry,
    ) -> Result<Box<dyn ProtocolEngine>, ConfigError> {
        Ok(Box::new(Self::new(config, local)?))
    }

    /// Number of peers not contacted yet in the current round
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Replace the view with a shuffled copy of it
    fn permute_view(&mut self) {
        let mut entries: Vec<(PeerId, Item)> = std::mem::take(&mut self.view).into_iter().collect();
        entries.shuffle(&mut thread_rng());

        self.view = entries.into_iter().collect();
    }

    /// Move the `healer` oldest entries to the tail, youngest first
    fn move_oldest(&mut self) {
        let count = self.config.healer.min(self.view.len());
        if count == 0 {
            return;
        }

        let mut oldest: Vec<(PeerId, Item)> = self
            .view
            .by_descending_age()
            .into_iter()
            .take(count)
            .collect();
        oldest.reverse();

        for (peer, _) in &oldest {
            self.view.remove(peer);
        }
        self.view.extend(oldest);
    }

    fn excess(&self) -> usize {
        self.view.len().saturating_sub(self.config.view_size)
    }

    fn resync_pending(&mut self) {
        let view = &self.view;
        self.pending.retain(|peer| view.contains(peer));
        self.already_chosen.retain(|peer| view.contains(peer));

        for peer in view.keys() {
            if !self.already_chosen.contains(peer) {
                self.pending.insert(peer.clone());
            }
        }
    }
}

impl ProtocolEngine for SamplingService {
    fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    fn view(&self) -> &View {
        &self.view
    }

    fn initialize(&mut self, peers: &[PeerId]) {
        initialize_view(&mut self.view, peers, self.config.view_size, &self.local);
        self.resync_pending();
    }

    fn select_peer(&mut self) -> Option<PeerId> {
        if self.pending.is_empty() {
            // Every peer was contacted, start a new round
            self.already_chosen.clear();
            self.resync_pending();

            let peer = self.view.random_key()?;
            self.pending.shift_remove(&peer);
            self.already_chosen.insert(peer.clone());

            return Some(peer);
        }

        let selected = match self.config.selection_policy {
            SelectionPolicy::Oldest => self.view.oldest_key_among(self.pending.iter()),
            _ => None,
        };

        let peer = match selected {
            Some(peer) => {
                self.pending.shift_remove(&peer);
                peer
            }
            None => {
                let index = thread_rng().gen_range(0..self.pending.len());
                self.pending.shift_remove_index(index)?
            }
        };

        self.already_chosen.insert(peer.clone());

        Some(peer)
    }

    fn select_items_to_send(
        &mut self,
        _: Direction,
        _: Option<&PeerId>,
        _: &DependencyViews,
    ) -> View {
        self.permute_view();
        self.move_oldest();

        let count = (self.config.view_size / 2).saturating_sub(1);

        let mut items = View::new();
        items.insert(self.local.clone(), Item::fresh(self.config.payload.clone()));
        items.extend(
            self.view
                .iter()
                .take(count)
                .map(|(peer, item)| (peer.clone(), item.clone())),
        );

        items
    }

    fn select_items_to_keep(&mut self, mut received: View, _: &DependencyViews) {
        received.remove(&self.local);

        for (peer, item) in received {
            match self.view.get_mut(&peer) {
                Some(current) => {
                    if item.age <= current.age {
                        *current = item;
                    }
                }
                None => {
                    self.view.insert(peer, item);
                }
            }
        }

        let healed = self.config.healer.min(self.excess());
        for (peer, _) in self.view.by_descending_age().into_iter().take(healed) {
            self.view.remove(&peer);
        }

        let swapped = self.config.swapper.min(self.excess());
        for _ in 0..swapped {
            self.view.shift_remove_index(0);
        }

        let mut rng = thread_rng();
        while self.excess() > 0 {
            let index = rng.gen_range(0..self.view.len());
            self.view.shift_remove_index(index);
        }

        self.resync_pending();
    }

    fn increase_age(&mut self) {
        self.view.increase_age();
    }

    fn remove_peer(&mut self, peer: &PeerId) -> bool {
        self.pending.shift_remove(peer);
        self.already_chosen.remove(peer);

        self.view.remove(peer).is_some()
    }

    fn trace_string(&self) -> String {
        format!(
            "{}[{}] pending={} {}",
            self.config.class,
            self.config.id,
            self.pending.len(),
            format_entries(&self.view)
        )
    }
}
