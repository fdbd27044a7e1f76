use weave_config::{ConfigError, ProtocolConfig, SelectionPolicy};
use weave_core::{Direction, Item, PeerId, SimilarityRegistry, View};

use crate::{initialize_view, DependencyViews, ProtocolEngine};

/// Cyclon random peer sampling.
///
/// The oldest peer is contacted at every cycle and receives `fanout - 1`
/// random entries plus a fresh entry for the local peer.
pub struct Cyclon {
    config: ProtocolConfig,
    local: PeerId,
    view: View,
}

impl Cyclon {
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
        })
    }

    pub(crate) fn create(
        config: ProtocolConfig,
        local: PeerId,
        _: &SimilarityRegistry,
    ) -> Result<Box<dyn ProtocolEngine>, ConfigError> {
        Ok(Box::new(Self::new(config, local)?))
    }
}

impl ProtocolEngine for Cyclon {
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
    }

    fn select_peer(&mut self) -> Option<PeerId> {
        self.view.oldest_key()
    }

    fn select_items_to_send(
        &mut self,
        direction: Direction,
        destination: Option<&PeerId>,
        _: &DependencyViews,
    ) -> View {
        match direction {
            Direction::Active => {
                let mut candidates = self.view.clone();
                if let Some(destination) = destination {
                    candidates.remove(destination);
                }

                let mut items = candidates.random_subset(self.config.fanout.saturating_sub(1));
                items.insert(self.local.clone(), Item::fresh(self.config.payload.clone()));

                items
            }
            Direction::Passive => self.view.random_subset(self.config.fanout),
        }
    }

    fn select_items_to_keep(&mut self, received: View, _: &DependencyViews) {
        self.view
            .merge_and_trim(received, self.config.view_size, &self.local);
    }

    fn increase_age(&mut self) {
        self.view.increase_age();
    }

    fn remove_peer(&mut self, peer: &PeerId) -> bool {
        self.view.remove(peer).is_some()
    }
}
