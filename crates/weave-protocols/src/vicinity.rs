use std::sync::Arc;

use tracing::warn;
use weave_config::{ConfigError, ProtocolConfig, SelectionPolicy};
use weave_core::{rank, Direction, Item, PeerId, Similarity, SimilarityRegistry, View};

use crate::{initialize_view, DependencyViews, ProtocolEngine};

/// Vicinity clustering overlay.
///
/// Keeps the `view_size` peers whose payload is the most similar to the local
/// one. Candidates come from the exchanges and from the views of the declared
/// dependencies, usually a random peer sampling protocol.
pub struct Vicinity {
    config: ProtocolConfig,
    local: PeerId,
    view: View,
    similarity: Arc<dyn Similarity>,
}

impl Vicinity {
    pub fn new(
        config: ProtocolConfig,
        local: PeerId,
        similarity: Arc<dyn Similarity>,
    ) -> Result<Self, ConfigError> {
        if config.selection_policy == SelectionPolicy::Oldest {
            return Err(ConfigError::UnsupportedSelectionPolicy {
                id: config.id,
                class: config.class,
                policy: config.selection_policy.to_string(),
            });
        }

        if config.selection_policy == SelectionPolicy::AgrBiased && config.dependencies.is_empty()
        {
            warn!(
                "Protocol {}: agr-biased selection without dependency, only the local view is ranked",
                config.id
            );
        }

        Ok(Self {
            config,
            local,
            view: View::new(),
            similarity,
        })
    }

    pub(crate) fn create(
        config: ProtocolConfig,
        local: PeerId,
        similarities: &SimilarityRegistry,
    ) -> Result<Box<dyn ProtocolEngine>, ConfigError> {
        let Some(name) = config.similarity_function.as_deref() else {
            return Err(ConfigError::MissingSimilarity { id: config.id });
        };

        let similarity = similarities
            .get(name)
            .ok_or_else(|| ConfigError::UnknownSimilarity {
                id: config.id.clone(),
                name: name.to_string(),
            })?;

        Ok(Box::new(Self::new(config, local, similarity)?))
    }

    /// Union of every dependency view
    fn dependency_view(dependencies: &DependencyViews) -> View {
        dependencies
            .values()
            .fold(View::new(), |merged, view| merged.merge(view))
    }

    fn rank(&self, n: usize, candidates: &View) -> View {
        rank(
            n,
            candidates,
            self.config.payload.as_ref(),
            self.similarity.as_ref(),
        )
    }
}

impl ProtocolEngine for Vicinity {
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
        dependencies: &DependencyViews,
    ) -> View {
        let mut candidates = match self.config.selection_policy {
            SelectionPolicy::AgrBiased => {
                let mut merged = self.view.merge(&Self::dependency_view(dependencies));
                merged.remove(&self.local);
                merged
            }
            _ => self.view.clone(),
        };

        let count = match direction {
            Direction::Active => {
                if let Some(destination) = destination {
                    candidates.remove(destination);
                }
                self.config.fanout.saturating_sub(1)
            }
            Direction::Passive => self.config.fanout,
        };

        let mut items = match self.config.selection_policy {
            SelectionPolicy::Biased | SelectionPolicy::AgrBiased => self.rank(count, &candidates),
            SelectionPolicy::Random | SelectionPolicy::Oldest => candidates.random_subset(count),
        };

        if direction == Direction::Active {
            items.insert(self.local.clone(), Item::fresh(self.config.payload.clone()));
        }

        items
    }

    fn select_items_to_keep(&mut self, received: View, dependencies: &DependencyViews) {
        let mut merged = self
            .view
            .merge(&received)
            .merge(&Self::dependency_view(dependencies));
        merged.remove(&self.local);

        self.view = self.rank(self.config.view_size, &merged);
    }

    fn increase_age(&mut self) {
        self.view.increase_age();
    }

    fn remove_peer(&mut self, peer: &PeerId) -> bool {
        self.view.remove(peer).is_some()
    }
}
