//! Gossip protocol engines maintaining a peer [`View`].
//!
//! Three variants share the [`ProtocolEngine`] contract:
//!
//! - [`Cyclon`]: random peer sampling, exchanges random subsets and favors
//!   incoming entries on merge.
//! - [`SamplingService`]: random peer sampling with healer (H) and swapper (S)
//!   eviction, working on an ordered view.
//! - [`Vicinity`]: clustering overlay keeping the peers most similar to the
//!   local payload, fed by the view of a sampling protocol.
//!
//! Engines are plain state machines: scheduling, transport and dependency
//! resolution are handled by their mediator.

use std::collections::HashMap;

use weave_config::{DependencyOptions, ProtocolConfig};
use weave_core::{Direction, PeerId, View};

mod cyclon;
mod registry;
mod sampling;
mod vicinity;

#[cfg(test)]
mod tests;

pub use cyclon::Cyclon;
pub use registry::{ProtocolConstructor, ProtocolRegistry};
pub use sampling::SamplingService;
pub use vicinity::Vicinity;

/// Attributes read from the dependencies of a protocol, keyed by source protocol id
pub type DependencyViews = HashMap<String, View>;

pub trait ProtocolEngine: Send + 'static {
    fn config(&self) -> &ProtocolConfig;

    fn local_peer(&self) -> &PeerId;

    fn view(&self) -> &View;

    /// Populate the view from the bootstrap peer list
    fn initialize(&mut self, peers: &[PeerId]);

    /// Peer to contact during the next active cycle, `None` on an empty view
    fn select_peer(&mut self) -> Option<PeerId>;

    /// Entries sent to `destination`, either when initiating an exchange
    /// ([`Direction::Active`]) or when answering one ([`Direction::Passive`])
    fn select_items_to_send(
        &mut self,
        direction: Direction,
        destination: Option<&PeerId>,
        dependencies: &DependencyViews,
    ) -> View;

    /// Merge the entries received from a peer into the view
    fn select_items_to_keep(&mut self, received: View, dependencies: &DependencyViews);

    /// Age every entry of the view by one cycle
    fn increase_age(&mut self);

    /// Forget `peer`, returns true if it was part of the view
    fn remove_peer(&mut self, peer: &PeerId) -> bool;

    fn id(&self) -> &str {
        &self.config().id
    }

    /// Read a named attribute for a dependent protocol
    fn attribute(&self, name: &str) -> Option<View> {
        (name == DependencyOptions::VIEW_ATTRIBUTE).then(|| self.view().clone())
    }

    fn trace_string(&self) -> String {
        format!(
            "{}[{}] {}",
            self.config().class,
            self.id(),
            format_entries(self.view())
        )
    }
}

pub(crate) fn format_entries(view: &View) -> String {
    view.iter()
        .map(|(peer, item)| match item.score {
            Some(score) => format!("{peer}:{}({score})", item.age),
            None => format!("{peer}:{}", item.age),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fill an empty view with up to `view_size` bootstrap peers of age 0
pub(crate) fn initialize_view(view: &mut View, peers: &[PeerId], view_size: usize, local: &PeerId) {
    for peer in peers {
        if view.len() >= view_size {
            break;
        }

        if peer != local && !view.contains(peer) {
            view.insert(peer.clone(), weave_core::Item::new(0, None));
        }
    }
}
