//! Shared building blocks of the weave overlay.
//!
//! Every protocol instance maintains a [`View`]: a bounded table of remote
//! [`PeerId`]s, each carrying an [`Item`] with a logical age and an opaque
//! application payload. This crate holds the view operations used by every
//! protocol variant, the similarity ranking used by clustering protocols and
//! the messages exchanged on the wire.

pub mod messages;
pub mod similarity;
mod types;
pub mod view;


pub use messages::{Direction, GossipMessage, NetworkMessage};
pub use similarity::{rank, Euclidean, Jaccard, NegativeDistance, Similarity, SimilarityRegistry};
pub use types::{Item, Payload, PeerId};
pub use view::View;
