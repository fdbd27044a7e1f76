//! Channels with remote peers.
//!
//! The [`Transport`] and [`Channel`] traits abstract the underlying network,
//! the [`ConnectionManager`] keeps a bounded pool of open channels.

mod error;
mod manager;
mod transport;

pub use error::TransportError;
pub use manager::{Connection, ConnectionManager, NewConnection};
pub use transport::{Channel, Transport, TransportEvent};
