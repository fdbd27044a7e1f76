//! Wire format of the messages exchanged between peers.
//!
//! Every message is a JSON object tagged by its `service`:
//!
//! ```json
//! {"service": "GOSSIP", "algoId": "rps", "emitter": "a", "direction": "active",
//!  "loop": 3, "payload": {"b": {"age": 0, "data": 5}}}
//! ```

use serde::{Deserialize, Serialize};

use crate::{Payload, PeerId, View};

/// Side of the exchange a gossip message belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent by the initiator of a cycle
    Active,
    /// Sent in response to an active message
    Passive,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GossipMessage {
    pub algo_id: String,
    pub emitter: PeerId,
    pub direction: Direction,
    #[serde(rename = "loop", default)]
    pub loop_count: u64,
    #[serde(default)]
    pub payload: View,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "service", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkMessage {
    Gossip(GossipMessage),
    Leave { emitter: PeerId },
    Application { emitter: PeerId, payload: Payload },
}

impl NetworkMessage {
    pub fn emitter(&self) -> &PeerId {
        match self {
            NetworkMessage::Gossip(GossipMessage { emitter, .. })
            | NetworkMessage::Leave { emitter }
            | NetworkMessage::Application { emitter, .. } => emitter,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl TryFrom<&[u8]> for NetworkMessage {
    type Error = serde_json::Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        serde_json::from_slice(data)
    }
}

impl From<GossipMessage> for NetworkMessage {
    fn from(message: GossipMessage) -> Self {
        Self::Gossip(message)
    }
}
