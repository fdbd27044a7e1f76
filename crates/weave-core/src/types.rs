use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Opaque application data attached to a view entry.
pub type Payload = serde_json::Value;

/// Identifier of a peer, stable for the lifetime of its process.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    pub fn random() -> Self {
        Self(format!("{:016x}", rand::random::<u64>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One entry of a view.
///
/// `age` is a logical counter increased once per active cycle of the owning
/// protocol. `score` is only set by the similarity ranker and never leaves the
/// local peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub age: u64,
    #[serde(rename = "data", default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(skip)]
    pub score: Option<f64>,
}

impl Item {
    pub fn new(age: u64, payload: Option<Payload>) -> Self {
        Self {
            age,
            payload,
            score: None,
        }
    }

    /// Fresh entry describing the local peer
    pub fn fresh(payload: Option<Payload>) -> Self {
        Self::new(0, payload)
    }

    /// Returns true if `self` should replace `other` when both describe the same peer
    pub fn is_fresher_than(&self, other: &Item) -> bool {
        self.age < other.age
    }
}
