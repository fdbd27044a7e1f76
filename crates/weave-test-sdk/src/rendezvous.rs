use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use weave_coordinator::{Rendezvous, RendezvousError};
use weave_core::PeerId;

/// Rendezvous registering every peer asking for a bootstrap peer.
///
/// The first registered peer other than the caller is used as bootstrap
/// peer, the initial view holds every other registered peer.
#[derive(Clone, Default)]
pub struct MemoryRendezvous {
    peers: Arc<Mutex<Vec<PeerId>>>,
    /// Number of upcoming requests to fail
    failures: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl MemoryRendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendezvous failing its next `failures` requests
    pub fn failing(failures: usize) -> Self {
        let rendezvous = Self::default();
        rendezvous.failures.store(failures, Ordering::SeqCst);

        rendezvous
    }

    pub fn unreachable() -> Self {
        Self::failing(usize::MAX)
    }

    pub fn register(&self, peer: PeerId) {
        let mut peers = self.peers.lock().unwrap();
        if !peers.contains(&peer) {
            peers.push(peer);
        }
    }

    /// Number of requests received, failed ones included
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), RendezvousError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |failures| {
                failures.checked_sub(1)
            })
            .is_ok();

        if failed {
            Err(RendezvousError::Unreachable("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Rendezvous for MemoryRendezvous {
    async fn bootstrap_peer(&self, local: &PeerId) -> Result<Option<PeerId>, RendezvousError> {
        self.check()?;

        let peer = self
            .peers
            .lock()
            .unwrap()
            .iter()
            .find(|peer| *peer != local)
            .cloned();
        self.register(local.clone());

        Ok(peer)
    }

    async fn initial_view(&self, local: &PeerId) -> Result<Vec<PeerId>, RendezvousError> {
        self.check()?;

        Ok(self
            .peers
            .lock()
            .unwrap()
            .iter()
            .filter(|peer| *peer != local)
            .cloned()
            .collect())
    }
}
