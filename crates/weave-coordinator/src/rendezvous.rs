use std::{future::Future, time::Duration};

use async_trait::async_trait;
use backoff::backoff::Backoff;
use futures::TryFutureExt;
use thiserror::Error;
use tracing::warn;
use weave_config::BootstrapConfig;
use weave_core::PeerId;

use crate::CoordinatorError;

/// Directory service used to join the overlay
#[async_trait]
pub trait Rendezvous: Send + Sync + 'static {
    /// Peer to join the overlay through, `None` when the local peer is the
    /// first one of the overlay
    async fn bootstrap_peer(&self, local: &PeerId) -> Result<Option<PeerId>, RendezvousError>;

    /// Peers used to initialize every protocol view
    async fn initial_view(&self, local: &PeerId) -> Result<Vec<PeerId>, RendezvousError>;
}

#[derive(Debug, Error)]
pub enum RendezvousError {
    #[error("Rendezvous is unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid rendezvous response: {0}")]
    InvalidResponse(String),
}

/// Outcome of a successful bootstrap
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bootstrap {
    pub(crate) peer: Option<PeerId>,
    pub(crate) view: Vec<PeerId>,
}

pub(crate) async fn bootstrap<R>(
    rendezvous: &R,
    local: &PeerId,
    config: &BootstrapConfig,
) -> Result<Bootstrap, CoordinatorError>
where
    R: Rendezvous + ?Sized,
{
    let peer = with_retry(config, || rendezvous.bootstrap_peer(local)).await?;

    let view = match peer {
        Some(_) => with_retry(config, || rendezvous.initial_view(local)).await?,
        None => Vec::new(),
    };

    Ok(Bootstrap { peer, view })
}

/// Constant delay between a bounded number of attempts
struct FixedRetry {
    delay: Duration,
    remaining: usize,
}

impl Backoff for FixedRetry {
    fn next_backoff(&mut self) -> Option<Duration> {
        self.remaining = self.remaining.checked_sub(1)?;

        Some(self.delay)
    }
}

async fn with_retry<T, F, Fut>(config: &BootstrapConfig, mut request: F) -> Result<T, CoordinatorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RendezvousError>>,
{
    let attempts = config.retries.max(1);
    let policy = FixedRetry {
        delay: config.backoff(),
        remaining: attempts - 1,
    };

    backoff::future::retry_notify(
        policy,
        || request().map_err(backoff::Error::transient),
        |error, delay: Duration| {
            warn!("Rendezvous request failed, retrying in {delay:?}: {error}")
        },
    )
    .await
    .map_err(|error| CoordinatorError::BootstrapExhausted {
        attempts,
        reason: error.to_string(),
    })
}
