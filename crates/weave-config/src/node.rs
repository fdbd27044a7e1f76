use std::{path::Path, time::Duration};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{Config, ProtocolOptions};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct NodeConfig {
    /// Identifier of the local peer, a random one is generated if not set
    pub peer_id: Option<String>,

    /// Rendezvous retry policy
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Connection pool configuration
    #[serde(default)]
    pub connections: ConnectionsConfig,

    /// Capacity of the command channels of every actor
    #[serde(default = "default_command_buffer_size")]
    pub command_buffer_size: usize,

    /// Protocol instances to schedule
    #[serde(default)]
    pub protocols: Vec<ProtocolOptions>,
}

const fn default_command_buffer_size() -> usize {
    NodeConfig::COMMAND_BUFFER_SIZE
}

impl NodeConfig {
    pub const COMMAND_BUFFER_SIZE: usize = 1024;

    /// Maximum number of simultaneous connections.
    ///
    /// Defaults to the sum of the view sizes of every configured protocol.
    pub fn max_connections(&self) -> usize {
        self.connections
            .max_connections
            .unwrap_or_else(|| self.protocols.iter().map(|p| p.view_size).sum())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            peer_id: None,
            bootstrap: BootstrapConfig::default(),
            connections: ConnectionsConfig::default(),
            command_buffer_size: Self::COMMAND_BUFFER_SIZE,
            protocols: Vec::new(),
        }
    }
}

impl Config for NodeConfig {
    type Output = NodeConfig;

    fn load_from_file(figment: Figment, home: &Path) -> Figment {
        let home = home.join("config.toml");

        let node = Figment::new()
            .merge(Toml::file(home).nested())
            .merge(
                Env::prefixed("WEAVE_NODE_")
                    .map(|key| key.as_str().replace("__", ".").replace('_', "-").into())
                    .profile(Self::profile()),
            )
            .select(Self::profile());

        figment.merge(node)
    }

    fn load_context(figment: Figment) -> Result<Self::Output, figment::Error> {
        figment.extract()
    }

    fn profile() -> String {
        "node".to_string()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct BootstrapConfig {
    /// Number of attempts for each rendezvous request
    #[serde(default = "BootstrapConfig::default_retries")]
    pub retries: usize,

    /// Delay between two attempts in milliseconds
    #[serde(default = "BootstrapConfig::default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            retries: Self::RETRIES,
            backoff_ms: Self::BACKOFF_MS,
        }
    }
}

impl BootstrapConfig {
    pub const RETRIES: usize = 3;
    pub const BACKOFF_MS: u64 = 3000;

    const fn default_retries() -> usize {
        Self::RETRIES
    }

    const fn default_backoff_ms() -> u64 {
        Self::BACKOFF_MS
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionsConfig {
    /// Overrides the default maximum number of connections
    pub max_connections: Option<usize>,
}
