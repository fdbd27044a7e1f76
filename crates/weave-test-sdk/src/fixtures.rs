use rstest::fixture;
use serde_json::json;
use weave_config::{
    BootstrapConfig, ConnectionsConfig, DependencyOptions, NodeConfig, PropagationPolicy,
    ProtocolOptions,
};
use weave_core::PeerId;

/// Shortest period accepted by the configuration
pub const PERIOD_MS: u64 = 2000;

pub fn protocol_options(id: &str, class: &str, view_size: usize, fanout: usize) -> ProtocolOptions {
    ProtocolOptions {
        id: id.to_string(),
        class: class.to_string(),
        view_size,
        fanout,
        period_time: PERIOD_MS,
        propagation_policy: PropagationPolicy::default(),
        selection_policy: "random".to_string(),
        healer: 0,
        swapper: 0,
        payload: None,
        similarity_function: None,
        dependencies: Vec::new(),
    }
}

#[fixture]
pub fn cyclon_options() -> ProtocolOptions {
    protocol_options("rps", "cyclon", 4, 2)
}

/// Vicinity instance fed by the `rps` protocol
#[fixture]
pub fn vicinity_options(#[default(5)] payload: i64) -> ProtocolOptions {
    ProtocolOptions {
        selection_policy: "agr-biased".to_string(),
        similarity_function: Some("negative-distance".to_string()),
        payload: Some(json!(payload)),
        dependencies: vec![DependencyOptions {
            algo_id: "rps".to_string(),
            attribute: "view".to_string(),
        }],
        ..protocol_options("clustering", "vicinity", 3, 2)
    }
}

#[fixture]
pub fn node_config(cyclon_options: ProtocolOptions) -> NodeConfig {
    NodeConfig {
        peer_id: None,
        bootstrap: BootstrapConfig {
            retries: 3,
            backoff_ms: 100,
        },
        connections: ConnectionsConfig::default(),
        command_buffer_size: NodeConfig::COMMAND_BUFFER_SIZE,
        protocols: vec![cyclon_options],
    }
}

pub fn peers(ids: &[&str]) -> Vec<PeerId> {
    ids.iter().map(|id| PeerId::from(*id)).collect()
}
