use rstest::fixture;
use serde_json::json;
use weave_config::{DependencyOptions, PropagationPolicy, ProtocolConfig, ProtocolOptions};
use weave_core::{Item, PeerId, View};

mod registry;
mod sampling;

pub(crate) fn options(id: &str, class: &str, view_size: usize, fanout: usize) -> ProtocolOptions {
    ProtocolOptions {
        id: id.to_string(),
        class: class.to_string(),
        view_size,
        fanout,
        period_time: ProtocolConfig::MIN_PERIOD_MS,
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
pub(crate) fn cyclon_config() -> ProtocolConfig {
    options("rps", "cyclon", 3, 2).validate().unwrap()
}

#[fixture]
pub(crate) fn vicinity_config() -> ProtocolConfig {
    let mut options = options("clustering", "vicinity", 4, 3);
    options.selection_policy = "biased".to_string();
    options.similarity_function = Some("negative-distance".to_string());
    options.payload = Some(json!(5));
    options.dependencies = vec![DependencyOptions {
        algo_id: "rps".to_string(),
        attribute: "view".to_string(),
    }];

    options.validate().unwrap()
}

pub(crate) fn peer(id: &str) -> PeerId {
    PeerId::from(id)
}

pub(crate) fn peers(ids: &[&str]) -> Vec<PeerId> {
    ids.iter().map(|id| peer(id)).collect()
}

pub(crate) fn view_of(entries: &[(&str, u64)]) -> View {
    entries
        .iter()
        .map(|(id, age)| (peer(id), Item::new(*age, None)))
        .collect()
}

pub(crate) fn view_with_payloads(entries: &[(&str, u64, i64)]) -> View {
    entries
        .iter()
        .map(|(id, age, payload)| (peer(id), Item::new(*age, Some(json!(payload)))))
        .collect()
}
