use rstest::rstest;
use test_log::test;
use weave_config::{ConfigError, ProtocolConfig};
use weave_core::{PeerId, SimilarityRegistry};

use super::{options, peer, vicinity_config};
use crate::{Cyclon, ProtocolEngine, ProtocolRegistry};

#[rstest]
#[case("cyclon")]
#[case("rps")]
#[case("sampling-service")]
#[case("rps-hs")]
#[case("Cyclon")]
#[test_log::test]
fn sampling_classes_are_registered(#[case] class: &str) {
    let registry = ProtocolRegistry::default();
    let config = options("rps", class, 4, 2).validate().unwrap();

    let mut engine = registry
        .create(config, peer("a"), &SimilarityRegistry::default())
        .expect("registered class");

    assert_eq!(engine.id(), "rps");
    assert_eq!(engine.select_peer(), None);
}

#[rstest]
fn vicinity_is_registered(vicinity_config: ProtocolConfig) {
    let engine = ProtocolRegistry::default()
        .create(vicinity_config, peer("a"), &SimilarityRegistry::default())
        .expect("registered class");

    assert_eq!(engine.id(), "clustering");
    assert_eq!(engine.attribute("view"), Some(engine.view().clone()));
    assert_eq!(engine.attribute("unknown"), None);
}

#[test]
fn unknown_class_is_rejected() {
    let config = options("rps", "newscast", 4, 2).validate().unwrap();

    assert!(matches!(
        ProtocolRegistry::default().create(config, peer("a"), &SimilarityRegistry::default()),
        Err(ConfigError::UnknownClass { class, .. }) if class == "newscast"
    ));
}

#[rstest]
fn vicinity_requires_a_similarity_function(mut vicinity_config: ProtocolConfig) {
    vicinity_config.similarity_function = None;

    assert!(matches!(
        ProtocolRegistry::default().create(vicinity_config, peer("a"), &SimilarityRegistry::default()),
        Err(ConfigError::MissingSimilarity { .. })
    ));
}

#[rstest]
fn vicinity_requires_a_registered_similarity_function(mut vicinity_config: ProtocolConfig) {
    vicinity_config.similarity_function = Some("cosine".to_string());

    assert!(matches!(
        ProtocolRegistry::default().create(vicinity_config, peer("a"), &SimilarityRegistry::default()),
        Err(ConfigError::UnknownSimilarity { name, .. }) if name == "cosine"
    ));
}

#[test]
fn custom_classes_can_be_registered() {
    fn create(
        config: ProtocolConfig,
        local: PeerId,
        _: &SimilarityRegistry,
    ) -> Result<Box<dyn ProtocolEngine>, ConfigError> {
        Ok(Box::new(Cyclon::new(config, local)?))
    }

    let mut registry = ProtocolRegistry::empty();
    registry.register("my-sampling", create);

    assert!(registry.contains("my-sampling"));
    assert!(!registry.contains("cyclon"));

    let config = options("custom", "my-sampling", 4, 2).validate().unwrap();
    let engine = registry
        .create(config, peer("a"), &SimilarityRegistry::default())
        .expect("registered class");

    assert!(engine.trace_string().starts_with("my-sampling[custom]"));
}
