use std::collections::HashMap;

use weave_config::{ConfigError, ProtocolConfig};
use weave_core::{PeerId, SimilarityRegistry};

use crate::{Cyclon, ProtocolEngine, SamplingService, Vicinity};

pub type ProtocolConstructor =
    fn(ProtocolConfig, PeerId, &SimilarityRegistry) -> Result<Box<dyn ProtocolEngine>, ConfigError>;

/// Protocol implementations available by class name
pub struct ProtocolRegistry {
    constructors: HashMap<String, ProtocolConstructor>,
}

impl ProtocolRegistry {
    pub const CYCLON: &'static str = "cyclon";
    pub const SAMPLING_SERVICE: &'static str = "sampling-service";
    pub const VICINITY: &'static str = "vicinity";

    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register `constructor` under `class`, replacing any previous one
    pub fn register(&mut self, class: &str, constructor: ProtocolConstructor) -> &mut Self {
        self.constructors.insert(class.to_lowercase(), constructor);
        self
    }

    pub fn contains(&self, class: &str) -> bool {
        self.constructors.contains_key(&class.to_lowercase())
    }

    /// Instantiate the protocol described by `config`
    pub fn create(
        &self,
        config: ProtocolConfig,
        local: PeerId,
        similarities: &SimilarityRegistry,
    ) -> Result<Box<dyn ProtocolEngine>, ConfigError> {
        match self.constructors.get(&config.class.to_lowercase()) {
            Some(constructor) => constructor(config, local, similarities),
            None => Err(ConfigError::UnknownClass {
                id: config.id,
                class: config.class,
            }),
        }
    }
}

impl Default for ProtocolRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(Self::CYCLON, Cyclon::create)
            .register("rps", Cyclon::create)
            .register(Self::SAMPLING_SERVICE, SamplingService::create)
            .register("rps-hs", SamplingService::create)
            .register(Self::VICINITY, Vicinity::create);

        registry
    }
}
