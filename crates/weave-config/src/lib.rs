mod error;
pub mod node;
pub mod protocol;


use std::path::Path;

use figment::providers::Serialized;
use figment::Figment;
use serde::Serialize;

pub use error::ConfigError;
pub use node::{BootstrapConfig, ConnectionsConfig, NodeConfig};
pub use protocol::{
    Dependency, DependencyOptions, PropagationPolicy, ProtocolConfig, ProtocolOptions,
    SelectionPolicy,
};

pub trait Config: Serialize {
    /// The configuration type returned (should be Self).
    type Output;

    /// Load the configuration from the files found in `home`.
    fn load_from_file(figment: Figment, home: &Path) -> Figment;

    /// Extract the configuration from the figment context.
    fn load_context(figment: Figment) -> Result<Self::Output, figment::Error>;

    /// Profile (top level table) of the configuration.
    fn profile() -> String;

    /// Convert the configuration to a TOML table.
    fn to_toml(&self) -> Result<toml::Table, toml::ser::Error> {
        toml::Table::try_from(self)
    }

    /// Load the configuration from the file and the overrides (if any), then
    /// extract it from the resulting context.
    fn load<S: Serialize>(home: &Path, overrides: Option<S>) -> Result<Self::Output, figment::Error> {
        let mut figment = Figment::new();

        figment = Self::load_from_file(figment, home);

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::from(overrides, Self::profile()))
        }

        Self::load_context(figment)
    }
}
