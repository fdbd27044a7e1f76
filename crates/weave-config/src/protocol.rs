use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;
use weave_core::Payload;

use crate::ConfigError;

/// Which entries to send (`random`, `biased`, `agr-biased`) or which peer to
/// contact (`random`, `oldest`)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectionPolicy {
    Random,
    Oldest,
    Biased,
    AgrBiased,
}

impl SelectionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionPolicy::Random => "random",
            SelectionPolicy::Oldest => "oldest",
            SelectionPolicy::Biased => "biased",
            SelectionPolicy::AgrBiased => "agr-biased",
        }
    }
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(SelectionPolicy::Random),
            "oldest" => Ok(SelectionPolicy::Oldest),
            "biased" => Ok(SelectionPolicy::Biased),
            "agr-biased" | "agr_biased" => Ok(SelectionPolicy::AgrBiased),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationPolicy {
    pub push: bool,
    pub pull: bool,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            push: true,
            pull: true,
        }
    }
}

/// Declared need of a protocol to read an attribute of another one
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct DependencyOptions {
    pub algo_id: String,
    #[serde(default = "DependencyOptions::default_attribute")]
    pub attribute: String,
}

impl DependencyOptions {
    pub const VIEW_ATTRIBUTE: &'static str = "view";

    fn default_attribute() -> String {
        Self::VIEW_ATTRIBUTE.to_string()
    }
}

/// Protocol options as written in the configuration file
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct ProtocolOptions {
    /// Identifier of the protocol instance, used to tag its messages
    pub id: String,
    /// Name of the protocol implementation
    pub class: String,
    pub view_size: usize,
    pub fanout: usize,
    /// Period of the active cycle in milliseconds
    #[serde(default = "ProtocolOptions::default_period_time")]
    pub period_time: u64,
    #[serde(default)]
    pub propagation_policy: PropagationPolicy,
    #[serde(default = "ProtocolOptions::default_selection_policy")]
    pub selection_policy: String,
    /// Number of oldest entries evicted on merge (H)
    #[serde(default)]
    pub healer: usize,
    /// Number of arbitrary entries evicted on merge (S)
    #[serde(default)]
    pub swapper: usize,
    /// Application payload advertised with the local entry
    #[serde(default)]
    pub payload: Option<Payload>,
    /// Name of a registered similarity function
    #[serde(default)]
    pub similarity_function: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyOptions>,
}

impl ProtocolOptions {
    fn default_period_time() -> u64 {
        ProtocolConfig::MIN_PERIOD_MS
    }

    fn default_selection_policy() -> String {
        SelectionPolicy::Random.as_str().to_string()
    }

    /// Validate the options, producing the immutable configuration of a protocol instance
    pub fn validate(self) -> Result<ProtocolConfig, ConfigError> {
        if self.view_size < ProtocolConfig::MIN_VIEW_SIZE {
            return Err(ConfigError::InvalidViewSize {
                id: self.id,
                value: self.view_size,
                min: ProtocolConfig::MIN_VIEW_SIZE,
            });
        }

        if self.fanout < ProtocolConfig::MIN_FANOUT {
            return Err(ConfigError::InvalidFanout {
                id: self.id,
                value: self.fanout,
                min: ProtocolConfig::MIN_FANOUT,
            });
        }

        if self.period_time < ProtocolConfig::MIN_PERIOD_MS {
            return Err(ConfigError::InvalidPeriod {
                id: self.id,
                value: self.period_time,
                min: ProtocolConfig::MIN_PERIOD_MS,
            });
        }

        let selection_policy = match self.selection_policy.parse::<SelectionPolicy>() {
            Ok(policy) => policy,
            Err(policy) => {
                return Err(ConfigError::UnknownSelectionPolicy {
                    id: self.id,
                    policy,
                })
            }
        };

        if self.fanout >= self.view_size {
            warn!(
                "Protocol {}: fanout {} should be lower than the view size {}",
                self.id, self.fanout, self.view_size
            );
        }

        if let Some(dependency) = self
            .dependencies
            .iter()
            .find(|dependency| dependency.algo_id.is_empty() || dependency.attribute.is_empty())
        {
            return Err(ConfigError::InvalidDependency {
                id: self.id,
                source_id: dependency.algo_id.clone(),
                reason: "protocol id and attribute must not be empty".to_string(),
            });
        }

        let dependencies = self
            .dependencies
            .into_iter()
            .map(|dependency| Dependency {
                dependent: self.id.clone(),
                source: dependency.algo_id,
                attribute: dependency.attribute,
            })
            .collect();

        Ok(ProtocolConfig {
            id: self.id,
            class: self.class,
            view_size: self.view_size,
            fanout: self.fanout,
            period: Duration::from_millis(self.period_time),
            propagation: self.propagation_policy,
            selection_policy,
            healer: self.healer,
            swapper: self.swapper,
            payload: self.payload,
            similarity_function: self.similarity_function,
            dependencies,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub dependent: String,
    pub source: String,
    pub attribute: String,
}

impl Dependency {
    /// The dependency reads an attribute of the protocol declaring it
    pub fn is_local(&self) -> bool {
        self.dependent == self.source
    }
}

/// Validated, immutable configuration of a protocol instance
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub id: String,
    pub class: String,
    pub view_size: usize,
    pub fanout: usize,
    pub period: Duration,
    pub propagation: PropagationPolicy,
    pub selection_policy: SelectionPolicy,
    pub healer: usize,
    pub swapper: usize,
    pub payload: Option<Payload>,
    pub similarity_function: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl ProtocolConfig {
    pub const MIN_VIEW_SIZE: usize = 2;
    pub const MIN_FANOUT: usize = 2;
    pub const MIN_PERIOD_MS: u64 = 2000;
}
