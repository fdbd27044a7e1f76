use thiserror::Error;

/// Malformed protocol or node options.
///
/// Detected when a protocol instance is created, fatal to that instance only.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Protocol {id}: view size {value} is lower than {min}")]
    InvalidViewSize { id: String, value: usize, min: usize },

    #[error("Protocol {id}: fanout {value} is lower than {min}")]
    InvalidFanout { id: String, value: usize, min: usize },

    #[error("Protocol {id}: period time {value}ms is lower than {min}ms")]
    InvalidPeriod { id: String, value: u64, min: u64 },

    #[error("Protocol {id}: unknown selection policy {policy}")]
    UnknownSelectionPolicy { id: String, policy: String },

    #[error("Protocol {id}: selection policy {policy} is not supported by {class}")]
    UnsupportedSelectionPolicy {
        id: String,
        class: String,
        policy: String,
    },

    #[error("Protocol {id}: unknown protocol class {class}")]
    UnknownClass { id: String, class: String },

    #[error("Protocol {id}: unknown similarity function {name}")]
    UnknownSimilarity { id: String, name: String },

    #[error("Protocol {id}: a similarity function is required")]
    MissingSimilarity { id: String },

    #[error("Protocol {id}: invalid dependency on {source_id}: {reason}")]
    InvalidDependency {
        id: String,
        source_id: String,
        reason: String,
    },

    #[error("Protocol {0} is declared more than once")]
    DuplicateProtocol(String),

    #[error("Unable to load the configuration: {0}")]
    Figment(#[from] figment::Error),
}
