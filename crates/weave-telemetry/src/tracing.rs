use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Environment variable selecting the [`LogFormat`]
pub const LOG_FORMAT_ENV: &str = "WEAVE_LOG_FORMAT";

const DEFAULT_DIRECTIVES: &str = "warn,weave=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown log format {other}")),
        }
    }
}

impl LogFormat {
    /// Format set in the environment, compact when unset or unknown
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|format| format.parse().ok())
            .unwrap_or_default()
    }
}

pub fn verbose_to_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        4..=u8::MAX => Level::TRACE,
    }
}

/// Filter of the weave targets.
///
/// Without verbosity, `RUST_LOG` is used if set and valid.
pub fn create_filter(verbose: u8) -> EnvFilter {
    if verbose > 0 {
        EnvFilter::new(format!("warn,weave={}", verbose_to_level(verbose).as_str()))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
    }
}

/// Install the global subscriber, fails if one is already installed
pub fn setup_tracing(verbose: u8, no_color: bool) -> Result<(), Box<dyn std::error::Error>> {
    let ansi = !no_color;

    let layer = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(ansi)
            .with_filter(create_filter(verbose))
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_filter(create_filter(verbose))
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(ansi)
            .with_filter(create_filter(verbose))
            .boxed(),
    };

    tracing_subscriber::registry().with(layer).try_init()?;

    Ok(())
}
