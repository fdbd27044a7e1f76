//! Log output of a weave node.

mod tracing;

pub use crate::tracing::{create_filter, setup_tracing, verbose_to_level, LogFormat, LOG_FORMAT_ENV};
