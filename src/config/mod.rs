//! Configuration loading and validation
//!
//! The engine consumes a resolved [`Config`] value object; this module also
//! ships the TOML adapter that produces one from a file, plus validation and
//! a content hash for change detection.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{Config, CrawlerConfig, RobotsConfig, UserAgentConfig};
pub use validation::validate;
