//! Bridge configuration
//!
//! Board-agnostic configuration structures plus a parser for the small
//! TOML subset the firmware embeds as `bridge.toml`.

pub mod parse;
pub mod types;

pub use parse::{parse_config, ConfigError};
pub use types::*;
