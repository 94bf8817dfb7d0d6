//! Configuration parsing for hidbridge
//!
//! This crate handles parsing the KDL configuration file that selects the
//! HID gadget endpoints, the input watch directory and the key remap tables.

mod error;
mod model;
mod parser;

pub use error::ConfigError;
pub use model::*;
pub use parser::{canonical_key, load_config, parse_config, parse_config_str};
