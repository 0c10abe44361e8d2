//! Utility modules shared across the crate.
//!
//! - [`toml_config`] - `statechat.toml` parsing, defaults and validation

pub mod toml_config;
