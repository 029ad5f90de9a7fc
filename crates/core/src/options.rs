//! Engine options read once per run from key/value configuration.
//!
//! Unrecognized keys are ignored for forward compatibility; recognized
//! keys with malformed values are configuration errors.

use crate::error::EngineError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Recognized run-level options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineOptions {
    /// Maximum navigation-chain depth retained by discovery.
    pub max_chain_depth: u32,
    /// Ask consumers to emit their debug artifacts.
    pub debug_output: bool,
    /// Ask the emission layer to generate builder shapes.
    pub emit_builders: bool,
}

impl EngineOptions {
    pub const DEFAULT_MAX_CHAIN_DEPTH: u32 = 3;

    /// Parse options from a key/value map.
    pub fn from_options(options: &BTreeMap<String, String>) -> Result<EngineOptions, EngineError> {
        let mut parsed = EngineOptions::default();
        for (key, value) in options {
            match key.as_str() {
                "max_chain_depth" => {
                    parsed.max_chain_depth = match value.parse::<u32>() {
                        Ok(depth) if depth > 0 => depth,
                        _ => {
                            return Err(EngineError::InvalidOption {
                                key: key.clone(),
                                message: format!(
                                    "expected a positive integer, got '{}'",
                                    value
                                ),
                            })
                        }
                    };
                }
                "debug_output" => parsed.debug_output = parse_bool(key, value)?,
                "emit_builders" => parsed.emit_builders = parse_bool(key, value)?,
                _ => {} // Unknown keys are ignored.
            }
        }
        Ok(parsed)
    }
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions {
            max_chain_depth: EngineOptions::DEFAULT_MAX_CHAIN_DEPTH,
            debug_output: false,
            emit_builders: false,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, EngineError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(EngineError::InvalidOption {
            key: key.to_string(),
            message: format!("expected 'true' or 'false', got '{}'", value),
        }),
    }
}
