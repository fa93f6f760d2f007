//! Compiler Configuration
//!
//! Replaces process-wide toggles with a value copied into each compilation.

use serde::{Deserialize, Serialize};

use crate::RECURSION_LIMIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerConfig {
    /// Missing includes and recursion-limit breaches become errors.
    #[serde(default)]
    pub strict: bool,
    /// Trace the intermediate text after every pipeline stage.
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,
}

fn default_recursion_limit() -> usize { RECURSION_LIMIT }

impl CompilerConfig {
    pub fn strict() -> Self {
        Self { strict: true, ..Self::default() }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict: false,
            debug: false,
            recursion_limit: RECURSION_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = CompilerConfig::from_json("{}").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.recursion_limit, 10);
    }

    #[test]
    fn test_camel_case_fields() {
        let config = CompilerConfig::from_json(r#"{"strict": true, "recursionLimit": 4}"#).unwrap();
        assert!(config.strict);
        assert!(!config.debug);
        assert_eq!(config.recursion_limit, 4);
    }
}
