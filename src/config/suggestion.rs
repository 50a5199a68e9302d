//! Suggestion provider configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Optional external team suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionSettings {
    /// Whether the assignment engine asks the provider at all
    pub enabled: bool,
    /// Provider endpoint receiving `{participants, seed}`
    pub endpoint: Option<String>,
    /// Bearer token sent to the provider
    pub api_key: Option<String>,
    /// Upper bound on a single suggestion call
    pub timeout_ms: u64,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key: None,
            timeout_ms: 5000,
        }
    }
}

impl SuggestionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
