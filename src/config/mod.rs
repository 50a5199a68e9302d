//! Configuration management for the matchday service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values for every engine component.

pub mod app;
pub mod balance;
pub mod rating;
pub mod suggestion;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use balance::BalanceConfig;
pub use rating::RatingConfig;
pub use suggestion::SuggestionSettings;
