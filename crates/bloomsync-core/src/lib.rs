//! Shared configuration and pure domain logic for the bloomsync engine.
//!
//! Everything here is side-effect free: tag parsing, sort-key construction,
//! wire types, and environment-driven configuration. Database and HTTP
//! concerns live in the sibling crates.

mod app_config;
mod config;
pub mod sort;
pub mod tags;
pub mod types;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, StoreConfig};
pub use config::{load_app_config, load_app_config_from_env};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
