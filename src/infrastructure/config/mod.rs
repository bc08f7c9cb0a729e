//! Configuration management infrastructure (§4.0 [NEW]).
//!
//! Hierarchical configuration using `figment`: YAML file loading,
//! environment variable overrides, round-trip-preserving save.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
