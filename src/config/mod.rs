//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), one section per subsystem,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, DetectionConfig, FeatureConfig, RiskConfig, ServiceConfig};
