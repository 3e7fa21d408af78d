//! Core utilities for the Ember engine.
//!
//! This crate provides foundational types and utilities used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Frame timing
//! - Engine configuration loaded from `ember.toml`

mod config;
mod error;
mod logging;
mod timer;

pub use config::{EngineConfig, LogConfig, PresentModePreference, RendererConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
