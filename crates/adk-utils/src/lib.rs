//! Shared utilities for adk-rs
//!
//! This crate provides common functionality used across the adk-rs workspace:
//! tracing setup and application configuration.

pub mod config;
pub mod logging;

pub use config::{Config, LogConfig, LogFormat};
pub use logging::{init_tracing, init_tracing_with};
