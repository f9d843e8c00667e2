//! Common test utilities and fixtures for integration tests.
//!
//! # Modules
//!
//! - `fixtures`: Forge and AI payload factories, mock mounting, config builders
//! - `log_capture`: In-memory `tracing` capture for log assertions
//! - `logger`: Structured test logging infrastructure

pub mod fixtures;
pub mod log_capture;
pub mod logger;
