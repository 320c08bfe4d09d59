//! # Fuzzer Container
//!
//! Runtime configuration for a fuzzing session.

pub mod config;

pub use config::{ConfigError, FuzzerConfig, MutationConfig, SessionConfig};
