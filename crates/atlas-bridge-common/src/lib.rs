//! Common utilities for atlas-bridge
//!
//! This crate provides the shared error taxonomy used across all
//! atlas-bridge crates.

pub mod error;

pub use error::{BridgeError, Result};
