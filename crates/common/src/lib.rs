//! Common utilities for aissert
//!
//! Shared code used across all aissert crates.

pub mod error;

pub use error::{Error, Result};
