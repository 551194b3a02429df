//! Cache-related MCP tools.
//!
//! This module provides tools for invalidating the link cache.

pub mod clear;

pub use clear::{CacheClearParams, clear_impl};
