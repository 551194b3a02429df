//! Queue view MCP tools.
//!
//! This module provides the operator-facing listing and per-entry delete.

pub mod list;
pub mod remove;

pub use list::{QueueListParams, list_impl};
pub use remove::{QueueRemoveParams, remove_impl};
