//! Core types and shared functionality for linkpeek.
//!
//! This crate provides:
//! - Link queue / result cache with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, EntryFilter, EntryStatus, LINK_KIND, Preview, QueueEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
