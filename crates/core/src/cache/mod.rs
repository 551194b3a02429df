//! SQLite-backed link queue and result cache.
//!
//! This module provides the persistent store behind the link pipeline using
//! SQLite with async access via tokio-rusqlite. It supports:
//!
//! - One row per target URL, keyed by a SHA-256 of the normalized URL
//! - Per-entry expiry evaluated against an injectable clock
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod clock;
pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;

pub use crate::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::CacheDb;
pub use entries::{EntryFilter, EntryStatus, LINK_KIND, Preview, QueueEntry};
pub use hash::{entry_key, is_entry_key};
