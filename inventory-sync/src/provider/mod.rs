//! Providers poll external systems and translate their objects into [`crate::types::SyncItem`]s.
//!
//! The core only sees the [`SyncProvider`] trait. [`memory::MemoryProvider`] serves tests and
//! development, [`file::FileProvider`] reads JSON exports from disk.

mod base;
pub mod file;
pub mod memory;

pub use base::SyncProvider;
