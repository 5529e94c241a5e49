//! Shared types and utilities for the qproc workspace
//!
//! Holds the processing data model (transcripts, translations, drafts,
//! snapshots, the per-question submission uuid index), the common error type
//! and TOML configuration loading. Everything here is rendering-agnostic; the
//! store and gateway live in `qproc-store`.

pub mod config;
pub mod error;
pub mod types;

pub use error::{Error, Result};
