//! # peerfind-core
//!
//! Core types and error definitions for peerfind.
//!
//! This crate provides:
//! - Error types (`PeerFindError`, `ConfigError`, `LookupError`)
//! - The observed peer set (`PeerSet`)
//! - Discovery input configuration (`DiscoveryConfig`)

mod config;
mod error;
mod peers;

pub use config::DiscoveryConfig;
pub use error::{ConfigError, LookupError, PeerFindError};
pub use peers::PeerSet;
