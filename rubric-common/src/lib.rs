//! Rubric Common - Shared configuration and logging for the Rubric service.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;

pub use config::{
    Config, LimitsConfig, NetworkConfig, ObservabilityConfig, RemoteStoreConfig, StorageConfig,
    StoreBackend, SummaryConfig,
};
