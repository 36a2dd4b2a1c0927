//! # xtrieve-gateway
//!
//! Serial-to-TCP gateway for xtrieve.
//!
//! This crate provides:
//! - A link listener accepting emulated null-modem connections
//! - Per-link sessions relaying framed requests to the engine
//! - Engine reconnection with a configurable policy
//! - YAML/environment configuration

pub mod config;
pub mod connector;
pub mod error;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError, EngineConfig, LinkConfig, ReconnectConfig};
pub use connector::EngineConnector;
pub use error::GatewayError;
pub use server::{Gateway, GatewayStats, LinkInfo, StatsSnapshot};
pub use session::{GatewaySession, Iteration};
