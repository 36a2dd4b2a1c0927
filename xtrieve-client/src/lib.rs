//! # xtrieve-client
//!
//! Client library for xtrieve.
//!
//! This crate provides:
//! - TCP connections to the engine with explicit connect/disconnect
//! - Record operations that carry the caller's position block
//! - An adapter that serves the legacy parameter-block calling convention
//!   over a serial link

pub mod client;
pub mod connection;
pub mod error;
pub mod legacy;

pub use client::{Client, Reply};
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
pub use legacy::{Dispatch, LegacyInterface, ParameterBlock, INTERFACE_ID};
