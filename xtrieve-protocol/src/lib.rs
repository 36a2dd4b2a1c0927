//! # xtrieve-protocol
//!
//! Wire protocol implementation for xtrieve, the Btrieve-style record manager
//! protocol spoken between legacy clients, the serial gateway and the engine.
//!
//! This crate provides:
//! - Little-endian request/response codec with an incremental decoder
//! - Status codes, operation codes and lock biases
//! - Sync marker scanning for lossy serial links
//! - Stream (serial) and connection (TCP) framers over tokio I/O
//! - Create-file payload builder

pub mod codec;
pub mod error;
pub mod filespec;
pub mod frame;
pub mod message;
pub mod transport;

pub use codec::{Decoder, Encoder};
pub use error::{ProtocolError, StatusCode};
pub use filespec::{FileSpec, FileStat, KeyFlags, KeySpec, KeyType};
pub use frame::{SyncScanner, SYNC_MARKER};
pub use message::{LockBias, Operation, PositionBlock, Request, Response};
pub use transport::{SerialFramer, SerialFramerConfig, TcpFramer};

/// Size of the opaque cursor carried in every request and response.
pub const POSITION_BLOCK_SIZE: usize = 128;

/// Default port of the xtrieve engine.
pub const DEFAULT_PORT: u16 = 7419;

/// Default port the gateway listens on for serial links.
pub const DEFAULT_LINK_PORT: u16 = 7418;

/// Nominal baud rate of the legacy serial link.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default ceiling on a decoded `data_len` used by the framers (16 MiB).
pub const MAX_DATA_LEN: u32 = 16 * 1024 * 1024;
