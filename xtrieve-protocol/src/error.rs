//! Protocol error types and record manager status codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transport-level errors raised while encoding, decoding or framing.
///
/// None of these are remote outcomes; a completed exchange always yields a
/// [`StatusCode`] inside the response instead.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("truncated {field}: need {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("{field} length {len} exceeds limit {max}")]
    LengthExceeded {
        field: &'static str,
        len: u64,
        max: u64,
    },

    #[error("no byte received within {0:?}")]
    Timeout(Duration),

    #[error("sync marker not found within {0:?}")]
    SyncTimeout(Duration),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("invalid position block length: {0} (expected 128)")]
    InvalidPositionBlock(usize),

    /// `Some` with no bytes; an absent path is `None`.
    #[error("file path is present but empty")]
    EmptyPath,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns true for errors that leave a byte stream at an unknown offset
    /// within a frame.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::Truncated { .. }
                | ProtocolError::LengthExceeded { .. }
                | ProtocolError::Timeout(_)
        )
    }
}

/// Record manager status code returned in every response.
///
/// Codes without a name are carried as [`StatusCode::Other`] so a status
/// always survives a decode/encode cycle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum StatusCode {
    Success,
    InvalidOperation,
    IoError,
    FileNotOpen,
    KeyNotFound,
    DuplicateKey,
    InvalidKeyNumber,
    DifferentKeyNumber,
    InvalidPositioning,
    EndOfFile,
    ModifiableKeyChanged,
    InvalidFileName,
    FileNotFound,
    DiskFull,
    RecordManagerInactive,
    KeyBufferTooShort,
    DataBufferTooShort,
    PositionBlockLengthError,
    PageSizeError,
    InvalidRecordLength,
    InvalidKeyLength,
    FileAlreadyExists,
    RecordLocked,
    FileLocked,
    Other(u16),
}

impl StatusCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => StatusCode::Success,
            1 => StatusCode::InvalidOperation,
            2 => StatusCode::IoError,
            3 => StatusCode::FileNotOpen,
            4 => StatusCode::KeyNotFound,
            5 => StatusCode::DuplicateKey,
            6 => StatusCode::InvalidKeyNumber,
            7 => StatusCode::DifferentKeyNumber,
            8 => StatusCode::InvalidPositioning,
            9 => StatusCode::EndOfFile,
            10 => StatusCode::ModifiableKeyChanged,
            11 => StatusCode::InvalidFileName,
            12 => StatusCode::FileNotFound,
            18 => StatusCode::DiskFull,
            20 => StatusCode::RecordManagerInactive,
            21 => StatusCode::KeyBufferTooShort,
            22 => StatusCode::DataBufferTooShort,
            23 => StatusCode::PositionBlockLengthError,
            24 => StatusCode::PageSizeError,
            28 => StatusCode::InvalidRecordLength,
            29 => StatusCode::InvalidKeyLength,
            59 => StatusCode::FileAlreadyExists,
            84 => StatusCode::RecordLocked,
            85 => StatusCode::FileLocked,
            other => StatusCode::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            StatusCode::Success => 0,
            StatusCode::InvalidOperation => 1,
            StatusCode::IoError => 2,
            StatusCode::FileNotOpen => 3,
            StatusCode::KeyNotFound => 4,
            StatusCode::DuplicateKey => 5,
            StatusCode::InvalidKeyNumber => 6,
            StatusCode::DifferentKeyNumber => 7,
            StatusCode::InvalidPositioning => 8,
            StatusCode::EndOfFile => 9,
            StatusCode::ModifiableKeyChanged => 10,
            StatusCode::InvalidFileName => 11,
            StatusCode::FileNotFound => 12,
            StatusCode::DiskFull => 18,
            StatusCode::RecordManagerInactive => 20,
            StatusCode::KeyBufferTooShort => 21,
            StatusCode::DataBufferTooShort => 22,
            StatusCode::PositionBlockLengthError => 23,
            StatusCode::PageSizeError => 24,
            StatusCode::InvalidRecordLength => 28,
            StatusCode::InvalidKeyLength => 29,
            StatusCode::FileAlreadyExists => 59,
            StatusCode::RecordLocked => 84,
            StatusCode::FileLocked => 85,
            StatusCode::Other(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        *self == StatusCode::Success
    }

    /// Returns whether repeating the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StatusCode::RecordLocked | StatusCode::FileLocked | StatusCode::RecordManagerInactive
        )
    }

    /// Returns true for the statuses that end a navigation loop.
    pub fn is_end_of_file(&self) -> bool {
        *self == StatusCode::EndOfFile
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode::from_code(code)
    }
}

impl From<StatusCode> for u16 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::InvalidOperation => "INVALID_OPERATION",
            StatusCode::IoError => "IO_ERROR",
            StatusCode::FileNotOpen => "FILE_NOT_OPEN",
            StatusCode::KeyNotFound => "KEY_NOT_FOUND",
            StatusCode::DuplicateKey => "DUPLICATE_KEY",
            StatusCode::InvalidKeyNumber => "INVALID_KEY_NUMBER",
            StatusCode::DifferentKeyNumber => "DIFFERENT_KEY_NUMBER",
            StatusCode::InvalidPositioning => "INVALID_POSITIONING",
            StatusCode::EndOfFile => "END_OF_FILE",
            StatusCode::ModifiableKeyChanged => "MODIFIABLE_KEY_CHANGED",
            StatusCode::InvalidFileName => "INVALID_FILE_NAME",
            StatusCode::FileNotFound => "FILE_NOT_FOUND",
            StatusCode::DiskFull => "DISK_FULL",
            StatusCode::RecordManagerInactive => "RECORD_MANAGER_INACTIVE",
            StatusCode::KeyBufferTooShort => "KEY_BUFFER_TOO_SHORT",
            StatusCode::DataBufferTooShort => "DATA_BUFFER_TOO_SHORT",
            StatusCode::PositionBlockLengthError => "POSITION_BLOCK_LENGTH",
            StatusCode::PageSizeError => "PAGE_SIZE_ERROR",
            StatusCode::InvalidRecordLength => "INVALID_RECORD_LENGTH",
            StatusCode::InvalidKeyLength => "INVALID_KEY_LENGTH",
            StatusCode::FileAlreadyExists => "FILE_ALREADY_EXISTS",
            StatusCode::RecordLocked => "RECORD_LOCKED",
            StatusCode::FileLocked => "FILE_LOCKED",
            StatusCode::Other(code) => return write!(f, "STATUS_{}", code),
        };
        write!(f, "{} ({})", name, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_status_code_roundtrips() {
        for code in 0..=u16::MAX {
            assert_eq!(StatusCode::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_named_codes() {
        assert_eq!(StatusCode::from_code(0), StatusCode::Success);
        assert_eq!(StatusCode::from_code(9), StatusCode::EndOfFile);
        assert_eq!(StatusCode::from_code(20), StatusCode::RecordManagerInactive);
        assert_eq!(StatusCode::from_code(84), StatusCode::RecordLocked);
        assert_eq!(StatusCode::from_code(13), StatusCode::Other(13));
    }

    #[test]
    fn test_status_retryable() {
        assert!(StatusCode::RecordLocked.is_retryable());
        assert!(StatusCode::FileLocked.is_retryable());

        assert!(!StatusCode::Success.is_retryable());
        assert!(!StatusCode::DuplicateKey.is_retryable());
        assert!(!StatusCode::EndOfFile.is_retryable());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(StatusCode::Success.to_string(), "SUCCESS (0)");
        assert_eq!(StatusCode::KeyNotFound.to_string(), "KEY_NOT_FOUND (4)");
        assert_eq!(StatusCode::Other(200).to_string(), "STATUS_200");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&StatusCode::DuplicateKey).unwrap();
        assert_eq!(json, "5");

        let parsed: StatusCode = serde_json::from_str("12").unwrap();
        assert_eq!(parsed, StatusCode::FileNotFound);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::Truncated {
            field: "data",
            needed: 10,
            available: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("data"));
        assert!(msg.contains("10"));

        let err = ProtocolError::LengthExceeded {
            field: "data_len",
            len: 100,
            max: 50,
        };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));

        assert!(ProtocolError::ConnectionClosed.to_string().contains("closed"));
    }

    #[test]
    fn test_is_framing() {
        assert!(ProtocolError::Timeout(Duration::from_secs(1)).is_framing());
        assert!(!ProtocolError::ConnectionClosed.is_framing());
        assert!(!ProtocolError::Io(std::io::ErrorKind::BrokenPipe.into()).is_framing());
    }
}
