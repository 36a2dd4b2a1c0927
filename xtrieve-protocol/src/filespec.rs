//! File and key specifications carried by Create, and the Stat reply.
//!
//! ```text
//! header (16 bytes):
//! +------------+-----------+-----------+--------+------------+----------+----------+
//! | record_len | page_size | key_count | unused | file_flags | reserved | prealloc |
//! |    u16     |    u16    |    u16    |   2    |    u32     |    2     |   u16    |
//! +------------+-----------+-----------+--------+------------+----------+----------+
//!
//! key entry (16 bytes each):
//! +----------+--------+-------+--------------+----------+------------+-----+----------+
//! | position | length | flags | unique count | key_type | null_value | acs | reserved |
//! |   u16    |  u16   |  u16  |      4       |    u8    |     u8     | u8  |    3     |
//! +----------+--------+-------+--------------+----------+------------+-----+----------+
//! ```
//!
//! Positions are 1-based, as the engine expects.

use crate::error::{ProtocolError, StatusCode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Size of the file specification header.
pub const FILE_SPEC_HEADER_SIZE: usize = 16;

/// Size of one key entry.
pub const KEY_SPEC_SIZE: usize = 16;

/// Default page size for new files.
pub const DEFAULT_PAGE_SIZE: u16 = 4096;

/// Key attribute bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyFlags(u16);

impl KeyFlags {
    pub const DUPLICATES: u16 = 0x0001;
    pub const MODIFIABLE: u16 = 0x0002;
    pub const BINARY: u16 = 0x0004;
    pub const NULL_KEY: u16 = 0x0008;
    /// Another segment of the same key follows this entry.
    pub const SEGMENTED: u16 = 0x0010;
    pub const ALT_SEQUENCE: u16 = 0x0020;
    pub const DESCENDING: u16 = 0x0040;
    pub const SUPPLEMENTAL: u16 = 0x0080;
    pub const EXTENDED_TYPE: u16 = 0x0100;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn with_duplicates(mut self) -> Self {
        self.0 |= Self::DUPLICATES;
        self
    }

    pub fn with_modifiable(mut self) -> Self {
        self.0 |= Self::MODIFIABLE;
        self
    }

    pub fn with_segmented(mut self) -> Self {
        self.0 |= Self::SEGMENTED;
        self
    }

    pub fn with_descending(mut self) -> Self {
        self.0 |= Self::DESCENDING;
        self
    }

    pub fn with_extended_type(mut self) -> Self {
        self.0 |= Self::EXTENDED_TYPE;
        self
    }

    pub fn allows_duplicates(&self) -> bool {
        self.0 & Self::DUPLICATES != 0
    }

    pub fn is_modifiable(&self) -> bool {
        self.0 & Self::MODIFIABLE != 0
    }

    pub fn is_segmented(&self) -> bool {
        self.0 & Self::SEGMENTED != 0
    }

    pub fn is_descending(&self) -> bool {
        self.0 & Self::DESCENDING != 0
    }
}

/// Extended key type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum KeyType {
    String,
    Integer,
    Float,
    Date,
    Time,
    Decimal,
    Money,
    Logical,
    Numeric,
    BFloat,
    LString,
    ZString,
    UnsignedBinary,
    AutoIncrement,
    Other(u8),
}

impl KeyType {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => KeyType::String,
            1 => KeyType::Integer,
            2 => KeyType::Float,
            3 => KeyType::Date,
            4 => KeyType::Time,
            5 => KeyType::Decimal,
            6 => KeyType::Money,
            7 => KeyType::Logical,
            8 => KeyType::Numeric,
            9 => KeyType::BFloat,
            10 => KeyType::LString,
            11 => KeyType::ZString,
            14 => KeyType::UnsignedBinary,
            15 => KeyType::AutoIncrement,
            other => KeyType::Other(other),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            KeyType::String => 0,
            KeyType::Integer => 1,
            KeyType::Float => 2,
            KeyType::Date => 3,
            KeyType::Time => 4,
            KeyType::Decimal => 5,
            KeyType::Money => 6,
            KeyType::Logical => 7,
            KeyType::Numeric => 8,
            KeyType::BFloat => 9,
            KeyType::LString => 10,
            KeyType::ZString => 11,
            KeyType::UnsignedBinary => 14,
            KeyType::AutoIncrement => 15,
            KeyType::Other(tag) => *tag,
        }
    }
}

impl From<u8> for KeyType {
    fn from(tag: u8) -> Self {
        KeyType::from_tag(tag)
    }
}

impl From<KeyType> for u8 {
    fn from(key_type: KeyType) -> Self {
        key_type.tag()
    }
}

/// One key segment of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    /// 1-based offset of the key within the record.
    pub position: u16,
    pub length: u16,
    #[serde(default)]
    pub flags: KeyFlags,
    pub key_type: KeyType,
    #[serde(default)]
    pub null_value: u8,
    #[serde(default)]
    pub acs_number: u8,
}

impl KeySpec {
    pub fn new(position: u16, length: u16, key_type: KeyType) -> Self {
        Self {
            position,
            length,
            flags: KeyFlags::new().with_extended_type(),
            key_type,
            null_value: 0,
            acs_number: 0,
        }
    }

    pub fn string(position: u16, length: u16) -> Self {
        Self::new(position, length, KeyType::String)
    }

    pub fn integer(position: u16, length: u16) -> Self {
        Self::new(position, length, KeyType::Integer)
    }

    pub fn unsigned(position: u16, length: u16) -> Self {
        Self::new(position, length, KeyType::UnsignedBinary)
    }

    pub fn autoincrement(position: u16, length: u16) -> Self {
        Self::new(position, length, KeyType::AutoIncrement)
    }

    pub fn with_flags(mut self, flags: KeyFlags) -> Self {
        self.flags = KeyFlags::from_bits(flags.bits() | KeyFlags::EXTENDED_TYPE);
        self
    }

    pub fn with_duplicates(mut self) -> Self {
        self.flags = self.flags.with_duplicates();
        self
    }

    pub fn with_modifiable(mut self) -> Self {
        self.flags = self.flags.with_modifiable();
        self
    }

    fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.position);
        buf.put_u16_le(self.length);
        buf.put_u16_le(self.flags.bits());
        // unique count, maintained by the engine
        buf.put_u32_le(0);
        buf.put_u8(self.key_type.tag());
        buf.put_u8(self.null_value);
        buf.put_u8(self.acs_number);
        buf.put_bytes(0, 3);
    }

    fn decode(buf: &mut Bytes) -> Self {
        let position = buf.get_u16_le();
        let length = buf.get_u16_le();
        let flags = KeyFlags::from_bits(buf.get_u16_le());
        buf.advance(4);
        let key_type = KeyType::from_tag(buf.get_u8());
        let null_value = buf.get_u8();
        let acs_number = buf.get_u8();
        buf.advance(3);
        Self {
            position,
            length,
            flags,
            key_type,
            null_value,
            acs_number,
        }
    }
}

/// Layout of a new file, sent as the data buffer of a Create call.
///
/// The key count written to the wire is always the number of entries in
/// `keys`, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub record_length: u16,
    #[serde(default = "default_page_size")]
    pub page_size: u16,
    #[serde(default)]
    pub file_flags: u32,
    #[serde(default)]
    pub preallocation: u16,
    pub keys: Vec<KeySpec>,
}

fn default_page_size() -> u16 {
    DEFAULT_PAGE_SIZE
}

impl FileSpec {
    pub fn new(record_length: u16) -> Self {
        Self {
            record_length,
            page_size: DEFAULT_PAGE_SIZE,
            file_flags: 0,
            preallocation: 0,
            keys: Vec::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: u16) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_key(mut self, key: KeySpec) -> Self {
        self.keys.push(key);
        self
    }

    /// Number of key entries, as written to the header.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn encoded_len(&self) -> usize {
        FILE_SPEC_HEADER_SIZE + KEY_SPEC_SIZE * self.keys.len()
    }

    /// Builds the Create data buffer.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let key_count = u16::try_from(self.keys.len()).map_err(|_| ProtocolError::LengthExceeded {
            field: "key_count",
            len: self.keys.len() as u64,
            max: u16::MAX as u64,
        })?;

        let mut buf = BytesMut::with_capacity(self.encoded_len());
        buf.put_u16_le(self.record_length);
        buf.put_u16_le(self.page_size);
        buf.put_u16_le(key_count);
        buf.put_bytes(0, 2);
        buf.put_u32_le(self.file_flags);
        buf.put_bytes(0, 2);
        buf.put_u16_le(self.preallocation);

        for key in &self.keys {
            key.encode_into(&mut buf);
        }
        Ok(buf.freeze())
    }

    /// Parses a Create data buffer.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < FILE_SPEC_HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                field: "file_spec",
                needed: FILE_SPEC_HEADER_SIZE,
                available: data.len(),
            });
        }
        let mut buf = Bytes::copy_from_slice(data);
        let record_length = buf.get_u16_le();
        let page_size = buf.get_u16_le();
        let key_count = buf.get_u16_le() as usize;
        buf.advance(2);
        let file_flags = buf.get_u32_le();
        buf.advance(2);
        let preallocation = buf.get_u16_le();

        let needed = KEY_SPEC_SIZE * key_count;
        if buf.remaining() < needed {
            return Err(ProtocolError::Truncated {
                field: "key_spec",
                needed,
                available: buf.remaining(),
            });
        }
        let keys = (0..key_count).map(|_| KeySpec::decode(&mut buf)).collect();

        Ok(Self {
            record_length,
            page_size,
            file_flags,
            preallocation,
            keys,
        })
    }
}

/// Statistics returned in the data buffer of a Stat call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    pub record_length: u16,
    pub page_size: u16,
    pub key_count: u16,
    pub record_count: u32,
}

/// Minimum size of a Stat reply payload.
pub const FILE_STAT_SIZE: usize = 10;

impl FileStat {
    /// Parses a Stat reply. A short payload yields
    /// [`StatusCode::DataBufferTooShort`].
    pub fn parse(data: &[u8]) -> Result<Self, StatusCode> {
        if data.len() < FILE_STAT_SIZE {
            return Err(StatusCode::DataBufferTooShort);
        }
        let mut buf = data;
        Ok(Self {
            record_length: buf.get_u16_le(),
            page_size: buf.get_u16_le(),
            key_count: buf.get_u16_le(),
            record_count: buf.get_u32_le(),
        })
    }
}
