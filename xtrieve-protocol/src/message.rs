//! Request and response messages and their little-endian wire layout.
//!
//! ```text
//! Request:
//! +------+----------------+----------+------+---------+-----+---------+----------+------+-----------+
//! |  op  | position_block | data_len | data | key_len | key | key_num | path_len | path | lock_bias |
//! | u16  |   128 bytes    |   u32    |  n   |   u16   |  n  |   i16   |   u16    |  n   |    u16    |
//! +------+----------------+----------+------+---------+-----+---------+----------+------+-----------+
//!
//! Response:
//! +--------+----------------+----------+------+---------+-----+
//! | status | position_block | data_len | data | key_len | key |
//! |  u16   |   128 bytes    |   u32    |  n   |   u16   |  n  |
//! +--------+----------------+----------+------+---------+-----+
//! ```

use crate::error::{ProtocolError, StatusCode};
use crate::POSITION_BLOCK_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use std::fmt;

/// Size of a request with empty data, key and path (2+128+4+2+2+2+2).
pub const REQUEST_FIXED_SIZE: usize = 142;

/// Size of a response with empty data and key (2+128+4+2).
pub const RESPONSE_FIXED_SIZE: usize = 136;

/// Record manager operation code.
///
/// The transport layers never validate operations; unknown codes travel as
/// [`Operation::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Close,
    Insert,
    Update,
    Delete,
    GetEqual,
    GetNext,
    GetPrevious,
    GetGreater,
    GetGreaterOrEqual,
    GetLess,
    GetLessOrEqual,
    GetFirst,
    GetLast,
    Create,
    Stat,
    BeginTransaction,
    EndTransaction,
    AbortTransaction,
    GetPosition,
    GetDirect,
    StepNext,
    Unlock,
    StepFirst,
    StepLast,
    StepPrevious,
    Other(u16),
}

impl Operation {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Operation::Open,
            1 => Operation::Close,
            2 => Operation::Insert,
            3 => Operation::Update,
            4 => Operation::Delete,
            5 => Operation::GetEqual,
            6 => Operation::GetNext,
            7 => Operation::GetPrevious,
            8 => Operation::GetGreater,
            9 => Operation::GetGreaterOrEqual,
            10 => Operation::GetLess,
            11 => Operation::GetLessOrEqual,
            12 => Operation::GetFirst,
            13 => Operation::GetLast,
            14 => Operation::Create,
            15 => Operation::Stat,
            19 => Operation::BeginTransaction,
            20 => Operation::EndTransaction,
            21 => Operation::AbortTransaction,
            22 => Operation::GetPosition,
            23 => Operation::GetDirect,
            24 => Operation::StepNext,
            27 => Operation::Unlock,
            33 => Operation::StepFirst,
            34 => Operation::StepLast,
            35 => Operation::StepPrevious,
            other => Operation::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Operation::Open => 0,
            Operation::Close => 1,
            Operation::Insert => 2,
            Operation::Update => 3,
            Operation::Delete => 4,
            Operation::GetEqual => 5,
            Operation::GetNext => 6,
            Operation::GetPrevious => 7,
            Operation::GetGreater => 8,
            Operation::GetGreaterOrEqual => 9,
            Operation::GetLess => 10,
            Operation::GetLessOrEqual => 11,
            Operation::GetFirst => 12,
            Operation::GetLast => 13,
            Operation::Create => 14,
            Operation::Stat => 15,
            Operation::BeginTransaction => 19,
            Operation::EndTransaction => 20,
            Operation::AbortTransaction => 21,
            Operation::GetPosition => 22,
            Operation::GetDirect => 23,
            Operation::StepNext => 24,
            Operation::Unlock => 27,
            Operation::StepFirst => 33,
            Operation::StepLast => 34,
            Operation::StepPrevious => 35,
            Operation::Other(code) => *code,
        }
    }

    /// Operations whose request names a file.
    pub fn carries_path(&self) -> bool {
        matches!(self, Operation::Open | Operation::Create)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Other(code) => write!(f, "OP_{}", code),
            op => write!(f, "{:?}", op),
        }
    }
}

/// Lock bias attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LockBias {
    #[default]
    None,
    SingleWait,
    SingleNoWait,
    MultiWait,
    MultiNoWait,
    Other(u16),
}

impl LockBias {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => LockBias::None,
            100 => LockBias::SingleWait,
            200 => LockBias::SingleNoWait,
            300 => LockBias::MultiWait,
            400 => LockBias::MultiNoWait,
            other => LockBias::Other(other),
        }
    }

    pub fn raw(&self) -> u16 {
        match self {
            LockBias::None => 0,
            LockBias::SingleWait => 100,
            LockBias::SingleNoWait => 200,
            LockBias::MultiWait => 300,
            LockBias::MultiNoWait => 400,
            LockBias::Other(raw) => *raw,
        }
    }
}

/// Opaque 128-byte cursor owned by the engine.
///
/// Callers never interpret its contents; it is replaced wholesale with the
/// value returned by every call.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PositionBlock([u8; POSITION_BLOCK_SIZE]);

impl PositionBlock {
    pub fn new() -> Self {
        Self([0u8; POSITION_BLOCK_SIZE])
    }

    pub fn from_bytes(bytes: [u8; POSITION_BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds a position block from a slice of exactly 128 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: [u8; POSITION_BLOCK_SIZE] = slice
            .try_into()
            .map_err(|_| ProtocolError::InvalidPositionBlock(slice.len()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; POSITION_BLOCK_SIZE] {
        &self.0
    }

    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// Replaces this block with `other`.
    pub fn replace_with(&mut self, other: &PositionBlock) {
        self.0 = other.0;
    }

    fn read_from(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        ensure(buf, "position_block", POSITION_BLOCK_SIZE)?;
        let mut bytes = [0u8; POSITION_BLOCK_SIZE];
        buf.copy_to_slice(&mut bytes);
        Ok(Self(bytes))
    }
}

impl Default for PositionBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PositionBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self
            .0
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        write!(f, "PositionBlock({:02x?}", &self.0[..used.min(16)])?;
        if used > 16 {
            write!(f, "..")?;
        }
        write!(f, ")")
    }
}

/// A record manager call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub position_block: PositionBlock,
    pub data: Bytes,
    pub key: Bytes,
    pub key_number: i16,
    /// Raw file path bytes. An absent path is `None`; `Some` with no bytes
    /// cannot be told apart on the wire and is rejected by `encode`.
    pub file_path: Option<Bytes>,
    pub lock_bias: LockBias,
}

impl Request {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            position_block: PositionBlock::new(),
            data: Bytes::new(),
            key: Bytes::new(),
            key_number: 0,
            file_path: None,
            lock_bias: LockBias::None,
        }
    }

    pub fn with_position_block(mut self, position_block: PositionBlock) -> Self {
        self.position_block = position_block;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_key_number(mut self, key_number: i16) -> Self {
        self.key_number = key_number;
        self
    }

    pub fn with_file_path(mut self, path: impl AsRef<str>) -> Self {
        let path = path.as_ref();
        self.file_path = if path.is_empty() {
            None
        } else {
            Some(Bytes::copy_from_slice(path.as_bytes()))
        };
        self
    }

    pub fn with_lock_bias(mut self, lock_bias: LockBias) -> Self {
        self.lock_bias = lock_bias;
        self
    }

    /// Returns the file path as text, replacing invalid UTF-8.
    pub fn file_path_lossy(&self) -> Option<Cow<'_, str>> {
        self.file_path
            .as_ref()
            .map(|path| String::from_utf8_lossy(path))
    }

    /// Number of bytes [`Request::encode_into`] writes.
    pub fn encoded_len(&self) -> usize {
        REQUEST_FIXED_SIZE
            + self.data.len()
            + self.key.len()
            + self.file_path.as_ref().map_or(0, |p| p.len())
    }

    /// Encodes the request into a new buffer.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Checks that every variable field fits its length prefix and that a
    /// present path is not empty.
    pub fn check_lengths(&self) -> Result<(), ProtocolError> {
        if self.file_path.as_ref().is_some_and(|path| path.is_empty()) {
            return Err(ProtocolError::EmptyPath);
        }
        checked_len("data", self.data.len(), u32::MAX as usize)?;
        checked_len("key", self.key.len(), u16::MAX as usize)?;
        checked_len("path", self.path_bytes().len(), u16::MAX as usize)?;
        Ok(())
    }

    fn path_bytes(&self) -> &[u8] {
        self.file_path.as_deref().unwrap_or(&[])
    }

    /// Appends the encoded request to `buf`.
    pub fn encode_into(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        self.check_lengths()?;
        let path = self.path_bytes();
        let data_len = self.data.len() as u32;
        let key_len = self.key.len() as u16;
        let path_len = path.len() as u16;

        buf.put_u16_le(self.operation.code());
        buf.put_slice(self.position_block.as_bytes());
        buf.put_u32_le(data_len);
        buf.put_slice(&self.data);
        buf.put_u16_le(key_len);
        buf.put_slice(&self.key);
        buf.put_i16_le(self.key_number);
        buf.put_u16_le(path_len);
        buf.put_slice(path);
        buf.put_u16_le(self.lock_bias.raw());
        Ok(())
    }

    /// Decodes one request from the front of `buf`.
    ///
    /// Fails with [`ProtocolError::Truncated`] when a field is incomplete. A
    /// short field is never consumed and nothing past the request is read.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        ensure(buf, "operation", 2)?;
        let operation = Operation::from_code(buf.get_u16_le());
        let position_block = PositionBlock::read_from(buf)?;

        ensure(buf, "data_len", 4)?;
        let data_len = buf.get_u32_le() as usize;
        ensure(buf, "data", data_len)?;
        let data = buf.copy_to_bytes(data_len);

        ensure(buf, "key_len", 2)?;
        let key_len = buf.get_u16_le() as usize;
        ensure(buf, "key", key_len)?;
        let key = buf.copy_to_bytes(key_len);

        ensure(buf, "key_number", 2)?;
        let key_number = buf.get_i16_le();

        ensure(buf, "path_len", 2)?;
        let path_len = buf.get_u16_le() as usize;
        ensure(buf, "path", path_len)?;
        let file_path = (path_len > 0).then(|| buf.copy_to_bytes(path_len));

        ensure(buf, "lock_bias", 2)?;
        let lock_bias = LockBias::from_raw(buf.get_u16_le());

        Ok(Self {
            operation,
            position_block,
            data,
            key,
            key_number,
            file_path,
            lock_bias,
        })
    }
}

/// The engine's answer to one [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: StatusCode,
    pub position_block: PositionBlock,
    pub data: Bytes,
    pub key: Bytes,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            position_block: PositionBlock::new(),
            data: Bytes::new(),
            key: Bytes::new(),
        }
    }

    pub fn with_position_block(mut self, position_block: PositionBlock) -> Self {
        self.position_block = position_block;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn encoded_len(&self) -> usize {
        RESPONSE_FIXED_SIZE + self.data.len() + self.key.len()
    }

    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn encode_into(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        let data_len = checked_len("data", self.data.len(), u32::MAX as usize)? as u32;
        let key_len = checked_len("key", self.key.len(), u16::MAX as usize)? as u16;

        buf.put_u16_le(self.status.code());
        buf.put_slice(self.position_block.as_bytes());
        buf.put_u32_le(data_len);
        buf.put_slice(&self.data);
        buf.put_u16_le(key_len);
        buf.put_slice(&self.key);
        Ok(())
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        ensure(buf, "status", 2)?;
        let status = StatusCode::from_code(buf.get_u16_le());
        let position_block = PositionBlock::read_from(buf)?;

        ensure(buf, "data_len", 4)?;
        let data_len = buf.get_u32_le() as usize;
        ensure(buf, "data", data_len)?;
        let data = buf.copy_to_bytes(data_len);

        ensure(buf, "key_len", 2)?;
        let key_len = buf.get_u16_le() as usize;
        ensure(buf, "key", key_len)?;
        let key = buf.copy_to_bytes(key_len);

        Ok(Self {
            status,
            position_block,
            data,
            key,
        })
    }
}

fn ensure(buf: &impl Buf, field: &'static str, needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            field,
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

fn checked_len(field: &'static str, len: usize, max: usize) -> Result<usize, ProtocolError> {
    if len > max {
        return Err(ProtocolError::LengthExceeded {
            field,
            len: len as u64,
            max: max as u64,
        });
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_insert() -> Request {
        Request::new(Operation::Insert)
            .with_data(vec![0x41u8; 100])
            .with_key_number(0)
    }

    #[test]
    fn test_insert_example_is_242_bytes() {
        let encoded = sample_insert().encode().unwrap();
        assert_eq!(encoded.len(), 242);

        assert_eq!(&encoded[0..2], &[0x02, 0x00]);
        assert!(encoded[2..130].iter().all(|&b| b == 0));
        assert_eq!(&encoded[130..134], &[0x64, 0x00, 0x00, 0x00]);
        assert!(encoded[134..234].iter().all(|&b| b == 0x41));
        // key_len, key_number, path_len, lock_bias
        assert_eq!(&encoded[234..242], &[0u8; 8]);
    }

    #[test]
    fn test_request_fixed_size() {
        let encoded = Request::new(Operation::Close).encode().unwrap();
        assert_eq!(encoded.len(), REQUEST_FIXED_SIZE);
    }

    #[test]
    fn test_response_fixed_size() {
        let encoded = Response::new(StatusCode::Success).encode().unwrap();
        assert_eq!(encoded.len(), RESPONSE_FIXED_SIZE);
    }

    #[test]
    fn test_negative_key_number() {
        let request = Request::new(Operation::Open).with_key_number(-1);
        let encoded = request.encode().unwrap();
        assert_eq!(&encoded[136..138], &[0xFF, 0xFF]);

        let decoded = Request::decode(&mut encoded.freeze()).unwrap();
        assert_eq!(decoded.key_number, -1);
    }

    #[test]
    fn test_path_is_not_null_terminated() {
        let request = Request::new(Operation::Open).with_file_path("C:\\DATA.BTR");
        let encoded = request.encode().unwrap();
        assert_eq!(encoded.len(), REQUEST_FIXED_SIZE + 11);
        assert_eq!(&encoded[138..140], &[11, 0]);
        assert_eq!(&encoded[140..151], b"C:\\DATA.BTR");
    }

    #[test]
    fn test_empty_path_is_absent() {
        let request = Request::new(Operation::Open).with_file_path("");
        assert!(request.file_path.is_none());

        let decoded = Request::decode(&mut request.encode().unwrap().freeze()).unwrap();
        assert!(decoded.file_path.is_none());
    }

    #[test]
    fn test_truncated_position_block_consumes_nothing() {
        let encoded = sample_insert().encode().unwrap();
        let mut short = encoded.freeze().slice(0..50);

        let result = Request::decode(&mut short);
        match result {
            Err(ProtocolError::Truncated {
                field,
                needed,
                available,
            }) => {
                assert_eq!(field, "position_block");
                assert_eq!(needed, 128);
                assert_eq!(available, 48);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // The operation was read; the short position block was not.
        assert_eq!(short.len(), 48);
    }

    #[test]
    fn test_truncated_data_reads_nothing_past_buffer() {
        let encoded = sample_insert().encode().unwrap();
        let mut short = encoded.freeze().slice(0..200);

        let result = Request::decode(&mut short);
        assert!(matches!(
            result,
            Err(ProtocolError::Truncated { field: "data", needed: 100, available: 66 })
        ));
        assert_eq!(short.len(), 66);
    }

    #[test]
    fn test_decode_leaves_trailing_bytes() {
        let mut buf = BytesMut::new();
        Response::new(StatusCode::EndOfFile).encode_into(&mut buf).unwrap();
        buf.put_slice(&[0xBB, 0xBB, 0x01]);

        let mut bytes = buf.freeze();
        let decoded = Response::decode(&mut bytes).unwrap();
        assert_eq!(decoded.status, StatusCode::EndOfFile);
        assert_eq!(bytes.as_ref(), &[0xBB, 0xBB, 0x01]);
    }

    #[test]
    fn test_key_too_long() {
        let request = Request::new(Operation::GetEqual).with_key(vec![0u8; 70_000]);
        assert!(matches!(
            request.encode(),
            Err(ProtocolError::LengthExceeded { field: "key", .. })
        ));
    }

    #[test]
    fn test_request_roundtrip_at_field_limits() {
        let request = Request {
            operation: Operation::Create,
            position_block: PositionBlock::from_bytes([0xBB; POSITION_BLOCK_SIZE]),
            data: vec![0x5Au8; 1 << 20].into(),
            key: vec![0x4Bu8; u16::MAX as usize].into(),
            key_number: i16::MIN,
            file_path: Some(vec![b'P'; u16::MAX as usize].into()),
            lock_bias: LockBias::from_raw(u16::MAX),
        };
        let encoded = request.encode().unwrap();
        assert_eq!(
            encoded.len(),
            REQUEST_FIXED_SIZE + (1 << 20) + 2 * u16::MAX as usize
        );

        let mut bytes = encoded.freeze();
        let decoded = Request::decode(&mut bytes).unwrap();
        assert_eq!(decoded, request);
        assert!(bytes.is_empty());

        let over = request.with_key(vec![0u8; u16::MAX as usize + 1]);
        assert!(matches!(
            over.encode(),
            Err(ProtocolError::LengthExceeded { field: "key", len: 65_536, .. })
        ));
    }

    #[test]
    fn test_response_roundtrip_at_key_limit() {
        let response = Response::new(StatusCode::Success)
            .with_data(vec![0x11u8; 1 << 16])
            .with_key(vec![0x22u8; u16::MAX as usize]);
        let mut bytes = response.encode().unwrap().freeze();
        assert_eq!(
            bytes.len(),
            RESPONSE_FIXED_SIZE + (1 << 16) + u16::MAX as usize
        );

        let decoded = Response::decode(&mut bytes).unwrap();
        assert_eq!(decoded, response);
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_present_empty_path_is_rejected() {
        let mut request = Request::new(Operation::Open);
        request.file_path = Some(Bytes::new());
        assert!(matches!(request.encode(), Err(ProtocolError::EmptyPath)));
        assert!(matches!(
            crate::codec::Encoder::encode_marked_request(&request),
            Err(ProtocolError::EmptyPath)
        ));
    }

    #[test]
    fn test_unknown_codes_roundtrip() {
        let request =
            Request::new(Operation::from_code(53)).with_lock_bias(LockBias::from_raw(150));
        let decoded = Request::decode(&mut request.encode().unwrap().freeze()).unwrap();
        assert_eq!(decoded.operation, Operation::Other(53));
        assert_eq!(decoded.lock_bias, LockBias::Other(150));
    }

    #[test]
    fn test_operation_codes() {
        assert_eq!(Operation::Unlock.code(), 27);
        assert_eq!(Operation::StepPrevious.code(), 35);
        assert_eq!(Operation::from_code(14), Operation::Create);
        for code in 0..=u16::MAX {
            assert_eq!(Operation::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_position_block_from_slice() {
        assert!(PositionBlock::from_slice(&[1u8; 128]).is_ok());
        assert!(matches!(
            PositionBlock::from_slice(&[1u8; 127]),
            Err(ProtocolError::InvalidPositionBlock(127))
        ));
    }

    fn arb_position_block() -> impl Strategy<Value = PositionBlock> {
        prop::collection::vec(any::<u8>(), POSITION_BLOCK_SIZE)
            .prop_map(|v| PositionBlock::from_slice(&v).unwrap())
    }

    fn arb_request() -> impl Strategy<Value = Request> {
        (
            any::<u16>(),
            arb_position_block(),
            prop::collection::vec(any::<u8>(), 0..512),
            prop::collection::vec(any::<u8>(), 0..80),
            any::<i16>(),
            prop::option::of(prop::collection::vec(any::<u8>(), 1..64)),
            any::<u16>(),
        )
            .prop_map(|(op, pos, data, key, key_number, path, bias)| Request {
                operation: Operation::from_code(op),
                position_block: pos,
                data: data.into(),
                key: key.into(),
                key_number,
                file_path: path.map(Bytes::from),
                lock_bias: LockBias::from_raw(bias),
            })
    }

    fn arb_response() -> impl Strategy<Value = Response> {
        (
            any::<u16>(),
            arb_position_block(),
            prop::collection::vec(any::<u8>(), 0..512),
            prop::collection::vec(any::<u8>(), 0..80),
        )
            .prop_map(|(status, pos, data, key)| {
                Response::new(StatusCode::from_code(status))
                    .with_position_block(pos)
                    .with_data(data)
                    .with_key(key)
            })
    }

    proptest! {
        #[test]
        fn prop_request_roundtrip(request in arb_request()) {
            let encoded = request.encode().unwrap();
            prop_assert_eq!(encoded.len(), request.encoded_len());
            let mut bytes = encoded.freeze();
            let decoded = Request::decode(&mut bytes).unwrap();
            prop_assert_eq!(decoded, request);
            prop_assert!(bytes.is_empty());
        }

        #[test]
        fn prop_response_roundtrip(response in arb_response()) {
            let mut bytes = response.encode().unwrap().freeze();
            let decoded = Response::decode(&mut bytes).unwrap();
            prop_assert_eq!(decoded, response);
            prop_assert!(bytes.is_empty());
        }

        #[test]
        fn prop_any_prefix_is_truncated(
            request in arb_request(),
            cut in any::<prop::sample::Index>(),
        ) {
            let encoded = request.encode().unwrap().freeze();
            let cut = cut.index(encoded.len());
            let mut prefix = encoded.slice(0..cut);
            let result = Request::decode(&mut prefix);
            prop_assert!(
                matches!(result, Err(ProtocolError::Truncated { .. })),
                "expected truncation error"
            );
        }
    }
}
