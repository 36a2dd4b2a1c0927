//! Encoder and incremental decoder for requests and responses.

use crate::error::ProtocolError;
use crate::frame::SYNC_MARKER;
use crate::message::{Request, Response};
use crate::POSITION_BLOCK_SIZE;
use bytes::{BufMut, Bytes, BytesMut};

/// Encodes requests and responses into wire bytes.
pub struct Encoder;

impl Encoder {
    /// Encodes a request with no framing prefix.
    pub fn encode_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        request.encode()
    }

    /// Encodes a request preceded by the serial sync marker.
    pub fn encode_marked_request(request: &Request) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(SYNC_MARKER.len() + request.encoded_len());
        buf.put_slice(&SYNC_MARKER);
        request.encode_into(&mut buf)?;
        Ok(buf)
    }

    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        response.encode()
    }
}

/// Buffers incoming bytes and yields complete messages.
///
/// The full frame length is computed from the length fields before anything
/// is consumed, so an incomplete frame leaves the buffer untouched.
pub struct Decoder {
    buffer: BytesMut,
    max_data_len: u32,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            max_data_len: u32::MAX,
        }
    }

    /// Rejects frames whose `data_len` exceeds `max` before buffering them.
    pub fn with_max_data_len(mut self, max: u32) -> Self {
        self.max_data_len = max;
        self
    }

    pub fn max_data_len(&self) -> u32 {
        self.max_data_len
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Mutable access to the buffer for direct socket reads.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Attempts to decode the next message of type `M` from the buffer.
    ///
    /// Returns `Ok(None)` if more data is needed.
    pub fn decode<M: Frameable>(&mut self) -> Result<Option<M>, ProtocolError> {
        match M::frame_len(&self.buffer, self.max_data_len)? {
            Some(len) => {
                let mut frame = self.buffer.split_to(len).freeze();
                M::decode_frame(&mut frame).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Attempts to decode the next request from the buffer.
    pub fn decode_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        self.decode()
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        self.decode()
    }

    /// Describes why the buffered bytes do not form a complete `M`.
    pub fn truncation<M: Frameable>(&self) -> ProtocolError {
        let mut partial = Bytes::copy_from_slice(&self.buffer);
        match M::decode_frame(&mut partial) {
            Err(err) => err,
            Ok(_) => ProtocolError::ConnectionClosed,
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Messages the decoder can delimit in a byte stream.
pub trait Frameable: Sized {
    /// Total encoded length of the message at the front of `buf`, or `None`
    /// while the length fields are still incomplete.
    fn frame_len(buf: &[u8], max_data_len: u32) -> Result<Option<usize>, ProtocolError>;

    fn decode_frame(buf: &mut Bytes) -> Result<Self, ProtocolError>;
}

impl Frameable for Request {
    fn frame_len(buf: &[u8], max_data_len: u32) -> Result<Option<usize>, ProtocolError> {
        request_frame_len(buf, max_data_len)
    }

    fn decode_frame(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Request::decode(buf)
    }
}

impl Frameable for Response {
    fn frame_len(buf: &[u8], max_data_len: u32) -> Result<Option<usize>, ProtocolError> {
        response_frame_len(buf, max_data_len)
    }

    fn decode_frame(buf: &mut Bytes) -> Result<Self, ProtocolError> {
        Response::decode(buf)
    }
}

/// Total encoded length of the request at the front of `buf`, if complete.
pub fn request_frame_len(buf: &[u8], max_data_len: u32) -> Result<Option<usize>, ProtocolError> {
    let mut offset = 2 + POSITION_BLOCK_SIZE;
    let Some(data_len) = peek_u32(buf, offset) else {
        return Ok(None);
    };
    check_data_len(data_len, max_data_len)?;
    offset += 4 + data_len as usize;

    let Some(key_len) = peek_u16(buf, offset) else {
        return Ok(None);
    };
    // key_len, key, key_number
    offset += 2 + key_len as usize + 2;

    let Some(path_len) = peek_u16(buf, offset) else {
        return Ok(None);
    };
    // path_len, path, lock_bias
    offset += 2 + path_len as usize + 2;

    Ok((buf.len() >= offset).then_some(offset))
}

/// Total encoded length of the response at the front of `buf`, if complete.
pub fn response_frame_len(buf: &[u8], max_data_len: u32) -> Result<Option<usize>, ProtocolError> {
    let mut offset = 2 + POSITION_BLOCK_SIZE;
    let Some(data_len) = peek_u32(buf, offset) else {
        return Ok(None);
    };
    check_data_len(data_len, max_data_len)?;
    offset += 4 + data_len as usize;

    let Some(key_len) = peek_u16(buf, offset) else {
        return Ok(None);
    };
    offset += 2 + key_len as usize;

    Ok((buf.len() >= offset).then_some(offset))
}

fn check_data_len(data_len: u32, max: u32) -> Result<(), ProtocolError> {
    if data_len > max {
        return Err(ProtocolError::LengthExceeded {
            field: "data_len",
            len: data_len as u64,
            max: max as u64,
        });
    }
    Ok(())
}

fn peek_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn peek_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
