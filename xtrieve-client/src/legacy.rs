//! Adapter for the legacy parameter-block calling convention.
//!
//! Legacy programs hand the record manager a block of pointers: data buffer
//! and length, position block, operation, key buffer, key number, status
//! word and an interface id. [`LegacyInterface`] serves calls addressed to
//! it over a serial link and hands every other call to an injected fallback,
//! so a previously installed handler keeps working.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};
use xtrieve_protocol::{
    Operation, PositionBlock, ProtocolError, Request, Response, SerialFramer, SerialFramerConfig,
    StatusCode,
};

/// Interface id identifying calls meant for this record manager.
pub const INTERFACE_ID: u16 = 0x6176;

/// Longest file path read from the key buffer, excluding the terminator.
pub const MAX_PATH_LEN: usize = 79;

/// One call in the legacy calling convention.
pub struct ParameterBlock<'a> {
    /// Caller's data buffer. Its length is the declared buffer size.
    pub data: &'a mut [u8],
    /// Bytes of `data` to send; set to the bytes copied back on return.
    pub data_len: u16,
    pub position_block: &'a mut PositionBlock,
    pub operation: u16,
    /// Caller's key buffer. Holds the null-terminated path for Open and
    /// Create.
    pub key: &'a mut [u8],
    pub key_number: i16,
    pub status: &'a mut u16,
    pub interface_id: u16,
}

/// How a call was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Served here; the status was written to the block.
    Handled(StatusCode),
    /// Not addressed to us; passed to the fallback.
    Chained,
}

/// Serves legacy calls over a serial link.
pub struct LegacyInterface<S, F> {
    framer: SerialFramer<S>,
    fallback: F,
    calls: u64,
}

impl<S, F> LegacyInterface<S, F>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&mut ParameterBlock<'_>),
{
    pub fn new(link: S, config: SerialFramerConfig, fallback: F) -> Self {
        Self {
            framer: SerialFramer::new(link, config),
            fallback,
            calls: 0,
        }
    }

    /// Returns true if `block` is addressed to this record manager.
    pub fn accepts(&self, block: &ParameterBlock<'_>) -> bool {
        block.interface_id == INTERFACE_ID
    }

    /// Number of calls served over the link.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Dispatches one call.
    ///
    /// A transport failure is reported to the caller as
    /// [`StatusCode::RecordManagerInactive`]; the caller's buffers are left
    /// untouched in that case.
    pub async fn call(&mut self, block: &mut ParameterBlock<'_>) -> Dispatch {
        if !self.accepts(block) {
            debug!(interface_id = block.interface_id, "Chaining foreign call");
            (self.fallback)(block);
            return Dispatch::Chained;
        }

        let status = match self.forward(block).await {
            Ok(status) => status,
            Err(err) => {
                warn!(op = block.operation, "Serial link failed: {}", err);
                StatusCode::RecordManagerInactive
            }
        };
        *block.status = status.code();
        Dispatch::Handled(status)
    }

    async fn forward(
        &mut self,
        block: &mut ParameterBlock<'_>,
    ) -> Result<StatusCode, ProtocolError> {
        let request = build_request(block);
        self.framer.write_request(&request).await?;
        let response = self.framer.read_response().await?;
        self.calls += 1;
        apply_response(block, &response);
        Ok(response.status)
    }
}

/// Builds the wire request for a legacy call.
pub fn build_request(block: &ParameterBlock<'_>) -> Request {
    let operation = Operation::from_code(block.operation);
    let send_len = (block.data_len as usize).min(block.data.len());

    let mut request = Request::new(operation)
        .with_position_block(*block.position_block)
        .with_data(Bytes::copy_from_slice(&block.data[..send_len]))
        .with_key(Bytes::copy_from_slice(block.key))
        .with_key_number(block.key_number);
    if operation.carries_path() {
        request.file_path = path_from_key(block.key);
    }
    request
}

/// Copies a response back into the caller's buffers, truncating data and key
/// to the buffer sizes.
pub fn apply_response(block: &mut ParameterBlock<'_>, response: &Response) {
    block.position_block.replace_with(&response.position_block);

    let copied = response.data.len().min(block.data.len());
    block.data[..copied].copy_from_slice(&response.data[..copied]);
    block.data_len = copied.min(u16::MAX as usize) as u16;

    let key_copied = response.key.len().min(block.key.len());
    block.key[..key_copied].copy_from_slice(&response.key[..key_copied]);
}

/// Reads a null-terminated path of at most [`MAX_PATH_LEN`] bytes.
fn path_from_key(key: &[u8]) -> Option<Bytes> {
    let limit = key.len().min(MAX_PATH_LEN);
    let end = key[..limit].iter().position(|&b| b == 0).unwrap_or(limit);
    (end > 0).then(|| Bytes::copy_from_slice(&key[..end]))
}
