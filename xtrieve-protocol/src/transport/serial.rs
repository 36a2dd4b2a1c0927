//! Framer for the serial link between legacy clients and the gateway.

use super::{fill, read_message, write_frame};
use crate::codec::{Decoder, Encoder};
use crate::error::ProtocolError;
use crate::frame::SyncScanner;
use crate::message::{Request, Response};
use crate::{MAX_DATA_LEN, POSITION_BLOCK_SIZE};
use bytes::Buf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Request bytes up to and including `data_len`, the field the size
/// ceiling is checked against.
const REQUEST_HEADER_LEN: usize = 2 + POSITION_BLOCK_SIZE + 4;

/// Timing and size limits for a serial link.
#[derive(Debug, Clone)]
pub struct SerialFramerConfig {
    /// Longest wait for the next byte once a frame has started.
    pub byte_timeout: Duration,
    /// Longest wait for a sync marker. `None` waits forever.
    pub sync_timeout: Option<Duration>,
    /// Ceiling on a decoded `data_len`.
    pub max_data_len: u32,
}

impl Default for SerialFramerConfig {
    fn default() -> Self {
        Self {
            byte_timeout: Duration::from_secs(1),
            sync_timeout: None,
            max_data_len: MAX_DATA_LEN,
        }
    }
}

impl SerialFramerConfig {
    pub fn with_byte_timeout(mut self, timeout: Duration) -> Self {
        self.byte_timeout = timeout;
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }

    pub fn with_max_data_len(mut self, max: u32) -> Self {
        self.max_data_len = max;
        self
    }
}

/// Frames requests and responses on a lossy byte stream.
///
/// The gateway end calls [`read_request`](Self::read_request) and
/// [`write_response`](Self::write_response); the client end calls
/// [`write_request`](Self::write_request) and
/// [`read_response`](Self::read_response).
pub struct SerialFramer<S> {
    stream: S,
    decoder: Decoder,
    scanner: SyncScanner,
    config: SerialFramerConfig,
}

impl<S> SerialFramer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: SerialFramerConfig) -> Self {
        let decoder = Decoder::new().with_max_data_len(config.max_data_len);
        Self {
            stream,
            decoder,
            scanner: SyncScanner::new(),
            config,
        }
    }

    pub fn config(&self) -> &SerialFramerConfig {
        &self.config
    }

    /// Total bytes discarded while hunting for sync markers.
    pub fn discarded_bytes(&self) -> u64 {
        self.scanner.discarded()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Waits for a sync marker, then reads one request.
    ///
    /// A frame that times out or ends early is discarded whole. A frame
    /// over the size ceiling loses only its header; whatever followed it is
    /// kept for the next call to scan.
    pub async fn read_request(&mut self) -> Result<Request, ProtocolError> {
        self.wait_for_sync().await?;

        let limit = Some(self.config.byte_timeout);
        match read_message::<_, Request>(&mut self.stream, &mut self.decoder, limit, true).await {
            Ok(request) => {
                debug!(
                    op = %request.operation,
                    data_len = request.data.len(),
                    key_len = request.key.len(),
                    "Serial request received"
                );
                Ok(request)
            }
            Err(err @ ProtocolError::LengthExceeded { .. }) => {
                let rejected = REQUEST_HEADER_LEN.min(self.decoder.buffered());
                debug!(
                    rejected,
                    kept = self.decoder.buffered() - rejected,
                    "Rejecting oversized frame: {}", err
                );
                self.decoder.buffer_mut().advance(rejected);
                Err(err)
            }
            Err(err) => {
                debug!(
                    buffered = self.decoder.buffered(),
                    "Discarding partial frame: {}", err
                );
                self.decoder.clear();
                Err(err)
            }
        }
    }

    /// Writes a response. Responses carry no marker.
    pub async fn write_response(&mut self, response: &Response) -> Result<(), ProtocolError> {
        let frame = Encoder::encode_response(response)?;
        write_frame(&mut self.stream, &frame).await?;
        debug!(status = %response.status, bytes = frame.len(), "Serial response sent");
        Ok(())
    }

    /// Writes a request preceded by the sync marker.
    pub async fn write_request(&mut self, request: &Request) -> Result<(), ProtocolError> {
        let frame = Encoder::encode_marked_request(request)?;
        write_frame(&mut self.stream, &frame).await?;
        debug!(op = %request.operation, bytes = frame.len(), "Serial request sent");
        Ok(())
    }

    /// Reads one response, each read bounded by the byte timeout.
    pub async fn read_response(&mut self) -> Result<Response, ProtocolError> {
        let limit = Some(self.config.byte_timeout);
        let result =
            read_message::<_, Response>(&mut self.stream, &mut self.decoder, limit, true).await;
        if result.is_err() {
            self.decoder.clear();
        }
        result
    }

    async fn wait_for_sync(&mut self) -> Result<(), ProtocolError> {
        let deadline = self.config.sync_timeout.map(|t| (Instant::now() + t, t));
        let before = self.scanner.discarded();

        loop {
            let buffer = self.decoder.buffer_mut();
            if let Some(end) = self.scanner.scan(buffer) {
                buffer.advance(end);
                let skipped = self.scanner.discarded() - before;
                if skipped > 0 {
                    warn!(skipped, "Resynchronized after discarding garbage");
                }
                return Ok(());
            }
            buffer.clear();

            let read = fill(&mut self.stream, &mut self.decoder, None);
            let n = match deadline {
                Some((deadline, timeout)) => tokio::time::timeout_at(deadline, read)
                    .await
                    .map_err(|_| ProtocolError::SyncTimeout(timeout))??,
                None => read.await?,
            };
            if n == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
        }
    }
}
