//! Framer for the TCP connection to the engine.

use super::{read_message, write_frame};
use crate::codec::{Decoder, Encoder};
use crate::error::ProtocolError;
use crate::message::{Request, Response};
use crate::MAX_DATA_LEN;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Frames requests and responses on a reliable ordered stream.
///
/// Messages carry no marker. Any failure leaves the stream at an unknown
/// offset, so callers must treat every error as a broken connection.
pub struct TcpFramer<S> {
    stream: S,
    decoder: Decoder,
    read_timeout: Option<Duration>,
}

impl<S> TcpFramer<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: Decoder::new().with_max_data_len(MAX_DATA_LEN),
            read_timeout: None,
        }
    }

    /// Bounds every read with `timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_data_len(mut self, max: u32) -> Self {
        self.decoder = Decoder::new().with_max_data_len(max);
        self
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    pub async fn write_request(&mut self, request: &Request) -> Result<(), ProtocolError> {
        let frame = Encoder::encode_request(request)?;
        write_frame(&mut self.stream, &frame).await?;
        debug!(op = %request.operation, bytes = frame.len(), "TCP request sent");
        Ok(())
    }

    pub async fn read_response(&mut self) -> Result<Response, ProtocolError> {
        let response = read_message::<_, Response>(
            &mut self.stream,
            &mut self.decoder,
            self.read_timeout,
            false,
        )
        .await?;
        debug!(status = %response.status, data_len = response.data.len(), "TCP response received");
        Ok(response)
    }

    /// Sends a request and waits for its response.
    pub async fn exchange(&mut self, request: &Request) -> Result<Response, ProtocolError> {
        self.write_request(request).await?;
        self.read_response().await
    }

    /// Reads the next request. Used on the engine side of a connection.
    pub async fn read_request(&mut self) -> Result<Request, ProtocolError> {
        read_message::<_, Request>(&mut self.stream, &mut self.decoder, self.read_timeout, false)
            .await
    }

    pub async fn write_response(&mut self, response: &Response) -> Result<(), ProtocolError> {
        let frame = Encoder::encode_response(response)?;
        write_frame(&mut self.stream, &frame).await
    }
}
