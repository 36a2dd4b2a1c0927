//! Framers binding the codec to tokio byte streams.
//!
//! - [`SerialFramer`]: lossy serial link, requests carry a sync marker and
//!   every read is bounded by a per-byte timeout.
//! - [`TcpFramer`]: reliable connection, no marker, any short read is a
//!   broken connection.

mod serial;
mod tcp;

pub use serial::{SerialFramer, SerialFramerConfig};
pub use tcp::TcpFramer;

use crate::codec::{Decoder, Frameable};
use crate::error::ProtocolError;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads from `stream` into the decoder's buffer, bounded by `limit`.
///
/// Returns the number of bytes read; zero means end of stream.
async fn fill<S>(
    stream: &mut S,
    decoder: &mut Decoder,
    limit: Option<Duration>,
) -> Result<usize, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let read = stream.read_buf(decoder.buffer_mut());
    let n = match limit {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| ProtocolError::Timeout(limit))??,
        None => read.await?,
    };
    Ok(n)
}

/// Reads until one complete `M` is buffered.
///
/// `in_frame` tells whether the frame has already started (a marker was
/// consumed), in which case end of stream is a truncation rather than a
/// clean close.
async fn read_message<S, M>(
    stream: &mut S,
    decoder: &mut Decoder,
    limit: Option<Duration>,
    in_frame: bool,
) -> Result<M, ProtocolError>
where
    S: AsyncRead + Unpin,
    M: Frameable,
{
    loop {
        if let Some(message) = decoder.decode::<M>()? {
            return Ok(message);
        }
        if fill(stream, decoder, limit).await? == 0 {
            if !in_frame && decoder.buffered() == 0 {
                return Err(ProtocolError::ConnectionClosed);
            }
            return Err(decoder.truncation::<M>());
        }
    }
}

async fn write_frame<S>(stream: &mut S, frame: &[u8]) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(frame).await?;
    stream.flush().await?;
    Ok(())
}
