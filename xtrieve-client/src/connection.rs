//! Connection management.

use crate::error::ClientError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use xtrieve_protocol::{ProtocolError, Request, Response, TcpFramer, MAX_DATA_LEN};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Bound on each read while waiting for a response. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Ceiling on the data length of a response.
    pub max_data_len: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
            max_data_len: MAX_DATA_LEN,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_max_data_len(mut self, max: u32) -> Self {
        self.max_data_len = max;
        self
    }
}

/// A connection to an xtrieve engine.
///
/// One request is outstanding at a time; `execute` takes `&mut self`.
pub struct Connection {
    config: ConnectionConfig,
    host: String,
    port: u16,
    peer: SocketAddr,
    framer: Option<TcpFramer<TcpStream>>,
    last_error: Option<String>,
    requests: u64,
}

impl Connection {
    /// Resolves `host` and connects with the default configuration.
    pub async fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        Self::connect_with(host, port, ConnectionConfig::default()).await
    }

    pub async fn connect_with(
        host: &str,
        port: u16,
        config: ConnectionConfig,
    ) -> Result<Self, ClientError> {
        let (peer, framer) = open(host, port, &config).await?;
        Ok(Self {
            config,
            host: host.to_string(),
            port,
            peer,
            framer: Some(framer),
            last_error: None,
            requests: 0,
        })
    }

    /// Sends one request and waits for its response.
    ///
    /// Any transport failure closes the connection; later calls fail with
    /// [`ClientError::NotConnected`] until [`reconnect`](Self::reconnect).
    pub async fn execute(&mut self, request: &Request) -> Result<Response, ClientError> {
        request.check_lengths().map_err(ClientError::InvalidRequest)?;
        let framer = self.framer.as_mut().ok_or(ClientError::NotConnected)?;

        tracing::debug!("Sending {} to {}", request.operation, self.peer);
        match framer.exchange(request).await {
            Ok(response) => {
                self.requests += 1;
                tracing::debug!("{} returned {}", request.operation, response.status);
                Ok(response)
            }
            Err(err) => {
                self.mark_broken(&err);
                Err(ClientError::Transport(err))
            }
        }
    }

    fn mark_broken(&mut self, err: &ProtocolError) {
        tracing::warn!("Connection to {} failed: {}", self.peer, err);
        self.last_error = Some(err.to_string());
        self.framer = None;
    }

    /// Closes the connection. Calling this on a closed connection is a no-op.
    pub async fn disconnect(&mut self) {
        if let Some(framer) = self.framer.take() {
            tracing::debug!("Closing connection to {}", self.peer);
            let mut stream = framer.into_inner();
            let _ = stream.shutdown().await;
        }
    }

    /// Drops any current connection and connects again to the same host.
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        self.disconnect().await;
        match open(&self.host, self.port, &self.config).await {
            Ok((peer, framer)) => {
                self.peer = peer;
                self.framer = Some(framer);
                Ok(())
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.framer.is_some()
    }

    /// Text of the most recent transport failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Number of completed exchanges.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}

async fn open(
    host: &str,
    port: u16,
    config: &ConnectionConfig,
) -> Result<(SocketAddr, TcpFramer<TcpStream>), ClientError> {
    tracing::debug!("Connecting to {}:{}...", host, port);

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|source| ClientError::Resolution {
            host: host.to_string(),
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(ClientError::Resolution {
            host: host.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        });
    }

    let mut last_err = None;
    for addr in addrs {
        match tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true).ok();
                tracing::debug!("Connected to {}", addr);
                let framer = TcpFramer::new(stream)
                    .with_max_data_len(config.max_data_len)
                    .with_read_timeout(config.read_timeout);
                return Ok((addr, framer));
            }
            Ok(Err(e)) => {
                tracing::debug!("Connection to {} failed: {}", addr, e);
                last_err = Some((addr, e));
            }
            Err(_) => {
                tracing::debug!("Connection to {} timed out", addr);
                let e = io::Error::new(io::ErrorKind::TimedOut, "connect timed out");
                last_err = Some((addr, e));
            }
        }
    }

    let (addr, source) = last_err.unwrap_or_else(|| {
        (
            SocketAddr::from(([0, 0, 0, 0], port)),
            io::Error::new(io::ErrorKind::NotFound, "no addresses"),
        )
    });
    Err(ClientError::Connect {
        addr: addr.to_string(),
        source,
    })
}
