//! Gateway sessions.
//!
//! A session owns one serial link and at most one engine connection, and
//! relays one request at a time:
//!
//! 1. read a request from the link (resync + field reads)
//! 2. write it to the engine
//! 3. read the engine's response
//! 4. write the response to the link
//! 5. count the request as processed
//!
//! Operation and status codes pass through untouched. A failed iteration
//! never produces a reply on the link. Framing errors on the link cost one
//! iteration; an I/O error on the link ends the session.

use crate::connector::EngineConnector;
use crate::error::GatewayError;
use crate::server::GatewayStats;
use chrono::{DateTime, Utc};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;
use xtrieve_protocol::{ProtocolError, SerialFramer, SerialFramerConfig, TcpFramer};

/// Result of one relay iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// The response reached the link.
    Relayed,
    /// The link lost a frame; the engine connection is untouched.
    LinkAborted,
    /// The engine side failed; the connection has been re-established.
    EngineAborted,
    /// The link reached end of stream while waiting for a marker.
    LinkClosed,
}

/// One link relayed to one engine connection.
pub struct GatewaySession<L> {
    id: Uuid,
    started_at: DateTime<Utc>,
    link: SerialFramer<L>,
    connector: Arc<EngineConnector>,
    engine: Option<TcpFramer<TcpStream>>,
    processed: u64,
    stats: Arc<GatewayStats>,
}

impl<L> GatewaySession<L>
where
    L: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        link: L,
        config: SerialFramerConfig,
        connector: Arc<EngineConnector>,
        stats: Arc<GatewayStats>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            link: SerialFramer::new(link, config),
            connector,
            engine: None,
            processed: 0,
            stats,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Requests relayed end to end.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn is_engine_connected(&self) -> bool {
        self.engine.is_some()
    }

    /// Bytes skipped on the link while hunting for markers.
    pub fn discarded_bytes(&self) -> u64 {
        self.link.discarded_bytes()
    }

    /// Connects to the engine if not already connected.
    pub async fn connect(&mut self) -> Result<(), GatewayError> {
        self.engine().await.map(|_| ())
    }

    async fn engine(&mut self) -> Result<&mut TcpFramer<TcpStream>, GatewayError> {
        let framer = match self.engine.take() {
            Some(framer) => framer,
            None => self.connector.establish().await?,
        };
        Ok(self.engine.insert(framer))
    }

    /// Runs one relay iteration.
    ///
    /// Returns `Err` when the engine cannot be re-established or the link
    /// itself fails.
    pub async fn run_once(&mut self) -> Result<Iteration, GatewayError> {
        self.engine().await?;

        let request = match self.link.read_request().await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(Iteration::LinkClosed),
            Err(err) if err.is_framing() || matches!(err, ProtocolError::SyncTimeout(_)) => {
                warn!(session = %self.id, "Link read aborted: {}", err);
                self.stats.stream_aborts.fetch_add(1, Ordering::Relaxed);
                return Ok(Iteration::LinkAborted);
            }
            Err(err) => {
                warn!(session = %self.id, "Link read failed: {}", err);
                return Err(err.into());
            }
        };

        let exchange = self.engine().await?.exchange(&request).await;
        let response = match exchange {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    session = %self.id,
                    op = %request.operation,
                    "Engine exchange failed, no reply sent: {}", err
                );
                self.stats.engine_aborts.fetch_add(1, Ordering::Relaxed);
                self.engine = None;
                self.engine().await?;
                self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                info!(session = %self.id, "Reconnected to engine at {}", self.connector.addr());
                return Ok(Iteration::EngineAborted);
            }
        };

        if let Err(err) = self.link.write_response(&response).await {
            warn!(session = %self.id, "Link write failed: {}", err);
            return Err(err.into());
        }

        self.processed += 1;
        self.stats.requests_relayed.fetch_add(1, Ordering::Relaxed);
        debug!(
            session = %self.id,
            op = %request.operation,
            status = %response.status,
            "Relayed request #{}",
            self.processed
        );
        Ok(Iteration::Relayed)
    }

    /// Relays until the link closes or fails, the engine is lost for good,
    /// or a shutdown signal arrives.
    pub async fn run(
        &mut self,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let result = loop {
            tokio::select! {
                iteration = self.run_once() => match iteration {
                    Ok(Iteration::LinkClosed) => break Ok(()),
                    Ok(_) => {}
                    Err(err) => break Err(err),
                },
                _ = shutdown.recv() => break Err(GatewayError::ShuttingDown),
            }
        };

        let elapsed = Utc::now().signed_duration_since(self.started_at);
        info!(
            session = %self.id,
            processed = self.processed,
            discarded = self.discarded_bytes(),
            elapsed_secs = elapsed.num_seconds(),
            "Session ended"
        );
        result
    }
}
