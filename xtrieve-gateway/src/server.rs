//! Link listener.
//!
//! The physical link is an emulated null-modem line: the emulator dials this
//! listener and every accepted connection becomes one [`GatewaySession`].

use crate::config::Config;
use crate::connector::EngineConnector;
use crate::error::GatewayError;
use crate::session::GatewaySession;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Gateway statistics, shared by all sessions. Reporting only.
#[derive(Debug, Default)]
pub struct GatewayStats {
    pub links_total: AtomicU64,
    pub links_active: AtomicU64,
    pub requests_relayed: AtomicU64,
    pub stream_aborts: AtomicU64,
    pub engine_aborts: AtomicU64,
    pub reconnects: AtomicU64,
}

impl GatewayStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            links_total: self.links_total.load(Ordering::Relaxed),
            links_active: self.links_active.load(Ordering::Relaxed),
            requests_relayed: self.requests_relayed.load(Ordering::Relaxed),
            stream_aborts: self.stream_aborts.load(Ordering::Relaxed),
            engine_aborts: self.engine_aborts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GatewayStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub links_total: u64,
    pub links_active: u64,
    pub requests_relayed: u64,
    pub stream_aborts: u64,
    pub engine_aborts: u64,
    pub reconnects: u64,
}

/// A live link.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub peer: SocketAddr,
    pub connected_at: DateTime<Utc>,
}

/// Accepts links and relays each to the engine.
pub struct Gateway {
    config: Config,
    connector: Arc<EngineConnector>,
    stats: Arc<GatewayStats>,
    links: Arc<DashMap<Uuid, LinkInfo>>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Gateway {
    pub fn new(config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let connector = Arc::new(EngineConnector::from_config(&config));
        Self {
            config,
            connector,
            stats: Arc::new(GatewayStats::default()),
            links: Arc::new(DashMap::new()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured link address and serves until shutdown.
    pub async fn run(&self) -> Result<(), GatewayError> {
        let listener = TcpListener::bind(self.config.link.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serves links from an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            "Gateway listening on {} (engine {})",
            listener.local_addr()?,
            self.connector.addr()
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.accept(stream, addr),
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Gateway shutting down");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        if self.stats.links_active.load(Ordering::Relaxed) >= self.config.link.max_links as u64 {
            tracing::warn!("Link limit reached, rejecting {}", addr);
            return;
        }

        self.stats.links_total.fetch_add(1, Ordering::Relaxed);
        self.stats.links_active.fetch_add(1, Ordering::Relaxed);
        stream.set_nodelay(true).ok();

        let mut session = GatewaySession::new(
            stream,
            self.config.framer_config(),
            self.connector.clone(),
            self.stats.clone(),
        );
        let id = session.id();
        self.links.insert(
            id,
            LinkInfo {
                peer: addr,
                connected_at: session.started_at(),
            },
        );
        tracing::info!(session = %id, "Link connected: {}", addr);

        let stats = self.stats.clone();
        let links = self.links.clone();
        let mut link_shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            match session.run(&mut link_shutdown).await {
                Ok(()) | Err(GatewayError::ShuttingDown) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!(session = %id, "Session stopped: {}", e);
                }
                Err(e) => {
                    tracing::warn!(session = %id, "Link failed: {}", e);
                }
            }

            links.remove(&id);
            stats.links_active.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(session = %id, "Link disconnected: {}", addr);
        });
    }

    /// Initiates gateway shutdown. Running sessions stop at their next
    /// suspension point.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &GatewayStats {
        &self.stats
    }

    /// Live links, keyed by session id.
    pub fn links(&self) -> Vec<(Uuid, LinkInfo)> {
        self.links
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use xtrieve_protocol::{
        Encoder, Operation, Request, Response, SerialFramer, SerialFramerConfig, StatusCode,
        TcpFramer,
    };

    async fn spawn_engine() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut framer = TcpFramer::new(stream);
                    while let Ok(request) = framer.read_request().await {
                        let status = match request.operation {
                            Operation::GetEqual => StatusCode::KeyNotFound,
                            _ => StatusCode::Success,
                        };
                        let response = Response::new(status).with_data(request.data.clone());
                        if framer.write_response(&response).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    async fn start_gateway(config: Config) -> (Arc<Gateway>, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let gateway = Arc::new(Gateway::new(config));
        let serving = gateway.clone();
        tokio::spawn(async move { serving.serve(listener).await });
        (gateway, addr)
    }

    fn test_config(engine_addr: String) -> Config {
        let mut config = Config::default();
        config.engine.addr = engine_addr;
        config.link.byte_timeout_ms = 200;
        config
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_gateway_relays_link() {
        let engine = spawn_engine().await;
        let (gateway, addr) = start_gateway(test_config(engine)).await;

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut link = SerialFramer::new(stream, SerialFramerConfig::default());

        link.write_request(&Request::new(Operation::Insert).with_data(&b"abc"[..]))
            .await
            .unwrap();
        let response = link.read_response().await.unwrap();
        assert_eq!(response.status, StatusCode::Success);
        assert_eq!(response.data.as_ref(), b"abc");

        // Status codes pass through untouched.
        link.write_request(&Request::new(Operation::GetEqual).with_key(&b"k"[..]))
            .await
            .unwrap();
        let response = link.read_response().await.unwrap();
        assert_eq!(response.status, StatusCode::KeyNotFound);

        assert!(gateway.is_running());
        assert_eq!(gateway.links().len(), 1);
        let stats = gateway.stats().snapshot();
        assert_eq!(stats.links_total, 1);
        assert_eq!(stats.requests_relayed, 2);

        drop(link);
        wait_for(|| gateway.stats().snapshot().links_active == 0).await;
        assert!(gateway.links().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_link_limit() {
        let engine = spawn_engine().await;
        let mut config = test_config(engine);
        config.link.max_links = 1;
        let (gateway, addr) = start_gateway(config).await;

        let _first = TcpStream::connect(addr).await.unwrap();
        wait_for(|| gateway.stats().snapshot().links_active == 1).await;

        // The second link is accepted by the OS and dropped at once.
        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        let read = tokio::io::AsyncReadExt::read(&mut second, &mut buf).await;
        assert!(matches!(read, Ok(0) | Err(_)));
        assert_eq!(gateway.stats().snapshot().links_total, 1);
    }

    #[tokio::test]
    async fn test_gateway_shutdown() {
        let engine = spawn_engine().await;
        let (gateway, addr) = start_gateway(test_config(engine)).await;

        let mut link = TcpStream::connect(addr).await.unwrap();
        wait_for(|| gateway.stats().snapshot().links_active == 1).await;

        gateway.shutdown();
        wait_for(|| !gateway.is_running()).await;
        wait_for(|| gateway.stats().snapshot().links_active == 0).await;

        // The session dropped its end of the link.
        let frame = Encoder::encode_marked_request(&Request::new(Operation::Stat)).unwrap();
        let _ = link.write_all(&frame).await;
        let mut buf = [0u8; 1];
        let read = tokio::io::AsyncReadExt::read(&mut link, &mut buf).await;
        assert!(matches!(read, Ok(0) | Err(_)));
    }

    #[tokio::test]
    async fn test_unreachable_engine_ends_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let engine = listener.local_addr().unwrap().to_string();
        drop(listener);
        let (gateway, addr) = start_gateway(test_config(engine)).await;

        let _link = TcpStream::connect(addr).await.unwrap();
        wait_for(|| gateway.stats().snapshot().links_total == 1).await;
        wait_for(|| gateway.stats().snapshot().links_active == 0).await;
        assert!(gateway.is_running());
    }
}
