//! Engine connection establishment with the reconnect policy.

use crate::config::{Config, ReconnectConfig};
use crate::error::GatewayError;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, error, warn};
use xtrieve_protocol::TcpFramer;

/// Opens framed connections to the engine.
#[derive(Debug, Clone)]
pub struct EngineConnector {
    addr: String,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
    max_data_len: u32,
    policy: ReconnectConfig,
}

impl EngineConnector {
    pub fn new(addr: impl Into<String>, policy: ReconnectConfig) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: None,
            max_data_len: xtrieve_protocol::MAX_DATA_LEN,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.engine.addr.clone(), config.reconnect.clone())
            .with_connect_timeout(config.engine.connect_timeout())
            .with_read_timeout(config.engine.read_timeout())
            .with_max_data_len(config.engine.max_data_len)
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

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn policy(&self) -> &ReconnectConfig {
        &self.policy
    }

    /// Makes a single connection attempt.
    pub async fn connect(&self) -> Result<TcpFramer<TcpStream>, GatewayError> {
        let connect = TcpStream::connect(self.addr.as_str());
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(GatewayError::Connect {
                    addr: self.addr.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(GatewayError::Connect {
                    addr: self.addr.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "connect timed out",
                    ),
                })
            }
        };
        stream.set_nodelay(true).ok();
        debug!("Connected to engine at {}", self.addr);

        Ok(TcpFramer::new(stream)
            .with_read_timeout(self.read_timeout)
            .with_max_data_len(self.max_data_len))
    }

    /// Connects, retrying with backoff until the policy runs out.
    ///
    /// Running out is unrecoverable for the caller.
    pub async fn establish(&self) -> Result<TcpFramer<TcpStream>, GatewayError> {
        let mut failed = 0u32;
        loop {
            match self.connect().await {
                Ok(framer) => return Ok(framer),
                Err(err) => {
                    failed += 1;
                    if !self.policy.allows(failed) {
                        error!(
                            "Giving up on engine at {} after {} attempt(s): {}",
                            self.addr, failed, err
                        );
                        return Err(GatewayError::Unrecoverable {
                            addr: self.addr.clone(),
                            attempts: failed,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = self.policy.backoff(failed);
                    warn!(
                        attempt = failed,
                        delay_ms = delay.as_millis() as u64,
                        "Engine connection failed: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
