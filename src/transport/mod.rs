//! # Transport Module
//!
//! Trait abstraction for the message-oriented session that carries frames
//! from the wattmeter, so the connection logic can be tested without a
//! network.
//!
//! This module handles:
//! - Validating the connection target URL
//! - Opening sessions against a target
//! - Reporting open, message, error and close events in arrival order
//! - A WebSocket implementation on top of `tokio-tungstenite`

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{MonitorError, Result};

pub mod websocket;

pub use websocket::WebSocketTransport;

/// Remote endpoint a connection is opened against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    url: String,
}

impl ConnectionTarget {
    /// Parse a `ws://` or `wss://` URL
    ///
    /// # Errors
    ///
    /// Returns `InvalidTarget` for other schemes or a missing host
    ///
    /// # Examples
    ///
    /// ```
    /// use wattmeter_monitor::transport::ConnectionTarget;
    ///
    /// let target = ConnectionTarget::parse("ws://192.168.1.46:8080/ws")?;
    /// assert_eq!(target.url(), "ws://192.168.1.46:8080/ws");
    /// assert!(ConnectionTarget::parse("http://meter").is_err());
    /// # Ok::<(), wattmeter_monitor::error::MonitorError>(())
    /// ```
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let rest = url
            .strip_prefix("ws://")
            .or_else(|| url.strip_prefix("wss://"))
            .ok_or_else(|| {
                MonitorError::InvalidTarget(format!("{} (expected ws:// or wss://)", url))
            })?;

        let host = rest.split(['/', '?']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(MonitorError::InvalidTarget(format!("{} (missing host)", url)));
        }

        Ok(Self { url: url.to_string() })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Session readiness, as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Event produced by a transport session
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Session established
    Opened,

    /// One inbound binary message; message boundaries are frame boundaries
    Message(Bytes),

    /// One inbound text message; the wattmeter only sends binary frames
    Text(String),

    /// Transport-level failure, with the transport's description
    Error(String),

    /// Session ended (peer close, failure, or local close)
    Closed,
}

/// Trait for an open (or opening) transport session
#[async_trait]
pub trait TransportSession: Send {
    /// Wait for the next event
    ///
    /// After `Closed` has been returned this never resolves.
    async fn next_event(&mut self) -> TransportEvent;

    /// Send a binary message to the peer
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Request shutdown of the session
    async fn close(&mut self) -> Result<()>;

    /// Current readiness of the session
    fn ready_state(&self) -> ReadyState;
}

/// Trait for creating sessions against a target
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    /// Start a session; establishment is reported through its events
    fn open(&self, target: &ConnectionTarget) -> Box<dyn TransportSession>;
}
