//! # WebSocket Transport
//!
//! Connects to the wattmeter's WebSocket endpoint (`ws://<host>:<port>/ws`).
//!
//! The handshake runs inside the first [`TransportSession::next_event`] call,
//! so a session starts out `Connecting` and reports either `Opened` or an
//! `Error` followed by `Closed`, like a browser socket. Binary messages are
//! delivered as `Message`, text messages as `Text`. Ping, pong and close
//! control frames are answered by `tokio-tungstenite` and never surface as
//! events.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{ConnectionTarget, ReadyState, Transport, TransportEvent, TransportSession};
use crate::error::{MonitorError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens WebSocket sessions
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, target: &ConnectionTarget) -> Box<dyn TransportSession> {
        Box::new(WebSocketSession::new(target.url()))
    }
}

/// One WebSocket session against the wattmeter
pub struct WebSocketSession {
    /// Endpoint URL
    url: String,
    /// Socket, `None` until the handshake completes and after close
    stream: Option<WsStream>,
    state: ReadyState,
    /// Events owed to the caller before the socket is read again
    pending: VecDeque<TransportEvent>,
}

impl std::fmt::Debug for WebSocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketSession")
            .field("url", &self.url)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl WebSocketSession {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            stream: None,
            state: ReadyState::Connecting,
            pending: VecDeque::new(),
        }
    }

    async fn handshake(&mut self) -> TransportEvent {
        debug!(url = %self.url, "Opening WebSocket");

        match connect_async(self.url.as_str()).await {
            Ok((stream, _response)) => {
                info!(url = %self.url, "WebSocket connection established");
                self.stream = Some(stream);
                self.state = ReadyState::Open;
                TransportEvent::Opened
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "WebSocket handshake failed");
                self.state = ReadyState::Closed;
                self.pending.push_back(TransportEvent::Closed);
                TransportEvent::Error(e.to_string())
            }
        }
    }

    // Reads until a data message or the end of the session.
    async fn read_message(&mut self) -> TransportEvent {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                self.state = ReadyState::Closed;
                return TransportEvent::Closed;
            };

            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return TransportEvent::Message(Bytes::from(data)),
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Close frame received");
                    self.state = ReadyState::Closing;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    // Reported while still Open so the failure reads as a lost connection
                    warn!(url = %self.url, error = %e, "WebSocket read failed");
                    self.stream = None;
                    self.pending.push_back(TransportEvent::Closed);
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    info!(url = %self.url, "WebSocket closed");
                    self.stream = None;
                    self.state = ReadyState::Closed;
                    return TransportEvent::Closed;
                }
            }
        }
    }
}

#[async_trait]
impl TransportSession for WebSocketSession {
    async fn next_event(&mut self) -> TransportEvent {
        if let Some(event) = self.pending.pop_front() {
            if event == TransportEvent::Closed {
                self.state = ReadyState::Closed;
            }
            return event;
        }

        match self.state {
            ReadyState::Connecting => self.handshake().await,
            ReadyState::Open | ReadyState::Closing => self.read_message().await,
            ReadyState::Closed => std::future::pending().await,
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            MonitorError::Transport(format!("Cannot send on {:?} WebSocket", self.state))
        })?;

        stream
            .send(Message::Binary(data.to_vec()))
            .await
            .map_err(|e| MonitorError::Transport(format!("Failed to send message: {}", e)))?;

        debug!("Sent WebSocket message ({} bytes)", data.len());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.pending.clear();

        let Some(mut stream) = self.stream.take() else {
            self.state = ReadyState::Closed;
            return Ok(());
        };

        self.state = ReadyState::Closing;
        let result = stream.close(None).await;
        self.state = ReadyState::Closed;

        result.map_err(|e| MonitorError::Transport(format!("Failed to close WebSocket: {}", e)))?;
        info!(url = %self.url, "WebSocket closed locally");
        Ok(())
    }

    fn ready_state(&self) -> ReadyState {
        self.state
    }
}
