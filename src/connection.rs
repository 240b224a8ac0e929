//! # Telemetry Connection
//!
//! Owns one transport session at a time and turns its events into consumer
//! events.
//!
//! ```text
//! Idle ──open()──▶ Connecting ──Opened──▶ Connected
//!                      │                      │
//!                      └──── Closed / close() ┴──▶ Closed ──open()──▶ Connecting
//! ```
//!
//! Each session runs on its own tokio task. Frames are decoded, scaled and
//! appended on that task strictly in arrival order, and the resulting window
//! is sent to the consumer over an unbounded channel. Every accepted `open()`
//! ends with exactly one `ConnectionChanged(false)`.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ConnectionPhase, MonitorError, Result};
use crate::protocol::wire::WireFormat;
use crate::samples::{SamplePipeline, SampleWindow};
use crate::transport::{ConnectionTarget, ReadyState, Transport, TransportEvent, TransportSession};

/// Lifecycle state of a [`TelemetryConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Event delivered to the consumer of a connection
#[derive(Debug)]
pub enum ConnectionEvent {
    /// `true` once the session is established, `false` when it ends
    ConnectionChanged(bool),

    /// Full sample window after a frame was processed
    Samples(SampleWindow),

    /// Decode or connection failure
    Error(MonitorError),
}

/// Receiving half of a connection's event channel
///
/// Unbounded: every `Samples` event owns a copy of the whole window, so a
/// consumer that stops reading grows the queue by one window per frame.
pub type EventReceiver = mpsc::UnboundedReceiver<ConnectionEvent>;

/// Connection to a wattmeter, driving frames into a rolling sample window
pub struct TelemetryConnection {
    format: WireFormat,
    capacity: usize,
    state: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for TelemetryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryConnection")
            .field("format", &self.format)
            .field("capacity", &self.capacity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl TelemetryConnection {
    /// Create an idle connection
    ///
    /// # Arguments
    ///
    /// * `format` - Wire format the device sends
    /// * `capacity` - Size of the rolling sample window
    pub fn new(format: WireFormat, capacity: usize) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            format,
            capacity,
            state: Arc::new(state),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Create an idle connection from the `[connection]` and `[buffer]` sections
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.connection.wire_format, config.buffer.capacity)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Open a session against `target`
    ///
    /// Allowed from `Idle`, and from `Closed` to re-open. Each session starts
    /// with an empty sample window. Must be called within a tokio runtime.
    ///
    /// # Returns
    ///
    /// * `Result<EventReceiver>` - Channel carrying this session's events
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a session is connecting or connected
    pub fn open(
        &mut self,
        transport: &dyn Transport,
        target: ConnectionTarget,
    ) -> Result<EventReceiver> {
        let current = self.state();
        if !matches!(current, ConnectionState::Idle | ConnectionState::Closed) {
            return Err(MonitorError::InvalidState(format!(
                "cannot open a {} connection",
                current
            )));
        }

        info!(url = %target, format = ?self.format, capacity = self.capacity, "Opening telemetry connection");

        // A closed session's task has already emitted its last event
        self.task.take();
        self.state.send_replace(ConnectionState::Connecting);

        let (events, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.cancel = cancel.clone();

        let session = transport.open(&target);
        let driver = SessionDriver {
            target,
            session,
            pipeline: SamplePipeline::new(self.format, self.capacity),
            events,
            state: Arc::clone(&self.state),
            opened: false,
            frames: 0,
            decode_errors: 0,
        };
        self.task = Some(tokio::spawn(driver.run(cancel)));

        Ok(receiver)
    }

    /// Close the current session
    ///
    /// No-op when idle or already closed. Otherwise shuts the transport down
    /// and waits for the session task, so no event is emitted after this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns `Transport` if the session task panicked
    pub async fn close(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        if self.state() != ConnectionState::Closed {
            debug!(state = %self.state(), "Closing telemetry connection");
        }
        self.cancel.cancel();

        task.await
            .map_err(|e| MonitorError::Transport(format!("Session task failed: {}", e)))
    }
}

impl Drop for TelemetryConnection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Per-session state owned by the session task
struct SessionDriver {
    target: ConnectionTarget,
    session: Box<dyn TransportSession>,
    pipeline: SamplePipeline,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    /// Whether `Opened` was seen
    opened: bool,
    frames: u64,
    decode_errors: u64,
}

impl SessionDriver {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                event = self.session.next_event() => Some(event),
            };

            let Some(event) = event else {
                self.shutdown().await;
                return;
            };

            if !self.handle(event).await {
                return;
            }
        }
    }

    /// Returns `false` once the session has ended
    async fn handle(&mut self, event: TransportEvent) -> bool {
        let delivered = match event {
            TransportEvent::Opened => {
                if self.current() != ConnectionState::Connecting {
                    debug!("Ignoring repeated open event");
                    return true;
                }
                self.opened = true;
                self.state.send_replace(ConnectionState::Connected);
                info!(url = %self.target, "Telemetry connection established");
                self.emit(ConnectionEvent::ConnectionChanged(true))
            }
            TransportEvent::Message(frame) => {
                if self.current() != ConnectionState::Connected {
                    debug!(len = frame.len(), state = %self.current(), "Ignoring frame outside connected state");
                    return true;
                }
                self.frames += 1;
                match self.pipeline.ingest(&frame) {
                    Ok(window) => {
                        debug!(frame = self.frames, appended = window.appended, window = window.len(), "Frame processed");
                        self.emit(ConnectionEvent::Samples(window))
                    }
                    Err(e) => {
                        self.decode_errors += 1;
                        warn!(frame = self.frames, len = frame.len(), error = %e, "Discarding malformed frame");
                        self.emit(ConnectionEvent::Error(e))
                    }
                }
            }
            TransportEvent::Text(text) => {
                if self.current() != ConnectionState::Connected {
                    debug!(len = text.len(), state = %self.current(), "Ignoring text outside connected state");
                    return true;
                }
                self.frames += 1;
                self.decode_errors += 1;
                let e = MonitorError::UnexpectedText { len: text.len() };
                warn!(frame = self.frames, error = %e, "Discarding text message");
                self.emit(ConnectionEvent::Error(e))
            }
            TransportEvent::Error(description) => {
                let phase = self.phase();
                let e = MonitorError::connection(phase, self.target.url(), &description);
                error!(url = %self.target, %phase, "{}", e);
                self.emit(ConnectionEvent::Error(e))
            }
            TransportEvent::Closed => {
                self.finish();
                return false;
            }
        };

        if !delivered {
            debug!("Event receiver dropped, closing session");
            self.shutdown().await;
            return false;
        }
        true
    }

    fn phase(&self) -> ConnectionPhase {
        match self.session.ready_state() {
            ReadyState::Connecting => ConnectionPhase::Establishing,
            ReadyState::Closed if !self.opened => ConnectionPhase::Establishing,
            _ => ConnectionPhase::Lost,
        }
    }

    async fn shutdown(&mut self) {
        if let Err(e) = self.session.close().await {
            warn!(url = %self.target, error = %e, "Transport did not close cleanly");
            self.emit(ConnectionEvent::Error(e));
        }
        self.finish();
    }

    fn finish(&mut self) {
        self.state.send_replace(ConnectionState::Closed);
        info!(
            url = %self.target,
            frames = self.frames,
            decode_errors = self.decode_errors,
            "Telemetry connection closed"
        );
        self.emit(ConnectionEvent::ConnectionChanged(false));
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn emit(&self, event: ConnectionEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::protocol::encoder::{encode_frame, encode_legacy_frame};
    use crate::protocol::wire::{RawSample, SamplesPackage};
    use crate::samples::PhysicalSample;
    use crate::transport::mocks::MockSession;
    use crate::transport::MockTransport;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::mpsc::error::TryRecvError;

    fn target() -> ConnectionTarget {
        ConnectionTarget::parse("ws://meter.local/ws").unwrap()
    }

    fn transport_with(session: MockSession) -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_open()
            .times(1)
            .return_once(move |_| Box::new(session) as Box<dyn TransportSession>);
        transport
    }

    fn frame(voltage: i16, current: i16) -> TransportEvent {
        let package = SamplesPackage::filled(0, 1.0, 1.0, RawSample { voltage, current });
        TransportEvent::Message(Bytes::from(encode_frame(&[package; 3])))
    }

    async fn next(rx: &mut EventReceiver) -> ConnectionEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ConnectionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_zero_frame_end_to_end() {
        let zero = SamplesPackage::filled(42, 1.0, 2.0, RawSample::default());
        let other = SamplesPackage::filled(43, 3.0, 4.0, RawSample::default());
        let message = TransportEvent::Message(Bytes::from(encode_frame(&[zero, other, other])));
        let session = MockSession::new(vec![TransportEvent::Opened, message]);
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();

        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        assert_eq!(connection.state(), ConnectionState::Connected);

        match next(&mut rx).await {
            ConnectionEvent::Samples(window) => {
                assert_eq!(window.len(), 192);
                assert_eq!(window.appended, 192);
                assert!(window.samples[..64]
                    .iter()
                    .all(|s| *s == PhysicalSample::new(0.0, 0.0)));
            }
            other => panic!("Expected Samples, got: {:?}", other),
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_decode_error_does_not_end_session() {
        let session = MockSession::new(vec![
            TransportEvent::Opened,
            TransportEvent::Message(Bytes::from(vec![0u8; 100])),
            frame(3, -3),
        ]);
        let transport = transport_with(session.clone());

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();

        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        match next(&mut rx).await {
            ConnectionEvent::Error(e) => {
                assert!(matches!(e, MonitorError::FrameTooShort { actual: 100, .. }));
                assert_eq!(e.kind(), ErrorKind::Decode);
            }
            other => panic!("Expected Error, got: {:?}", other),
        }
        match next(&mut rx).await {
            ConnectionEvent::Samples(window) => {
                assert_eq!(window.len(), 192);
                assert!(window.samples.iter().all(|s| *s == PhysicalSample::new(3.0, -3.0)));
            }
            other => panic!("Expected Samples, got: {:?}", other),
        }
        assert!(drain(&mut rx).is_empty());
        assert_eq!(connection.state(), ConnectionState::Connected);
        assert_eq!(session.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_close_twice_reports_disconnect_once() {
        let session = MockSession::new(vec![TransportEvent::Opened]);
        let transport = transport_with(session.clone());

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));

        tokio_test::assert_ok!(connection.close().await);
        tokio_test::assert_ok!(connection.close().await);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ConnectionEvent::ConnectionChanged(false)));
        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(session.close_calls(), 1);
        // Task finished, sender dropped
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[tokio::test]
    async fn test_close_when_idle_is_noop() {
        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        tokio_test::assert_ok!(connection.close().await);
        assert_eq!(connection.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_peer_close() {
        let session = MockSession::new(vec![TransportEvent::Opened, TransportEvent::Closed]);
        let transport = transport_with(session.clone());

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();

        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(false)));
        assert!(rx.recv().await.is_none());
        assert_eq!(connection.state(), ConnectionState::Closed);

        tokio_test::assert_ok!(connection.close().await);
        assert_eq!(session.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_while_establishing() {
        let session = MockSession::new(vec![
            TransportEvent::Error("connection refused".into()),
            TransportEvent::Closed,
        ]);
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();

        match next(&mut rx).await {
            ConnectionEvent::Error(MonitorError::Connection { phase, message }) => {
                assert_eq!(phase, ConnectionPhase::Establishing);
                assert!(message.contains("ws://meter.local/ws"));
                assert!(message.contains("connection refused"));
            }
            other => panic!("Expected connection error, got: {:?}", other),
        }
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(false)));
        assert!(rx.recv().await.is_none());
        assert_eq!(connection.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_failure_after_establishment() {
        let session = MockSession::new(vec![
            TransportEvent::Opened,
            TransportEvent::Error("connection reset".into()),
            TransportEvent::Closed,
        ]);
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();

        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        match next(&mut rx).await {
            ConnectionEvent::Error(e) => {
                assert!(matches!(e, MonitorError::Connection { phase: ConnectionPhase::Lost, .. }));
                assert!(!e.is_recoverable());
            }
            other => panic!("Expected connection error, got: {:?}", other),
        }
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(false)));
    }

    #[tokio::test]
    async fn test_close_while_connecting() {
        let session = MockSession::new(vec![]);
        let transport = transport_with(session.clone());

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();
        assert_eq!(connection.state(), ConnectionState::Connecting);

        tokio_test::assert_ok!(connection.close().await);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ConnectionEvent::ConnectionChanged(false)));
        assert_eq!(session.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_open_twice_is_rejected() {
        let transport = transport_with(MockSession::new(vec![]));
        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let _rx = connection.open(&transport, target()).unwrap();

        let unused = MockTransport::new();
        match connection.open(&unused, target()) {
            Err(e) => {
                assert!(matches!(e, MonitorError::InvalidState(_)));
                assert_eq!(e.kind(), ErrorKind::Usage);
            }
            Ok(_) => panic!("Expected InvalidState"),
        }
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_reopen_starts_with_empty_window() {
        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);

        let first = transport_with(MockSession::new(vec![TransportEvent::Opened, frame(1, 1)]));
        let mut rx = connection.open(&first, target()).unwrap();
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        assert!(matches!(next(&mut rx).await, ConnectionEvent::Samples(_)));
        connection.close().await.unwrap();

        let second = transport_with(MockSession::new(vec![TransportEvent::Opened, frame(2, 2)]));
        let mut rx = connection.open(&second, target()).unwrap();
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        match next(&mut rx).await {
            ConnectionEvent::Samples(window) => {
                assert_eq!(window.len(), 192);
                assert!(window.samples.iter().all(|s| s.voltage == 2.0));
            }
            other => panic!("Expected Samples, got: {:?}", other),
        }
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_frames_before_open_are_ignored() {
        let session = MockSession::new(vec![frame(9, 9), TransportEvent::Opened, frame(1, 1)]);
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();

        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        match next(&mut rx).await {
            ConnectionEvent::Samples(window) => {
                assert_eq!(window.len(), 192);
                assert!(window.samples.iter().all(|s| s.voltage == 1.0));
            }
            other => panic!("Expected Samples, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_window_is_bounded_across_frames() {
        let session = MockSession::new(vec![
            TransportEvent::Opened,
            frame(1, 1),
            frame(2, 2),
            frame(3, 3),
        ]);
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 400);
        let mut rx = connection.open(&transport, target()).unwrap();
        next(&mut rx).await;

        let mut lengths = Vec::new();
        let mut last = None;
        for _ in 0..3 {
            if let ConnectionEvent::Samples(window) = next(&mut rx).await {
                lengths.push(window.len());
                last = Some(window);
            }
        }
        assert_eq!(lengths, vec![192, 384, 400]);

        let last = last.unwrap();
        assert!(last.samples[..16].iter().all(|s| s.voltage == 1.0));
        assert!(last.samples[16..208].iter().all(|s| s.voltage == 2.0));
        assert!(last.latest().iter().all(|s| s.voltage == 3.0));
    }

    #[tokio::test]
    async fn test_text_message_is_decode_error() {
        let session = MockSession::new(vec![
            TransportEvent::Opened,
            TransportEvent::Text("hello".into()),
            frame(2, 2),
        ]);
        let transport = transport_with(session.clone());

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();

        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));
        match next(&mut rx).await {
            ConnectionEvent::Error(e) => {
                assert!(matches!(e, MonitorError::UnexpectedText { len: 5 }));
                assert!(e.is_recoverable());
            }
            other => panic!("Expected Error, got: {:?}", other),
        }
        match next(&mut rx).await {
            ConnectionEvent::Samples(window) => assert_eq!(window.len(), 192),
            other => panic!("Expected Samples, got: {:?}", other),
        }
        assert_eq!(connection.state(), ConnectionState::Connected);
        assert_eq!(session.close_calls(), 0);
    }

    #[tokio::test]
    async fn test_unread_windows_queue_as_independent_copies() {
        let session = MockSession::new(vec![
            TransportEvent::Opened,
            frame(1, 1),
            frame(2, 2),
            frame(3, 3),
            TransportEvent::Closed,
        ]);
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut state = connection.subscribe_state();
        let mut rx = connection.open(&transport, target()).unwrap();

        // Nothing is read until the session has ended
        tokio::time::timeout(
            Duration::from_secs(1),
            state.wait_for(|s| *s == ConnectionState::Closed),
        )
        .await
        .unwrap()
        .unwrap();
        tokio_test::assert_ok!(connection.close().await);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 5);
        let lengths: Vec<usize> = events
            .iter()
            .filter_map(|event| match event {
                ConnectionEvent::Samples(window) => Some(window.len()),
                _ => None,
            })
            .collect();
        assert_eq!(lengths, vec![192, 384, 576]);
        assert!(matches!(events[4], ConnectionEvent::ConnectionChanged(false)));
    }

    #[tokio::test]
    async fn test_dropped_receiver_closes_session() {
        let session = MockSession::new(vec![TransportEvent::Opened, frame(1, 1)]);
        let transport = transport_with(session.clone());

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut state = connection.subscribe_state();
        drop(connection.open(&transport, target()).unwrap());

        tokio::time::timeout(
            Duration::from_secs(1),
            state.wait_for(|s| *s == ConnectionState::Closed),
        )
        .await
        .expect("session did not close")
        .unwrap();
        connection.close().await.unwrap();
        assert_eq!(session.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_dropping_connection_closes_session() {
        let session = MockSession::new(vec![TransportEvent::Opened]);
        let transport = transport_with(session.clone());

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(true)));

        drop(connection);
        assert!(matches!(next(&mut rx).await, ConnectionEvent::ConnectionChanged(false)));
        assert!(rx.recv().await.is_none());
        assert_eq!(session.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_transport_close_is_reported() {
        let session = MockSession::new(vec![TransportEvent::Opened]);
        session.set_close_error("socket already gone");
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Scaled, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();
        next(&mut rx).await;
        connection.close().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ConnectionEvent::Error(MonitorError::Transport(_))));
        assert!(matches!(events[1], ConnectionEvent::ConnectionChanged(false)));
    }

    #[tokio::test]
    async fn test_legacy_wire_format() {
        let samples = vec![PhysicalSample::new(230.0, 1.5); 16];
        let session = MockSession::new(vec![
            TransportEvent::Opened,
            TransportEvent::Message(Bytes::from(encode_legacy_frame(&samples))),
        ]);
        let transport = transport_with(session);

        let mut connection = TelemetryConnection::new(WireFormat::Legacy, 1024);
        let mut rx = connection.open(&transport, target()).unwrap();
        next(&mut rx).await;

        match next(&mut rx).await {
            ConnectionEvent::Samples(window) => assert_eq!(window.samples, samples),
            other => panic!("Expected Samples, got: {:?}", other),
        }
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.connection.wire_format = WireFormat::Legacy;
        config.buffer.capacity = 64;

        let connection = TelemetryConnection::from_config(&config);
        assert_eq!(connection.format, WireFormat::Legacy);
        assert_eq!(connection.capacity, 64);
        assert_eq!(connection.state(), ConnectionState::Idle);
    }
}
