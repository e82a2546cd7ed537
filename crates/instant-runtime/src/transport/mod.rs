//! A single logical connection to the server's event stream.
//!
//! Two mutually exclusive mechanisms sit behind [`Transport`]: a
//! unidirectional event source (the term travels in the request path) and a
//! websocket that needs a handshake frame after every open. Both deliver
//! validated [`StreamMessage`]s to a [`TransportSink`] in arrival order and
//! reconnect on their own after the connection drops.

pub mod event_source;
pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use url::Url;

use crate::config::{Mechanism, TransportConfig};
use crate::protocol::{parse_message, ProtocolError, StreamMessage};

pub use event_source::EventSourceTransport;
pub use websocket::WebSocketTransport;

/// What a transport reports to its owner.
#[derive(Debug)]
pub enum TransportEvent {
    Message(StreamMessage),
    /// A frame that failed validation. The owner must treat this as fatal.
    Defect(ProtocolError),
    /// Connection lost; automatic reconnection is under way.
    Reconnecting,
    /// Connection re-established after `Reconnecting`.
    Reopened,
    /// Reconnection gave up.
    Closed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    EventSource,
    Websocket,
}

/// The handler a transport delivers events to. `emit` returns false once
/// the owner has gone away, which stops the connection task.
#[derive(Clone)]
pub struct TransportSink {
    handler: Arc<dyn Fn(TransportEvent) -> bool + Send + Sync>,
}

impl TransportSink {
    pub fn new(handler: impl Fn(TransportEvent) -> bool + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    pub fn from_channel(tx: tokio::sync::mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self::new(move |event| tx.send(event).is_ok())
    }

    pub fn emit(&self, event: TransportEvent) -> bool {
        (self.handler)(event)
    }
}

impl std::fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSink").finish_non_exhaustive()
    }
}

pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Start streaming results for `term`. Reopening closes any previous
    /// connection first.
    fn open(&mut self, term: &str, sink: TransportSink) -> Result<()>;

    fn close(&mut self);
}

/// Creates a fresh transport for every query.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Transport>>;
}

/// Whether the unidirectional mechanism can be used. Evaluated once per
/// transport creation.
pub fn event_source_supported(config: &TransportConfig) -> bool {
    config.mechanism != Mechanism::Websocket
}

/// Picks the mechanism from configuration.
pub struct DefaultTransportFactory {
    base: Url,
    config: TransportConfig,
}

impl DefaultTransportFactory {
    pub fn new(base: Url, config: TransportConfig) -> Self {
        Self { base, config }
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(&self) -> Result<Box<dyn Transport>> {
        let policy = ReconnectPolicy::from_config(&self.config);
        if event_source_supported(&self.config) {
            Ok(Box::new(EventSourceTransport::new(self.base.clone(), policy)?))
        } else {
            Ok(Box::new(WebSocketTransport::new(&self.base, policy)?))
        }
    }
}

/// Validate one frame and hand it to the sink.
pub fn dispatch_frame(sink: &TransportSink, data: &str) -> bool {
    match parse_message(data) {
        Ok(message) => sink.emit(TransportEvent::Message(message)),
        Err(err) => {
            tracing::error!(error = %err, "Invalid frame on event stream");
            sink.emit(TransportEvent::Defect(err))
        }
    }
}

/// Exponential reconnect backoff.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    pub fn from_config(config: &TransportConfig) -> Self {
        Self {
            base: Duration::from_millis(config.reconnect_base_ms),
            max: Duration::from_millis(config.reconnect_max_ms),
            max_attempts: config.max_reconnect_attempts,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Shared reconnect bookkeeping: one `Reconnecting` per outage, one
/// `Reopened` when it ends.
pub(crate) struct Reconnector {
    policy: ReconnectPolicy,
    attempt: u32,
    reconnecting: bool,
}

impl Reconnector {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            reconnecting: false,
        }
    }

    /// Call once a connection is established.
    pub(crate) fn connected(&mut self, sink: &TransportSink) -> bool {
        self.attempt = 0;
        if self.reconnecting {
            self.reconnecting = false;
            return sink.emit(TransportEvent::Reopened);
        }
        true
    }

    /// Call after the connection dropped or failed. Returns false when the
    /// task should stop.
    pub(crate) async fn wait(&mut self, sink: &TransportSink) -> bool {
        if !self.reconnecting {
            self.reconnecting = true;
            if !sink.emit(TransportEvent::Reconnecting) {
                return false;
            }
        }
        if let Some(max) = self.policy.max_attempts {
            if self.attempt >= max {
                sink.emit(TransportEvent::Closed(format!(
                    "gave up after {} reconnect attempts",
                    max
                )));
                return false;
            }
        }
        let delay = self.policy.delay(self.attempt);
        self.attempt += 1;
        tracing::info!(
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting event stream"
        );
        tokio::time::sleep(delay).await;
        true
    }
}
