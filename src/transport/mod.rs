//! Transport seam
//!
//! A [`Connector`] opens a [`Link`]: the engine's end of one message-oriented
//! connection. The other end, a [`LinkDriver`], is owned by whatever moves
//! frames (a WebSocket task, or a test playing the server). Events for one
//! connection travel through a single FIFO channel, so dropping a `Link`
//! also drops every event it could still deliver.

mod channel;
mod websocket;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::types::{ClientError, Result};

pub use channel::{ChannelConnector, ReceivedCall, ServerEnd};
pub use websocket::WebSocketConnector;

/// WebSocket close code for a normal closure
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame without a status code
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// Connection dropped without a close frame, or never established
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// How a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: Option<String>,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            code,
            reason: (!reason.is_empty()).then_some(reason),
        }
    }

    pub fn normal() -> Self {
        Self {
            code: NORMAL_CLOSURE,
            reason: None,
        }
    }

    pub fn abnormal() -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: None,
        }
    }
}

/// Something the transport reports to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is usable
    Opened,
    /// One inbound text frame
    Message(String),
    /// The connection is gone; nothing follows
    Closed(CloseInfo),
}

/// Something the engine asks the transport to do
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Engine end of a connection
#[derive(Debug)]
pub struct Link {
    address: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Transport end of a connection
#[derive(Debug)]
pub struct LinkDriver {
    outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Link {
    /// Create a connected link/driver pair
    pub fn pair(address: impl Into<String>) -> (Link, LinkDriver) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        (
            Link {
                address: address.into(),
                outbound: out_tx,
                events: ev_rx,
            },
            LinkDriver {
                outbound: out_rx,
                events: ev_tx,
            },
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Queue a text frame
    pub fn send_text(&self, text: String) -> Result<()> {
        self.outbound
            .send(Outbound::Text(text))
            .map_err(|_| ClientError::NotConnected)
    }

    /// Ask the transport to close with a normal closure
    pub fn close(&self) {
        drop(self.outbound.send(Outbound::Close));
    }

    /// Next event, in delivery order
    ///
    /// A transport that vanished without reporting is seen as an abnormal
    /// closure.
    pub async fn next_event(&mut self) -> TransportEvent {
        self.events
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::Closed(CloseInfo::abnormal()))
    }
}

impl LinkDriver {
    /// Report an event; false if the engine dropped the link
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Next frame queued by the engine; `None` once the link is dropped
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    /// True once the engine dropped its end
    pub fn is_detached(&self) -> bool {
        self.events.is_closed()
    }
}

/// Opens connections for the engine
///
/// `open` must not block: it returns the link immediately and reports
/// [`TransportEvent::Opened`] or [`TransportEvent::Closed`] through it later.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, address: &str, connect_timeout: Duration) -> Link;
}
