//! In-memory transport
//!
//! Every `open` hands a [`ServerEnd`] to whoever holds the receiver returned
//! by [`ChannelConnector::new`]. The holder plays the server: it reads the
//! client's frames and pushes responses, notifications and closures.

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use super::{CloseInfo, Connector, Link, LinkDriver, Outbound, TransportEvent};
use crate::protocol::JSONRPC_VERSION;

/// Connector backed by in-process channels
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    servers: mpsc::UnboundedSender<ServerEnd>,
}

impl ChannelConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerEnd>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { servers: tx }, rx)
    }
}

impl Connector for ChannelConnector {
    fn open(&self, address: &str, _connect_timeout: Duration) -> Link {
        let (link, driver) = Link::pair(address);
        let server = ServerEnd {
            address: address.to_string(),
            driver,
        };
        if self.servers.send(server).is_err() {
            tracing::debug!(address, "No server listening on channel connector");
        }
        link
    }
}

/// A request frame as read by the server side
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedCall {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

/// Server side of an in-memory connection
#[derive(Debug)]
pub struct ServerEnd {
    address: String,
    driver: LinkDriver,
}

impl ServerEnd {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Report the connection as open
    pub fn open(&self) {
        self.driver.emit(TransportEvent::Opened);
    }

    /// Next raw frame from the client; `None` once the client dropped the link
    pub async fn next_frame(&mut self) -> Option<Outbound> {
        self.driver.next_outbound().await
    }

    /// Next call from the client
    ///
    /// Returns `None` when the client closes or drops the connection.
    /// Frames that are not calls are skipped.
    pub async fn next_call(&mut self) -> Option<ReceivedCall> {
        loop {
            let Outbound::Text(text) = self.next_frame().await? else {
                return None;
            };
            let Ok(value) = serde_json::from_str::<Value>(&text) else {
                continue;
            };
            let (Some(id), Some(method)) = (
                value.get("id").and_then(Value::as_u64),
                value.get("method").and_then(Value::as_str),
            ) else {
                continue;
            };
            return Some(ReceivedCall {
                id,
                method: method.to_string(),
                params: value.get("params").cloned().unwrap_or(Value::Null),
            });
        }
    }

    /// Open the connection and answer the `initialize` call
    ///
    /// Returns the handshake params, or `None` if the client went away first.
    pub async fn accept(&mut self) -> Option<Value> {
        self.open();
        let call = self.next_call().await?;
        self.respond(call.id, json!({}));
        Some(call.params)
    }

    /// Push a raw text frame
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.driver.emit(TransportEvent::Message(text.into()))
    }

    pub fn respond(&self, id: u64, result: Value) -> bool {
        self.send_raw(json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result}).to_string())
    }

    pub fn respond_error(&self, id: u64, error: Value) -> bool {
        self.send_raw(json!({"jsonrpc": JSONRPC_VERSION, "id": id, "error": error}).to_string())
    }

    pub fn notify(&self, method: &str, params: Value) -> bool {
        self.send_raw(
            json!({"jsonrpc": JSONRPC_VERSION, "method": method, "params": params}).to_string(),
        )
    }

    /// Close from the server side
    pub fn close(&self, code: u16, reason: &str) -> bool {
        self.driver
            .emit(TransportEvent::Closed(CloseInfo::new(code, reason)))
    }

    /// True once the client dropped its end
    pub fn is_detached(&self) -> bool {
        self.driver.is_detached()
    }
}
