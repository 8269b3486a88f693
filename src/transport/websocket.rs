//! WebSocket transport
//!
//! One spawned task per connection: it performs the connect under a timeout,
//! then pumps frames both ways until either side closes.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info, trace, warn};

use super::{CloseInfo, Connector, Link, LinkDriver, NO_STATUS_RECEIVED, Outbound, TransportEvent};

/// Opens `ws://` connections with tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for WebSocketConnector {
    fn open(&self, address: &str, connect_timeout: Duration) -> Link {
        let (link, driver) = Link::pair(address);
        tokio::spawn(run_socket(address.to_string(), connect_timeout, driver));
        link
    }
}

async fn run_socket(url: String, connect_timeout: Duration, mut driver: LinkDriver) {
    let stream = match time::timeout(connect_timeout, tokio_tungstenite::connect_async(url.as_str()))
        .await
    {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(e)) => {
            warn!(url = %url, error = %e, "WebSocket connect failed");
            driver.emit(TransportEvent::Closed(CloseInfo::abnormal()));
            return;
        }
        Err(_) => {
            warn!(
                url = %url,
                timeout_ms = u64::try_from(connect_timeout.as_millis()).unwrap_or(u64::MAX),
                "WebSocket connect timed out"
            );
            driver.emit(TransportEvent::Closed(CloseInfo::abnormal()));
            return;
        }
    };

    info!(url = %url, "WebSocket connected");
    if !driver.emit(TransportEvent::Opened) {
        debug!(url = %url, "Link dropped before open");
        return;
    }

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            outbound = driver.next_outbound() => match outbound {
                Some(Outbound::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!(url = %url, error = %e, "WebSocket write failed");
                        driver.emit(TransportEvent::Closed(CloseInfo::abnormal()));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!(url = %url, "Closing WebSocket");
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: String::new().into(),
                    };
                    drop(write.send(Message::Close(Some(frame))).await);
                    drop(write.close().await);
                    return;
                }
            },
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    driver.emit(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        driver.emit(TransportEvent::Message(text));
                    }
                    Err(_) => trace!(url = %url, len = bytes.len(), "Discarding non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.as_str()),
                        None => CloseInfo {
                            code: NO_STATUS_RECEIVED,
                            reason: None,
                        },
                    };
                    info!(url = %url, code = info.code, "WebSocket closed by server");
                    driver.emit(TransportEvent::Closed(info));
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(url = %url, error = %e, "WebSocket read failed");
                    driver.emit(TransportEvent::Closed(CloseInfo::abnormal()));
                    return;
                }
                None => {
                    driver.emit(TransportEvent::Closed(CloseInfo::abnormal()));
                    return;
                }
            }
        }
    }
}
