pub mod packet;
mod transport;

use std::time::Duration;

use url::Url;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    model::{IncomingMessage, SentAck, UserId},
    AppResult,
};

/// What the relay connection reports to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Reconnected,
    Disconnected { reason: String },
    ConnectError { message: String },
    Message(IncomingMessage),
    MessageSent(SentAck),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub receiver_id: UserId,
    pub message: String,
    pub client_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Send(OutgoingMessage),
    Disconnect,
}

#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub url: Url,
    pub session_cookie: Option<String>,
    pub connect_timeout: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
}

/// Handle to the single relay connection of a session.
#[derive(Debug, Clone)]
pub struct Channel {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Channel {
    /// Spawns the transport task; it keeps reconnecting until `disconnect` is called.
    pub fn connect(options: ChannelOptions) -> (Channel, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (outbound, commands) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(transport::run(options, commands, events_tx));
        (Channel { outbound }, events)
    }

    /// A channel with no transport behind it; whatever is sent shows up on the receiver.
    pub fn detached() -> (Channel, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, commands) = mpsc::unbounded_channel();
        (Channel { outbound }, commands)
    }

    pub fn send(&self, receiver_id: &UserId, message: &str, client_id: Uuid) {
        let outgoing = OutgoingMessage {
            receiver_id: receiver_id.clone(),
            message: message.to_owned(),
            client_id,
        };
        if self.outbound.send(Outbound::Send(outgoing)).is_err() {
            tracing::warn!(%client_id, "relay transport is gone, message dropped");
        }
    }

    pub fn disconnect(&self) {
        let _ = self.outbound.send(Outbound::Disconnect);
    }
}

/// `ws(s)://host/<path>?EIO=4&transport=websocket` for an `http(s)` backend.
pub fn socket_url(base: &Url, path: &str) -> AppResult<Url> {
    let mut url = base.join(path)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(format!("unsupported scheme {other}").into()),
    };
    url.set_scheme(scheme)
        .map_err(|_| format!("cannot switch {base} to {scheme}"))?;
    url.query_pairs_mut()
        .clear()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket");
    Ok(url)
}
