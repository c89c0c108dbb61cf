use std::{collections::VecDeque, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::mpsc,
    time::{sleep, sleep_until, timeout, Instant},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{header, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use super::{
    packet::{Handshake, Outgoing, Packet, PacketError, SocketPacket},
    ChannelEvent, ChannelOptions, OutgoingMessage, Outbound,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
enum TransportError {
    #[error(transparent)]
    Ws(#[from] tungstenite::Error),
    #[error("invalid session cookie")]
    Cookie,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed during handshake")]
    Closed,
    #[error("unexpected packet during handshake: {0:?}")]
    Unexpected(Packet),
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error("relay refused connection: {0}")]
    Refused(String),
}

enum Exit {
    Teardown,
    Lost(String),
}

pub(super) async fn run(
    options: ChannelOptions,
    mut commands: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let mut queue = VecDeque::new();
    let mut connected_before = false;
    let mut attempt: u32 = 0;

    loop {
        info!(url = %options.url, attempt, "connecting to relay");
        match connect(&options, &mut commands, &events, &mut queue, &mut connected_before).await {
            Ok(Exit::Teardown) => {
                info!("relay connection closed");
                return;
            }
            Ok(Exit::Lost(reason)) => {
                warn!(%reason, "disconnected from relay");
                let _ = events.send(ChannelEvent::Disconnected { reason });
                attempt = 0;
            }
            Err(err) => {
                error!("relay connection error: {err}");
                let _ = events.send(ChannelEvent::ConnectError { message: err.to_string() });
            }
        }

        let delay = backoff(&options, attempt);
        attempt = attempt.saturating_add(1);
        debug!(?delay, "waiting before reconnect");
        if wait(delay, &mut commands, &mut queue).await {
            info!("relay connection closed while reconnecting");
            return;
        }
    }
}

fn backoff(options: &ChannelOptions, attempt: u32) -> Duration {
    options
        .reconnect_base
        .saturating_mul(1_u32.checked_shl(attempt).unwrap_or(u32::MAX))
        .min(options.reconnect_max)
}

/// Sleeps for `delay`, buffering sends. Returns true on teardown.
async fn wait(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<Outbound>,
    queue: &mut VecDeque<OutgoingMessage>,
) -> bool {
    let deadline = sleep(delay);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => return false,
            command = commands.recv() => match command {
                Some(Outbound::Send(msg)) => queue.push_back(msg),
                Some(Outbound::Disconnect) | None => return true,
            },
        }
    }
}

async fn connect(
    options: &ChannelOptions,
    commands: &mut mpsc::UnboundedReceiver<Outbound>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    queue: &mut VecDeque<OutgoingMessage>,
    connected_before: &mut bool,
) -> Result<Exit, TransportError> {
    let mut request = options.url.as_str().into_client_request()?;
    if let Some(cookie) = &options.session_cookie {
        let value = HeaderValue::from_str(cookie).map_err(|_| TransportError::Cookie)?;
        request.headers_mut().insert(header::COOKIE, value);
    }

    let (mut socket, _) = timeout(options.connect_timeout, connect_async(request))
        .await
        .map_err(|_| TransportError::Timeout(options.connect_timeout))??;

    let handshake = timeout(options.connect_timeout, open(&mut socket))
        .await
        .map_err(|_| TransportError::Timeout(options.connect_timeout))??;
    debug!(sid = %handshake.sid, "relay handshake complete");

    if *connected_before {
        info!("reconnected to relay");
        let _ = events.send(ChannelEvent::Reconnected);
    } else {
        info!("connected to relay");
        let _ = events.send(ChannelEvent::Connected);
    }
    *connected_before = true;

    let (mut sink, mut stream) = socket.split();

    while let Some(msg) = queue.pop_front() {
        if let Err(err) = sink.send(Message::text(send_message_frame(&msg))).await {
            queue.push_front(msg);
            return Ok(Exit::Lost(err.to_string()));
        }
    }

    let liveness = handshake.ping_interval + handshake.ping_timeout;
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    None => return Ok(Exit::Lost("connection closed".to_owned())),
                    Some(Err(err)) => return Ok(Exit::Lost(err.to_string())),
                    Some(Ok(Message::Close(_))) => return Ok(Exit::Lost("closed by relay".to_owned())),
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(_)) => continue,
                };

                match Packet::decode(text.as_str()) {
                    Ok(Packet::Ping) => {
                        deadline = Instant::now() + liveness;
                        if let Err(err) = sink.send(Message::text(Outgoing::Pong.encode())).await {
                            return Ok(Exit::Lost(err.to_string()));
                        }
                    }
                    Ok(Packet::Close) => return Ok(Exit::Lost("closed by relay".to_owned())),
                    Ok(Packet::Message(SocketPacket::Disconnect)) => {
                        return Ok(Exit::Lost("relay disconnected the session".to_owned()));
                    }
                    Ok(Packet::Message(SocketPacket::Event { name, data })) => dispatch(&name, data, events),
                    Ok(other) => debug!(?other, "ignoring relay packet"),
                    Err(err) => warn!(frame = %text.as_str(), "skipping malformed relay frame: {err}"),
                }
            }
            command = commands.recv() => match command {
                Some(Outbound::Send(msg)) => {
                    if let Err(err) = sink.send(Message::text(send_message_frame(&msg))).await {
                        queue.push_back(msg);
                        return Ok(Exit::Lost(err.to_string()));
                    }
                    debug!(client_id = %msg.client_id, "send_message emitted");
                }
                Some(Outbound::Disconnect) | None => {
                    let _ = sink.send(Message::text(Outgoing::Disconnect.encode())).await;
                    let _ = sink.close().await;
                    return Ok(Exit::Teardown);
                }
            },
            _ = sleep_until(deadline) => return Ok(Exit::Lost("ping timeout".to_owned())),
        }
    }
}

/// Reads the Engine.IO open packet and joins the default namespace.
async fn open(socket: &mut Socket) -> Result<Handshake, TransportError> {
    let handshake = match next_packet(socket).await? {
        Packet::Open(handshake) => handshake,
        other => return Err(TransportError::Unexpected(other)),
    };

    socket
        .send(Message::text(Outgoing::Connect.encode()))
        .await?;

    loop {
        match next_packet(socket).await? {
            Packet::Message(SocketPacket::Connect(_)) => return Ok(handshake),
            Packet::Message(SocketPacket::ConnectError(message)) => {
                return Err(TransportError::Refused(message));
            }
            Packet::Ping => socket.send(Message::text(Outgoing::Pong.encode())).await?,
            Packet::Noop => {}
            other => return Err(TransportError::Unexpected(other)),
        }
    }
}

async fn next_packet(socket: &mut Socket) -> Result<Packet, TransportError> {
    loop {
        match socket.next().await {
            None | Some(Ok(Message::Close(_))) => return Err(TransportError::Closed),
            Some(Err(err)) => return Err(err.into()),
            Some(Ok(Message::Text(text))) => return Ok(Packet::decode(text.as_str())?),
            Some(Ok(_)) => continue,
        }
    }
}

fn send_message_frame(msg: &OutgoingMessage) -> String {
    let data = serde_json::to_value(msg).unwrap_or(Value::Null);
    Outgoing::event("send_message", data).encode()
}

fn dispatch(name: &str, data: Value, events: &mpsc::UnboundedSender<ChannelEvent>) {
    let event = match name {
        "receive_message" => serde_json::from_value(data).map(ChannelEvent::Message),
        "message_sent" => serde_json::from_value(data).map(ChannelEvent::MessageSent),
        _ => {
            debug!(event = name, "ignoring relay event");
            return;
        }
    };

    match event {
        Ok(event) => {
            let _ = events.send(event);
        }
        Err(err) => warn!(event = name, "malformed relay event: {err}"),
    }
}
