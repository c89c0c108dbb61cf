//! Engine.IO v4 / Socket.IO v5 text framing, default namespace only.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::GetField;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("binary packets are not supported")]
    Binary,
    #[error("malformed packet: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub sid: String,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    Ack { id: u64 },
    ConnectError(String),
}

impl Packet {
    pub fn decode(frame: &str) -> Result<Packet, PacketError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => Ok(Packet::Open(decode_handshake(rest)?)),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => Ok(Packet::Message(SocketPacket::decode(rest)?)),
            '5' => Ok(Packet::Upgrade),
            '6' => Ok(Packet::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

impl SocketPacket {
    fn decode(frame: &str) -> Result<SocketPacket, PacketError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        if matches!(kind, '5' | '6') {
            return Err(PacketError::Binary);
        }
        let mut rest = chars.as_str();

        if rest.starts_with('/') {
            let (namespace, tail) = rest.split_once(',').unwrap_or((rest, ""));
            if namespace != "/" {
                return Err(PacketError::Malformed(format!("unexpected namespace {namespace}")));
            }
            rest = tail;
        }

        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (ack, payload) = rest.split_at(digits);
        let ack = if ack.is_empty() {
            None
        } else {
            Some(ack.parse::<u64>().map_err(|err| PacketError::Malformed(err.to_string()))?)
        };
        let payload = if payload.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(payload)
                    .map_err(|err| PacketError::Malformed(err.to_string()))?,
            )
        };

        match kind {
            '0' => Ok(SocketPacket::Connect(payload)),
            '1' => Ok(SocketPacket::Disconnect),
            '2' => decode_event(payload),
            '3' => ack
                .map(|id| SocketPacket::Ack { id })
                .ok_or_else(|| PacketError::Malformed("ack without id".to_owned())),
            '4' => Ok(SocketPacket::ConnectError(connect_error_message(payload))),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

/// Frames the client writes. Pongs go out bare, everything else inside an
/// Engine.IO message frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Pong,
    Connect,
    Disconnect,
    Event { name: String, data: Value },
}

impl Outgoing {
    pub fn event(name: &str, data: Value) -> Outgoing {
        Outgoing::Event { name: name.to_owned(), data }
    }

    pub fn encode(&self) -> String {
        match self {
            Outgoing::Pong => "3".to_owned(),
            Outgoing::Connect => "40".to_owned(),
            Outgoing::Disconnect => "41".to_owned(),
            Outgoing::Event { name, data } => {
                format!("42{}", Value::Array(vec![Value::String(name.clone()), data.clone()]))
            }
        }
    }
}

fn decode_handshake(payload: &str) -> Result<Handshake, PacketError> {
    let value: Value =
        serde_json::from_str(payload).map_err(|err| PacketError::Malformed(err.to_string()))?;
    let field_err = |err: crate::AppError| PacketError::Malformed(err.to_string());

    Ok(Handshake {
        sid: value.get_str_field("sid").map_err(field_err)?,
        ping_interval: Duration::from_millis(value.get_u64_field("pingInterval").map_err(field_err)?),
        ping_timeout: Duration::from_millis(value.get_u64_field("pingTimeout").map_err(field_err)?),
    })
}

fn decode_event(payload: Option<Value>) -> Result<SocketPacket, PacketError> {
    let Some(Value::Array(mut items)) = payload else {
        return Err(PacketError::Malformed("event payload must be an array".to_owned()));
    };
    if items.is_empty() {
        return Err(PacketError::Malformed("event without a name".to_owned()));
    }
    let Value::String(name) = items.remove(0) else {
        return Err(PacketError::Malformed("event name must be a string".to_owned()));
    };
    let data = if items.is_empty() { Value::Null } else { items.remove(0) };

    Ok(SocketPacket::Event { name, data })
}

fn connect_error_message(payload: Option<Value>) -> String {
    match payload {
        Some(Value::String(message)) => message,
        Some(value) => value
            .get_str_field("message")
            .unwrap_or_else(|_| value.to_string()),
        None => "connection refused".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_open_handshake() {
        let packet = Packet::decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#).unwrap();

        assert_eq!(packet, Packet::Open(Handshake {
            sid: "abc".to_owned(),
            ping_interval: Duration::from_secs(25),
            ping_timeout: Duration::from_secs(20),
        }));
    }

    #[test]
    fn open_without_intervals_is_malformed() {
        let err = Packet::decode(r#"0{"sid":"abc"}"#).unwrap_err();
        assert!(matches!(err, PacketError::Malformed(msg) if msg.contains("pingInterval")));
    }

    #[test]
    fn decodes_control_packets() {
        assert_eq!(Packet::decode("1").unwrap(), Packet::Close);
        assert_eq!(Packet::decode("2").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
        assert_eq!(Packet::decode("6").unwrap(), Packet::Noop);
        assert_eq!(Packet::decode("").unwrap_err(), PacketError::Empty);
        assert_eq!(Packet::decode("9").unwrap_err(), PacketError::UnknownType('9'));
    }

    #[test]
    fn decodes_namespace_connect() {
        assert_eq!(
            Packet::decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Packet::Message(SocketPacket::Connect(Some(json!({ "sid": "xyz" })))),
        );
        assert_eq!(Packet::decode("41").unwrap(), Packet::Message(SocketPacket::Disconnect));
    }

    #[test]
    fn decodes_events() {
        let packet = Packet::decode(r#"42["receive_message",{"sender_id":"1","message":"hi"}]"#).unwrap();

        assert_eq!(packet, Packet::Message(SocketPacket::Event {
            name: "receive_message".to_owned(),
            data: json!({ "sender_id": "1", "message": "hi" }),
        }));
    }

    #[test]
    fn decodes_events_with_ack_ids_and_root_namespace() {
        let packet = Packet::decode(r#"42/,12["message_sent"]"#).unwrap();
        assert_eq!(packet, Packet::Message(SocketPacket::Event {
            name: "message_sent".to_owned(),
            data: Value::Null,
        }));
    }

    #[test]
    fn rejects_other_namespaces_and_binary() {
        assert!(matches!(Packet::decode(r#"42/admin,["x"]"#), Err(PacketError::Malformed(_))));
        assert_eq!(Packet::decode(r#"451-["x",{"_placeholder":true,"num":0}]"#).unwrap_err(), PacketError::Binary);
    }

    #[test]
    fn rejects_malformed_events() {
        assert!(Packet::decode("42{}").is_err());
        assert!(Packet::decode("42[]").is_err());
        assert!(Packet::decode("42[1]").is_err());
        assert!(Packet::decode("42[\"x\"").is_err());
    }

    #[test]
    fn decodes_connect_errors() {
        assert_eq!(
            Packet::decode(r#"44{"message":"Not authorized"}"#).unwrap(),
            Packet::Message(SocketPacket::ConnectError("Not authorized".to_owned())),
        );
        assert_eq!(
            Packet::decode("44").unwrap(),
            Packet::Message(SocketPacket::ConnectError("connection refused".to_owned())),
        );
    }

    #[test]
    fn encodes_client_frames() {
        assert_eq!(Outgoing::Connect.encode(), "40");
        assert_eq!(Outgoing::Pong.encode(), "3");
        assert_eq!(Outgoing::Disconnect.encode(), "41");
        assert_eq!(
            Outgoing::event("send_message", json!({ "receiver_id": 1, "message": "hello" })).encode(),
            r#"42["send_message",{"message":"hello","receiver_id":1}]"#,
        );
    }
}
