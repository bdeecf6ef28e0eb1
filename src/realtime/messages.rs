use actix::Message;
use serde::{Deserialize, Serialize};

use crate::db::models::Notification;
use crate::error::RealtimeError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "auth")]
    Authenticate { token: String },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(text).map_err(|e| RealtimeError::InvalidFormat(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "auth_result")]
    AuthResult { success: bool, error: Option<String> },
    #[serde(rename = "notification")]
    Notification(Notification),
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

/// Serialized server message delivered to one websocket session.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct Push(pub String);
