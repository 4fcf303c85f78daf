use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::messages::MessageTemplate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message the bot can edit later (lead cards, reason prompts).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("chat api rejected `{method}`: {description}")]
    Api { method: String, description: String },
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn send_message(
        &self,
        chat_id: ChatId,
        message: &MessageTemplate,
    ) -> Result<MessageRef, TransportError>;

    async fn edit_message(
        &self,
        target: MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), TransportError>;

    /// Stops the client-side spinner on a pressed button.
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}
