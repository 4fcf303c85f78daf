//! Telegram Bot API over long polling: inbound updates, outbound messages, voice downloads.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use outreach_agent::{AudioFetcher, AudioRef, TranscriptionError};
use outreach_core::config::TelegramConfig;
use outreach_core::{Operator, OperatorId};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    chat::{ChatClient, ChatId, MessageRef, TransportError},
    commands::BotCommand,
    events::{
        ButtonEvent, ChatEvent, ChatUpdate, CommandEvent, TextEvent, VoiceEvent,
    },
    messages::MessageTemplate,
    runner::UpdateTransport,
};

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUpdate {
    update_id: i64,
    message: Option<RawMessage>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    message_id: i64,
    chat: RawChat,
    from: Option<RawUser>,
    text: Option<String>,
    voice: Option<RawVoice>,
}

#[derive(Debug, Deserialize)]
struct RawChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: i64,
    username: Option<String>,
    first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVoice {
    file_id: String,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCallbackQuery {
    id: String,
    from: RawUser,
    message: Option<RawMessage>,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    file_path: Option<String>,
}

impl From<RawUser> for Operator {
    fn from(user: RawUser) -> Self {
        Self {
            id: OperatorId(user.id.to_string()),
            username: user.username,
            first_name: user.first_name,
        }
    }
}

fn convert_update(raw: RawUpdate) -> ChatUpdate {
    let event = match (raw.message, raw.callback_query) {
        (_, Some(query)) => convert_callback(query),
        (Some(message), None) => convert_message(message),
        (None, None) => ChatEvent::Unsupported { kind: "update".to_owned() },
    };
    ChatUpdate { update_id: raw.update_id, event }
}

fn convert_message(message: RawMessage) -> ChatEvent {
    let chat_id = ChatId(message.chat.id);
    let Some(from) = message.from else {
        return ChatEvent::Unsupported { kind: "anonymous_message".to_owned() };
    };
    let operator = Operator::from(from);

    if let Some(voice) = message.voice {
        return ChatEvent::Voice(VoiceEvent {
            chat_id,
            operator,
            audio: AudioRef { file_id: voice.file_id, mime_type: voice.mime_type },
        });
    }

    let Some(text) = message.text else {
        return ChatEvent::Unsupported { kind: "message".to_owned() };
    };
    match BotCommand::parse(&text) {
        Some(command) => {
            let args = text
                .trim()
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest.trim().to_owned())
                .unwrap_or_default();
            ChatEvent::Command(CommandEvent { chat_id, operator, command, args })
        }
        None => ChatEvent::Text(TextEvent { chat_id, operator, text }),
    }
}

fn convert_callback(query: RawCallbackQuery) -> ChatEvent {
    let operator = Operator::from(query.from);
    let (chat_id, message, message_text) = match query.message {
        Some(message) => {
            let chat_id = ChatId(message.chat.id);
            (chat_id, Some(MessageRef { chat_id, message_id: message.message_id }), message.text)
        }
        // Private chats share the user's id.
        None => (ChatId(operator.id.0.parse().unwrap_or_default()), None, None),
    };
    ChatEvent::Button(ButtonEvent {
        chat_id,
        operator,
        callback_id: query.id,
        message,
        message_text,
        data: query.data.unwrap_or_default(),
    })
}

/// Body shared by `sendMessage` and `editMessageText`.
fn message_body(chat_id: ChatId, message: &MessageTemplate) -> Value {
    let mut body = json!({ "chat_id": chat_id.0, "text": message.text });
    if let Some(parse_mode) = message.parse_mode {
        body["parse_mode"] = json!(parse_mode);
    }
    if !message.keyboard.is_empty() {
        body["reply_markup"] = json!({ "inline_keyboard": message.keyboard });
    }
    body
}

#[derive(Default)]
struct PollState {
    offset: i64,
    buffered: VecDeque<ChatUpdate>,
    closed: bool,
}

pub struct TelegramTransport {
    client: reqwest::Client,
    api_base_url: String,
    token: SecretString,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()
            .map_err(|error| TransportError::Connect(error.without_url().to_string()))?;
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            state: Mutex::new(PollState::default()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.token.expose_secret())
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base_url, self.token.expose_secret())
    }

    /// Stops `next_update` from polling again; the runner then disconnects.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
    }

    async fn call<T>(
        &self,
        method: &str,
        body: &Value,
        network_error: fn(String) -> TransportError,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| network_error(format!("{method}: {}", error.without_url())))?;
        let payload: ApiResponse<T> = response
            .json()
            .await
            .map_err(|error| network_error(format!("{method}: {}", error.without_url())))?;

        match payload {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, .. } => Err(TransportError::Api {
                method: method.to_owned(),
                description: description.unwrap_or_else(|| "no description".to_owned()),
            }),
        }
    }
}

#[async_trait]
impl UpdateTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me: RawUser = self.call("getMe", &json!({}), TransportError::Connect).await?;
        self.state.lock().await.closed = false;
        info!(
            event_name = "ingress.telegram.connected",
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "telegram bot identity confirmed"
        );
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError> {
        loop {
            let offset = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Ok(None);
                }
                if let Some(update) = state.buffered.pop_front() {
                    return Ok(Some(update));
                }
                state.offset
            };

            let body = json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message", "callback_query"],
            });
            let raw: Vec<RawUpdate> =
                self.call("getUpdates", &body, TransportError::Receive).await?;
            debug!(count = raw.len(), offset, "polled telegram updates");

            let mut state = self.state.lock().await;
            state.buffered.extend(raw.into_iter().map(convert_update));
        }
    }

    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.offset = state.offset.max(update_id + 1);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.buffered.clear();
        Ok(())
    }
}

#[async_trait]
impl ChatClient for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        message: &MessageTemplate,
    ) -> Result<MessageRef, TransportError> {
        let sent: RawMessage =
            self.call("sendMessage", &message_body(chat_id, message), TransportError::Send).await?;
        Ok(MessageRef { chat_id: ChatId(sent.chat.id), message_id: sent.message_id })
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        message: &MessageTemplate,
    ) -> Result<(), TransportError> {
        let mut body = message_body(target.chat_id, message);
        body["message_id"] = json!(target.message_id);
        // Result is the edited message, or `true` for inline messages.
        let _: Value = self.call("editMessageText", &body, TransportError::Send).await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id }),
                TransportError::Send,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AudioFetcher for TelegramTransport {
    async fn fetch(&self, audio: &AudioRef) -> Result<Vec<u8>, TranscriptionError> {
        let file: RawFile = self
            .call("getFile", &json!({ "file_id": audio.file_id }), TransportError::Receive)
            .await
            .map_err(|error| TranscriptionError::Download(error.to_string()))?;
        let file_path = file.file_path.ok_or_else(|| {
            TranscriptionError::Download(format!("file `{}` has no download path", audio.file_id))
        })?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|error| TranscriptionError::Download(error.without_url().to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|error| TranscriptionError::Download(error.without_url().to_string()))?;

        debug!(file_id = %audio.file_id, bytes = bytes.len(), "downloaded voice message");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use outreach_core::config::TelegramConfig;
    use secrecy::SecretString;
    use serde_json::json;

    use super::{convert_update, message_body, RawUpdate, TelegramTransport};
    use crate::chat::{ChatId, MessageRef};
    use crate::commands::BotCommand;
    use crate::events::ChatEvent;
    use crate::messages::{MessageBuilder, MessageTemplate};
    use crate::runner::UpdateTransport;

    fn raw(value: serde_json::Value) -> RawUpdate {
        serde_json::from_value(value).expect("valid update json")
    }

    fn config() -> TelegramConfig {
        TelegramConfig {
            bot_token: SecretString::from("123456:abc-secret".to_owned()),
            api_base_url: "https://api.telegram.org/".to_owned(),
            poll_timeout_secs: 30,
        }
    }

    #[test]
    fn converts_command_with_arguments() {
        let update = convert_update(raw(json!({
            "update_id": 10,
            "message": {
                "message_id": 1,
                "chat": { "id": 500 },
                "from": { "id": 1001, "username": "alice", "first_name": "Alice" },
                "text": "/next@OutreachBot  now please"
            }
        })));

        let ChatEvent::Command(event) = update.event else {
            panic!("expected command, got {:?}", update.event);
        };
        assert_eq!(event.command, BotCommand::Next);
        assert_eq!(event.args, "now please");
        assert_eq!(event.chat_id, ChatId(500));
        assert_eq!(event.operator.completed_by_tag(), "1001 @alice");
    }

    #[test]
    fn converts_text_voice_and_callback() {
        let text = convert_update(raw(json!({
            "update_id": 11,
            "message": {
                "message_id": 2,
                "chat": { "id": 500 },
                "from": { "id": 1001, "first_name": "Alice" },
                "text": "Budget frozen"
            }
        })));
        assert!(matches!(text.event, ChatEvent::Text(ref event) if event.text == "Budget frozen"));

        let voice = convert_update(raw(json!({
            "update_id": 12,
            "message": {
                "message_id": 3,
                "chat": { "id": 500 },
                "from": { "id": 1001, "first_name": "Alice" },
                "voice": { "file_id": "AwACAgI", "mime_type": "audio/ogg", "duration": 4 }
            }
        })));
        let ChatEvent::Voice(event) = voice.event else {
            panic!("expected voice");
        };
        assert_eq!(event.audio.file_id, "AwACAgI");

        let button = convert_update(raw(json!({
            "update_id": 13,
            "callback_query": {
                "id": "cb-9",
                "from": { "id": 1001, "first_name": "Alice" },
                "message": { "message_id": 44, "chat": { "id": 500 }, "text": "Lead #3" },
                "data": "result:ignored:4"
            }
        })));
        let ChatEvent::Button(event) = button.event else {
            panic!("expected button");
        };
        assert_eq!(event.message, Some(MessageRef { chat_id: ChatId(500), message_id: 44 }));
        assert_eq!(event.message_text.as_deref(), Some("Lead #3"));
        assert_eq!(event.data, "result:ignored:4");
    }

    #[test]
    fn unknown_update_kinds_are_unsupported() {
        let sticker = convert_update(raw(json!({
            "update_id": 14,
            "message": {
                "message_id": 5,
                "chat": { "id": 500 },
                "from": { "id": 1001, "first_name": "Alice" },
                "sticker": { "file_id": "x" }
            }
        })));
        assert!(matches!(sticker.event, ChatEvent::Unsupported { .. }));

        let edited = convert_update(raw(json!({ "update_id": 15, "edited_message": {} })));
        assert!(matches!(edited.event, ChatEvent::Unsupported { .. }));
    }

    #[test]
    fn message_body_includes_markup_only_when_needed() {
        let plain = message_body(ChatId(9), &MessageTemplate::plain("hi"));
        assert_eq!(plain, json!({ "chat_id": 9, "text": "hi" }));

        let card = MessageBuilder::html().line("<b>Lead</b>").build();
        let body = message_body(ChatId(9), &card);
        assert_eq!(body["parse_mode"], "HTML");
        assert!(body.get("reply_markup").is_none());
    }

    #[test]
    fn urls_embed_token_without_double_slash() {
        let transport = TelegramTransport::new(&config()).expect("client");
        assert_eq!(
            transport.method_url("getMe"),
            "https://api.telegram.org/bot123456:abc-secret/getMe"
        );
        assert_eq!(
            transport.file_url("voice/file_1.oga"),
            "https://api.telegram.org/file/bot123456:abc-secret/voice/file_1.oga"
        );
    }

    #[tokio::test]
    async fn acknowledge_advances_offset_monotonically() {
        let transport = TelegramTransport::new(&config()).expect("client");
        transport.acknowledge(41).await.expect("ack");
        transport.acknowledge(40).await.expect("ack");
        assert_eq!(transport.state.lock().await.offset, 42);

        transport.close().await;
        assert_eq!(transport.next_update().await.expect("closed stream"), None);
    }
}
