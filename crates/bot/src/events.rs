use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use outreach_agent::AudioRef;
use outreach_core::Operator;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    auth::AccessPolicy,
    chat::{ChatClient, ChatId, MessageRef, TransportError},
    commands::BotCommand,
    messages::unauthorized_message,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatUpdate {
    pub update_id: i64,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Command(CommandEvent),
    Button(ButtonEvent),
    Text(TextEvent),
    Voice(VoiceEvent),
    Unsupported { kind: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Command(_) => ChatEventType::Command,
            Self::Button(_) => ChatEventType::Button,
            Self::Text(_) => ChatEventType::Text,
            Self::Voice(_) => ChatEventType::Voice,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn operator(&self) -> Option<&Operator> {
        match self {
            Self::Command(event) => Some(&event.operator),
            Self::Button(event) => Some(&event.operator),
            Self::Text(event) => Some(&event.operator),
            Self::Voice(event) => Some(&event.operator),
            Self::Unsupported { .. } => None,
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Command(event) => Some(event.chat_id),
            Self::Button(event) => Some(event.chat_id),
            Self::Text(event) => Some(event.chat_id),
            Self::Voice(event) => Some(event.chat_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Command,
    Button,
    Text,
    Voice,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub chat_id: ChatId,
    pub operator: Operator,
    pub command: BotCommand,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonEvent {
    pub chat_id: ChatId,
    pub operator: Operator,
    pub callback_id: String,
    /// Message carrying the button; absent when the platform no longer has it.
    pub message: Option<MessageRef>,
    pub message_text: Option<String>,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextEvent {
    pub chat_id: ChatId,
    pub operator: Operator,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceEvent {
    pub chat_id: ChatId,
    pub operator: Operator,
    pub audio: AudioRef,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
    Unauthorized,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Chat(#[from] TransportError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

struct AccessGate {
    policy: AccessPolicy,
    chat: Arc<dyn ChatClient>,
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
    gate: Option<AccessGate>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns away operators outside `policy` before any handler runs.
    pub fn with_access_policy(mut self, policy: AccessPolicy, chat: Arc<dyn ChatClient>) -> Self {
        self.gate = Some(AccessGate { policy, chat });
        self
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        if let Some(gate) = &self.gate {
            if !gate.policy.is_open() {
                let permitted = update
                    .event
                    .operator()
                    .is_some_and(|operator| gate.policy.permits(&operator.id));
                if !permitted {
                    reject(gate, update, ctx).await?;
                    return Ok(HandlerResult::Unauthorized);
                }
            }
        }

        let Some(handler) = self.handlers.get(&update.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(update, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

async fn reject(
    gate: &AccessGate,
    update: &ChatUpdate,
    ctx: &EventContext,
) -> Result<(), EventHandlerError> {
    info!(
        event_name = "bot.access.denied",
        correlation_id = %ctx.correlation_id,
        operator = update.event.operator().map(|operator| operator.id.0.as_str()).unwrap_or("unknown"),
        "operator is not on the allow-list"
    );

    if let ChatEvent::Button(event) = &update.event {
        if let Err(error) = gate.chat.answer_callback(&event.callback_id).await {
            warn!(correlation_id = %ctx.correlation_id, error = %error, "failed to answer callback");
        }
    }
    if let Some(chat_id) = update.event.chat_id() {
        gate.chat.send_message(chat_id, &unauthorized_message()).await?;
    }
    Ok(())
}

/// Operator-facing behaviour behind each event kind.
#[async_trait]
pub trait LeadWorkflow: Send + Sync {
    async fn on_command(
        &self,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn on_button(
        &self,
        event: &ButtonEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn on_text(
        &self,
        event: &TextEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;

    async fn on_voice(
        &self,
        event: &VoiceEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub fn default_dispatcher<S>(service: Arc<S>) -> EventDispatcher
where
    S: LeadWorkflow + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(service.clone()));
    dispatcher.register(ButtonHandler::new(service.clone()));
    dispatcher.register(TextHandler::new(service.clone()));
    dispatcher.register(VoiceHandler::new(service));
    dispatcher
}

pub struct CommandHandler<S> {
    service: Arc<S>,
}

impl<S> CommandHandler<S>
where
    S: LeadWorkflow,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: LeadWorkflow + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Command
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Command(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.on_command(event, ctx).await
    }
}

pub struct ButtonHandler<S> {
    service: Arc<S>,
}

impl<S> ButtonHandler<S>
where
    S: LeadWorkflow,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ButtonHandler<S>
where
    S: LeadWorkflow + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Button
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Button(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.on_button(event, ctx).await
    }
}

pub struct TextHandler<S> {
    service: Arc<S>,
}

impl<S> TextHandler<S>
where
    S: LeadWorkflow,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextHandler<S>
where
    S: LeadWorkflow + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Text
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Text(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.on_text(event, ctx).await
    }
}

pub struct VoiceHandler<S> {
    service: Arc<S>,
}

impl<S> VoiceHandler<S>
where
    S: LeadWorkflow,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for VoiceHandler<S>
where
    S: LeadWorkflow + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Voice
    }

    async fn handle(
        &self,
        update: &ChatUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Voice(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.service.on_voice(event, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use outreach_core::{Operator, OperatorId};
    use tokio::sync::Mutex;

    use super::{
        default_dispatcher, ButtonEvent, ChatEvent, ChatUpdate, CommandEvent, EventContext,
        EventDispatcher, EventHandlerError, HandlerResult, LeadWorkflow, TextEvent, VoiceEvent,
    };
    use crate::auth::AccessPolicy;
    use crate::chat::{ChatClient, ChatId, MessageRef, TransportError};
    use crate::commands::BotCommand;
    use crate::messages::MessageTemplate;

    #[derive(Default)]
    struct CountingWorkflow {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl LeadWorkflow for CountingWorkflow {
        async fn on_command(
            &self,
            _event: &CommandEvent,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.calls.lock().await.push("command");
            Ok(HandlerResult::Processed)
        }

        async fn on_button(
            &self,
            _event: &ButtonEvent,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.calls.lock().await.push("button");
            Ok(HandlerResult::Processed)
        }

        async fn on_text(
            &self,
            _event: &TextEvent,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.calls.lock().await.push("text");
            Ok(HandlerResult::Ignored)
        }

        async fn on_voice(
            &self,
            _event: &VoiceEvent,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.calls.lock().await.push("voice");
            Ok(HandlerResult::Processed)
        }
    }

    #[derive(Default)]
    struct RecordingChat {
        sent: Mutex<Vec<(ChatId, String)>>,
        answered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatClient for RecordingChat {
        async fn send_message(
            &self,
            chat_id: ChatId,
            message: &MessageTemplate,
        ) -> Result<MessageRef, TransportError> {
            self.sent.lock().await.push((chat_id, message.text.clone()));
            Ok(MessageRef { chat_id, message_id: 1 })
        }

        async fn edit_message(
            &self,
            _target: MessageRef,
            _message: &MessageTemplate,
        ) -> Result<(), TransportError> {
            Ok(())
        }

        async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
            self.answered.lock().await.push(callback_id.to_owned());
            Ok(())
        }
    }

    fn operator(id: &str) -> Operator {
        Operator { id: OperatorId(id.to_owned()), username: None, first_name: None }
    }

    fn command_update(operator_id: &str) -> ChatUpdate {
        ChatUpdate {
            update_id: 1,
            event: ChatEvent::Command(CommandEvent {
                chat_id: ChatId(7),
                operator: operator(operator_id),
                command: BotCommand::Next,
                args: String::new(),
            }),
        }
    }

    #[tokio::test]
    async fn routes_each_event_kind_to_its_handler() {
        let workflow = Arc::new(CountingWorkflow::default());
        let dispatcher = default_dispatcher(workflow.clone());
        assert_eq!(dispatcher.handler_count(), 4);

        let ctx = EventContext::default();
        let result = dispatcher.dispatch(&command_update("1"), &ctx).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Processed);

        let text = ChatUpdate {
            update_id: 2,
            event: ChatEvent::Text(TextEvent {
                chat_id: ChatId(7),
                operator: operator("1"),
                text: "hello".to_owned(),
            }),
        };
        dispatcher.dispatch(&text, &ctx).await.expect("dispatch");

        let unsupported =
            ChatUpdate { update_id: 3, event: ChatEvent::Unsupported { kind: "sticker".to_owned() } };
        let result = dispatcher.dispatch(&unsupported, &ctx).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);

        assert_eq!(*workflow.calls.lock().await, vec!["command", "text"]);
    }

    #[tokio::test]
    async fn unauthorized_operator_never_reaches_handlers() {
        let workflow = Arc::new(CountingWorkflow::default());
        let chat = Arc::new(RecordingChat::default());
        let dispatcher = default_dispatcher(workflow.clone())
            .with_access_policy(AccessPolicy::from_users(["1001"]), chat.clone());

        let ctx = EventContext::default();
        let result = dispatcher.dispatch(&command_update("666"), &ctx).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Unauthorized);
        assert!(workflow.calls.lock().await.is_empty());
        assert_eq!(
            *chat.sent.lock().await,
            vec![(ChatId(7), "You are not authorized to use this bot.".to_owned())]
        );

        let button = ChatUpdate {
            update_id: 2,
            event: ChatEvent::Button(ButtonEvent {
                chat_id: ChatId(7),
                operator: operator("666"),
                callback_id: "cb-1".to_owned(),
                message: None,
                message_text: None,
                data: "result:ignored:2".to_owned(),
            }),
        };
        dispatcher.dispatch(&button, &ctx).await.expect("dispatch");
        assert_eq!(*chat.answered.lock().await, vec!["cb-1"]);

        let result = dispatcher.dispatch(&command_update("1001"), &ctx).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(*workflow.calls.lock().await, vec!["command"]);
    }

    #[tokio::test]
    async fn empty_dispatcher_ignores_everything() {
        let dispatcher = EventDispatcher::default();
        let result = dispatcher
            .dispatch(&command_update("1"), &EventContext::default())
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }
}
