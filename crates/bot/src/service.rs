use std::sync::Arc;

use async_trait::async_trait;
use outreach_agent::Transcriber;
use outreach_core::config::PromptLanguage;
use outreach_core::{ApplicationError, AssignmentEngine, Operator, ReasonInput};
use outreach_sheets::LeadRepository;
use tracing::{error, info, warn};

use crate::{
    chat::{ChatClient, ChatId},
    commands::{BotCommand, CallbackAction, CallbackKind},
    events::{
        ButtonEvent, CommandEvent, EventContext, EventHandlerError, HandlerResult, LeadWorkflow,
        TextEvent, VoiceEvent,
    },
    messages::{self, failures, MessageTemplate},
    sessions::SessionManager,
};

/// The lead-processing conversation: claim, pick an outcome, give a reason.
pub struct LeadBotService {
    repository: Arc<dyn LeadRepository>,
    transcriber: Arc<dyn Transcriber>,
    chat: Arc<dyn ChatClient>,
    sessions: SessionManager,
    language: PromptLanguage,
}

impl LeadBotService {
    pub fn new(
        repository: Arc<dyn LeadRepository>,
        transcriber: Arc<dyn Transcriber>,
        chat: Arc<dyn ChatClient>,
    ) -> Self {
        Self {
            repository,
            transcriber,
            chat,
            sessions: SessionManager::default(),
            language: PromptLanguage::default(),
        }
    }

    pub fn with_prompt_language(mut self, language: PromptLanguage) -> Self {
        self.language = language;
        self
    }

    pub fn with_engine(mut self, engine: AssignmentEngine) -> Self {
        self.sessions = SessionManager::new(engine);
        self
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    async fn reply(&self, chat_id: ChatId, message: MessageTemplate) -> Result<(), EventHandlerError> {
        self.chat.send_message(chat_id, &message).await?;
        Ok(())
    }

    /// Logs `error` and picks the reply: rule violations get the user-safe interface
    /// message, everything else the operation's own retry hint.
    fn failure_reply(
        &self,
        error: ApplicationError,
        ctx: &EventContext,
        operation: &'static str,
        fallback: MessageTemplate,
    ) -> MessageTemplate {
        error!(
            event_name = "bot.operation.failed",
            correlation_id = %ctx.correlation_id,
            operation,
            error_class = error.class(),
            error = %error,
            "operator action failed"
        );
        match error {
            ApplicationError::Domain(_) => {
                MessageTemplate::plain(error.into_interface(ctx.correlation_id.clone()).user_message())
            }
            _ => fallback,
        }
    }

    async fn send_next_lead(&self, event: &CommandEvent, ctx: &EventContext) -> MessageTemplate {
        match self.repository.claim_next(&event.operator.completed_by_tag()).await {
            Ok(Some(lead)) => {
                info!(
                    event_name = "bot.lead.presented",
                    correlation_id = %ctx.correlation_id,
                    operator = %event.operator.id,
                    row_index = lead.row_index.get(),
                    "lead card sent"
                );
                messages::lead_card(&lead)
            }
            Ok(None) => messages::no_leads_message(),
            Err(error) => self.failure_reply(error.into(), ctx, "next", failures::next_lead()),
        }
    }

    async fn send_stats(&self, ctx: &EventContext) -> MessageTemplate {
        match self.repository.compute_stats().await {
            Ok(stats) => messages::stats_message(&stats),
            Err(error) => self.failure_reply(error.into(), ctx, "stats", failures::stats()),
        }
    }

    async fn edit_card(&self, event: &ButtonEvent, message: MessageTemplate, ctx: &EventContext) {
        let Some(target) = event.message else {
            return;
        };
        if let Err(error) = self.chat.edit_message(target, &message).await {
            warn!(
                correlation_id = %ctx.correlation_id,
                message_id = target.message_id,
                error = %error,
                "failed to edit message; continuing"
            );
        }
    }

    async fn select_outcome(
        &self,
        event: &ButtonEvent,
        action: CallbackAction,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let card_text = event.message_text.clone().unwrap_or_default();

        if !action.outcome.requires_reason() {
            let finalized = self.finalize_without_prompt(&event.operator, action).await;
            let reply = match finalized {
                Ok(()) => {
                    self.edit_card(event, messages::card_with_result(&card_text, action.outcome), ctx)
                        .await;
                    messages::marked_message(action.outcome)
                }
                Err(error) => self.failure_reply(error, ctx, "select", failures::selection()),
            };
            return self.reply(event.chat_id, reply).await;
        }

        let opened = self
            .sessions
            .begin(&event.operator, action.outcome, action.row_index, self.repository.as_ref())
            .await;
        match opened {
            Ok(_) => {
                self.edit_card(event, messages::card_with_result(&card_text, action.outcome), ctx)
                    .await;
                self.reply(event.chat_id, messages::reason_prompt(action, self.language)).await
            }
            Err(error) => {
                let reply = self.failure_reply(error, ctx, "select", failures::selection());
                self.reply(event.chat_id, reply).await
            }
        }
    }

    async fn finalize_without_prompt(
        &self,
        operator: &Operator,
        action: CallbackAction,
    ) -> Result<(), ApplicationError> {
        self.repository
            .finalize_claim(
                action.row_index,
                action.outcome,
                ReasonInput::NotSolicited,
                "",
                &operator.completed_by_tag(),
            )
            .await?;
        Ok(())
    }

    async fn skip_reason(
        &self,
        event: &ButtonEvent,
        action: CallbackAction,
        ctx: &EventContext,
    ) -> Result<(), EventHandlerError> {
        let skipped = self
            .sessions
            .skip_reason(&event.operator, action.outcome, action.row_index, self.repository.as_ref())
            .await;
        match skipped {
            Ok(()) => {
                self.edit_card(event, messages::reason_skipped_message(), ctx).await;
                self.reply(event.chat_id, messages::marked_message(action.outcome)).await
            }
            Err(error) => {
                let reply = self.failure_reply(error, ctx, "skip", failures::skip());
                self.reply(event.chat_id, reply).await
            }
        }
    }

    async fn save_reason(
        &self,
        chat_id: ChatId,
        operator: &Operator,
        reason: &str,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        match self.sessions.resolve_reason(&operator.id, reason, self.repository.as_ref()).await {
            Ok(Some(session)) => {
                info!(
                    event_name = "bot.reason.saved",
                    correlation_id = %ctx.correlation_id,
                    operator = %operator.id,
                    row_index = session.row_index.get(),
                    outcome = session.outcome.token(),
                    "reason saved"
                );
                self.reply(chat_id, messages::saved_message(session.outcome, reason)).await?;
                Ok(HandlerResult::Processed)
            }
            Ok(None) => Ok(HandlerResult::Ignored),
            Err(error) => {
                let reply = self.failure_reply(error, ctx, "save_reason", failures::save_reason());
                self.reply(chat_id, reply).await?;
                Ok(HandlerResult::Processed)
            }
        }
    }
}

#[async_trait]
impl LeadWorkflow for LeadBotService {
    async fn on_command(
        &self,
        event: &CommandEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let reply = match &event.command {
            BotCommand::Start => messages::welcome_message(),
            BotCommand::Help => messages::help_message(),
            BotCommand::Next => self.send_next_lead(event, ctx).await,
            BotCommand::Stats => self.send_stats(ctx).await,
            BotCommand::Unknown(name) => messages::unknown_command_message(name),
        };
        self.reply(event.chat_id, reply).await?;
        Ok(HandlerResult::Processed)
    }

    async fn on_button(
        &self,
        event: &ButtonEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if let Err(error) = self.chat.answer_callback(&event.callback_id).await {
            warn!(correlation_id = %ctx.correlation_id, error = %error, "failed to answer callback");
        }

        let action = match CallbackAction::parse(&event.data) {
            Ok(action) => action,
            Err(error) => {
                warn!(
                    event_name = "bot.callback.rejected",
                    correlation_id = %ctx.correlation_id,
                    data = %event.data,
                    error = %error,
                    "unrecognized button payload"
                );
                self.reply(event.chat_id, failures::selection()).await?;
                return Ok(HandlerResult::Ignored);
            }
        };

        match action.kind {
            CallbackKind::Result => self.select_outcome(event, action, ctx).await?,
            CallbackKind::Skip => self.skip_reason(event, action, ctx).await?,
        }
        Ok(HandlerResult::Processed)
    }

    async fn on_text(
        &self,
        event: &TextEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if self.sessions.get(&event.operator.id).await.is_none() {
            return Ok(HandlerResult::Ignored);
        }
        self.save_reason(event.chat_id, &event.operator, &event.text, ctx).await
    }

    async fn on_voice(
        &self,
        event: &VoiceEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if self.sessions.get(&event.operator.id).await.is_none() {
            self.reply(event.chat_id, messages::no_session_for_voice_message()).await?;
            return Ok(HandlerResult::Processed);
        }

        self.reply(event.chat_id, messages::transcribing_message()).await?;
        let transcript = match self.transcriber.transcribe(&event.audio).await {
            Ok(transcript) => transcript,
            Err(error) => {
                let error = ApplicationError::Transcription(error.to_string());
                let reply = self.failure_reply(error, ctx, "transcribe", failures::transcription());
                self.reply(event.chat_id, reply).await?;
                return Ok(HandlerResult::Processed);
            }
        };

        self.reply(event.chat_id, messages::transcribed_message(&transcript)).await?;
        self.save_reason(event.chat_id, &event.operator, &transcript, ctx).await
    }
}
