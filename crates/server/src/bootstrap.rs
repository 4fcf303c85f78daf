use std::sync::Arc;

use async_trait::async_trait;
use outreach_agent::{
    AudioRef, Transcriber, TranscriptionBridge, TranscriptionError, WhisperTranscriber,
};
use outreach_bot::{
    default_dispatcher, AccessPolicy, LeadBotService, PollingRunner, ReconnectPolicy,
    TelegramTransport, TransportError,
};
use outreach_core::config::{AppConfig, ConfigError, LoadOptions};
use outreach_core::AssignmentEngine;
use outreach_sheets::{
    GoogleSheetsRowStore, LeadRepository, RowStore, RowStoreError, SheetLayout, SheetLeadRepository,
};
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<dyn RowStore>,
    pub layout: SheetLayout,
    pub repository: Arc<dyn LeadRepository>,
    pub runner: PollingRunner,
    pub telegram: Arc<TelegramTransport>,
    pub transcription_enabled: bool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("lead sheet client setup failed: {0}")]
    Sheets(#[source] RowStoreError),
    #[error("telegram client setup failed: {0}")]
    Telegram(#[source] TransportError),
}

/// Stands in when no speech-to-text key is configured; voice replies get the
/// transcription failure message and the reason prompt stays open.
struct DisabledTranscriber;

#[async_trait]
impl Transcriber for DisabledTranscriber {
    async fn transcribe(&self, _audio: &AudioRef) -> Result<String, TranscriptionError> {
        Err(TranscriptionError::NotConfigured("transcription.api_key is not set".to_owned()))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store: Arc<dyn RowStore> =
        Arc::new(GoogleSheetsRowStore::new(&config.sheets).map_err(BootstrapError::Sheets)?);
    let layout = SheetLayout::new(config.sheet_prefix());
    let repository: Arc<dyn LeadRepository> =
        Arc::new(SheetLeadRepository::configured(store.clone(), &config));
    info!(
        event_name = "system.bootstrap.sheet_configured",
        correlation_id = "bootstrap",
        spreadsheet_id = %config.sheets.spreadsheet_id,
        reclaim_enabled = config.queue.reclaim_after_secs.is_some(),
        "lead sheet repository configured"
    );

    let telegram =
        Arc::new(TelegramTransport::new(&config.telegram).map_err(BootstrapError::Telegram)?);

    let (transcriber, transcription_enabled): (Arc<dyn Transcriber>, bool) =
        match WhisperTranscriber::new(&config.transcription) {
            Ok(speech) => (
                Arc::new(TranscriptionBridge::new(
                    telegram.clone(),
                    Arc::new(speech),
                    config.transcription.language.clone(),
                )),
                true,
            ),
            Err(error) => {
                warn!(
                    event_name = "system.bootstrap.transcription_disabled",
                    correlation_id = "bootstrap",
                    error = %error,
                    "voice reasons disabled"
                );
                (Arc::new(DisabledTranscriber), false)
            }
        };

    let engine = AssignmentEngine::new().with_reclaim(config.queue.reclaim_after_secs.is_some());
    let service = LeadBotService::new(repository.clone(), transcriber, telegram.clone())
        .with_prompt_language(config.bot.prompt_language)
        .with_engine(engine);

    let policy = AccessPolicy::from_users(&config.bot.authorized_users);
    if policy.is_open() {
        warn!(
            event_name = "system.bootstrap.open_access",
            correlation_id = "bootstrap",
            "bot.authorized_users is empty; every chat user may work the queue"
        );
    }
    let dispatcher =
        default_dispatcher(Arc::new(service)).with_access_policy(policy, telegram.clone());
    let runner = PollingRunner::new(telegram.clone(), dispatcher, ReconnectPolicy::default());

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        transcription_enabled,
        "application bootstrap complete"
    );

    Ok(Application {
        config,
        store,
        layout,
        repository,
        runner,
        telegram,
        transcription_enabled,
    })
}
