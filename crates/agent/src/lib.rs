//! Model-backed helpers for the outreach pipeline.
//!
//! - `llm`: completion client trait with Anthropic and OpenAI implementations
//! - `extraction`: batched name/company extraction from chat titles
//! - `transcription`: voice note download, scoped staging and speech-to-text
//! - `pipeline`: chat export filtering and lead extraction runs
//!
//! Model output is only ever used to fill identity columns. Queue state is decided
//! by the assignment engine in `outreach-core`.

pub mod extraction;
pub mod llm;
pub mod pipeline;
pub mod transcription;

pub use extraction::{ExtractedIdentity, ExtractionBatchError, TitleExtractor};
pub use llm::{build_llm_client, AnthropicClient, LlmClient, OpenAiClient};
pub use pipeline::{ChatKind, ChatSummary, ExtractionReport};
pub use transcription::{
    AudioFetcher, AudioRef, SpeechToText, Transcriber, TranscriptionBridge, TranscriptionError,
    WhisperTranscriber,
};
