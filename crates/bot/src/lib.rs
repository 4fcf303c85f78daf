//! Telegram front end for the lead queue
//!
//! - **Runner** (`runner`) - long-polling update loop with reconnection logic
//! - **Events** (`events`) - commands, button presses, text and voice replies
//! - **Commands** (`commands`) - `/next`, `/stats` and button payload parsing
//! - **Messages** (`messages`) - lead cards, reason prompts, inline keyboards
//! - **Sessions** (`sessions`) - operators waiting to give a reason
//! - **Telegram** (`telegram`) - Bot API transport, outbound chat client, voice downloads
//!
//! ```text
//! Telegram updates → PollingRunner → EventDispatcher → LeadBotService → Lead sheet
//!                                         ↓
//!                               MessageTemplate ← reply
//! ```

pub mod auth;
pub mod chat;
pub mod commands;
pub mod events;
pub mod messages;
pub mod runner;
pub mod service;
pub mod sessions;
pub mod telegram;

pub use auth::AccessPolicy;
pub use chat::{ChatClient, ChatId, MessageRef, TransportError};
pub use events::{default_dispatcher, EventDispatcher, LeadWorkflow};
pub use runner::{PollingRunner, ReconnectPolicy, UpdateTransport};
pub use service::LeadBotService;
pub use sessions::SessionManager;
pub use telegram::TelegramTransport;
