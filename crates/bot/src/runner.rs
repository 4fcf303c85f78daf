use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    chat::TransportError,
    commands::CallbackAction,
    events::{ChatEvent, ChatUpdate, EventContext, EventDispatcher},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Inbound side of the chat platform. `next_update` yields `None` once the stream is closed.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_update(&self) -> Result<Option<ChatUpdate>, TransportError>;
    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Pumps updates until the transport closes. Transport failures reconnect with backoff;
    /// the retry budget resets whenever a connection delivered at least one update.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let mut delivered = 0_usize;
            let Err(transport_error) = self.connect_and_pump(attempt, &mut delivered).await else {
                return Ok(());
            };
            if delivered > 0 {
                attempt = 0;
            }

            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %transport_error,
                "chat transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "chat transport retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(
        &self,
        attempt: u32,
        delivered: &mut usize,
    ) -> Result<(), TransportError> {
        info!(attempt, "opening chat transport connection");
        self.transport.connect().await?;
        info!(attempt, "chat transport connected");

        loop {
            let Some(update) = self.transport.next_update().await? else {
                info!(attempt, "chat transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            *delivered += 1;

            let correlation_id = Uuid::new_v4().to_string();
            let (operator, row_index) = correlation_fields(&update);

            info!(
                event_name = "ingress.telegram.update_received",
                update_id = update.update_id,
                event_type = ?update.event.event_type(),
                correlation_id = %correlation_id,
                operator = operator.unwrap_or("unknown"),
                row_index = row_index.unwrap_or_default(),
                "received chat update"
            );

            if let Err(error) = self.transport.acknowledge(update.update_id).await {
                warn!(
                    event_name = "ingress.telegram.ack_sent",
                    update_id = update.update_id,
                    correlation_id = %correlation_id,
                    error = %error,
                    "failed to acknowledge chat update"
                );
            } else {
                debug!(
                    event_name = "ingress.telegram.ack_sent",
                    update_id = update.update_id,
                    correlation_id = %correlation_id,
                    "acknowledged chat update"
                );
            }

            let context = EventContext { correlation_id: correlation_id.clone() };
            if let Err(error) = self.dispatcher.dispatch(&update, &context).await {
                warn!(
                    update_id = update.update_id,
                    correlation_id = %correlation_id,
                    operator = operator.unwrap_or("unknown"),
                    error = %error,
                    "event dispatch failed; continuing polling loop"
                );
            }
        }
    }
}

fn correlation_fields(update: &ChatUpdate) -> (Option<&str>, Option<u32>) {
    let operator = update.event.operator().map(|operator| operator.id.0.as_str());
    let row_index = match &update.event {
        ChatEvent::Button(event) => {
            CallbackAction::parse(&event.data).ok().map(|action| action.row_index.get())
        }
        _ => None,
    };
    (operator, row_index)
}
