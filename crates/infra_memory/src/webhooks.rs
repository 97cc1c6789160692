//! In-memory webhook event audit store

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use core_kernel::{DomainPort, PaymentId, PortError};
use domain_webhooks::{EventInsert, StoredWebhookEvent, WebhookEventStore};

use crate::state::MemoryState;

/// In-memory implementation of [`WebhookEventStore`]
#[derive(Clone)]
pub struct MemoryWebhookEventStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryWebhookEventStore {
    pub(crate) fn new(state: Arc<Mutex<MemoryState>>) -> Self {
        Self { state }
    }
}

impl DomainPort for MemoryWebhookEventStore {}

#[async_trait]
impl WebhookEventStore for MemoryWebhookEventStore {
    async fn insert_or_get(&self, event: StoredWebhookEvent) -> Result<EventInsert, PortError> {
        let mut state = self.state.lock().await;
        let key = (event.provider, event.provider_event_id.clone());
        if let Some(existing_id) = state.event_by_key.get(&key) {
            let existing = state
                .events
                .get(existing_id)
                .cloned()
                .ok_or_else(|| PortError::internal("event index out of sync"))?;
            return Ok(EventInsert::Existing(existing));
        }
        state.event_by_key.insert(key, event.id);
        state.events.insert(event.id, event.clone());
        Ok(EventInsert::Inserted(event))
    }

    async fn list_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<StoredWebhookEvent>, PortError> {
        let state = self.state.lock().await;
        let mut events: Vec<StoredWebhookEvent> = state
            .events
            .values()
            .filter(|e| &e.payment_id == payment_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.received_at);
        Ok(events)
    }
}
