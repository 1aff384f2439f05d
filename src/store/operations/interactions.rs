use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// Append-only interaction event stream (session_start, sentence_selected,
/// sentence_review, word_graduated, material_accepted, …). Consumers are out
/// of process; this is the durable record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub id: String,
    pub event: String,
    pub at: DateTime<Utc>,
    pub attrs: serde_json::Value,
}

impl Store {
    pub fn log_interaction(
        &self,
        event: &str,
        attrs: serde_json::Value,
    ) -> Result<(), StoreError> {
        let record = InteractionEvent {
            id: uuid::Uuid::new_v4().to_string(),
            event: event.to_string(),
            at: Utc::now(),
            attrs,
        };
        let key = keys::interaction_key(record.at.timestamp_millis(), &record.id);
        self.interactions
            .insert(key.as_bytes(), Self::serialize(&record)?)?;
        Ok(())
    }

    /// Most recent events first (reverse-timestamp keys scan newest-first).
    pub fn recent_interactions(
        &self,
        limit: usize,
    ) -> Result<Vec<InteractionEvent>, StoreError> {
        let mut events = Vec::new();
        for item in self.interactions.iter() {
            let (_, v) = item?;
            events.push(Self::deserialize::<InteractionEvent>(&v)?);
            if events.len() >= limit {
                break;
            }
        }
        Ok(events)
    }
}
