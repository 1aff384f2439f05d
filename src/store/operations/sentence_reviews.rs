use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::operations::sentences::{Comprehension, ReviewMode};
use crate::store::{Store, StoreError};

/// One record per sentence-level review, orthogonal to the per-lemma logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceReviewLog {
    pub id: String,
    pub sentence_id: Option<String>,
    pub primary_lemma_id: String,
    pub comprehension_signal: Comprehension,
    pub missed_lemma_ids: Vec<String>,
    pub confused_feature_keys: Vec<String>,
    pub review_mode: ReviewMode,
    pub response_ms: Option<u32>,
    pub session_id: Option<String>,
    pub client_review_id: Option<String>,
    pub word_count: usize,
    pub reviewed_at: DateTime<Utc>,
}

impl Store {
    pub fn append_sentence_review_log(
        &self,
        log: &SentenceReviewLog,
    ) -> Result<(), StoreError> {
        if let Some(crid) = &log.client_review_id {
            let idx_key = keys::client_review_id_key(crid);
            let prior = self.sentence_review_client_ids.compare_and_swap(
                idx_key.as_bytes(),
                None::<&[u8]>,
                Some(log.id.as_bytes()),
            )?;
            if prior.is_err() {
                return Err(StoreError::Conflict {
                    entity: "sentence_review_log".to_string(),
                    key: crid.clone(),
                });
            }
        }

        let key = keys::sentence_review_log_key(log.reviewed_at.timestamp_millis(), &log.id);
        self.sentence_review_logs
            .insert(key.as_bytes(), Self::serialize(log)?)?;
        Ok(())
    }

    pub fn sentence_review_exists(&self, client_review_id: &str) -> Result<bool, StoreError> {
        let idx_key = keys::client_review_id_key(client_review_id);
        Ok(self
            .sentence_review_client_ids
            .get(idx_key.as_bytes())?
            .is_some())
    }

    pub fn remove_sentence_review_by_client_id(
        &self,
        client_review_id: &str,
    ) -> Result<bool, StoreError> {
        let idx_key = keys::client_review_id_key(client_review_id);
        if self
            .sentence_review_client_ids
            .remove(idx_key.as_bytes())?
            .is_none()
        {
            return Ok(false);
        }
        let mut found: Option<Vec<u8>> = None;
        for item in self.sentence_review_logs.iter() {
            let (k, v) = item?;
            let log: SentenceReviewLog = Self::deserialize(&v)?;
            if log.client_review_id.as_deref() == Some(client_review_id) {
                found = Some(k.to_vec());
                break;
            }
        }
        if let Some(k) = found {
            self.sentence_review_logs.remove(&k)?;
        }
        Ok(true)
    }
}
