use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::operations::knowledge::{FsrsCard, KnowledgeState};
use crate::store::operations::sentences::{Comprehension, ReviewMode};
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    Primary,
    Collateral,
    Encounter,
    Acquisition,
}

/// Pre-transition snapshot stored with every review. The undo path restores
/// cards and counters from here, so fields must survive round-tripping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSnapshot {
    pub state_before: KnowledgeState,
    pub card_before: Option<FsrsCard>,
    pub acquisition_box_before: Option<u8>,
    pub acquisition_box_after: Option<u8>,
    #[serde(default)]
    pub acquisition_next_due_before: Option<DateTime<Utc>>,
    pub graduated: bool,
    pub pre_times_seen: u32,
    pub pre_times_correct: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: String,
    pub lemma_id: String,
    pub rating: u8,
    pub reviewed_at: DateTime<Utc>,
    pub response_ms: Option<u32>,
    pub review_mode: ReviewMode,
    pub comprehension_signal: Option<Comprehension>,
    pub credit_type: CreditType,
    pub sentence_id: Option<String>,
    pub session_id: Option<String>,
    pub client_review_id: Option<String>,
    pub is_acquisition: bool,
    pub fsrs_log: ReviewSnapshot,
}

impl Store {
    /// Append a review. `client_review_id` uniqueness is enforced here via
    /// the index tree; a colliding append is a Conflict (callers check for
    /// duplicates first and report them as no-op results, not errors).
    pub fn append_review_log(&self, log: &ReviewLog) -> Result<(), StoreError> {
        if let Some(crid) = &log.client_review_id {
            let idx_key = keys::client_review_id_key(crid);
            let prior = self.review_client_ids.compare_and_swap(
                idx_key.as_bytes(),
                None::<&[u8]>,
                Some(log.id.as_bytes()),
            )?;
            if prior.is_err() {
                return Err(StoreError::Conflict {
                    entity: "review_log".to_string(),
                    key: crid.clone(),
                });
            }
        }

        let ts = log.reviewed_at.timestamp_millis();
        let key = keys::review_log_key(ts, &log.id);
        self.review_logs
            .insert(key.as_bytes(), Self::serialize(log)?)?;

        let lemma_key = keys::review_by_lemma_key(&log.lemma_id, ts, &log.id);
        self.reviews_by_lemma
            .insert(lemma_key.as_bytes(), key.as_bytes())?;
        Ok(())
    }

    pub fn client_review_id_exists(&self, client_review_id: &str) -> Result<bool, StoreError> {
        let idx_key = keys::client_review_id_key(client_review_id);
        Ok(self.review_client_ids.get(idx_key.as_bytes())?.is_some())
    }

    /// Most recent reviews across all lemmas (reverse-timestamp key order).
    pub fn recent_reviews(&self, limit: usize) -> Result<Vec<ReviewLog>, StoreError> {
        let mut logs = Vec::new();
        for item in self.review_logs.iter() {
            let (_, v) = item?;
            logs.push(Self::deserialize::<ReviewLog>(&v)?);
            if logs.len() >= limit {
                break;
            }
        }
        Ok(logs)
    }

    /// Reviews for a lemma, most recent first.
    pub fn reviews_for_lemma(
        &self,
        lemma_id: &str,
        limit: usize,
    ) -> Result<Vec<ReviewLog>, StoreError> {
        let prefix = keys::review_by_lemma_prefix(lemma_id);
        let mut logs = Vec::new();
        for item in self.reviews_by_lemma.scan_prefix(prefix.as_bytes()) {
            let (_, log_key) = item?;
            if let Some(raw) = self.review_logs.get(&log_key)? {
                logs.push(Self::deserialize::<ReviewLog>(&raw)?);
            }
            if logs.len() >= limit {
                break;
            }
        }
        Ok(logs)
    }

    pub fn last_review_for_lemma(&self, lemma_id: &str) -> Result<Option<ReviewLog>, StoreError> {
        Ok(self.reviews_for_lemma(lemma_id, 1)?.into_iter().next())
    }

    /// Distinct UTC calendar days on which a lemma received acquisition
    /// reviews. Graduation requires this to span ≥ 2 days.
    pub fn acquisition_review_days(&self, lemma_id: &str) -> Result<usize, StoreError> {
        let mut days: HashSet<chrono::NaiveDate> = HashSet::new();
        for log in self.reviews_for_lemma(lemma_id, usize::MAX)? {
            if log.is_acquisition {
                days.insert(log.reviewed_at.date_naive());
            }
        }
        Ok(days.len())
    }

    /// Remove every review whose client id is `client_review_id` or prefixed
    /// `client_review_id:`. Returns the removed logs, newest first, for the
    /// undo path to restore snapshots from.
    pub fn remove_reviews_by_client_id(
        &self,
        client_review_id: &str,
    ) -> Result<Vec<ReviewLog>, StoreError> {
        let mut matched_ids: Vec<String> = Vec::new();
        let exact = keys::client_review_id_key(client_review_id);
        if self.review_client_ids.get(exact.as_bytes())?.is_some() {
            matched_ids.push(client_review_id.to_string());
        }
        let prefix = format!("{client_review_id}:");
        for item in self.review_client_ids.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item?;
            matched_ids.push(String::from_utf8_lossy(&k).to_string());
        }

        let mut removed = Vec::new();
        for crid in matched_ids {
            self.review_client_ids.remove(crid.as_bytes())?;
            // Scan for the log row carrying this client id; log volume per
            // client id is one, so the per-undo scan is bounded in practice
            // by the recent window.
            let mut found_key: Option<Vec<u8>> = None;
            for item in self.review_logs.iter() {
                let (k, v) = item?;
                let log: ReviewLog = Self::deserialize(&v)?;
                if log.client_review_id.as_deref() == Some(crid.as_str()) {
                    found_key = Some(k.to_vec());
                    removed.push(log);
                    break;
                }
            }
            if let Some(k) = found_key {
                self.review_logs.remove(&k)?;
                if let Some(log) = removed.last() {
                    let lemma_key = keys::review_by_lemma_key(
                        &log.lemma_id,
                        log.reviewed_at.timestamp_millis(),
                        &log.id,
                    );
                    self.reviews_by_lemma.remove(lemma_key.as_bytes())?;
                }
            }
        }

        removed.sort_by(|a, b| b.reviewed_at.cmp(&a.reviewed_at));
        Ok(removed)
    }

    /// The review preceding `before` for a lemma, used to restore state after
    /// an undo when the removed review was not the first.
    pub fn review_before(
        &self,
        lemma_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<ReviewLog>, StoreError> {
        for log in self.reviews_for_lemma(lemma_id, usize::MAX)? {
            if log.reviewed_at < before {
                return Ok(Some(log));
            }
        }
        Ok(None)
    }
}
