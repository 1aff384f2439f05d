//! Post-graduation scheduling on FSRS. Ratings are Again/Hard/Good/Easy =
//! 1/2/3/4; each review produces a new (stability, difficulty, due) tuple.
//! Next-due computation is deterministic (no fuzz), so replays and tests
//! see identical schedules.

use chrono::{DateTime, Duration, Utc};
use fsrs::{MemoryState, DEFAULT_PARAMETERS, FSRS};
use serde::Serialize;

use crate::engine::{Engine, EngineError};
use crate::store::operations::knowledge::{FsrsCard, KnowledgeState};
use crate::store::operations::review_logs::{CreditType, ReviewLog, ReviewSnapshot};
use crate::store::operations::sentences::{Comprehension, ReviewMode};
use crate::store::StoreError;

/// Floor for the Again re-entry interval. FSRS can propose sub-day intervals;
/// anything shorter than this collapses into the same sitting.
const MIN_AGAIN_INTERVAL_SECS: i64 = 600;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsReviewOutcome {
    pub lemma_id: String,
    pub rating: u8,
    pub new_state: KnowledgeState,
    pub credit_type: CreditType,
    pub next_due: Option<DateTime<Utc>>,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoOutcome {
    pub undone: bool,
    pub reviews_removed: usize,
}

fn interval_duration(interval_days: f32) -> Duration {
    Duration::seconds((f64::from(interval_days) * 86_400.0) as i64)
}

impl Engine {
    fn scheduler(&self) -> Result<FSRS, EngineError> {
        FSRS::new(Some(&DEFAULT_PARAMETERS))
            .map_err(|e| EngineError::Scheduler(e.to_string()))
    }

    /// The synthetic Good review that seeds a graduating word's card.
    pub(crate) fn seed_graduation_card(&self, now: DateTime<Utc>) -> Result<FsrsCard, EngineError> {
        let fsrs = self.scheduler()?;
        let next = fsrs
            .next_states(None, self.config().desired_retention, 0)
            .map_err(|e| EngineError::Scheduler(e.to_string()))?;
        Ok(FsrsCard {
            stability: next.good.memory.stability,
            difficulty: next.good.memory.difficulty,
            due: now + interval_duration(next.good.interval),
            last_review: Some(now),
            reps: 1,
        })
    }

    /// Transition an SRS card on a rating. Idempotent by `client_review_id`.
    /// Rating 1 on `known` demotes to `lapsed`; a successful review on
    /// `lapsed` recovers to `learning`; `learning` promotes to `known` once
    /// stability crosses the configured threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_srs_review(
        &self,
        lemma_id: &str,
        rating: u8,
        response_ms: Option<u32>,
        session_id: Option<&str>,
        review_mode: ReviewMode,
        comprehension_signal: Option<Comprehension>,
        credit_type: CreditType,
        sentence_id: Option<&str>,
        client_review_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SrsReviewOutcome, EngineError> {
        if let Some(crid) = client_review_id {
            if self.store().client_review_id_exists(crid)? {
                let ulk = self.store().get_knowledge(lemma_id)?;
                return Ok(SrsReviewOutcome {
                    lemma_id: lemma_id.to_string(),
                    rating,
                    new_state: ulk
                        .as_ref()
                        .map(|u| u.state)
                        .unwrap_or(KnowledgeState::Learning),
                    credit_type,
                    next_due: ulk.and_then(|u| u.due_at()),
                    duplicate: true,
                });
            }
        }

        let Some(mut ulk) = self.store().get_knowledge(lemma_id)? else {
            return Err(StoreError::NotFound {
                entity: "knowledge".to_string(),
                key: lemma_id.to_string(),
            }
            .into());
        };

        if ulk.state == KnowledgeState::Acquiring {
            let outcome = self.submit_acquisition_review(
                &crate::engine::acquisition::AcquisitionReviewInput {
                    lemma_id,
                    rating,
                    response_ms,
                    session_id,
                    review_mode,
                    comprehension_signal,
                    client_review_id,
                },
                now,
            )?;
            return Ok(SrsReviewOutcome {
                lemma_id: outcome.lemma_id,
                rating,
                new_state: outcome.new_state,
                credit_type: CreditType::Acquisition,
                next_due: outcome.next_due,
                duplicate: outcome.duplicate,
            });
        }

        let Some(card_before) = ulk.fsrs_card.clone() else {
            return Err(StoreError::InvariantViolation {
                lemma_id: lemma_id.to_string(),
                detail: format!("srs review on state {} without card", ulk.state.as_str()),
            }
            .into());
        };

        let days_elapsed = card_before
            .last_review
            .map(|last| u32::try_from((now - last).num_days().clamp(0, 36_500)).unwrap_or(0))
            .unwrap_or(0);

        let fsrs = self.scheduler()?;
        let current = MemoryState {
            stability: card_before.stability,
            difficulty: card_before.difficulty,
        };
        let next_states = fsrs
            .next_states(Some(current), self.config().desired_retention, days_elapsed)
            .map_err(|e| EngineError::Scheduler(e.to_string()))?;

        let chosen = match rating {
            1 => next_states.again,
            2 => next_states.hard,
            4 => next_states.easy,
            _ => next_states.good,
        };

        let mut interval = interval_duration(chosen.interval);
        if rating == 1 && interval < Duration::seconds(MIN_AGAIN_INTERVAL_SECS) {
            interval = Duration::seconds(MIN_AGAIN_INTERVAL_SECS);
        }

        let new_card = FsrsCard {
            stability: chosen.memory.stability,
            difficulty: chosen.memory.difficulty,
            due: now + interval,
            last_review: Some(now),
            reps: card_before.reps + 1,
        };

        let old_state = ulk.state;
        ulk.state = match (old_state, rating) {
            (KnowledgeState::Known, 1) => KnowledgeState::Lapsed,
            (KnowledgeState::Lapsed, r) if r >= 3 => KnowledgeState::Learning,
            (KnowledgeState::Learning, r)
                if r >= 3 && new_card.stability >= self.config().known_stability_days =>
            {
                KnowledgeState::Known
            }
            (state, _) => state,
        };

        ulk.fsrs_card = Some(new_card.clone());
        ulk.times_seen += 1;
        if rating >= 3 {
            ulk.times_correct += 1;
        }
        ulk.total_encounters += 1;
        ulk.last_reviewed = Some(now);
        self.store().put_knowledge(&ulk)?;

        self.store().append_review_log(&ReviewLog {
            id: uuid::Uuid::new_v4().to_string(),
            lemma_id: lemma_id.to_string(),
            rating,
            reviewed_at: now,
            response_ms,
            review_mode,
            comprehension_signal,
            credit_type,
            sentence_id: sentence_id.map(str::to_string),
            session_id: session_id.map(str::to_string),
            client_review_id: client_review_id.map(str::to_string),
            is_acquisition: false,
            fsrs_log: ReviewSnapshot {
                state_before: old_state,
                card_before: Some(card_before),
                acquisition_box_before: None,
                acquisition_box_after: None,
                acquisition_next_due_before: None,
                graduated: false,
                pre_times_seen: ulk.times_seen - 1,
                pre_times_correct: if rating >= 3 {
                    ulk.times_correct - 1
                } else {
                    ulk.times_correct
                },
            },
        })?;

        Ok(SrsReviewOutcome {
            lemma_id: lemma_id.to_string(),
            rating,
            new_state: ulk.state,
            credit_type,
            next_due: Some(new_card.due),
            duplicate: false,
        })
    }

    /// Undo a sentence review: remove every per-lemma log whose client id is
    /// `client_review_id` or prefixed `client_review_id:<lemma>`, and restore
    /// each affected ULK from its pre-review snapshot.
    pub fn undo_sentence_review(
        &self,
        client_review_id: &str,
    ) -> Result<UndoOutcome, EngineError> {
        let sentence_removed = self
            .store()
            .remove_sentence_review_by_client_id(client_review_id)?;
        let removed = self.store().remove_reviews_by_client_id(client_review_id)?;

        if removed.is_empty() && !sentence_removed {
            return Ok(UndoOutcome {
                undone: false,
                reviews_removed: 0,
            });
        }

        for log in &removed {
            let Some(mut ulk) = self.store().get_knowledge(&log.lemma_id)? else {
                continue;
            };
            ulk.state = log.fsrs_log.state_before;
            ulk.fsrs_card = log.fsrs_log.card_before.clone();
            ulk.acquisition_box = log.fsrs_log.acquisition_box_before;
            ulk.acquisition_next_due = log.fsrs_log.acquisition_next_due_before;
            ulk.times_seen = log.fsrs_log.pre_times_seen;
            ulk.times_correct = log.fsrs_log.pre_times_correct;
            if log.fsrs_log.state_before != KnowledgeState::Acquiring {
                ulk.acquisition_box = None;
                ulk.acquisition_next_due = None;
            }
            ulk.last_reviewed = self
                .store()
                .review_before(&log.lemma_id, log.reviewed_at)?
                .map(|prior| prior.reviewed_at);
            self.store().put_knowledge(&ulk)?;
        }

        self.store().log_interaction(
            "review_undone",
            serde_json::json!({
                "clientReviewId": client_review_id,
                "reviewsRemoved": removed.len(),
            }),
        )?;

        Ok(UndoOutcome {
            undone: true,
            reviews_removed: removed.len(),
        })
    }
}
