//! Leitner 3-box acquisition phase, gating words before they enter the SRS.
//!
//! Box 1→2 is encoding and may advance within a session. Box 2→3 and
//! graduation enforce real inter-session spacing: the day-scale steps encode
//! sleep-dependent consolidation and must not be bypassed by rapid re-clicks,
//! so they only advance when the word is actually due.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::constants::{
    BOX_1_INTERVAL_HOURS, BOX_2_INTERVAL_DAYS, BOX_3_INTERVAL_DAYS, GRADUATION_MIN_ACCURACY,
    GRADUATION_MIN_CALENDAR_DAYS, GRADUATION_MIN_REVIEWS,
};
use crate::engine::{Engine, EngineError};
use crate::store::operations::knowledge::{KnowledgeState, UserLemmaKnowledge};
use crate::store::operations::review_logs::{CreditType, ReviewLog, ReviewSnapshot};
use crate::store::operations::sentences::{Comprehension, ReviewMode};
use crate::store::StoreError;

fn box_interval(acq_box: u8) -> Duration {
    match acq_box {
        1 => Duration::hours(BOX_1_INTERVAL_HOURS),
        2 => Duration::days(BOX_2_INTERVAL_DAYS),
        _ => Duration::days(BOX_3_INTERVAL_DAYS),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionOutcome {
    pub lemma_id: String,
    pub new_state: KnowledgeState,
    pub acquisition_box: Option<u8>,
    pub graduated: bool,
    pub next_due: Option<DateTime<Utc>>,
    pub duplicate: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcquisitionStats {
    pub total_acquiring: u64,
    pub box_1: u64,
    pub box_2: u64,
    pub box_3: u64,
    pub due_now: u64,
}

pub struct AcquisitionReviewInput<'a> {
    pub lemma_id: &'a str,
    pub rating: u8,
    pub response_ms: Option<u32>,
    pub session_id: Option<&'a str>,
    pub review_mode: ReviewMode,
    pub comprehension_signal: Option<Comprehension>,
    pub client_review_id: Option<&'a str>,
}

const GENERIC_SOURCES: &[&str] = &["study", "encountered"];

impl Engine {
    /// Create or transition a ULK into the acquiring state at box 1.
    /// `due_immediately` puts the first review into the current session;
    /// otherwise it lands after the box-1 interval.
    pub fn start_acquisition(
        &self,
        lemma_id: &str,
        source: &str,
        due_immediately: bool,
        now: DateTime<Utc>,
    ) -> Result<UserLemmaKnowledge, EngineError> {
        let lemma = self.store().require_lemma(lemma_id)?;
        if lemma.is_variant() {
            return Err(StoreError::Validation(format!(
                "lemma {lemma_id} is a variant and cannot be scheduled"
            ))
            .into());
        }

        let next_due = if due_immediately {
            now
        } else {
            now + box_interval(1)
        };

        let mut ulk = match self.store().get_knowledge(lemma_id)? {
            Some(existing) => existing,
            None => UserLemmaKnowledge::new_encountered(lemma_id, source, now),
        };

        ulk.state = KnowledgeState::Acquiring;
        ulk.acquisition_box = Some(1);
        ulk.acquisition_next_due = Some(next_due);
        ulk.entered_acquiring_at = Some(now);
        ulk.introduced_at = Some(now);
        ulk.fsrs_card = None;
        // Preserve meaningful provenance (book, textbook_scan, …) across the
        // encountered → acquiring transition.
        if ulk.source.is_empty() || GENERIC_SOURCES.contains(&ulk.source.as_str()) {
            ulk.source = source.to_string();
        }

        self.store().put_knowledge(&ulk)?;
        self.store().log_interaction(
            "acquisition_started",
            serde_json::json!({"lemmaId": lemma_id, "source": source}),
        )?;
        Ok(ulk)
    }

    /// Submit a review for a word in the acquisition phase.
    ///
    /// rating ≥ 3: advance box (1→2→3), graduate from box 3 when criteria met
    /// rating == 2: stay in the same box, reset the interval when due
    /// rating == 1: reset to box 1
    pub fn submit_acquisition_review(
        &self,
        input: &AcquisitionReviewInput<'_>,
        now: DateTime<Utc>,
    ) -> Result<AcquisitionOutcome, EngineError> {
        if let Some(crid) = input.client_review_id {
            if self.store().client_review_id_exists(crid)? {
                let ulk = self.store().get_knowledge(input.lemma_id)?;
                return Ok(AcquisitionOutcome {
                    lemma_id: input.lemma_id.to_string(),
                    new_state: ulk
                        .as_ref()
                        .map(|u| u.state)
                        .unwrap_or(KnowledgeState::Acquiring),
                    acquisition_box: ulk.as_ref().and_then(|u| u.acquisition_box),
                    graduated: false,
                    next_due: ulk.and_then(|u| u.acquisition_next_due),
                    duplicate: true,
                });
            }
        }

        let Some(mut ulk) = self.store().get_knowledge(input.lemma_id)? else {
            return Err(StoreError::NotFound {
                entity: "knowledge".to_string(),
                key: input.lemma_id.to_string(),
            }
            .into());
        };

        if ulk.state != KnowledgeState::Acquiring {
            tracing::warn!(
                lemma_id = input.lemma_id,
                state = ulk.state.as_str(),
                "Acquisition review for non-acquiring lemma, delegating to SRS"
            );
            let outcome = self.submit_srs_review(
                input.lemma_id,
                input.rating,
                input.response_ms,
                input.session_id,
                input.review_mode,
                input.comprehension_signal,
                CreditType::Primary,
                None,
                input.client_review_id,
                now,
            )?;
            return Ok(AcquisitionOutcome {
                lemma_id: outcome.lemma_id,
                new_state: outcome.new_state,
                acquisition_box: None,
                graduated: false,
                next_due: outcome.next_due,
                duplicate: outcome.duplicate,
            });
        }

        let old_box = ulk.acquisition_box.unwrap_or(1);
        let old_times_seen = ulk.times_seen;
        let old_times_correct = ulk.times_correct;
        let old_state = ulk.state;
        let old_next_due = ulk.acquisition_next_due;

        ulk.times_seen += 1;
        if input.rating >= 3 {
            ulk.times_correct += 1;
        }
        ulk.total_encounters += 1;
        ulk.last_reviewed = Some(now);

        // A null due is treated as due.
        let is_due = old_next_due.map(|d| d <= now).unwrap_or(true);

        if input.rating >= 3 {
            if old_box == 1 {
                // Encoding → consolidation handoff, allowed within a session.
                ulk.acquisition_box = Some(2);
                ulk.acquisition_next_due = Some(now + box_interval(2));
            } else if old_box == 2 && is_due {
                ulk.acquisition_box = Some(3);
                ulk.acquisition_next_due = Some(now + box_interval(3));
            } else if old_box >= 3 && is_due {
                ulk.acquisition_box = Some(3);
                ulk.acquisition_next_due = Some(now + box_interval(3));
            }
            // Not due: exposure credit only, no box or timer change.
        } else if input.rating == 2 {
            ulk.acquisition_box = Some(old_box);
            if is_due {
                let interval = if ulk.times_correct == 0 {
                    Duration::minutes(10)
                } else {
                    box_interval(old_box)
                };
                ulk.acquisition_next_due = Some(now + interval);
            }
        } else {
            // Again resets to box 1 regardless of due status.
            ulk.acquisition_box = Some(1);
            let interval = if ulk.times_correct == 0 {
                Duration::minutes(5)
            } else {
                box_interval(1)
            };
            ulk.acquisition_next_due = Some(now + interval);
        }

        let mut graduated = false;
        if ulk.acquisition_box == Some(3) && is_due && input.rating >= 3 {
            let accuracy = ulk.accuracy();
            if ulk.times_seen >= GRADUATION_MIN_REVIEWS
                && accuracy >= GRADUATION_MIN_ACCURACY
                && self.store().acquisition_review_days(input.lemma_id)?
                    >= GRADUATION_MIN_CALENDAR_DAYS
            {
                graduated = true;
            }
        }

        if graduated {
            ulk.state = KnowledgeState::Learning;
            ulk.acquisition_box = None;
            ulk.acquisition_next_due = None;
            ulk.graduated_at = Some(now);
            // One synthetic Good review seeds the baseline stability.
            ulk.fsrs_card = Some(self.seed_graduation_card(now)?);
        }

        self.store().put_knowledge(&ulk)?;

        self.store().append_review_log(&ReviewLog {
            id: uuid::Uuid::new_v4().to_string(),
            lemma_id: input.lemma_id.to_string(),
            rating: input.rating,
            reviewed_at: now,
            response_ms: input.response_ms,
            review_mode: input.review_mode,
            comprehension_signal: input.comprehension_signal,
            credit_type: CreditType::Acquisition,
            sentence_id: None,
            session_id: input.session_id.map(str::to_string),
            client_review_id: input.client_review_id.map(str::to_string),
            is_acquisition: true,
            fsrs_log: ReviewSnapshot {
                state_before: old_state,
                card_before: None,
                acquisition_box_before: Some(old_box),
                acquisition_box_after: ulk.acquisition_box,
                acquisition_next_due_before: old_next_due,
                graduated,
                pre_times_seen: old_times_seen,
                pre_times_correct: old_times_correct,
            },
        })?;

        if graduated {
            self.store().log_interaction(
                "word_graduated",
                serde_json::json!({
                    "lemmaId": input.lemma_id,
                    "timesSeen": ulk.times_seen,
                    "timesCorrect": ulk.times_correct,
                }),
            )?;
        }

        Ok(AcquisitionOutcome {
            lemma_id: input.lemma_id.to_string(),
            new_state: ulk.state,
            acquisition_box: ulk.acquisition_box,
            graduated,
            next_due: ulk
                .acquisition_next_due
                .or_else(|| ulk.fsrs_card.as_ref().map(|c| c.due)),
            duplicate: false,
        })
    }

    pub fn acquisition_stats(&self, now: DateTime<Utc>) -> Result<AcquisitionStats, EngineError> {
        let mut stats = AcquisitionStats::default();
        for row in self.store().list_knowledge()? {
            if row.state != KnowledgeState::Acquiring {
                continue;
            }
            stats.total_acquiring += 1;
            match row.acquisition_box.unwrap_or(1) {
                1 => stats.box_1 += 1,
                2 => stats.box_2 += 1,
                _ => stats.box_3 += 1,
            }
            if row.acquisition_next_due.map(|d| d <= now).unwrap_or(true) {
                stats.due_now += 1;
            }
        }
        Ok(stats)
    }
}
