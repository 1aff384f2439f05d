//! Sentence-level review fan-out: one comprehension signal becomes per-lemma
//! ratings with primary/collateral/encounter credit. Each per-lemma write is
//! independently idempotent via `client_review_id:<lemma_id>`, so a mid-way
//! failure can be replayed safely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::acquisition::AcquisitionReviewInput;
use crate::engine::{Engine, EngineError};
use crate::store::operations::knowledge::{KnowledgeState, UserLemmaKnowledge};
use crate::store::operations::review_logs::CreditType;
use crate::store::operations::sentence_reviews::SentenceReviewLog;
use crate::store::operations::sentences::{Comprehension, ReviewMode};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceReviewInput {
    pub sentence_id: Option<String>,
    pub primary_lemma_id: String,
    pub comprehension_signal: Comprehension,
    #[serde(default)]
    pub missed_lemma_ids: Vec<String>,
    /// For `grammar_confused` these are grammar feature keys.
    #[serde(default)]
    pub confused_lemma_ids: Vec<String>,
    pub response_ms: Option<u32>,
    pub session_id: Option<String>,
    #[serde(default = "default_review_mode")]
    pub review_mode: ReviewMode,
    pub client_review_id: Option<String>,
}

fn default_review_mode() -> ReviewMode {
    ReviewMode::Reading
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordReviewResult {
    pub lemma_id: String,
    pub rating: Option<u8>,
    pub new_state: String,
    pub credit_type: CreditType,
    pub next_due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceReviewOutcome {
    pub duplicate: bool,
    pub word_results: Vec<WordReviewResult>,
}

/// Per-word rating policy for a comprehension signal.
fn rating_for(signal: Comprehension, lemma_id: &str, missed: &[String]) -> u8 {
    match signal {
        Comprehension::NoIdea => 1,
        Comprehension::Understood => 3,
        Comprehension::Partial | Comprehension::GrammarConfused => {
            if missed.iter().any(|m| m == lemma_id) {
                1
            } else {
                3
            }
        }
    }
}

impl Engine {
    pub fn submit_sentence_review(
        &self,
        input: &SentenceReviewInput,
        now: DateTime<Utc>,
    ) -> Result<SentenceReviewOutcome, EngineError> {
        if let Some(crid) = &input.client_review_id {
            if self.store().sentence_review_exists(crid)? {
                return Ok(SentenceReviewOutcome {
                    duplicate: true,
                    word_results: Vec::new(),
                });
            }
        }

        // Collect the lemmas to credit: all non-function sentence words with
        // a mapping, plus the primary. Variants resolve to their canonical.
        let mut lemma_ids: Vec<String> = Vec::new();
        let mut sentence = match &input.sentence_id {
            Some(sid) => Some(self.store().require_sentence(sid)?),
            None => None,
        };
        if let Some(sid) = &input.sentence_id {
            for word in self.store().sentence_words(sid)? {
                if word.is_function_word {
                    continue;
                }
                let Some(lid) = word.lemma_id else { continue };
                let canonical = self.store().canonical_lemma_id(&lid)?;
                if !lemma_ids.contains(&canonical) {
                    lemma_ids.push(canonical);
                }
            }
        }
        let primary = self.store().canonical_lemma_id(&input.primary_lemma_id)?;
        if !lemma_ids.contains(&primary) {
            lemma_ids.push(primary.clone());
        }

        // Fixed iteration order; per-lemma idempotency makes replays no-ops.
        let mut word_results: Vec<WordReviewResult> = Vec::new();
        for lemma_id in &lemma_ids {
            let sub_client_id = input
                .client_review_id
                .as_ref()
                .map(|crid| format!("{crid}:{lemma_id}"));
            let credit = if *lemma_id == primary {
                CreditType::Primary
            } else {
                CreditType::Collateral
            };
            let rating = rating_for(
                input.comprehension_signal,
                lemma_id,
                &input.missed_lemma_ids,
            );

            let knowledge = self.store().get_knowledge(lemma_id)?;
            match knowledge {
                None => {
                    // First sighting: record as encountered, no SRS review.
                    let ulk = UserLemmaKnowledge::new_encountered(lemma_id, "encountered", now);
                    self.store().put_knowledge(&ulk)?;
                    word_results.push(WordReviewResult {
                        lemma_id: lemma_id.clone(),
                        rating: None,
                        new_state: KnowledgeState::Encountered.as_str().to_string(),
                        credit_type: CreditType::Encounter,
                        next_due: None,
                    });
                }
                Some(k) if k.state == KnowledgeState::Suspended => {}
                Some(k) if k.state == KnowledgeState::Encountered => {
                    // Seen again in context but still not under study.
                    let mut ulk = k;
                    ulk.total_encounters += 1;
                    self.store().put_knowledge(&ulk)?;
                    word_results.push(WordReviewResult {
                        lemma_id: lemma_id.clone(),
                        rating: None,
                        new_state: KnowledgeState::Encountered.as_str().to_string(),
                        credit_type: CreditType::Encounter,
                        next_due: None,
                    });
                }
                Some(k) if k.state == KnowledgeState::Acquiring => {
                    let outcome = self.submit_acquisition_review(
                        &AcquisitionReviewInput {
                            lemma_id,
                            rating,
                            response_ms: input.response_ms,
                            session_id: input.session_id.as_deref(),
                            review_mode: input.review_mode,
                            comprehension_signal: Some(input.comprehension_signal),
                            client_review_id: sub_client_id.as_deref(),
                        },
                        now,
                    )?;
                    word_results.push(WordReviewResult {
                        lemma_id: lemma_id.clone(),
                        rating: Some(rating),
                        new_state: outcome.new_state.as_str().to_string(),
                        credit_type: CreditType::Acquisition,
                        next_due: outcome.next_due,
                    });
                }
                Some(_) => {
                    let outcome = self.submit_srs_review(
                        lemma_id,
                        rating,
                        input.response_ms,
                        input.session_id.as_deref(),
                        input.review_mode,
                        Some(input.comprehension_signal),
                        credit,
                        input.sentence_id.as_deref(),
                        sub_client_id.as_deref(),
                        now,
                    )?;
                    word_results.push(WordReviewResult {
                        lemma_id: lemma_id.clone(),
                        rating: Some(rating),
                        new_state: outcome.new_state.as_str().to_string(),
                        credit_type: credit,
                        next_due: outcome.next_due,
                    });
                }
            }
        }

        // Sentence bookkeeping: per-mode shown instant + comprehension.
        if let Some(s) = sentence.as_mut() {
            s.record_shown(input.review_mode, input.comprehension_signal, now);
            self.store().update_sentence(s)?;
        }

        // Grammar exposure for the sentence's features, plus explicitly
        // flagged confusions that are not on the sentence's tag list.
        if let Some(s) = &sentence {
            self.record_sentence_grammar(
                &s.grammar_features,
                input.comprehension_signal,
                now,
            )?;
            if input.comprehension_signal == Comprehension::GrammarConfused {
                let extra: Vec<String> = input
                    .confused_lemma_ids
                    .iter()
                    .filter(|key| !s.grammar_features.contains(key))
                    .cloned()
                    .collect();
                self.record_confused_features(&extra, now)?;
            }
        } else if input.comprehension_signal == Comprehension::GrammarConfused {
            self.record_confused_features(&input.confused_lemma_ids, now)?;
        }

        self.store().append_sentence_review_log(&SentenceReviewLog {
            id: uuid::Uuid::new_v4().to_string(),
            sentence_id: input.sentence_id.clone(),
            primary_lemma_id: primary.clone(),
            comprehension_signal: input.comprehension_signal,
            missed_lemma_ids: input.missed_lemma_ids.clone(),
            confused_feature_keys: input.confused_lemma_ids.clone(),
            review_mode: input.review_mode,
            response_ms: input.response_ms,
            session_id: input.session_id.clone(),
            client_review_id: input.client_review_id.clone(),
            word_count: word_results.len(),
            reviewed_at: now,
        })?;

        self.store().log_interaction(
            "sentence_review",
            serde_json::json!({
                "sentenceId": input.sentence_id,
                "lemmaId": primary,
                "comprehensionSignal": input.comprehension_signal,
                "reviewMode": input.review_mode,
                "wordsReviewed": word_results.len(),
                "collateralCount": word_results
                    .iter()
                    .filter(|w| w.credit_type == CreditType::Collateral)
                    .count(),
            }),
        )?;

        Ok(SentenceReviewOutcome {
            duplicate: false,
            word_results,
        })
    }
}
