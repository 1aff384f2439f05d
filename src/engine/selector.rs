//! Session assembly: greedy weighted set-cover over due words with
//! difficulty matching, grammar fit, diversity and freshness, ordered for
//! easy–hard–easy pacing.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::arabic::function_words::is_function_word;
use crate::arabic::lookup::LemmaIndex;
use crate::constants::{
    FRESHNESS_BASELINE, MAX_INTRO_PER_SESSION, MAX_REINTRO_PER_SESSION, STRUGGLING_MIN_SEEN,
};
use crate::engine::word_selector::{FamilyMember, WordCandidate};
use crate::engine::{Engine, EngineError};
use crate::store::operations::knowledge::{KnowledgeState, UserLemmaKnowledge};
use crate::store::operations::lemmas::Lemma;
use crate::store::operations::sentences::{Comprehension, ReviewMode, Sentence};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionWord {
    pub lemma_id: Option<String>,
    pub surface_form: String,
    pub gloss_en: Option<String>,
    pub stability: Option<f32>,
    pub is_due: bool,
    pub is_function_word: bool,
    pub knowledge_state: String,
    pub root: Option<String>,
    pub root_meaning: Option<String>,
    pub root_id: Option<String>,
    pub frequency_rank: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionItem {
    pub sentence_id: Option<String>,
    pub arabic_text: String,
    pub arabic_diacritized: String,
    pub english_translation: String,
    pub transliteration: Option<String>,
    pub primary_lemma_id: Option<String>,
    pub primary_lemma_ar: String,
    pub primary_gloss_en: String,
    pub words: Vec<SessionWord>,
    pub grammar_features: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReintroCard {
    pub lemma_id: String,
    pub surface: String,
    pub gloss_en: String,
    pub pos: Option<String>,
    pub transliteration: Option<String>,
    pub root: Option<String>,
    pub root_meaning: Option<String>,
    pub root_id: Option<String>,
    pub forms: std::collections::BTreeMap<String, String>,
    pub example_ar: Option<String>,
    pub example_en: Option<String>,
    pub grammar_features: Vec<String>,
    pub times_seen: u32,
    pub root_family: Vec<FamilyMember>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroCandidate {
    #[serde(flatten)]
    pub word: WordCandidate,
    pub insert_at: usize,
    pub root_family: Vec<FamilyMember>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session_id: String,
    pub items: Vec<SessionItem>,
    pub total_due_words: usize,
    pub covered_due_words: usize,
    pub intro_candidates: Vec<IntroCandidate>,
    pub reintro_cards: Vec<ReintroCard>,
    pub grammar_intro_needed: Vec<String>,
    pub grammar_refresher_needed: Vec<String>,
}

struct WordMeta {
    lemma_id: Option<String>,
    surface_form: String,
    stability: Option<f32>,
    is_due: bool,
    is_function_word: bool,
    knowledge_state: String,
}

struct Candidate {
    sentence: Sentence,
    words: Vec<WordMeta>,
    due_covered: HashSet<String>,
    grammar: Vec<String>,
    score: f64,
}

/// How well the scaffolding matches the weakest due word. Thresholds are low
/// on purpose: they have to work for early learners with days of study.
pub(crate) fn difficulty_match_quality(weakest: f64, scaffold: &[f64]) -> f64 {
    if scaffold.is_empty() {
        return 1.0;
    }
    let avg = scaffold.iter().sum::<f64>() / scaffold.len() as f64;
    if weakest < 0.5 {
        if scaffold.iter().any(|s| *s < 0.5) {
            return 0.3;
        }
        1.0
    } else if weakest < 3.0 {
        if avg < weakest {
            return 0.5;
        }
        1.0
    } else {
        1.0
    }
}

/// Average of per-feature multipliers in {0.8, 1.0, 1.1}: unseen and
/// unintroduced features cost, comfortable ones pay a small bonus.
pub(crate) fn grammar_fit(
    features: &[String],
    exposure: &HashMap<String, (f64, bool)>,
) -> f64 {
    if features.is_empty() {
        return 1.0;
    }
    let total: f64 = features
        .iter()
        .map(|key| match exposure.get(key) {
            None => 0.8,
            Some((comfort, introduced)) => {
                if *comfort >= 0.5 {
                    1.1
                } else if *comfort >= 0.3 || *introduced {
                    1.0
                } else {
                    0.8
                }
            }
        })
        .sum();
    total / features.len() as f64
}

/// Penalize sentences whose scaffolds are over-reviewed: per-word penalty
/// min(1, 8/max(seen,1)), aggregated by geometric mean, floored at 0.3.
pub(crate) fn scaffold_freshness(scaffold_times_seen: &[u32]) -> f64 {
    if scaffold_times_seen.is_empty() {
        return 1.0;
    }
    let product: f64 = scaffold_times_seen
        .iter()
        .map(|seen| (FRESHNESS_BASELINE / f64::from((*seen).max(1))).min(1.0))
        .product();
    let geo_mean = product.powf(1.0 / scaffold_times_seen.len() as f64);
    geo_mean.max(0.3)
}

fn recency_cutoff(signal: Option<Comprehension>, now: DateTime<Utc>) -> DateTime<Utc> {
    match signal {
        Some(Comprehension::Understood) | None => now - Duration::days(7),
        Some(Comprehension::Partial) => now - Duration::days(2),
        Some(Comprehension::GrammarConfused) => now - Duration::days(1),
        Some(Comprehension::NoIdea) => now - Duration::hours(4),
    }
}

fn score_candidate(
    covered: usize,
    dmq: f64,
    gfit: f64,
    times_shown: u32,
    freshness: f64,
) -> f64 {
    let coverage = (covered as f64).powf(1.5);
    let diversity = 1.0 / (1.0 + f64::from(times_shown));
    coverage * dmq * gfit * diversity * freshness
}

impl Engine {
    /// Assemble a sentence-based review session. See module docs for the
    /// pipeline; `log_events=false` (prefetch) suppresses interaction events.
    pub fn build_session(
        &self,
        limit: usize,
        mode: ReviewMode,
        log_events: bool,
        now: DateTime<Utc>,
    ) -> Result<SessionOut, EngineError> {
        let session_id = uuid::Uuid::new_v4().to_string();

        // 1. Due words, with struggling ones set aside for reintro cards.
        let all_knowledge = self.store().list_knowledge()?;
        let mut knowledge_map: HashMap<String, UserLemmaKnowledge> = HashMap::new();
        let mut stability_map: HashMap<String, f64> = HashMap::new();
        let mut due_ids: HashSet<String> = HashSet::new();

        for k in all_knowledge {
            if k.state == KnowledgeState::Suspended {
                continue;
            }
            stability_map.insert(k.lemma_id.clone(), f64::from(k.stability()));
            if let Some(card) = &k.fsrs_card {
                if card.due <= now {
                    due_ids.insert(k.lemma_id.clone());
                }
            }
            knowledge_map.insert(k.lemma_id.clone(), k);
        }

        let struggling: HashSet<String> = due_ids
            .iter()
            .filter(|lid| {
                knowledge_map
                    .get(*lid)
                    .map(|k| k.times_seen >= STRUGGLING_MIN_SEEN && k.times_correct == 0)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        for lid in &struggling {
            due_ids.remove(lid);
        }

        let total_due = due_ids.len() + struggling.len();
        let reintro_cards = self.build_reintro_cards(&struggling, &knowledge_map)?;

        if due_ids.is_empty() {
            return self.with_fallbacks(
                session_id,
                &due_ids,
                &stability_map,
                &knowledge_map,
                total_due,
                Vec::new(),
                HashSet::new(),
                limit,
                mode,
                reintro_cards,
                now,
            );
        }

        // 2. Candidate sentences containing at least one due word, gated by
        // per-mode recency keyed on the last comprehension signal.
        let mut candidate_sentence_ids: HashSet<String> = HashSet::new();
        for lid in &due_ids {
            for sid in self.store().sentence_ids_for_lemma(lid)? {
                candidate_sentence_ids.insert(sid);
            }
        }

        let mut sentences: Vec<Sentence> = Vec::new();
        for sid in &candidate_sentence_ids {
            let Some(sentence) = self.store().get_sentence(sid)? else {
                continue;
            };
            if !sentence.is_active {
                continue;
            }
            let gate_passed = match sentence.last_shown_in_mode(mode) {
                None => true,
                Some(shown_at) => {
                    shown_at < recency_cutoff(sentence.last_comprehension_in_mode(mode), now)
                }
            };
            if gate_passed {
                sentences.push(sentence);
            }
        }

        if sentences.is_empty() {
            return self.with_fallbacks(
                session_id,
                &due_ids,
                &stability_map,
                &knowledge_map,
                total_due,
                Vec::new(),
                HashSet::new(),
                limit,
                mode,
                reintro_cards,
                now,
            );
        }

        // 3. Load words, healing legacy rows with missing lemma mappings.
        let lemma_rows = self.store().list_lemmas()?;
        let index = LemmaIndex::build(&lemma_rows);
        let mut words_by_sentence: HashMap<String, Vec<crate::store::operations::sentences::SentenceWord>> =
            HashMap::new();
        for sentence in &sentences {
            let mut words = self.store().sentence_words(&sentence.sentence_id)?;
            for word in &mut words {
                if word.lemma_id.is_none() && !word.is_function_word {
                    if let Some(lid) = index.resolve_surface(&word.surface_form) {
                        self.store().set_sentence_word_lemma(
                            &sentence.sentence_id,
                            word.position,
                            lid,
                        )?;
                        word.lemma_id = Some(lid.to_string());
                    }
                }
            }
            words_by_sentence.insert(sentence.sentence_id.clone(), words);
        }

        let mut lemma_map: HashMap<String, Lemma> = HashMap::new();
        for lemma in lemma_rows {
            lemma_map.insert(lemma.lemma_id.clone(), lemma);
        }

        // 4. Grammar exposure snapshot for fit scoring.
        let mut exposure_map: HashMap<String, (f64, bool)> = HashMap::new();
        for exp in self.store().list_grammar_exposures()? {
            let comfort = crate::engine::grammar::comfort(
                exp.times_seen,
                exp.times_correct,
                exp.last_seen_at,
                now,
            );
            exposure_map.insert(exp.feature_key.clone(), (comfort, exp.introduced_at.is_some()));
        }

        // 5. Listening readiness: at least one positive review and the last
        // rating was ≥ 3. Only scaffold words are filtered on this.
        let mut listening_ready: HashSet<String> = HashSet::new();
        if mode == ReviewMode::Listening {
            let mut scaffold_ids: HashSet<String> = HashSet::new();
            for words in words_by_sentence.values() {
                for w in words {
                    if let Some(lid) = &w.lemma_id {
                        if !due_ids.contains(lid) {
                            scaffold_ids.insert(lid.clone());
                        }
                    }
                }
            }
            for lid in scaffold_ids {
                let Some(k) = knowledge_map.get(&lid) else {
                    continue;
                };
                if k.times_correct < 1 {
                    continue;
                }
                if let Some(last) = self.store().last_review_for_lemma(&lid)? {
                    if last.rating >= 3 {
                        listening_ready.insert(lid);
                    }
                }
            }
        }

        // 6. Score candidates.
        let mut candidates: Vec<Candidate> = Vec::new();
        for sentence in sentences {
            let words = words_by_sentence
                .remove(&sentence.sentence_id)
                .unwrap_or_default();
            let mut metas: Vec<WordMeta> = Vec::with_capacity(words.len());
            let mut due_covered: HashSet<String> = HashSet::new();
            let mut scaffold_stabs: Vec<f64> = Vec::new();

            for w in &words {
                let is_fn = w.is_function_word || is_function_word(&w.surface_form);
                let stability = w
                    .lemma_id
                    .as_ref()
                    .and_then(|lid| stability_map.get(lid))
                    .map(|s| *s as f32);
                let is_due = w
                    .lemma_id
                    .as_ref()
                    .map(|lid| due_ids.contains(lid))
                    .unwrap_or(false);
                let state = w
                    .lemma_id
                    .as_ref()
                    .and_then(|lid| knowledge_map.get(lid))
                    .map(|k| k.state.as_str().to_string())
                    .unwrap_or_else(|| "new".to_string());

                if let Some(lid) = &w.lemma_id {
                    if is_due {
                        due_covered.insert(lid.clone());
                    } else if let Some(stab) = stability_map.get(lid) {
                        scaffold_stabs.push(*stab);
                    }
                }

                metas.push(WordMeta {
                    lemma_id: w.lemma_id.clone(),
                    surface_form: w.surface_form.clone(),
                    stability,
                    is_due,
                    is_function_word: is_fn,
                    knowledge_state: state,
                });
            }

            if due_covered.is_empty() {
                continue;
            }

            if mode == ReviewMode::Listening {
                let unready = metas.iter().any(|m| {
                    m.lemma_id.as_ref().is_some_and(|lid| {
                        !m.is_due && !m.is_function_word && !listening_ready.contains(lid)
                    })
                });
                if unready {
                    continue;
                }
            }

            // Sentence grammar tags, falling back to the union of lemma tags.
            let grammar: Vec<String> = if sentence.grammar_features.is_empty() {
                let mut keys: HashSet<String> = HashSet::new();
                for w in &words {
                    if let Some(lemma) = w.lemma_id.as_ref().and_then(|lid| lemma_map.get(lid)) {
                        keys.extend(lemma.grammar_features.iter().cloned());
                    }
                }
                let mut keys: Vec<String> = keys.into_iter().collect();
                keys.sort();
                keys
            } else {
                sentence.grammar_features.clone()
            };

            let weakest = due_covered
                .iter()
                .map(|lid| stability_map.get(lid).copied().unwrap_or(0.0))
                .fold(f64::INFINITY, f64::min);
            let dmq = difficulty_match_quality(weakest, &scaffold_stabs);
            let gfit = grammar_fit(&grammar, &exposure_map);
            let freshness = scaffold_freshness(&scaffold_seen(&metas, &knowledge_map));
            let score = score_candidate(
                due_covered.len(),
                dmq,
                gfit,
                sentence.times_shown,
                freshness,
            );

            candidates.push(Candidate {
                sentence,
                words: metas,
                due_covered,
                grammar,
                score,
            });
        }

        // 7. Greedy set cover with marginal rescoring each round.
        let mut selected: Vec<Candidate> = Vec::new();
        let mut remaining: HashSet<String> = due_ids.clone();

        while !remaining.is_empty() && selected.len() < limit && !candidates.is_empty() {
            for c in &mut candidates {
                let overlap: HashSet<&String> =
                    c.due_covered.intersection(&remaining).collect();
                if overlap.is_empty() {
                    c.score = 0.0;
                    continue;
                }
                let weakest = overlap
                    .iter()
                    .map(|lid| stability_map.get(*lid).copied().unwrap_or(0.0))
                    .fold(f64::INFINITY, f64::min);
                let scaffold_stabs: Vec<f64> = c
                    .words
                    .iter()
                    .filter(|w| w.lemma_id.is_some() && !w.is_due)
                    .filter_map(|w| w.stability.map(f64::from))
                    .collect();
                let dmq = difficulty_match_quality(weakest, &scaffold_stabs);
                let gfit = grammar_fit(&c.grammar, &exposure_map);
                let freshness = scaffold_freshness(&scaffold_seen(&c.words, &knowledge_map));
                c.score = score_candidate(
                    overlap.len(),
                    dmq,
                    gfit,
                    c.sentence.times_shown,
                    freshness,
                );
            }

            candidates.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            if candidates[0].score <= 0.0 {
                break;
            }
            let best = candidates.remove(0);
            for lid in &best.due_covered {
                remaining.remove(lid);
            }

            if log_events {
                self.store().log_interaction(
                    "sentence_selected",
                    serde_json::json!({
                        "sessionId": session_id,
                        "sentenceId": best.sentence.sentence_id,
                        "selectionOrder": selected.len() + 1,
                        "score": (best.score * 1000.0).round() / 1000.0,
                        "dueWordsCovered": best.due_covered.len(),
                        "remainingDue": remaining.len(),
                    }),
                )?;
            }
            selected.push(best);
        }

        let mut covered: HashSet<String> = HashSet::new();
        for c in &selected {
            covered.extend(c.due_covered.iter().cloned());
        }

        // 8. Easy bookends, hard middle.
        let ordered = order_session(selected, &stability_map);

        let items: Vec<SessionItem> = ordered
            .into_iter()
            .map(|c| self.candidate_to_item(c, &due_ids, &lemma_map))
            .collect::<Result<_, _>>()?;

        self.with_fallbacks(
            session_id,
            &due_ids,
            &stability_map,
            &knowledge_map,
            total_due,
            items,
            covered,
            limit,
            mode,
            reintro_cards,
            now,
        )
    }

    fn candidate_to_item(
        &self,
        c: Candidate,
        due_ids: &HashSet<String>,
        lemma_map: &HashMap<String, Lemma>,
    ) -> Result<SessionItem, EngineError> {
        let primary_id = match &c.sentence.target_lemma_id {
            Some(target) if due_ids.contains(target) => Some(target.clone()),
            _ => c
                .due_covered
                .iter()
                .next()
                .cloned()
                .or_else(|| c.sentence.target_lemma_id.clone()),
        };
        let primary = primary_id.as_ref().and_then(|lid| lemma_map.get(lid));

        let mut words = Vec::with_capacity(c.words.len());
        for meta in &c.words {
            let lemma = meta.lemma_id.as_ref().and_then(|lid| lemma_map.get(lid));
            let root = match lemma.and_then(|l| l.root_id.as_ref()) {
                Some(rid) => self.store().get_root(rid)?,
                None => None,
            };
            let gloss = lemma.map(|l| l.gloss_en.clone()).or_else(|| {
                crate::arabic::function_words::function_word_gloss(
                    &crate::arabic::normalize_arabic(&meta.surface_form),
                )
                .map(str::to_string)
            });
            words.push(SessionWord {
                lemma_id: meta.lemma_id.clone(),
                surface_form: meta.surface_form.clone(),
                gloss_en: gloss,
                stability: meta.stability,
                is_due: meta.is_due,
                is_function_word: meta.is_function_word,
                knowledge_state: meta.knowledge_state.clone(),
                root: root.as_ref().map(|r| r.root.clone()),
                root_meaning: root.as_ref().and_then(|r| r.core_meaning_en.clone()),
                root_id: lemma.and_then(|l| l.root_id.clone()),
                frequency_rank: lemma.and_then(|l| l.frequency_rank),
            });
        }

        Ok(SessionItem {
            sentence_id: Some(c.sentence.sentence_id.clone()),
            arabic_text: c.sentence.arabic_text.clone(),
            arabic_diacritized: c.sentence.arabic_diacritized.clone(),
            english_translation: c.sentence.english_translation.clone(),
            transliteration: c.sentence.transliteration.clone(),
            primary_lemma_id: primary_id.clone(),
            primary_lemma_ar: primary.map(|l| l.surface.clone()).unwrap_or_default(),
            primary_gloss_en: primary.map(|l| l.gloss_en.clone()).unwrap_or_default(),
            words,
            grammar_features: c.grammar,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn with_fallbacks(
        &self,
        session_id: String,
        due_ids: &HashSet<String>,
        stability_map: &HashMap<String, f64>,
        knowledge_map: &HashMap<String, UserLemmaKnowledge>,
        total_due: usize,
        mut items: Vec<SessionItem>,
        mut covered: HashSet<String>,
        limit: usize,
        mode: ReviewMode,
        reintro_cards: Vec<ReintroCard>,
        now: DateTime<Utc>,
    ) -> Result<SessionOut, EngineError> {
        // Word-only fallbacks for due words no sentence covered.
        let mut uncovered: Vec<String> = due_ids.difference(&covered).cloned().collect();
        uncovered.sort();
        for lid in &uncovered {
            if items.len() >= limit {
                break;
            }
            let Some(lemma) = self.store().get_lemma(lid)? else {
                continue;
            };
            let root = match &lemma.root_id {
                Some(rid) => self.store().get_root(rid)?,
                None => None,
            };
            let state = knowledge_map
                .get(lid)
                .map(|k| k.state.as_str().to_string())
                .unwrap_or_else(|| "new".to_string());
            items.push(SessionItem {
                sentence_id: None,
                arabic_text: lemma.surface.clone(),
                arabic_diacritized: lemma.surface.clone(),
                english_translation: lemma.gloss_en.clone(),
                transliteration: lemma.transliteration.clone(),
                primary_lemma_id: Some(lid.clone()),
                primary_lemma_ar: lemma.surface.clone(),
                primary_gloss_en: lemma.gloss_en.clone(),
                words: vec![SessionWord {
                    lemma_id: Some(lid.clone()),
                    surface_form: lemma.surface.clone(),
                    gloss_en: Some(lemma.gloss_en.clone()),
                    stability: stability_map.get(lid).map(|s| *s as f32),
                    is_due: true,
                    is_function_word: false,
                    knowledge_state: state,
                    root: root.as_ref().map(|r| r.root.clone()),
                    root_meaning: root.as_ref().and_then(|r| r.core_meaning_en.clone()),
                    root_id: lemma.root_id.clone(),
                    frequency_rank: lemma.frequency_rank,
                }],
                grammar_features: Vec::new(),
            });
            covered.insert(lid.clone());
        }

        // Intro candidates at positions 4 and 8. Reading mode only, only once
        // the session is substantial enough to absorb them, and only while
        // recent accuracy says the learner is not already drowning.
        let intro_candidates = if mode == ReviewMode::Listening
            || items.is_empty()
            || !self.recent_accuracy_is_healthy()?
        {
            Vec::new()
        } else {
            let insert_positions = [3usize, 7usize];
            self.select_next_words(MAX_INTRO_PER_SESSION, now)?
                .into_iter()
                .enumerate()
                .map(|(i, word)| {
                    let insert_at = insert_positions
                        .get(i)
                        .copied()
                        .unwrap_or_else(|| items.len().saturating_sub(1))
                        .min(items.len());
                    let root_family = match &word.root_id {
                        Some(rid) => self.root_family(rid)?,
                        None => Vec::new(),
                    };
                    Ok(IntroCandidate {
                        word,
                        insert_at,
                        root_family,
                    })
                })
                .collect::<Result<Vec<_>, EngineError>>()?
        };

        // Grammar prompts: features in session sentences never introduced,
        // plus confused features needing resurfacing.
        let mut session_features: Vec<String> = Vec::new();
        for item in &items {
            for key in &item.grammar_features {
                if !session_features.contains(key) {
                    session_features.push(key.clone());
                }
            }
        }
        let grammar_intro_needed = self.unintroduced_features(&session_features)?;
        let grammar_refresher_needed = self.confused_features()?;

        Ok(SessionOut {
            session_id,
            covered_due_words: covered.len(),
            total_due_words: total_due,
            items,
            intro_candidates,
            reintro_cards,
            grammar_intro_needed,
            grammar_refresher_needed,
        })
    }

    /// Accuracy over the most recent reviews. With little history the gate
    /// stays open so the very first sessions can still introduce words.
    fn recent_accuracy_is_healthy(&self) -> Result<bool, EngineError> {
        const WINDOW: usize = 20;
        const MIN_SAMPLE: usize = 5;
        const HEALTHY_ACCURACY: f64 = 0.6;

        let recent = self.store().recent_reviews(WINDOW)?;
        if recent.len() < MIN_SAMPLE {
            return Ok(true);
        }
        let correct = recent.iter().filter(|log| log.rating >= 3).count();
        Ok(correct as f64 / recent.len() as f64 >= HEALTHY_ACCURACY)
    }

    /// Rich re-introduction cards for struggling words (≥3 reviews, zero
    /// correct), most-seen first, capped per session.
    fn build_reintro_cards(
        &self,
        struggling: &HashSet<String>,
        knowledge_map: &HashMap<String, UserLemmaKnowledge>,
    ) -> Result<Vec<ReintroCard>, EngineError> {
        let mut ids: Vec<&String> = struggling.iter().collect();
        ids.sort_by_key(|lid| {
            std::cmp::Reverse(knowledge_map.get(*lid).map(|k| k.times_seen).unwrap_or(0))
        });

        let mut cards = Vec::new();
        for lid in ids.into_iter().take(MAX_REINTRO_PER_SESSION) {
            let Some(lemma) = self.store().get_lemma(lid)? else {
                continue;
            };
            let root = match &lemma.root_id {
                Some(rid) => self.store().get_root(rid)?,
                None => None,
            };
            let root_family = match &lemma.root_id {
                Some(rid) => self.root_family(rid)?,
                None => Vec::new(),
            };
            cards.push(ReintroCard {
                lemma_id: lemma.lemma_id.clone(),
                surface: lemma.surface.clone(),
                gloss_en: lemma.gloss_en.clone(),
                pos: lemma.pos.clone(),
                transliteration: lemma.transliteration.clone(),
                root: root.as_ref().map(|r| r.root.clone()),
                root_meaning: root.as_ref().and_then(|r| r.core_meaning_en.clone()),
                root_id: lemma.root_id.clone(),
                forms: lemma.forms.clone(),
                example_ar: lemma.example_ar.clone(),
                example_en: lemma.example_en.clone(),
                grammar_features: lemma.grammar_features.clone(),
                times_seen: knowledge_map.get(lid).map(|k| k.times_seen).unwrap_or(0),
                root_family,
            });
        }
        Ok(cards)
    }
}

fn scaffold_seen(
    metas: &[WordMeta],
    knowledge_map: &HashMap<String, UserLemmaKnowledge>,
) -> Vec<u32> {
    metas
        .iter()
        .filter(|m| m.lemma_id.is_some() && !m.is_due && !m.is_function_word)
        .map(|m| {
            m.lemma_id
                .as_ref()
                .and_then(|lid| knowledge_map.get(lid))
                .map(|k| k.times_seen)
                .unwrap_or(0)
        })
        .collect()
}

/// Easy bookends, hard middle: sort by minimum due-word stability descending,
/// then place the easiest first and the second-easiest last.
fn order_session(selected: Vec<Candidate>, stability_map: &HashMap<String, f64>) -> Vec<Candidate> {
    if selected.len() <= 2 {
        return selected;
    }

    let min_due_stability = |c: &Candidate| -> f64 {
        c.due_covered
            .iter()
            .map(|lid| stability_map.get(lid).copied().unwrap_or(0.0))
            .fold(f64::INFINITY, f64::min)
    };

    let mut sorted = selected;
    sorted.sort_by(|a, b| {
        min_due_stability(b)
            .partial_cmp(&min_due_stability(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let start = sorted.remove(0);
    let end = sorted.remove(0);
    let mut ordered = vec![start];
    ordered.extend(sorted);
    ordered.push(end);
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dmq_fragile_word_needs_stable_scaffolds() {
        assert_eq!(difficulty_match_quality(0.2, &[0.1, 2.0]), 0.3);
        assert_eq!(difficulty_match_quality(0.2, &[1.0, 2.0]), 1.0);
    }

    #[test]
    fn dmq_shaky_word_wants_stronger_average() {
        assert_eq!(difficulty_match_quality(2.0, &[1.0, 1.5]), 0.5);
        assert_eq!(difficulty_match_quality(2.0, &[3.0, 4.0]), 1.0);
    }

    #[test]
    fn dmq_stable_word_is_unconstrained() {
        assert_eq!(difficulty_match_quality(5.0, &[0.1]), 1.0);
        assert_eq!(difficulty_match_quality(0.1, &[]), 1.0);
    }

    #[test]
    fn grammar_fit_averages_multipliers() {
        let mut exposure = HashMap::new();
        exposure.insert("comfortable".to_string(), (0.8, true));
        exposure.insert("introduced_low".to_string(), (0.1, true));

        let features = vec![
            "comfortable".to_string(),
            "introduced_low".to_string(),
            "unseen".to_string(),
        ];
        let fit = grammar_fit(&features, &exposure);
        let expected = (1.1 + 1.0 + 0.8) / 3.0;
        assert!((fit - expected).abs() < 1e-9);
        assert_eq!(grammar_fit(&[], &exposure), 1.0);
    }

    #[test]
    fn freshness_penalizes_over_reviewed_scaffolds() {
        assert_eq!(scaffold_freshness(&[]), 1.0);
        assert_eq!(scaffold_freshness(&[8]), 1.0);
        assert!((scaffold_freshness(&[16]) - 0.5).abs() < 1e-9);
        // Heavy over-review hits the floor
        assert_eq!(scaffold_freshness(&[800, 800]), 0.3);
    }

    #[test]
    fn score_prefers_higher_coverage() {
        let two = score_candidate(2, 1.0, 1.0, 0, 1.0);
        let one = score_candidate(1, 1.0, 1.0, 0, 1.0);
        assert!(two > one * 2.0); // superlinear in coverage
    }

    #[test]
    fn score_diversity_decays_with_times_shown() {
        let fresh = score_candidate(1, 1.0, 1.0, 0, 1.0);
        let shown = score_candidate(1, 1.0, 1.0, 4, 1.0);
        assert!((shown - fresh / 5.0).abs() < 1e-9);
    }

    #[test]
    fn recency_cutoffs_follow_comprehension() {
        let now = Utc::now();
        assert_eq!(recency_cutoff(Some(Comprehension::Understood), now), now - Duration::days(7));
        assert_eq!(recency_cutoff(Some(Comprehension::Partial), now), now - Duration::days(2));
        assert_eq!(
            recency_cutoff(Some(Comprehension::GrammarConfused), now),
            now - Duration::days(1)
        );
        assert_eq!(recency_cutoff(Some(Comprehension::NoIdea), now), now - Duration::hours(4));
        assert_eq!(recency_cutoff(None, now), now - Duration::days(7));
    }
}
