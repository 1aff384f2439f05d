//! Background sentence supply: keep ≥ MIN_SENTENCES active sentences per
//! word under study, rotating stale material out under the pipeline cap.
//!
//! Generation is a bounded retry loop: Generate → Validate → (Accept |
//! Reject-with-reasons → Generate′), carrying the unknown words forward as
//! an avoid list. Nothing is persisted unless every content token maps to a
//! lemma.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Deserialize;

use crate::arabic::lookup::LemmaIndex;
use crate::arabic::validator::{map_tokens_to_lemmas, validate_sentence};
use crate::arabic::{normalize_arabic, tokenize};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::services::llm_provider::{GenerateOptions, LlmError, LlmProvider};
use crate::store::operations::knowledge::KnowledgeState;
use crate::store::operations::lemmas::Lemma;
use crate::store::operations::sentences::{Sentence, SentenceWord};
use crate::store::Store;

/// Over-cap slack: a racing worker may push slightly past the cap; rotation
/// on the next pass brings it back.
const CAP_SLACK: usize = 10;

/// At most this many cohort gaps are serviced per run.
const MAX_GAPS_PER_RUN: usize = 10;

/// How many intro candidates are pre-warmed per run.
const INTRO_LOOKAHEAD: usize = 5;

const MAX_GROUP_SIZE: usize = 3;

#[derive(Debug, Default, Clone)]
pub struct PipelineStats {
    pub rotated: usize,
    pub cohort_gaps: usize,
    pub intro_gaps: usize,
    pub generated: usize,
    pub rejected: usize,
}

#[derive(Debug, Deserialize)]
struct GeneratedSentence {
    arabic: String,
    english: String,
    #[serde(default)]
    transliteration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    sentences: Vec<GeneratedSentence>,
}

pub async fn run(
    store: &Store,
    engine: &Engine,
    llm: &LlmProvider,
    cfg: &EngineConfig,
) -> PipelineStats {
    match run_inner(store, engine, llm, cfg).await {
        Ok(stats) => {
            tracing::info!(
                rotated = stats.rotated,
                cohort_gaps = stats.cohort_gaps,
                intro_gaps = stats.intro_gaps,
                generated = stats.generated,
                rejected = stats.rejected,
                "Material pipeline run complete"
            );
            stats
        }
        Err(err) => {
            tracing::error!(error = %err, "Material pipeline run failed");
            PipelineStats::default()
        }
    }
}

async fn run_inner(
    store: &Store,
    engine: &Engine,
    llm: &LlmProvider,
    cfg: &EngineConfig,
) -> Result<PipelineStats, Box<dyn std::error::Error + Send + Sync>> {
    let mut stats = PipelineStats::default();
    let now = Utc::now();

    // 1. Cap check: rotate stale sentences first to make room.
    let mut total_active = store.count_active_sentences()?;
    if total_active >= cfg.pipeline_cap {
        stats.rotated = rotate_stale(store, 1, cfg.min_sentences_per_word)?;
        total_active = total_active.saturating_sub(stats.rotated);
    }
    if total_active >= cfg.pipeline_cap + CAP_SLACK {
        tracing::info!(
            total_active,
            cap = cfg.pipeline_cap,
            "Still over cap after rotation, skipping generation"
        );
        return Ok(stats);
    }

    // 2. Gap lemmas: focus cohort first, then likely next introductions.
    let knowledge = store.list_knowledge()?;
    let focus_cohort: Vec<String> = knowledge
        .iter()
        .filter(|k| {
            matches!(
                k.state,
                KnowledgeState::Acquiring | KnowledgeState::Learning | KnowledgeState::Lapsed
            )
        })
        .map(|k| k.lemma_id.clone())
        .collect();

    let mut gap_ids: Vec<String> = Vec::new();
    if !focus_cohort.is_empty() {
        let counts = store.active_counts_for_targets(&focus_cohort)?;
        for lid in &focus_cohort {
            if counts.get(lid).copied().unwrap_or(0) < cfg.min_sentences_per_word {
                gap_ids.push(lid.clone());
            }
        }
        stats.cohort_gaps = gap_ids.len();
        gap_ids.truncate(MAX_GAPS_PER_RUN);
    }

    for candidate in engine.select_next_words(INTRO_LOOKAHEAD, now)? {
        if gap_ids.contains(&candidate.lemma_id) {
            continue;
        }
        let counts = store.active_counts_for_targets(&[candidate.lemma_id.clone()])?;
        if counts
            .get(&candidate.lemma_id)
            .copied()
            .unwrap_or(0)
            < cfg.min_sentences_per_word
        {
            gap_ids.push(candidate.lemma_id.clone());
            stats.intro_gaps += 1;
        }
    }

    if gap_ids.is_empty() {
        tracing::info!("Material pipeline: no gaps found");
        return Ok(stats);
    }

    // 3. Vocabulary context for prompting, validation, mapping.
    let all_lemmas = store.list_lemmas()?;
    let lemma_by_id: HashMap<String, Lemma> = all_lemmas
        .iter()
        .map(|l| (l.lemma_id.clone(), l.clone()))
        .collect();
    let knowledge_by_id: HashMap<String, KnowledgeState> = knowledge
        .iter()
        .map(|k| (k.lemma_id.clone(), k.state))
        .collect();

    // Prompt vocabulary: active study states. Validation vocabulary also
    // admits encountered words; the learner has seen them, a sentence using
    // one is still readable.
    let prompt_lemmas: Vec<Lemma> = all_lemmas
        .iter()
        .filter(|l| {
            knowledge_by_id
                .get(&l.lemma_id)
                .map(|s| s.is_active_vocabulary())
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    let validation_lemmas: Vec<Lemma> = all_lemmas
        .iter()
        .filter(|l| knowledge_by_id.contains_key(&l.lemma_id))
        .cloned()
        .collect();
    let validation_index = LemmaIndex::build(&validation_lemmas);
    let mapping_index = LemmaIndex::build(&all_lemmas);

    let avoid = avoid_words(store, &lemma_by_id)?;

    let gap_lemmas: Vec<Lemma> = gap_ids
        .iter()
        .filter_map(|lid| lemma_by_id.get(lid).cloned())
        .collect();

    // 4. Multi-target groups (2–3 compatible words), singletons for the rest.
    for group in group_for_generation(&gap_lemmas) {
        let accepted = generate_for_group(
            store,
            llm,
            cfg,
            &group,
            &prompt_lemmas,
            &validation_index,
            &mapping_index,
            &avoid,
            &mut stats,
        )
        .await;
        if let Err(err) = accepted {
            match err {
                LlmError::AllProvidersFailed | LlmError::Disabled => {
                    tracing::warn!(error = %err, "LLM unavailable, aborting pipeline run");
                    break;
                }
                other => {
                    tracing::warn!(error = %other, "Generation failed for group, continuing");
                }
            }
        }
    }

    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
async fn generate_for_group(
    store: &Store,
    llm: &LlmProvider,
    cfg: &EngineConfig,
    group: &[Lemma],
    prompt_lemmas: &[Lemma],
    validation_index: &LemmaIndex,
    mapping_index: &LemmaIndex,
    avoid: &[String],
    stats: &mut PipelineStats,
) -> Result<(), LlmError> {
    let needed = group.len() * cfg.min_sentences_per_word;
    let mut stored = 0usize;
    let mut avoid_extra: HashSet<String> = HashSet::new();

    for _attempt in 0..=llm.max_generation_retries() {
        if stored >= needed {
            break;
        }
        let mut avoid_all: Vec<String> = avoid.to_vec();
        avoid_all.extend(avoid_extra.iter().cloned());

        let prompt = build_prompt(group, prompt_lemmas, &avoid_all, needed + 2);
        let response = llm
            .generate_structured(
                &prompt,
                SYSTEM_PROMPT,
                &GenerateOptions {
                    temperature: Some(0.8),
                    timeout_secs: None,
                    task_type: "sentence_generation",
                    model_override: None,
                },
            )
            .await?;

        let parsed: GenerationResponse = match serde_json::from_value(response) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, "Generation response had unexpected shape");
                continue;
            }
        };

        for candidate in parsed.sentences {
            if stored >= needed {
                break;
            }
            // Attribute the sentence to the first group target it contains.
            let Some(target) = group.iter().find(|lemma| {
                validate_sentence(&candidate.arabic, &lemma.bare, validation_index).target_found
            }) else {
                stats.rejected += 1;
                reject_event(store, &candidate.arabic, "target_missing");
                continue;
            };

            let validation = validate_sentence(&candidate.arabic, &target.bare, validation_index);
            if !validation.valid {
                stats.rejected += 1;
                for unknown in &validation.unknown_words {
                    avoid_extra.insert(normalize_arabic(unknown));
                }
                reject_event(store, &candidate.arabic, "unknown_words");
                continue;
            }

            let tokens = tokenize(&candidate.arabic);
            let mappings =
                map_tokens_to_lemmas(&tokens, mapping_index, &target.lemma_id, &target.bare);
            let unmapped: Vec<&str> = mappings
                .iter()
                .filter(|m| m.lemma_id.is_none() && !m.is_function_word)
                .map(|m| m.surface_form.as_str())
                .collect();
            if !unmapped.is_empty() {
                stats.rejected += 1;
                tracing::warn!(?unmapped, "Skipping sentence with unmapped words");
                reject_event(store, &candidate.arabic, "mapping_failed");
                continue;
            }

            // Optional second opinion on the word→lemma mappings.
            if llm.verify_mappings_enabled() {
                let flagged = verify_mappings(llm, store, &candidate, &mappings).await?;
                if !flagged.is_empty() {
                    stats.rejected += 1;
                    tracing::warn!(
                        positions = ?flagged,
                        "LLM flagged mapping issues, discarding sentence"
                    );
                    reject_event(store, &candidate.arabic, "mapping_flagged");
                    continue;
                }
            }

            let sentence_id = uuid::Uuid::new_v4().to_string();
            let words: Vec<SentenceWord> = mappings
                .iter()
                .map(|m| SentenceWord {
                    sentence_id: sentence_id.clone(),
                    position: m.position,
                    surface_form: m.surface_form.clone(),
                    lemma_id: m.lemma_id.clone(),
                    is_target: m.is_target,
                    is_function_word: m.is_function_word,
                })
                .collect();

            let sentence = Sentence {
                sentence_id: sentence_id.clone(),
                arabic_text: candidate.arabic.clone(),
                arabic_diacritized: candidate.arabic.clone(),
                english_translation: candidate.english.clone(),
                transliteration: candidate.transliteration.clone(),
                target_lemma_id: Some(target.lemma_id.clone()),
                is_active: true,
                times_shown: 0,
                last_reading_shown_at: None,
                last_reading_comprehension: None,
                last_listening_shown_at: None,
                last_listening_comprehension: None,
                grammar_features: Vec::new(),
                source: "llm".to_string(),
                created_at: Utc::now(),
            };

            match store.create_sentence_with_words(&sentence, &words) {
                Ok(()) => {
                    stored += 1;
                    stats.generated += 1;
                    let _ = store.log_interaction(
                        "material_accepted",
                        serde_json::json!({
                            "sentenceId": sentence_id,
                            "targetLemmaId": target.lemma_id,
                        }),
                    );
                }
                Err(err) => {
                    stats.rejected += 1;
                    tracing::warn!(error = %err, "Persisting generated sentence failed");
                    reject_event(store, &candidate.arabic, "persistence_failed");
                }
            }
        }
    }

    Ok(())
}

/// Ask the adapter to double-check each mapped token against its lemma
/// gloss. Returns the positions it disputes; fail-open on response-shape
/// problems (the deterministic validator already passed).
async fn verify_mappings(
    llm: &LlmProvider,
    store: &Store,
    candidate: &GeneratedSentence,
    mappings: &[crate::arabic::validator::TokenMapping],
) -> Result<Vec<usize>, LlmError> {
    let mut lines = Vec::new();
    for m in mappings {
        let Some(lid) = &m.lemma_id else { continue };
        let gloss = store
            .get_lemma(lid)
            .ok()
            .flatten()
            .map(|l| l.gloss_en)
            .unwrap_or_default();
        lines.push(format!(
            "{}: {} -> {}",
            m.position, m.surface_form, gloss
        ));
    }

    let prompt = format!(
        "Sentence: {}\nTranslation: {}\nToken mappings (position: surface -> \
         gloss):\n{}\n\nReturn JSON {{\"wrongPositions\": [..]}} listing any \
         position whose gloss does not fit the token in this sentence.",
        candidate.arabic,
        candidate.english,
        lines.join("\n")
    );

    let response = llm
        .generate_structured(
            &prompt,
            "You verify Arabic word-to-dictionary mappings. Respond with JSON only.",
            &GenerateOptions {
                temperature: Some(0.0),
                timeout_secs: None,
                task_type: "mapping_verification",
                model_override: None,
            },
        )
        .await?;

    Ok(response["wrongPositions"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_u64().map(|n| n as usize))
                .collect()
        })
        .unwrap_or_default())
}

fn reject_event(store: &Store, arabic: &str, reason: &str) {
    let _ = store.log_interaction(
        "material_rejected",
        serde_json::json!({"arabic": arabic, "reason": reason}),
    );
}

const SYSTEM_PROMPT: &str = "You are an Arabic language tutor writing short, \
natural Modern Standard Arabic sentences for a beginner. Use ONLY the \
provided vocabulary plus common function words. Always include full \
diacritics (tashkeel). Respond with JSON only.";

fn build_prompt(group: &[Lemma], known: &[Lemma], avoid: &[String], count: usize) -> String {
    let targets: Vec<String> = group
        .iter()
        .map(|l| format!("{} ({})", l.surface, l.gloss_en))
        .collect();

    let mut by_pos: HashMap<&str, Vec<String>> = HashMap::new();
    for lemma in known {
        by_pos
            .entry(lemma.pos.as_deref().unwrap_or("other"))
            .or_default()
            .push(format!("{} ({})", lemma.surface, lemma.gloss_en));
    }
    let mut vocab_sections: Vec<String> = by_pos
        .into_iter()
        .map(|(pos, words)| format!("{pos}: {}", words.join("، ")))
        .collect();
    vocab_sections.sort();

    let avoid_section = if avoid.is_empty() {
        String::new()
    } else {
        format!(
            "\nAvoid over-used words: {}",
            avoid.join("، ")
        )
    };

    format!(
        "Write {count} different sentences, each using at least one of these \
         target words: {}.\nAllowed vocabulary:\n{}{}\n\nReturn JSON: \
         {{\"sentences\": [{{\"arabic\": \"...\", \"english\": \"...\", \
         \"transliteration\": \"...\"}}]}}",
        targets.join("، "),
        vocab_sections.join("\n"),
        avoid_section
    )
}

/// Content words whose sentence count exceeds max(4, 2×median) are avoided
/// in new generations, so the corpus does not converge on the same few
/// scaffolds.
fn avoid_words(
    store: &Store,
    lemma_by_id: &HashMap<String, Lemma>,
) -> Result<Vec<String>, crate::store::StoreError> {
    let mut counts: HashMap<String, u32> = HashMap::new();
    for sentence in store.list_active_sentences()? {
        for word in store.sentence_words(&sentence.sentence_id)? {
            if word.is_function_word {
                continue;
            }
            if let Some(lid) = word.lemma_id {
                *counts.entry(lid).or_insert(0) += 1;
            }
        }
    }
    if counts.is_empty() {
        return Ok(Vec::new());
    }

    let mut values: Vec<u32> = counts.values().copied().collect();
    values.sort_unstable();
    let median = values[values.len() / 2];
    let threshold = (2 * median).max(4);

    let mut avoid: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count > threshold)
        .filter_map(|(lid, _)| lemma_by_id.get(&lid).map(|l| l.surface.clone()))
        .collect();
    avoid.sort();
    Ok(avoid)
}

/// Group gap words for multi-target generation: runs of 2–3 words sharing a
/// part of speech, singletons for everything else.
fn group_for_generation(gap_lemmas: &[Lemma]) -> Vec<Vec<Lemma>> {
    let mut by_pos: HashMap<&str, Vec<Lemma>> = HashMap::new();
    for lemma in gap_lemmas {
        by_pos
            .entry(lemma.pos.as_deref().unwrap_or("other"))
            .or_default()
            .push(lemma.clone());
    }

    let mut pos_keys: Vec<&str> = by_pos.keys().copied().collect();
    pos_keys.sort();

    let mut groups = Vec::new();
    for pos in pos_keys {
        let lemmas = by_pos.remove(pos).unwrap_or_default();
        for chunk in lemmas.chunks(MAX_GROUP_SIZE) {
            groups.push(chunk.to_vec());
        }
    }
    groups
}

/// Retire stale sentences: shown at least `min_shown` times, at least two
/// scaffolds, every scaffold fully known and none acquiring. Lowest
/// diversity first, and a target never drops below `min_active` active
/// sentences.
pub fn rotate_stale(
    store: &Store,
    min_shown: u32,
    min_active: usize,
) -> Result<usize, crate::store::StoreError> {
    let sentences = store.list_active_sentences()?;
    let knowledge: HashMap<String, KnowledgeState> = store
        .list_knowledge()?
        .into_iter()
        .map(|k| (k.lemma_id.clone(), k.state))
        .collect();

    let mut active_per_target: HashMap<Option<String>, usize> = HashMap::new();
    for s in &sentences {
        *active_per_target.entry(s.target_lemma_id.clone()).or_insert(0) += 1;
    }

    let mut stale: Vec<&Sentence> = Vec::new();
    for sentence in &sentences {
        if sentence.times_shown < min_shown {
            continue;
        }
        let words = store.sentence_words(&sentence.sentence_id)?;
        let scaffolds: Vec<&SentenceWord> = words
            .iter()
            .filter(|w| !w.is_function_word && !w.is_target && w.lemma_id.is_some())
            .collect();
        if scaffolds.len() < 2 {
            continue;
        }
        let any_acquiring = scaffolds.iter().any(|w| {
            w.lemma_id
                .as_ref()
                .and_then(|lid| knowledge.get(lid))
                .map(|s| *s == KnowledgeState::Acquiring)
                .unwrap_or(false)
        });
        let all_known = scaffolds.iter().all(|w| {
            w.lemma_id
                .as_ref()
                .and_then(|lid| knowledge.get(lid))
                .map(|s| *s == KnowledgeState::Known)
                .unwrap_or(false)
        });
        if !any_acquiring && all_known {
            stale.push(sentence);
        }
    }

    // Ascending diversity = most-shown first.
    stale.sort_by(|a, b| {
        let div_a = 1.0 / (1.0 + f64::from(a.times_shown));
        let div_b = 1.0 / (1.0 + f64::from(b.times_shown));
        div_a.partial_cmp(&div_b).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut retired = 0usize;
    let mut retiring_per_target: HashMap<Option<String>, usize> = HashMap::new();
    for sentence in stale {
        let target = sentence.target_lemma_id.clone();
        let active = active_per_target.get(&target).copied().unwrap_or(0);
        let already = retiring_per_target.get(&target).copied().unwrap_or(0);
        if active - already > min_active {
            store.retire_sentence(&sentence.sentence_id)?;
            *retiring_per_target.entry(target).or_insert(0) += 1;
            retired += 1;
        }
    }

    if retired > 0 {
        store.log_interaction(
            "sentences_retired",
            serde_json::json!({"retired": retired, "totalActive": sentences.len()}),
        )?;
    }
    Ok(retired)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::config::LlmConfig;
    use crate::engine::testutil::{seed_lemma, test_engine};
    use crate::store::operations::knowledge::{FsrsCard, UserLemmaKnowledge};

    use super::*;

    fn mock_llm() -> LlmProvider {
        LlmProvider::new(&LlmConfig {
            enabled: true,
            mock: true,
            providers: Vec::new(),
            timeout_secs: 1,
            max_generation_retries: 1,
            verify_mappings: false,
        })
    }

    fn set_state(store: &Store, lemma_id: &str, state: KnowledgeState) {
        let now = Utc::now();
        let mut ulk = UserLemmaKnowledge::new_encountered(lemma_id, "study", now);
        ulk.state = state;
        match state {
            KnowledgeState::Acquiring => {
                ulk.acquisition_box = Some(1);
                ulk.acquisition_next_due = Some(now);
            }
            s if s.is_srs() => {
                ulk.fsrs_card = Some(FsrsCard {
                    stability: 30.0,
                    difficulty: 4.0,
                    due: now + Duration::days(10),
                    last_review: Some(now),
                    reps: 8,
                });
            }
            _ => {}
        }
        store.put_knowledge(&ulk).unwrap();
    }

    fn seed_sentence_for(store: &Store, sid: &str, target: &str, scaffolds: &[&str], shown: u32) {
        let mut words = vec![SentenceWord {
            sentence_id: sid.to_string(),
            position: 0,
            surface_form: "هدف".to_string(),
            lemma_id: Some(target.to_string()),
            is_target: true,
            is_function_word: false,
        }];
        for (i, lid) in scaffolds.iter().enumerate() {
            words.push(SentenceWord {
                sentence_id: sid.to_string(),
                position: i + 1,
                surface_form: format!("كلمة{i}"),
                lemma_id: Some(lid.to_string()),
                is_target: false,
                is_function_word: false,
            });
        }
        let sentence = Sentence {
            sentence_id: sid.to_string(),
            arabic_text: "جملة".to_string(),
            arabic_diacritized: "جملة".to_string(),
            english_translation: "sentence".to_string(),
            transliteration: None,
            target_lemma_id: Some(target.to_string()),
            is_active: true,
            times_shown: shown,
            last_reading_shown_at: None,
            last_reading_comprehension: None,
            last_listening_shown_at: None,
            last_listening_comprehension: None,
            grammar_features: Vec::new(),
            source: "llm".to_string(),
            created_at: Utc::now(),
        };
        store.create_sentence_with_words(&sentence, &words).unwrap();
    }

    #[tokio::test]
    async fn generates_and_persists_valid_sentences() {
        let (_tmp, store, engine) = test_engine();
        let llm = mock_llm();
        let cfg = crate::config::EngineConfig {
            min_sentences_per_word: 1,
            ..Default::default()
        };

        seed_lemma(&store, "l1", "كتاب", "book");
        seed_lemma(&store, "l2", "ولد", "boy");
        set_state(&store, "l1", KnowledgeState::Acquiring);
        set_state(&store, "l2", KnowledgeState::Known);

        llm.push_mock_response(serde_json::json!({
            "sentences": [
                {"arabic": "هذا الولد مع كتاب", "english": "this boy has a book", "transliteration": "hādhā al-walad maʿa kitāb"}
            ]
        }));

        let stats = run(&store, &engine, &llm, &cfg).await;
        assert_eq!(stats.generated, 1);

        let active = store.list_active_sentences().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].target_lemma_id.as_deref(), Some("l1"));
        let words = store.sentence_words(&active[0].sentence_id).unwrap();
        // Every non-function token is mapped
        assert!(words
            .iter()
            .all(|w| w.is_function_word || w.lemma_id.is_some()));
        let target = words.iter().find(|w| w.is_target).unwrap();
        assert_eq!(target.lemma_id.as_deref(), Some("l1"));
    }

    #[tokio::test]
    async fn rejects_sentences_with_unknown_words() {
        let (_tmp, store, engine) = test_engine();
        let llm = mock_llm();
        let cfg = crate::config::EngineConfig {
            min_sentences_per_word: 1,
            ..Default::default()
        };

        seed_lemma(&store, "l1", "كتاب", "book");
        set_state(&store, "l1", KnowledgeState::Acquiring);

        llm.push_mock_response(serde_json::json!({
            "sentences": [
                {"arabic": "الكتاب المستشفى يشاهد", "english": "nonsense", "transliteration": ""}
            ]
        }));

        let stats = run(&store, &engine, &llm, &cfg).await;
        assert_eq!(stats.generated, 0);
        assert!(stats.rejected >= 1);
        assert!(store.list_active_sentences().unwrap().is_empty());
    }

    #[tokio::test]
    async fn skips_generation_when_over_cap_after_rotation() {
        let (_tmp, store, engine) = test_engine();
        let llm = mock_llm();
        let cfg = crate::config::EngineConfig {
            pipeline_cap: 1,
            min_sentences_per_word: 1,
            ..Default::default()
        };

        seed_lemma(&store, "l1", "كتاب", "book");
        seed_lemma(&store, "l2", "ولد", "boy");
        set_state(&store, "l1", KnowledgeState::Acquiring);
        set_state(&store, "l2", KnowledgeState::Known);
        // Over the tiny cap with non-stale sentences (never shown)
        for i in 0..12 {
            seed_sentence_for(&store, &format!("s{i}"), "l2", &["l1"], 0);
        }

        let stats = run(&store, &engine, &llm, &cfg).await;
        assert_eq!(stats.generated, 0);
        assert_eq!(store.count_active_sentences().unwrap(), 12);
    }

    #[test]
    fn rotate_stale_respects_min_active_per_target() {
        let (_tmp, store, _engine) = test_engine();
        for id in ["t", "a", "b"] {
            seed_lemma(&store, id, &format!("لفظ_{id}"), "word");
        }
        set_state(&store, "a", KnowledgeState::Known);
        set_state(&store, "b", KnowledgeState::Known);
        set_state(&store, "t", KnowledgeState::Learning);

        // Three stale sentences for the same target, all shown
        for i in 0..3 {
            seed_sentence_for(&store, &format!("s{i}"), "t", &["a", "b"], 3 + i);
        }

        let retired = rotate_stale(&store, 1, 2).unwrap();
        assert_eq!(retired, 1);
        assert_eq!(store.count_active_sentences().unwrap(), 2);
    }

    #[test]
    fn rotate_stale_keeps_sentences_with_acquiring_scaffolds() {
        let (_tmp, store, _engine) = test_engine();
        for id in ["t", "a", "b"] {
            seed_lemma(&store, id, &format!("لفظ_{id}"), "word");
        }
        set_state(&store, "a", KnowledgeState::Acquiring);
        set_state(&store, "b", KnowledgeState::Known);
        set_state(&store, "t", KnowledgeState::Learning);

        for i in 0..3 {
            seed_sentence_for(&store, &format!("s{i}"), "t", &["a", "b"], 5);
        }

        let retired = rotate_stale(&store, 1, 2).unwrap();
        assert_eq!(retired, 0);
    }

    #[test]
    fn avoid_words_uses_median_threshold() {
        let (_tmp, store, _engine) = test_engine();
        seed_lemma(&store, "common", "شمس", "sun");
        for i in 0..5 {
            seed_lemma(&store, &format!("r{i}"), &format!("قمر{i}"), "moon");
        }

        // "common" scaffolds every sentence (count 5); each r_i is a target
        // once (count 1). Median 1 → threshold max(4, 2) = 4 → only the
        // over-used scaffold is avoided.
        for i in 0..5 {
            seed_sentence_for(&store, &format!("c{i}"), &format!("r{i}"), &["common"], 0);
        }
        let lemma_map: HashMap<String, Lemma> = store
            .list_lemmas()
            .unwrap()
            .into_iter()
            .map(|l| (l.lemma_id.clone(), l))
            .collect();
        let avoid = avoid_words(&store, &lemma_map).unwrap();
        assert_eq!(avoid, vec!["شمس"]);
    }

    #[test]
    fn grouping_chunks_same_pos_words() {
        let (_tmp, store, _engine) = test_engine();
        for i in 0..5 {
            seed_lemma(&store, &format!("l{i}"), &format!("كلمة{i}"), "word");
        }
        let lemmas = store.list_lemmas().unwrap();
        let groups = group_for_generation(&lemmas);
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), 5);
        assert!(groups.iter().all(|g| g.len() <= MAX_GROUP_SIZE));
    }
}
