//! 新词推荐评分：频率、词根熟悉度、语法就绪度、同根词引入间隔。

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::arabic::function_words::is_function_word;
use crate::engine::{Engine, EngineError};
use crate::store::operations::knowledge::{KnowledgeState, UserLemmaKnowledge};
use crate::store::operations::lemmas::Lemma;

/// Dampen a root for this long after one of its siblings was introduced, so
/// same-root words spread out instead of arriving back to back.
const SIBLING_COOLDOWN_DAYS: i64 = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCandidate {
    pub lemma_id: String,
    pub surface: String,
    pub gloss_en: String,
    pub pos: Option<String>,
    pub transliteration: Option<String>,
    pub root: Option<String>,
    pub root_meaning: Option<String>,
    pub root_id: Option<String>,
    pub forms: BTreeMap<String, String>,
    pub example_ar: Option<String>,
    pub example_en: Option<String>,
    pub grammar_features: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub lemma_id: String,
    pub surface: String,
    pub gloss_en: String,
    pub pos: Option<String>,
    pub transliteration: Option<String>,
    pub state: String,
}

/// Frequency prior: rank 1 is the most common word. Unknown ranks sit at a
/// neutral 0.3 so hand-imported words still surface.
pub(crate) fn frequency_score(rank: Option<u32>) -> f64 {
    match rank {
        None => 0.3,
        Some(rank) => 1.0 / (1.0 + (f64::from(rank)).ln_1p() / 2.0),
    }
}

/// Share of root siblings already under study. A partially known root makes
/// a new sibling cheap to anchor. A fully known root drops to 0.1; there is
/// nothing left for the new word to scaffold against.
pub(crate) fn root_familiarity_score(
    siblings: &[Lemma],
    knowledge: &HashMap<String, UserLemmaKnowledge>,
) -> (f64, usize, usize) {
    let total = siblings.len();
    if total == 0 {
        return (0.0, 0, 0);
    }
    let known = siblings
        .iter()
        .filter(|s| {
            knowledge
                .get(&s.lemma_id)
                .map(|k| k.state.is_active_vocabulary())
                .unwrap_or(false)
        })
        .count();
    if known == 0 {
        return (0.0, 0, total);
    }
    if known == total {
        return (0.1, known, total);
    }
    (known as f64 / total as f64, known, total)
}

impl Engine {
    /// Score unlearned lemmas and return the top `count` introduction
    /// candidates, best first.
    pub fn select_next_words(
        &self,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<WordCandidate>, EngineError> {
        let lemmas = self.store().list_lemmas()?;
        let knowledge: HashMap<String, UserLemmaKnowledge> = self
            .store()
            .list_knowledge()?
            .into_iter()
            .map(|k| (k.lemma_id.clone(), k))
            .collect();

        let mut siblings_by_root: HashMap<String, Vec<Lemma>> = HashMap::new();
        for lemma in &lemmas {
            if let Some(root_id) = &lemma.root_id {
                if !lemma.is_variant() {
                    siblings_by_root
                        .entry(root_id.clone())
                        .or_default()
                        .push(lemma.clone());
                }
            }
        }

        // Most recent introduction instant per root, for the cooldown.
        let mut last_intro_by_root: HashMap<String, DateTime<Utc>> = HashMap::new();
        for lemma in &lemmas {
            let (Some(root_id), Some(k)) = (&lemma.root_id, knowledge.get(&lemma.lemma_id))
            else {
                continue;
            };
            if let Some(intro) = k.introduced_at {
                let entry = last_intro_by_root.entry(root_id.clone()).or_insert(intro);
                if intro > *entry {
                    *entry = intro;
                }
            }
        }

        let mut candidates: Vec<WordCandidate> = Vec::new();
        for lemma in &lemmas {
            if lemma.is_variant() || is_function_word(&lemma.bare) {
                continue;
            }
            // Already in play (any state beyond a bare encounter), skip.
            if let Some(k) = knowledge.get(&lemma.lemma_id) {
                if k.state != KnowledgeState::Encountered {
                    continue;
                }
            }

            let freq = frequency_score(lemma.frequency_rank);

            let (root_score, _, _) = match &lemma.root_id {
                Some(root_id) => root_familiarity_score(
                    siblings_by_root
                        .get(root_id)
                        .map(Vec::as_slice)
                        .unwrap_or(&[]),
                    &knowledge,
                ),
                None => (0.0, 0, 0),
            };

            let grammar_readiness = if lemma.grammar_features.is_empty() {
                0.5
            } else {
                let mut sum = 0.0;
                for key in &lemma.grammar_features {
                    sum += self.comfort_for(key, now)?;
                }
                sum / lemma.grammar_features.len() as f64
            };

            let cooldown = match lemma
                .root_id
                .as_ref()
                .and_then(|r| last_intro_by_root.get(r))
            {
                Some(last) if now - *last < Duration::days(SIBLING_COOLDOWN_DAYS) => 0.5,
                _ => 1.0,
            };

            let score =
                (0.4 * freq + 0.3 * root_score + 0.2 * grammar_readiness + 0.1) * cooldown;

            let root = match &lemma.root_id {
                Some(rid) => self.store().get_root(rid)?,
                None => None,
            };

            candidates.push(WordCandidate {
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
                score,
            });
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(count);
        Ok(candidates)
    }

    /// Root family with per-sibling knowledge state, for intro/reintro cards.
    pub fn root_family(&self, root_id: &str) -> Result<Vec<FamilyMember>, EngineError> {
        let mut members = Vec::new();
        for sibling in self.store().lemmas_for_root(root_id)? {
            let state = self
                .store()
                .get_knowledge(&sibling.lemma_id)?
                .map(|k| k.state.as_str().to_string())
                .unwrap_or_else(|| "new".to_string());
            members.push(FamilyMember {
                lemma_id: sibling.lemma_id,
                surface: sibling.surface,
                gloss_en: sibling.gloss_en,
                pos: sibling.pos,
                transliteration: sibling.transliteration,
                state,
            });
        }
        Ok(members)
    }
}
