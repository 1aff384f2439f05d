use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comprehension {
    Understood,
    Partial,
    GrammarConfused,
    NoIdea,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    Reading,
    Listening,
    Reintro,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentence {
    pub sentence_id: String,
    pub arabic_text: String,
    pub arabic_diacritized: String,
    pub english_translation: String,
    pub transliteration: Option<String>,
    pub target_lemma_id: Option<String>,
    pub is_active: bool,
    pub times_shown: u32,
    pub last_reading_shown_at: Option<DateTime<Utc>>,
    pub last_reading_comprehension: Option<Comprehension>,
    pub last_listening_shown_at: Option<DateTime<Utc>>,
    pub last_listening_comprehension: Option<Comprehension>,
    #[serde(default)]
    pub grammar_features: Vec<String>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl Sentence {
    pub fn last_shown_in_mode(&self, mode: ReviewMode) -> Option<DateTime<Utc>> {
        match mode {
            ReviewMode::Listening => self.last_listening_shown_at,
            _ => self.last_reading_shown_at,
        }
    }

    pub fn last_comprehension_in_mode(&self, mode: ReviewMode) -> Option<Comprehension> {
        match mode {
            ReviewMode::Listening => self.last_listening_comprehension,
            _ => self.last_reading_comprehension,
        }
    }

    pub fn record_shown(&mut self, mode: ReviewMode, signal: Comprehension, now: DateTime<Utc>) {
        self.times_shown += 1;
        match mode {
            ReviewMode::Listening => {
                self.last_listening_shown_at = Some(now);
                self.last_listening_comprehension = Some(signal);
            }
            _ => {
                self.last_reading_shown_at = Some(now);
                self.last_reading_comprehension = Some(signal);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceWord {
    pub sentence_id: String,
    pub position: usize,
    pub surface_form: String,
    pub lemma_id: Option<String>,
    pub is_target: bool,
    #[serde(default)]
    pub is_function_word: bool,
}

impl Store {
    /// Persist a sentence together with its word rows, atomically from the
    /// caller's perspective. Rejected before any write when:
    /// - fewer than two tokens,
    /// - a non-function content token has no lemma mapping; partial
    ///   sentences must never be stored,
    /// - the target lemma is a variant.
    pub fn create_sentence_with_words(
        &self,
        sentence: &Sentence,
        words: &[SentenceWord],
    ) -> Result<(), StoreError> {
        if words.len() < 2 {
            return Err(StoreError::Validation(format!(
                "sentence {} has fewer than 2 tokens",
                sentence.sentence_id
            )));
        }
        for w in words {
            if !w.is_function_word && w.lemma_id.is_none() {
                return Err(StoreError::Validation(format!(
                    "unmapped content token '{}' at position {}",
                    w.surface_form, w.position
                )));
            }
        }
        if let Some(target_id) = &sentence.target_lemma_id {
            let target = self.require_lemma(target_id)?;
            if target.is_variant() {
                return Err(StoreError::Validation(format!(
                    "target lemma {target_id} is a variant"
                )));
            }
        }

        let key = keys::sentence_key(&sentence.sentence_id);
        self.sentences
            .insert(key.as_bytes(), Self::serialize(sentence)?)?;

        for w in words {
            self.put_sentence_word(w)?;
        }
        Ok(())
    }

    fn put_sentence_word(&self, word: &SentenceWord) -> Result<(), StoreError> {
        let key = keys::sentence_word_key(&word.sentence_id, word.position);
        self.sentence_words
            .insert(key.as_bytes(), Self::serialize(word)?)?;
        if let Some(lid) = &word.lemma_id {
            let idx_key = keys::sentence_words_by_lemma_key(lid, &word.sentence_id);
            self.sentence_words_by_lemma
                .insert(idx_key.as_bytes(), word.sentence_id.as_bytes())?;
        }
        Ok(())
    }

    pub fn get_sentence(&self, sentence_id: &str) -> Result<Option<Sentence>, StoreError> {
        let key = keys::sentence_key(sentence_id);
        match self.sentences.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn require_sentence(&self, sentence_id: &str) -> Result<Sentence, StoreError> {
        self.get_sentence(sentence_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "sentence".to_string(),
                key: sentence_id.to_string(),
            })
    }

    pub fn update_sentence(&self, sentence: &Sentence) -> Result<(), StoreError> {
        let key = keys::sentence_key(&sentence.sentence_id);
        self.sentences
            .insert(key.as_bytes(), Self::serialize(sentence)?)?;
        Ok(())
    }

    /// Words of a sentence in position order.
    pub fn sentence_words(&self, sentence_id: &str) -> Result<Vec<SentenceWord>, StoreError> {
        let prefix = keys::sentence_word_prefix(sentence_id);
        let mut words = Vec::new();
        for item in self.sentence_words.scan_prefix(prefix.as_bytes()) {
            let (_, v) = item?;
            words.push(Self::deserialize::<SentenceWord>(&v)?);
        }
        Ok(words)
    }

    /// Sentence ids containing a given lemma (via the secondary index).
    pub fn sentence_ids_for_lemma(&self, lemma_id: &str) -> Result<Vec<String>, StoreError> {
        let prefix = keys::sentence_words_by_lemma_prefix(lemma_id);
        let mut ids = Vec::new();
        for item in self.sentence_words_by_lemma.scan_prefix(prefix.as_bytes()) {
            let (_, v) = item?;
            ids.push(String::from_utf8_lossy(&v).to_string());
        }
        Ok(ids)
    }

    pub fn list_active_sentences(&self) -> Result<Vec<Sentence>, StoreError> {
        let mut sentences = Vec::new();
        for item in self.sentences.iter() {
            let (_, v) = item?;
            let s: Sentence = Self::deserialize(&v)?;
            if s.is_active {
                sentences.push(s);
            }
        }
        Ok(sentences)
    }

    pub fn count_active_sentences(&self) -> Result<usize, StoreError> {
        Ok(self.list_active_sentences()?.len())
    }

    /// Active sentence count per target lemma for the given targets.
    pub fn active_counts_for_targets(
        &self,
        target_lemma_ids: &[String],
    ) -> Result<std::collections::HashMap<String, usize>, StoreError> {
        let mut counts: std::collections::HashMap<String, usize> = target_lemma_ids
            .iter()
            .map(|lid| (lid.clone(), 0))
            .collect();
        for sentence in self.list_active_sentences()? {
            if let Some(target) = &sentence.target_lemma_id {
                if let Some(c) = counts.get_mut(target) {
                    *c += 1;
                }
            }
        }
        Ok(counts)
    }

    pub fn retire_sentence(&self, sentence_id: &str) -> Result<(), StoreError> {
        let mut sentence = self.require_sentence(sentence_id)?;
        sentence.is_active = false;
        self.update_sentence(&sentence)
    }

    /// Heal a legacy word row whose lemma was unresolved at creation time.
    pub fn set_sentence_word_lemma(
        &self,
        sentence_id: &str,
        position: usize,
        lemma_id: &str,
    ) -> Result<(), StoreError> {
        let key = keys::sentence_word_key(sentence_id, position);
        let raw = self
            .sentence_words
            .get(key.as_bytes())?
            .ok_or_else(|| StoreError::NotFound {
                entity: "sentence_word".to_string(),
                key: key.clone(),
            })?;
        let mut word: SentenceWord = Self::deserialize(&raw)?;
        word.lemma_id = Some(lemma_id.to_string());
        self.put_sentence_word(&word)
    }

    /// All word rows with no lemma mapping, for the backfill worker.
    pub fn list_unmapped_sentence_words(&self) -> Result<Vec<SentenceWord>, StoreError> {
        let mut unmapped = Vec::new();
        for item in self.sentence_words.iter() {
            let (_, v) = item?;
            let word: SentenceWord = Self::deserialize(&v)?;
            if word.lemma_id.is_none() && !word.is_function_word {
                unmapped.push(word);
            }
        }
        Ok(unmapped)
    }
}
