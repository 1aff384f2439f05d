pub mod keys;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub lemmas: sled::Tree,
    pub roots: sled::Tree,
    pub sentences: sled::Tree,
    pub sentence_words: sled::Tree,
    pub knowledge: sled::Tree,
    pub review_logs: sled::Tree,
    pub sentence_review_logs: sled::Tree,
    pub grammar_features: sled::Tree,
    pub grammar_exposure: sled::Tree,
    pub interactions: sled::Tree,
    // Secondary index trees
    pub sentence_words_by_lemma: sled::Tree,
    pub reviews_by_lemma: sled::Tree,
    pub review_client_ids: sled::Tree,
    pub sentence_review_client_ids: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("state invariant violation for lemma {lemma_id}: {detail}")]
    InvariantViolation { lemma_id: String, detail: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let lemmas = db.open_tree(trees::LEMMAS)?;
        let roots = db.open_tree(trees::ROOTS)?;
        let sentences = db.open_tree(trees::SENTENCES)?;
        let sentence_words = db.open_tree(trees::SENTENCE_WORDS)?;
        let knowledge = db.open_tree(trees::KNOWLEDGE)?;
        let review_logs = db.open_tree(trees::REVIEW_LOGS)?;
        let sentence_review_logs = db.open_tree(trees::SENTENCE_REVIEW_LOGS)?;
        let grammar_features = db.open_tree(trees::GRAMMAR_FEATURES)?;
        let grammar_exposure = db.open_tree(trees::GRAMMAR_EXPOSURE)?;
        let interactions = db.open_tree(trees::INTERACTIONS)?;
        let sentence_words_by_lemma = db.open_tree(trees::SENTENCE_WORDS_BY_LEMMA)?;
        let reviews_by_lemma = db.open_tree(trees::REVIEWS_BY_LEMMA)?;
        let review_client_ids = db.open_tree(trees::REVIEW_CLIENT_IDS)?;
        let sentence_review_client_ids = db.open_tree(trees::SENTENCE_REVIEW_CLIENT_IDS)?;

        Ok(Self {
            db,
            lemmas,
            roots,
            sentences,
            sentence_words,
            knowledge,
            review_logs,
            sentence_review_logs,
            grammar_features,
            grammar_exposure,
            interactions,
            sentence_words_by_lemma,
            reviews_by_lemma,
            review_client_ids,
            sentence_review_client_ids,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn raw_db(&self) -> &Db {
        &self.db
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
