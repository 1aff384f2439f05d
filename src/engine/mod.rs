pub mod acquisition;
pub mod dispatcher;
pub mod grammar;
pub mod selector;
pub mod srs;
pub mod word_selector;

use std::sync::Arc;

use thiserror::Error;

use crate::config::EngineConfig;
use crate::response::AppError;
use crate::store::{Store, StoreError};

/// The learning state machine: acquisition boxes, SRS scheduling, session
/// assembly and review dispatch. Holds no global state; everything flows
/// through the store handle and the injected clock (`now` parameters).
pub struct Engine {
    config: EngineConfig,
    store: Arc<Store>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl From<EngineError> for AppError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::Store(e) => e.into(),
            EngineError::Scheduler(msg) => AppError::internal(&msg),
        }
    }
}

impl Engine {
    pub fn new(config: EngineConfig, store: Arc<Store>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Utc;

    use crate::config::EngineConfig;
    use crate::store::operations::lemmas::Lemma;
    use crate::store::Store;

    use super::Engine;

    pub fn test_engine() -> (tempfile::TempDir, Arc<Store>, Engine) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store =
            Arc::new(Store::open(tmp.path().join("engine.sled").to_str().unwrap()).unwrap());
        let engine = Engine::new(EngineConfig::default(), store.clone());
        (tmp, store, engine)
    }

    pub fn seed_lemma(store: &Store, id: &str, surface: &str, gloss: &str) {
        store
            .upsert_lemma(&Lemma {
                lemma_id: id.to_string(),
                surface: surface.to_string(),
                bare: crate::arabic::normalize_arabic(surface),
                gloss_en: gloss.to_string(),
                pos: Some("noun".to_string()),
                root_id: None,
                frequency_rank: None,
                forms: BTreeMap::new(),
                canonical_lemma_id: None,
                grammar_features: Vec::new(),
                example_ar: None,
                example_en: None,
                transliteration: None,
                created_at: Utc::now(),
            })
            .unwrap();
    }
}
