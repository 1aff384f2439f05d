use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarFeature {
    pub feature_key: String,
    pub category: Option<String>,
    pub label_en: String,
    pub label_ar: Option<String>,
}

/// Per-feature exposure counters. Comfort is derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGrammarExposure {
    pub feature_key: String,
    pub times_seen: u32,
    pub times_correct: u32,
    pub times_confused: u32,
    pub first_seen_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub introduced_at: Option<DateTime<Utc>>,
}

impl UserGrammarExposure {
    pub fn new(feature_key: &str) -> Self {
        Self {
            feature_key: feature_key.to_string(),
            times_seen: 0,
            times_correct: 0,
            times_confused: 0,
            first_seen_at: None,
            last_seen_at: None,
            introduced_at: None,
        }
    }

    pub fn confusion_rate(&self) -> f64 {
        if self.times_seen == 0 {
            return 0.0;
        }
        f64::from(self.times_confused) / f64::from(self.times_seen)
    }
}

impl Store {
    pub fn upsert_grammar_feature(&self, feature: &GrammarFeature) -> Result<(), StoreError> {
        let key = keys::grammar_feature_key(&feature.feature_key);
        self.grammar_features
            .insert(key.as_bytes(), Self::serialize(feature)?)?;
        Ok(())
    }

    pub fn get_grammar_feature(
        &self,
        feature_key: &str,
    ) -> Result<Option<GrammarFeature>, StoreError> {
        let key = keys::grammar_feature_key(feature_key);
        match self.grammar_features.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_grammar_exposure(
        &self,
        feature_key: &str,
    ) -> Result<Option<UserGrammarExposure>, StoreError> {
        let key = keys::grammar_exposure_key(feature_key);
        match self.grammar_exposure.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_grammar_exposure(
        &self,
        exposure: &UserGrammarExposure,
    ) -> Result<(), StoreError> {
        let key = keys::grammar_exposure_key(&exposure.feature_key);
        self.grammar_exposure
            .insert(key.as_bytes(), Self::serialize(exposure)?)?;
        Ok(())
    }

    pub fn list_grammar_exposures(&self) -> Result<Vec<UserGrammarExposure>, StoreError> {
        let mut exposures = Vec::new();
        for item in self.grammar_exposure.iter() {
            let (_, v) = item?;
            exposures.push(Self::deserialize::<UserGrammarExposure>(&v)?);
        }
        Ok(exposures)
    }
}
