use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// 一个规范词条。`bare` 由 `surface` 去音符 + alef 归一化派生，导入时计算。
/// `canonical_lemma_id` 非空表示这是一个变体词条：不可独立排期，
/// 只用于把 surface form 经 `forms` 路由到规范词条。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lemma {
    pub lemma_id: String,
    pub surface: String,
    pub bare: String,
    pub gloss_en: String,
    pub pos: Option<String>,
    pub root_id: Option<String>,
    pub frequency_rank: Option<u32>,
    #[serde(default)]
    pub forms: BTreeMap<String, String>,
    pub canonical_lemma_id: Option<String>,
    #[serde(default)]
    pub grammar_features: Vec<String>,
    pub example_ar: Option<String>,
    pub example_en: Option<String>,
    pub transliteration: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Lemma {
    pub fn is_variant(&self) -> bool {
        self.canonical_lemma_id.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Root {
    pub root_id: String,
    pub root: String,
    pub core_meaning_en: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Create or replace a lemma. Variant chains are rejected: a variant must
    /// point at an existing non-variant lemma.
    pub fn upsert_lemma(&self, lemma: &Lemma) -> Result<(), StoreError> {
        if let Some(canonical_id) = &lemma.canonical_lemma_id {
            let canonical = self.get_lemma(canonical_id)?.ok_or_else(|| {
                StoreError::Validation(format!(
                    "canonical lemma {canonical_id} does not exist"
                ))
            })?;
            if canonical.is_variant() {
                return Err(StoreError::Validation(format!(
                    "canonical lemma {canonical_id} is itself a variant"
                )));
            }
        }

        let key = keys::lemma_key(&lemma.lemma_id);
        self.lemmas.insert(key.as_bytes(), Self::serialize(lemma)?)?;
        Ok(())
    }

    pub fn get_lemma(&self, lemma_id: &str) -> Result<Option<Lemma>, StoreError> {
        let key = keys::lemma_key(lemma_id);
        match self.lemmas.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn require_lemma(&self, lemma_id: &str) -> Result<Lemma, StoreError> {
        self.get_lemma(lemma_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "lemma".to_string(),
            key: lemma_id.to_string(),
        })
    }

    /// Resolve a lemma to its canonical id (variants redirect, one hop).
    pub fn canonical_lemma_id(&self, lemma_id: &str) -> Result<String, StoreError> {
        let lemma = self.require_lemma(lemma_id)?;
        Ok(lemma
            .canonical_lemma_id
            .unwrap_or_else(|| lemma.lemma_id.clone()))
    }

    pub fn list_lemmas(&self) -> Result<Vec<Lemma>, StoreError> {
        let mut lemmas = Vec::new();
        for item in self.lemmas.iter() {
            let (_, v) = item?;
            lemmas.push(Self::deserialize::<Lemma>(&v)?);
        }
        Ok(lemmas)
    }

    pub fn get_lemmas_by_ids(
        &self,
        lemma_ids: &[String],
    ) -> Result<HashMap<String, Lemma>, StoreError> {
        let mut map = HashMap::with_capacity(lemma_ids.len());
        for lid in lemma_ids {
            if let Some(lemma) = self.get_lemma(lid)? {
                map.insert(lid.clone(), lemma);
            }
        }
        Ok(map)
    }

    pub fn upsert_root(&self, root: &Root) -> Result<(), StoreError> {
        let key = keys::root_key(&root.root_id);
        self.roots.insert(key.as_bytes(), Self::serialize(root)?)?;
        Ok(())
    }

    pub fn get_root(&self, root_id: &str) -> Result<Option<Root>, StoreError> {
        let key = keys::root_key(root_id);
        match self.roots.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// All non-variant lemmas sharing a root (the "root family").
    pub fn lemmas_for_root(&self, root_id: &str) -> Result<Vec<Lemma>, StoreError> {
        let mut siblings = Vec::new();
        for item in self.lemmas.iter() {
            let (_, v) = item?;
            let lemma: Lemma = Self::deserialize(&v)?;
            if lemma.root_id.as_deref() == Some(root_id) && !lemma.is_variant() {
                siblings.push(lemma);
            }
        }
        Ok(siblings)
    }
}
