use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeState {
    Encountered,
    Acquiring,
    Learning,
    Known,
    Lapsed,
    Suspended,
}

impl KnowledgeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Encountered => "encountered",
            Self::Acquiring => "acquiring",
            Self::Learning => "learning",
            Self::Known => "known",
            Self::Lapsed => "lapsed",
            Self::Suspended => "suspended",
        }
    }

    /// States scheduled by the SRS (carry an FSRS card).
    pub fn is_srs(self) -> bool {
        matches!(self, Self::Learning | Self::Known | Self::Lapsed)
    }

    /// States that count as active vocabulary for sentence generation.
    pub fn is_active_vocabulary(self) -> bool {
        matches!(
            self,
            Self::Acquiring | Self::Learning | Self::Known | Self::Lapsed
        )
    }
}

/// Serialized SRS card. Kept small and stable: this is what `fsrs_log`
/// snapshots and the undo path restore byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FsrsCard {
    pub stability: f32,
    pub difficulty: f32,
    pub due: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reps: u32,
}

/// Per-lemma learner state. One row per non-variant lemma that is in play.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLemmaKnowledge {
    pub lemma_id: String,
    pub state: KnowledgeState,
    pub acquisition_box: Option<u8>,
    pub acquisition_next_due: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de_card_column")]
    pub fsrs_card: Option<FsrsCard>,
    pub times_seen: u32,
    pub times_correct: u32,
    pub total_encounters: u32,
    pub last_reviewed: Option<DateTime<Utc>>,
    pub introduced_at: Option<DateTime<Utc>>,
    pub entered_acquiring_at: Option<DateTime<Utc>>,
    pub graduated_at: Option<DateTime<Utc>>,
    pub source: String,
}

/// 兼容历史数据：fsrs_card 列可能是对象，也可能是整段 JSON 字符串。
/// 读取时统一归一化，两种形态都接受。
fn de_card_column<'de, D>(deserializer: D) -> Result<Option<FsrsCard>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(raw)) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(other) => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl UserLemmaKnowledge {
    pub fn new_encountered(lemma_id: &str, source: &str, now: DateTime<Utc>) -> Self {
        Self {
            lemma_id: lemma_id.to_string(),
            state: KnowledgeState::Encountered,
            acquisition_box: None,
            acquisition_next_due: None,
            fsrs_card: None,
            times_seen: 0,
            times_correct: 0,
            total_encounters: 1,
            last_reviewed: None,
            introduced_at: Some(now),
            entered_acquiring_at: None,
            graduated_at: None,
            source: source.to_string(),
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.times_seen == 0 {
            return 0.0;
        }
        f64::from(self.times_correct) / f64::from(self.times_seen)
    }

    pub fn stability(&self) -> f32 {
        self.fsrs_card.as_ref().map(|c| c.stability).unwrap_or(0.0)
    }

    /// The instant this row becomes due, regardless of phase.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            KnowledgeState::Acquiring => self.acquisition_next_due,
            s if s.is_srs() => self.fsrs_card.as_ref().map(|c| c.due),
            _ => None,
        }
    }

    /// Enforced at write time, never silently coerced:
    /// acquiring ⇔ box ∈ {1,2,3} ∧ no card; SRS states ⇔ card ∧ no box;
    /// encountered ⇒ neither.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        let violation = |detail: &str| StoreError::InvariantViolation {
            lemma_id: self.lemma_id.clone(),
            detail: detail.to_string(),
        };

        match self.state {
            KnowledgeState::Acquiring => {
                if !matches!(self.acquisition_box, Some(1..=3)) {
                    return Err(violation("acquiring without box in 1..=3"));
                }
                if self.fsrs_card.is_some() {
                    return Err(violation("acquiring with non-null fsrs card"));
                }
            }
            KnowledgeState::Learning | KnowledgeState::Known | KnowledgeState::Lapsed => {
                if self.fsrs_card.is_none() {
                    return Err(violation("srs state without fsrs card"));
                }
                if self.acquisition_box.is_some() {
                    return Err(violation("srs state with acquisition box"));
                }
            }
            KnowledgeState::Encountered => {
                if self.fsrs_card.is_some() || self.acquisition_box.is_some() {
                    return Err(violation("encountered with card or box"));
                }
            }
            KnowledgeState::Suspended => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeStats {
    pub encountered: u64,
    pub acquiring: u64,
    pub learning: u64,
    pub known: u64,
    pub lapsed: u64,
    pub suspended: u64,
}

impl Store {
    pub fn get_knowledge(
        &self,
        lemma_id: &str,
    ) -> Result<Option<UserLemmaKnowledge>, StoreError> {
        let key = keys::knowledge_key(lemma_id);
        match self.knowledge.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_knowledge(&self, ulk: &UserLemmaKnowledge) -> Result<(), StoreError> {
        ulk.check_invariants()?;
        let key = keys::knowledge_key(&ulk.lemma_id);
        self.knowledge.insert(key.as_bytes(), Self::serialize(ulk)?)?;
        Ok(())
    }

    pub fn list_knowledge(&self) -> Result<Vec<UserLemmaKnowledge>, StoreError> {
        let mut rows = Vec::new();
        for item in self.knowledge.iter() {
            let (_, v) = item?;
            rows.push(Self::deserialize::<UserLemmaKnowledge>(&v)?);
        }
        Ok(rows)
    }

    /// Every non-suspended row whose due instant is ≤ now. An acquiring row
    /// with a null due is treated as due.
    pub fn enumerate_due(&self, now: DateTime<Utc>) -> Result<Vec<UserLemmaKnowledge>, StoreError> {
        let mut due = Vec::new();
        for row in self.list_knowledge()? {
            if row.state == KnowledgeState::Suspended {
                continue;
            }
            match row.state {
                KnowledgeState::Acquiring => match row.acquisition_next_due {
                    Some(d) if d <= now => due.push(row),
                    None => due.push(row),
                    _ => {}
                },
                s if s.is_srs() => {
                    if let Some(card) = &row.fsrs_card {
                        if card.due <= now {
                            due.push(row);
                        }
                    }
                }
                _ => {}
            }
        }
        due.sort_by_key(|r| r.due_at());
        Ok(due)
    }

    pub fn knowledge_stats(&self) -> Result<KnowledgeStats, StoreError> {
        let mut stats = KnowledgeStats::default();
        for row in self.list_knowledge()? {
            match row.state {
                KnowledgeState::Encountered => stats.encountered += 1,
                KnowledgeState::Acquiring => stats.acquiring += 1,
                KnowledgeState::Learning => stats.learning += 1,
                KnowledgeState::Known => stats.known += 1,
                KnowledgeState::Lapsed => stats.lapsed += 1,
                KnowledgeState::Suspended => stats.suspended += 1,
            }
        }
        Ok(stats)
    }
}
