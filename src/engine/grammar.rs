//! Grammar exposure tracking: per-feature comfort and confusion resurfacing.

use chrono::{DateTime, Utc};

use crate::constants::{CONFUSION_RATE_THRESHOLD, MIN_SEEN_FOR_CONFUSION};
use crate::engine::{Engine, EngineError};
use crate::store::operations::grammar::UserGrammarExposure;
use crate::store::operations::sentences::Comprehension;

/// Comfort with a grammar feature, in [0, 1]. Monotone non-decreasing in
/// correct answers, saturating with exposure, decaying once the feature has
/// not been seen for a week (half-life 30 days).
pub fn comfort(
    times_seen: u32,
    times_correct: u32,
    last_seen_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    if times_seen == 0 {
        return 0.0;
    }
    let accuracy = f64::from(times_correct) / f64::from(times_seen);
    let saturation = 1.0 - (-f64::from(times_seen) / 5.0).exp();

    let staleness = match last_seen_at {
        Some(last) => {
            let days_stale = (now - last).num_days().max(0) as f64;
            let past_grace = (days_stale - 7.0).max(0.0);
            0.5_f64.powf(past_grace / 30.0)
        }
        None => 1.0,
    };

    (accuracy * saturation * staleness).clamp(0.0, 1.0)
}

impl Engine {
    pub fn comfort_for(&self, feature_key: &str, now: DateTime<Utc>) -> Result<f64, EngineError> {
        Ok(match self.store().get_grammar_exposure(feature_key)? {
            Some(exp) => comfort(exp.times_seen, exp.times_correct, exp.last_seen_at, now),
            None => 0.0,
        })
    }

    /// Bump exposure counters for every feature on a reviewed sentence.
    pub fn record_sentence_grammar(
        &self,
        feature_keys: &[String],
        signal: Comprehension,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        for key in feature_keys {
            let mut exp = self
                .store()
                .get_grammar_exposure(key)?
                .unwrap_or_else(|| UserGrammarExposure::new(key));
            exp.times_seen += 1;
            if signal == Comprehension::Understood {
                exp.times_correct += 1;
            }
            if signal == Comprehension::GrammarConfused {
                exp.times_confused += 1;
            }
            if exp.first_seen_at.is_none() {
                exp.first_seen_at = Some(now);
            }
            exp.last_seen_at = Some(now);
            self.store().put_grammar_exposure(&exp)?;
        }
        Ok(())
    }

    /// Bump confusion for features the learner flagged explicitly but that
    /// are not tagged on the sentence itself.
    pub fn record_confused_features(
        &self,
        feature_keys: &[String],
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        for key in feature_keys {
            let mut exp = self
                .store()
                .get_grammar_exposure(key)?
                .unwrap_or_else(|| UserGrammarExposure::new(key));
            exp.times_confused += 1;
            exp.last_seen_at = Some(now);
            self.store().put_grammar_exposure(&exp)?;
        }
        Ok(())
    }

    /// Features with confusion rate ≥ 0.3 over at least 5 sightings. These
    /// get resurfaced as refresher lessons.
    pub fn confused_features(&self) -> Result<Vec<String>, EngineError> {
        let mut confused = Vec::new();
        for exp in self.store().list_grammar_exposures()? {
            if exp.times_seen >= MIN_SEEN_FOR_CONFUSION
                && exp.confusion_rate() >= CONFUSION_RATE_THRESHOLD
            {
                confused.push(exp.feature_key);
            }
        }
        confused.sort();
        Ok(confused)
    }

    /// Features present in the given keys that were never introduced. These
    /// need a just-in-time lesson before the session continues.
    pub fn unintroduced_features(
        &self,
        feature_keys: &[String],
    ) -> Result<Vec<String>, EngineError> {
        let mut unintroduced = Vec::new();
        for key in feature_keys {
            let introduced = self
                .store()
                .get_grammar_exposure(key)?
                .map(|e| e.introduced_at.is_some())
                .unwrap_or(false);
            if !introduced && !unintroduced.contains(key) {
                unintroduced.push(key.clone());
            }
        }
        unintroduced.sort();
        Ok(unintroduced)
    }

    pub fn introduce_feature(
        &self,
        feature_key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut exp = self
            .store()
            .get_grammar_exposure(feature_key)?
            .unwrap_or_else(|| UserGrammarExposure::new(feature_key));
        exp.introduced_at = Some(now);
        self.store().put_grammar_exposure(&exp)?;
        Ok(())
    }
}
