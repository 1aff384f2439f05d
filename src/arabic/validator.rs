use serde::Serialize;

use crate::arabic::function_words::is_function_word;
use crate::arabic::lookup::{strip_clitics, LemmaIndex};
use crate::arabic::{normalize_alef, normalize_arabic, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCategory {
    TargetWord,
    FunctionWord,
    Known,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClassification {
    pub original: String,
    pub bare: String,
    pub category: TokenCategory,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub target_found: bool,
    pub unknown_words: Vec<String>,
    pub known_words: Vec<String>,
    pub function_words: Vec<String>,
    pub classifications: Vec<TokenClassification>,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TokenMapping {
    pub position: usize,
    pub surface_form: String,
    pub lemma_id: Option<String>,
    pub is_target: bool,
    pub is_function_word: bool,
}

/// The target's acceptable normalized forms: bare, with/without al-prefix.
fn target_forms(target_bare: &str) -> Vec<String> {
    let normalized = normalize_alef(target_bare);
    let mut forms = vec![normalized.clone()];
    if let Some(stripped) = normalized.strip_prefix("ال") {
        if normalized.chars().count() > 2 {
            forms.push(stripped.to_string());
        }
    } else {
        forms.push(format!("ال{normalized}"));
    }
    forms
}

fn matches_target(bare_norm: &str, forms: &[String]) -> bool {
    if forms.iter().any(|f| f == bare_norm) {
        return true;
    }
    strip_clitics(bare_norm)
        .iter()
        .any(|stem| forms.iter().any(|f| *f == normalize_alef(stem)))
}

/// Deterministic sentence validation: every token must be the target, a
/// function word, or known vocabulary. Order is fixed: target check first,
/// then function words (direct only), then known lookup with clitic
/// stripping.
pub fn validate_sentence(
    arabic_text: &str,
    target_bare: &str,
    known: &LemmaIndex,
) -> ValidationResult {
    let tokens = tokenize(arabic_text);
    if tokens.is_empty() {
        return ValidationResult {
            valid: false,
            target_found: false,
            unknown_words: Vec::new(),
            known_words: Vec::new(),
            function_words: Vec::new(),
            classifications: Vec::new(),
            issues: vec!["Empty sentence".to_string()],
        };
    }

    let forms = target_forms(target_bare);

    let mut classifications = Vec::with_capacity(tokens.len());
    let mut unknown_words = Vec::new();
    let mut known_words = Vec::new();
    let mut function_words = Vec::new();
    let mut target_found = false;

    for token in &tokens {
        let bare_norm = normalize_arabic(token);

        if matches_target(&bare_norm, &forms) {
            classifications.push(TokenClassification {
                original: token.clone(),
                bare: bare_norm,
                category: TokenCategory::TargetWord,
            });
            target_found = true;
            continue;
        }

        if is_function_word(token) {
            classifications.push(TokenClassification {
                original: token.clone(),
                bare: bare_norm,
                category: TokenCategory::FunctionWord,
            });
            function_words.push(token.clone());
            continue;
        }

        if known.lookup(&bare_norm).is_some() {
            classifications.push(TokenClassification {
                original: token.clone(),
                bare: bare_norm,
                category: TokenCategory::Known,
            });
            known_words.push(token.clone());
        } else {
            classifications.push(TokenClassification {
                original: token.clone(),
                bare: bare_norm,
                category: TokenCategory::Unknown,
            });
            unknown_words.push(token.clone());
        }
    }

    let mut issues = Vec::new();
    if !target_found {
        issues.push(format!("Target word '{target_bare}' not found in sentence"));
    }
    if !unknown_words.is_empty() {
        issues.push(format!(
            "Unknown words (besides target): {}",
            unknown_words.join("، ")
        ));
    }

    ValidationResult {
        valid: target_found && unknown_words.is_empty(),
        target_found,
        unknown_words,
        known_words,
        function_words,
        classifications,
        issues,
    }
}

/// Map tokens to lemma ids for persistence. Function words resolve via
/// direct lookup only; everything else gets the clitic-aware path. Target
/// tokens are forced onto `target_lemma_id`.
pub fn map_tokens_to_lemmas(
    tokens: &[String],
    index: &LemmaIndex,
    target_lemma_id: &str,
    target_bare: &str,
) -> Vec<TokenMapping> {
    let forms = target_forms(target_bare);

    tokens
        .iter()
        .enumerate()
        .map(|(position, token)| {
            let bare_norm = normalize_arabic(token);

            if matches_target(&bare_norm, &forms) {
                return TokenMapping {
                    position,
                    surface_form: token.clone(),
                    lemma_id: Some(target_lemma_id.to_string()),
                    is_target: true,
                    is_function_word: false,
                };
            }

            let is_function = is_function_word(token);
            let lemma_id = if is_function {
                index.lookup_direct(&bare_norm)
            } else {
                index.lookup(&bare_norm)
            };
            TokenMapping {
                position,
                surface_form: token.clone(),
                lemma_id: lemma_id.map(str::to_string),
                is_target: false,
                is_function_word: is_function,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use crate::store::operations::lemmas::Lemma;

    use super::*;

    fn lemma(id: &str, bare: &str) -> Lemma {
        Lemma {
            lemma_id: id.to_string(),
            surface: bare.to_string(),
            bare: bare.to_string(),
            gloss_en: "g".to_string(),
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
        }
    }

    #[test]
    fn valid_sentence_with_target_and_known_words() {
        let index = LemmaIndex::build(&[lemma("l1", "ولد"), lemma("l2", "قرا")]);
        let result = validate_sentence("الولد قرأ الكتاب", "كتاب", &index);
        assert!(result.valid);
        assert!(result.target_found);
        assert!(result.unknown_words.is_empty());
    }

    #[test]
    fn missing_target_invalidates() {
        let index = LemmaIndex::build(&[lemma("l1", "ولد")]);
        let result = validate_sentence("الولد هنا", "كتاب", &index);
        assert!(!result.valid);
        assert!(!result.target_found);
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn unknown_content_word_invalidates() {
        let index = LemmaIndex::build(&[lemma("l1", "ولد")]);
        let result = validate_sentence("الولد يشاهد الكتاب", "كتاب", &index);
        assert!(result.target_found);
        assert!(!result.valid);
        assert_eq!(result.unknown_words, vec!["يشاهد"]);
    }

    #[test]
    fn function_words_never_count_as_unknown() {
        let index = LemmaIndex::build(&[]);
        let result = validate_sentence("هذا هو الكتاب", "كتاب", &index);
        assert!(result.valid);
        assert_eq!(result.function_words.len(), 2);
    }

    #[test]
    fn target_matches_with_al_prefix_and_clitics() {
        let index = LemmaIndex::build(&[]);
        assert!(validate_sentence("الكتاب هنا", "كتاب", &index).target_found);
        assert!(validate_sentence("وكتابه هنا", "كتاب", &index).target_found);
    }

    #[test]
    fn diacritized_sentence_validates() {
        let index = LemmaIndex::build(&[lemma("l1", "ولد")]);
        let result = validate_sentence("الوَلَدُ يَقْرَأُ الكِتَابَ", "يقرا", &index);
        assert!(result.target_found);
    }

    #[test]
    fn mapping_marks_target_and_function_words() {
        let index = LemmaIndex::build(&[lemma("l1", "ولد"), lemma("l2", "كتاب")]);
        let tokens = tokenize("الولد في الكتاب");
        let mappings = map_tokens_to_lemmas(&tokens, &index, "l2", "كتاب");

        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings[0].lemma_id.as_deref(), Some("l1"));
        assert!(mappings[1].is_function_word);
        assert!(mappings[1].lemma_id.is_none());
        assert!(mappings[2].is_target);
        assert_eq!(mappings[2].lemma_id.as_deref(), Some("l2"));
    }

    #[test]
    fn mapping_leaves_unknown_tokens_unmapped() {
        let index = LemmaIndex::build(&[lemma("l2", "كتاب")]);
        let tokens = tokenize("الغامض الكتاب");
        let mappings = map_tokens_to_lemmas(&tokens, &index, "l2", "كتاب");
        assert!(mappings[0].lemma_id.is_none());
        assert!(!mappings[0].is_function_word);
    }
}
