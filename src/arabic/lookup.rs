use std::collections::HashMap;

use crate::arabic::function_words::{is_function_word, FUNCTION_WORD_FORMS};
use crate::arabic::{normalize_alef, normalize_arabic};
use crate::store::operations::lemmas::Lemma;

/// Proclitics tried during bounded clitic stripping, longest first.
const PROCLITICS: &[&str] = &[
    "وال", "بال", "فال", "لل", "كال", "و", "ف", "ب", "ل", "ك",
];

/// Enclitics (possessive / object pronouns), longest first.
const ENCLITICS: &[&str] = &[
    "هما", "هم", "هن", "ها", "كم", "كن", "نا", "ني", "ه", "ك",
];

/// Normalized bare form → canonical lemma_id. Derived state: rebuilt from
/// the lemmas table per request; it must always reflect the committed rows
/// when a reviewer tokenizes a sentence.
#[derive(Debug, Default)]
pub struct LemmaIndex {
    by_bare: HashMap<String, String>,
}

impl LemmaIndex {
    /// Build the index from lemma rows. Each lemma contributes its bare form
    /// with and without the al-prefix, plus every inflected value in
    /// `forms`. Variants route to their canonical lemma_id, so a variant is
    /// invisible at lookup time. First writer wins on collisions: canonical
    /// bare forms are indexed before inflected forms.
    pub fn build(lemmas: &[Lemma]) -> Self {
        let mut by_bare: HashMap<String, String> = HashMap::new();
        let mut bare_to_id: HashMap<String, String> = HashMap::new();

        let canonical_id = |lemma: &Lemma| -> String {
            lemma
                .canonical_lemma_id
                .clone()
                .unwrap_or_else(|| lemma.lemma_id.clone())
        };

        for lemma in lemmas {
            let target = canonical_id(lemma);
            let bare_norm = normalize_alef(&lemma.bare);
            by_bare.entry(bare_norm.clone()).or_insert_with(|| target.clone());
            bare_to_id
                .entry(bare_norm.clone())
                .or_insert_with(|| target.clone());

            if let Some(stripped) = bare_norm.strip_prefix("ال") {
                if stripped.chars().count() >= 1 && bare_norm.chars().count() > 2 {
                    by_bare
                        .entry(stripped.to_string())
                        .or_insert_with(|| target.clone());
                    bare_to_id
                        .entry(stripped.to_string())
                        .or_insert_with(|| target.clone());
                }
            } else {
                by_bare
                    .entry(format!("ال{bare_norm}"))
                    .or_insert_with(|| target.clone());
            }
        }

        for lemma in lemmas {
            let target = canonical_id(lemma);
            for form in lemma.forms.values() {
                let form_bare = normalize_arabic(form);
                if form_bare.is_empty() {
                    continue;
                }
                by_bare
                    .entry(form_bare.clone())
                    .or_insert_with(|| target.clone());
                if !form_bare.starts_with("ال") {
                    by_bare
                        .entry(format!("ال{form_bare}"))
                        .or_insert_with(|| target.clone());
                }
            }
        }

        // Conjugated function word forms route to the base word's lemma when
        // the base itself is in the vocabulary.
        for (form, base) in FUNCTION_WORD_FORMS.iter() {
            let form_norm = normalize_alef(form);
            if by_bare.contains_key(&form_norm) {
                continue;
            }
            let base_norm = normalize_alef(base);
            if let Some(base_id) = bare_to_id.get(&base_norm) {
                by_bare.insert(form_norm, base_id.clone());
            }
        }

        Self { by_bare }
    }

    pub fn len(&self) -> usize {
        self.by_bare.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_bare.is_empty()
    }

    pub fn known_bare_forms(&self) -> impl Iterator<Item = &str> {
        self.by_bare.keys().map(String::as_str)
    }

    /// Direct match with al-prefix variants only, no clitic stripping.
    /// Used for function words to avoid false analysis (e.g. splitting a
    /// conjugated verb as pronoun).
    pub fn lookup_direct(&self, bare_norm: &str) -> Option<&str> {
        if let Some(id) = self.by_bare.get(bare_norm) {
            return Some(id);
        }
        if let Some(stripped) = bare_norm.strip_prefix("ال") {
            if bare_norm.chars().count() > 2 {
                if let Some(id) = self.by_bare.get(stripped) {
                    return Some(id);
                }
            }
        } else if let Some(id) = self.by_bare.get(&format!("ال{bare_norm}")) {
            return Some(id);
        }
        None
    }

    /// Full lookup: direct match first, then bounded clitic stripping.
    /// The first matching stem wins.
    pub fn lookup(&self, bare_norm: &str) -> Option<&str> {
        if let Some(id) = self.lookup_direct(bare_norm) {
            return Some(id);
        }
        for stem in strip_clitics(bare_norm) {
            let stem_norm = normalize_alef(&stem);
            if let Some(id) = self.by_bare.get(&stem_norm) {
                return Some(id);
            }
        }
        None
    }

    /// Resolve a raw surface form (possibly diacritized). Function words are
    /// looked up directly only; clitic stripping is disabled for them.
    pub fn resolve_surface(&self, surface_form: &str) -> Option<&str> {
        let bare_norm = normalize_arabic(surface_form);
        if is_function_word(surface_form) {
            self.lookup_direct(&bare_norm)
        } else {
            self.lookup(&bare_norm)
        }
    }
}

/// All candidate stems after removing proclitics/enclitics, in match-priority
/// order. Handles ta-marbuta restoration (final ت → ة after suffix removal)
/// and al-prefix variants on each stem.
pub fn strip_clitics(bare_form: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();

    let push_with_al_variants = |stem: &str, out: &mut Vec<String>| {
        if stem.chars().count() < 2 {
            return;
        }
        if !out.contains(&stem.to_string()) {
            out.push(stem.to_string());
        }
        if let Some(stripped) = stem.strip_prefix("ال") {
            if stem.chars().count() > 2 && !out.contains(&stripped.to_string()) {
                out.push(stripped.to_string());
            }
        } else {
            let with_al = format!("ال{stem}");
            if !out.contains(&with_al) {
                out.push(with_al);
            }
        }
    };

    let strip_suffixes = |stem: &str| -> Vec<String> {
        let mut results = vec![stem.to_string()];
        for suf in ENCLITICS {
            if let Some(base) = stem.strip_suffix(suf) {
                if base.is_empty() {
                    continue;
                }
                results.push(base.to_string());
                // ta-marbuta restoration: مدرسته → مدرست + ه → مدرسة
                if let Some(trunk) = base.strip_suffix('ت') {
                    results.push(format!("{trunk}ة"));
                }
            }
        }
        results
    };

    // 1. Suffix-only stripping
    for stem in strip_suffixes(bare_form) {
        push_with_al_variants(&stem, &mut candidates);
    }

    // 2. Prefix stripping, then optional suffix stripping
    for pre in PROCLITICS {
        if let Some(after_pre) = bare_form.strip_prefix(pre) {
            if after_pre.is_empty() {
                continue;
            }
            for stem in strip_suffixes(after_pre) {
                push_with_al_variants(&stem, &mut candidates);
            }
        }
    }

    candidates.retain(|c| c != bare_form);
    candidates
}
