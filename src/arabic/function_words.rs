use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::arabic::{normalize_alef, strip_diacritics};

/// Common Arabic function words (particles, pronouns, demonstratives,
/// prepositions, conjunctions, negation, question words, auxiliary verbs).
/// Stored as bare (undiacritized) forms; the selector treats these as free
/// scaffolding and the validator never requires a lemma mapping for them.
pub static FUNCTION_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Prepositions
        "في", "من", "على", "الى", "إلى", "عن", "مع", "بين", "حتى",
        "منذ", "خلال", "عند", "نحو", "فوق", "تحت", "امام", "أمام",
        "وراء", "بعد", "قبل", "حول", "دون",
        // Single-letter prepositions/conjunctions
        "ب", "ل", "ك", "و", "ف",
        // Conjunctions
        "او", "أو", "ان", "أن", "إن", "لكن", "ثم", "بل",
        // Definite article (standalone, rare but possible after tokenization)
        "ال",
        // Pronouns
        "انا", "أنا", "انت", "أنت", "انتم", "أنتم", "هو", "هي",
        "هم", "هن", "نحن", "انتما", "هما",
        // Demonstratives
        "هذا", "هذه", "ذلك", "تلك", "هؤلاء", "اولئك", "أولئك",
        // Relative pronouns
        "الذي", "التي", "الذين", "اللذان", "اللتان", "اللواتي",
        // Question words
        "ما", "ماذا", "لماذا", "كيف", "اين", "أين", "متى",
        "هل", "كم", "اي", "أي",
        // Negation
        "لا", "لم", "لن", "ليس", "ليست",
        // Auxiliary / modal
        "كان", "كانت", "يكون", "تكون", "قد", "سوف", "سـ",
        // Very common adverbs/particles
        "ايضا", "أيضا", "جدا", "فقط", "كل", "بعض", "كلما",
        "هنا", "هناك", "الان", "الآن", "لذلك", "هكذا", "معا",
        // Conditional/temporal conjunctions
        "اذا", "إذا", "لو", "عندما", "بينما", "حيث", "كما",
        "لان", "لأن", "كي", "لكي", "حين", "حينما",
        // Emphasis / structure particles
        "لقد", "اما", "أما", "الا", "إلا", "اذن", "إذن",
        "انه", "إنه", "انها", "إنها", "مثل", "غير",
        // Common verbs that are essentially grammatical
        "يوجد", "توجد",
    ]
    .into_iter()
    .collect()
});

static FUNCTION_WORDS_NORMALIZED: Lazy<HashSet<String>> =
    Lazy::new(|| FUNCTION_WORDS.iter().map(|w| normalize_alef(w)).collect());

/// Conjugated function word forms → base bare form. Provides a direct match
/// path BEFORE clitic stripping so e.g. كانت is never analyzed as ك+انت.
pub static FUNCTION_WORD_FORMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        // كان conjugations
        ("كانت", "كان"),
        ("كانوا", "كان"),
        ("كنت", "كان"),
        ("كنا", "كان"),
        ("يكون", "كان"),
        ("تكون", "كان"),
        ("يكونون", "كان"),
        ("نكون", "كان"),
        ("اكون", "كان"),
        ("كانا", "كان"),
        ("كنتم", "كان"),
        ("يكن", "كان"),
        // ليس conjugations
        ("ليست", "ليس"),
        ("ليسوا", "ليس"),
        ("لست", "ليس"),
        ("لسنا", "ليس"),
        ("ليسا", "ليس"),
        // يوجد/توجد
        ("توجد", "يوجد"),
        ("وجد", "يوجد"),
    ]
    .into_iter()
    .collect()
});

/// Minimal glosses so function words stay tappable in review even without a
/// lemma entry.
pub static FUNCTION_WORD_GLOSSES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("في", "in"),
        ("من", "from"),
        ("على", "on/upon"),
        ("الى", "to"),
        ("إلى", "to"),
        ("عن", "about/from"),
        ("مع", "with"),
        ("بين", "between"),
        ("حتى", "until/even"),
        ("عند", "at/with"),
        ("بعد", "after"),
        ("قبل", "before"),
        ("و", "and"),
        ("ف", "so/then"),
        ("ب", "with/by"),
        ("ل", "for/to"),
        ("ك", "like/as"),
        ("او", "or"),
        ("أو", "or"),
        ("ان", "that"),
        ("أن", "that"),
        ("إن", "indeed"),
        ("لكن", "but"),
        ("ثم", "then"),
        ("هو", "he"),
        ("هي", "she"),
        ("هم", "they (m)"),
        ("نحن", "we"),
        ("انا", "I"),
        ("أنا", "I"),
        ("انت", "you (m)"),
        ("أنت", "you (m)"),
        ("هذا", "this (m)"),
        ("هذه", "this (f)"),
        ("ذلك", "that (m)"),
        ("تلك", "that (f)"),
        ("الذي", "who/which (m)"),
        ("التي", "who/which (f)"),
        ("ما", "what"),
        ("ماذا", "what"),
        ("لماذا", "why"),
        ("كيف", "how"),
        ("اين", "where"),
        ("أين", "where"),
        ("متى", "when"),
        ("هل", "? (yes/no)"),
        ("كم", "how many"),
        ("لا", "no/not"),
        ("لم", "did not"),
        ("لن", "will not"),
        ("ليس", "is not"),
        ("ليست", "is not (f)"),
        ("كان", "was/were"),
        ("كانت", "was (f)"),
        ("قد", "may/already"),
        ("سوف", "will"),
        ("فقط", "only"),
        ("كل", "every/all"),
        ("بعض", "some"),
        ("هنا", "here"),
        ("هناك", "there"),
        ("الان", "now"),
        ("الآن", "now"),
        ("اذا", "if"),
        ("إذا", "if"),
        ("عندما", "when"),
        ("بينما", "while"),
        ("حيث", "where"),
        ("كما", "as/like"),
        ("لان", "because"),
        ("لأن", "because"),
        ("مثل", "like"),
        ("غير", "other than"),
        ("يوجد", "there is"),
        ("توجد", "there is (f)"),
    ]
    .into_iter()
    .collect()
});

/// Check whether a (possibly diacritized) form is a function word. Strips
/// diacritics first, then consults the bare set and the conjugated-form
/// table.
pub fn is_function_word(form: &str) -> bool {
    let normalized = normalize_alef(&strip_diacritics(form));
    FUNCTION_WORDS_NORMALIZED.contains(&normalized)
        || FUNCTION_WORD_FORMS.contains_key(normalized.as_str())
}

pub fn function_word_gloss(bare: &str) -> Option<&'static str> {
    FUNCTION_WORD_GLOSSES.get(bare).copied()
}
