pub mod function_words;
pub mod lookup;
pub mod validator;

/// Arabic diacritics (tashkeel) plus Quranic annotation marks.
fn is_diacritic(c: char) -> bool {
    matches!(c,
        '\u{0610}'..='\u{061A}'
        | '\u{064B}'..='\u{065F}'
        | '\u{0670}'
        | '\u{06D6}'..='\u{06DC}'
        | '\u{06DF}'..='\u{06E4}'
        | '\u{06E7}'
        | '\u{06E8}'
        | '\u{06EA}'..='\u{06ED}'
    )
}

fn is_arabic_punctuation(c: char) -> bool {
    matches!(
        c,
        '،' | '؟' | '؛' | '«' | '»' | '.' | ',' | ':' | ';' | '!' | '?' | '"' | '\'' | '-'
            | '(' | ')' | '[' | ']' | '{' | '}' | '…'
    )
}

pub fn strip_diacritics(text: &str) -> String {
    text.chars().filter(|c| !is_diacritic(*c)).collect()
}

/// Remove tatweel (kashida).
pub fn strip_tatweel(text: &str) -> String {
    text.replace('\u{0640}', "")
}

/// Normalize alef variants (أ إ آ ٱ) to bare alef.
pub fn normalize_alef(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'أ' | 'إ' | 'آ' | 'ٱ' => 'ا',
            other => other,
        })
        .collect()
}

/// Full normalization: strip diacritics and tatweel, normalize alef.
/// `Lemma.bare` is exactly this applied to `Lemma.surface`.
pub fn normalize_arabic(text: &str) -> String {
    normalize_alef(&strip_tatweel(&strip_diacritics(text)))
}

/// Tokenize Arabic text into words: punctuation becomes whitespace, then
/// whitespace split. Non-empty tokens only.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .map(|c| if is_arabic_punctuation(c) { ' ' } else { c })
        .collect();
    cleaned
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Strip boundary punctuation from a single word for import hygiene.
/// Slash alternatives take the first part, multi-word phrases the first word.
/// Returns None when nothing usable remains or the bare form is a single
/// character (abbreviations, not vocabulary).
pub fn sanitize_arabic_word(text: &str) -> Option<String> {
    let mut cleaned = text
        .trim_matches(|c: char| is_arabic_punctuation(c) || c == '/' || c.is_whitespace())
        .to_string();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(first) = cleaned
        .split('/')
        .map(str::trim)
        .find(|p| !p.is_empty())
        .map(str::to_string)
    {
        cleaned = first;
    }
    if let Some(first) = cleaned.split_whitespace().next().map(str::to_string) {
        cleaned = first;
    }
    cleaned = cleaned
        .trim_matches(|c: char| is_arabic_punctuation(c) || c.is_whitespace())
        .to_string();

    if cleaned.is_empty() || normalize_arabic(&cleaned).chars().count() < 2 {
        return None;
    }
    Some(cleaned)
}
