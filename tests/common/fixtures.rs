use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use arabic_learning_backend::store::operations::knowledge::{
    FsrsCard, KnowledgeState, UserLemmaKnowledge,
};
use arabic_learning_backend::store::operations::lemmas::Lemma;
use arabic_learning_backend::store::operations::sentences::{Sentence, SentenceWord};
use arabic_learning_backend::store::Store;

#[allow(dead_code)]
pub fn seed_lemma(store: &Store, id: &str, surface: &str, gloss: &str) {
    store
        .upsert_lemma(&Lemma {
            lemma_id: id.to_string(),
            surface: surface.to_string(),
            bare: arabic_learning_backend::arabic::normalize_arabic(surface),
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
        .expect("seed lemma");
}

/// A word in an SRS state with a card due `due_offset_hours` from now
/// (negative = already due).
#[allow(dead_code)]
pub fn seed_srs_word(
    store: &Store,
    lemma_id: &str,
    state: KnowledgeState,
    stability: f32,
    due_offset_hours: i64,
) {
    let now = Utc::now();
    let mut ulk = UserLemmaKnowledge::new_encountered(lemma_id, "study", now);
    ulk.state = state;
    ulk.fsrs_card = Some(FsrsCard {
        stability,
        difficulty: 5.0,
        due: now + Duration::hours(due_offset_hours),
        last_review: Some(now - Duration::days(3)),
        reps: 4,
    });
    ulk.times_seen = 5;
    ulk.times_correct = 3;
    store.put_knowledge(&ulk).expect("seed srs word");
}

#[allow(dead_code)]
pub fn seed_struggling_word(store: &Store, lemma_id: &str) {
    let now = Utc::now();
    let mut ulk = UserLemmaKnowledge::new_encountered(lemma_id, "study", now);
    ulk.state = KnowledgeState::Learning;
    ulk.fsrs_card = Some(FsrsCard {
        stability: 0.3,
        difficulty: 8.0,
        due: now - Duration::hours(2),
        last_review: Some(now - Duration::days(1)),
        reps: 4,
    });
    ulk.times_seen = 4;
    ulk.times_correct = 0;
    store.put_knowledge(&ulk).expect("seed struggling word");
}

#[allow(dead_code)]
pub fn seed_sentence(
    store: &Store,
    sentence_id: &str,
    arabic: &str,
    target: &str,
    word_lemmas: &[(&str, Option<&str>)],
) {
    let words: Vec<SentenceWord> = word_lemmas
        .iter()
        .enumerate()
        .map(|(pos, (surface, lemma))| SentenceWord {
            sentence_id: sentence_id.to_string(),
            position: pos,
            surface_form: surface.to_string(),
            lemma_id: lemma.map(str::to_string),
            is_target: lemma.map(|l| l == target).unwrap_or(false),
            is_function_word: lemma.is_none(),
        })
        .collect();

    store
        .create_sentence_with_words(
            &Sentence {
                sentence_id: sentence_id.to_string(),
                arabic_text: arabic.to_string(),
                arabic_diacritized: arabic.to_string(),
                english_translation: format!("translation of {sentence_id}"),
                transliteration: None,
                target_lemma_id: Some(target.to_string()),
                is_active: true,
                times_shown: 0,
                last_reading_shown_at: None,
                last_reading_comprehension: None,
                last_listening_shown_at: None,
                last_listening_comprehension: None,
                grammar_features: Vec::new(),
                source: "manual".to_string(),
                created_at: Utc::now(),
            },
            &words,
        )
        .expect("seed sentence");
}

#[allow(dead_code)]
pub fn card_of(store: &Store, lemma_id: &str) -> Option<FsrsCard> {
    store
        .get_knowledge(lemma_id)
        .expect("get knowledge")
        .and_then(|k| k.fsrs_card)
}

#[allow(dead_code)]
pub fn due_instant(store: &Store, lemma_id: &str) -> Option<DateTime<Utc>> {
    store
        .get_knowledge(lemma_id)
        .expect("get knowledge")
        .and_then(|k| k.due_at())
}
