//! Property tests for the learning state machine invariants.

use std::sync::Arc;

use chrono::{Duration, Utc};
use proptest::prelude::*;

use arabic_learning_backend::arabic::lookup::{strip_clitics, LemmaIndex};
use arabic_learning_backend::config::EngineConfig;
use arabic_learning_backend::engine::acquisition::AcquisitionReviewInput;
use arabic_learning_backend::engine::Engine;
use arabic_learning_backend::store::operations::knowledge::KnowledgeState;
use arabic_learning_backend::store::operations::lemmas::Lemma;
use arabic_learning_backend::store::operations::sentences::ReviewMode;
use arabic_learning_backend::store::Store;

fn engine_with_word() -> (tempfile::TempDir, Arc<Store>, Engine) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(tmp.path().join("prop.sled").to_str().unwrap()).unwrap());
    store
        .upsert_lemma(&Lemma {
            lemma_id: "w".to_string(),
            surface: "كتاب".to_string(),
            bare: "كتاب".to_string(),
            gloss_en: "book".to_string(),
            pos: Some("noun".to_string()),
            root_id: None,
            frequency_rank: None,
            forms: Default::default(),
            canonical_lemma_id: None,
            grammar_features: Vec::new(),
            example_ar: None,
            example_en: None,
            transliteration: None,
            created_at: Utc::now(),
        })
        .unwrap();
    let engine = Engine::new(EngineConfig::default(), store.clone());
    (tmp, store, engine)
}

proptest! {
    /// After any sequence of acquisition ratings, the ULK row satisfies the
    /// phase invariant: acquiring ⇔ box ∈ 1..=3 ∧ no card; graduated ⇒ card
    /// present and box cleared.
    #[test]
    fn pt_acquisition_phase_invariant_holds(ratings in prop::collection::vec(1u8..=4, 1..15)) {
        let (_tmp, store, engine) = engine_with_word();
        let mut now = Utc::now();
        engine.start_acquisition("w", "study", true, now).unwrap();

        for rating in ratings {
            now += Duration::hours(30);
            let _ = engine
                .submit_acquisition_review(
                    &AcquisitionReviewInput {
                        lemma_id: "w",
                        rating,
                        response_ms: None,
                        session_id: None,
                        review_mode: ReviewMode::Reading,
                        comprehension_signal: None,
                        client_review_id: None,
                    },
                    now,
                )
                .unwrap();

            let ulk = store.get_knowledge("w").unwrap().unwrap();
            match ulk.state {
                KnowledgeState::Acquiring => {
                    prop_assert!(matches!(ulk.acquisition_box, Some(1..=3)));
                    prop_assert!(ulk.fsrs_card.is_none());
                }
                // Post-graduation reviews keep flowing through the SRS arm
                KnowledgeState::Learning | KnowledgeState::Known | KnowledgeState::Lapsed => {
                    prop_assert!(ulk.fsrs_card.is_some());
                    prop_assert!(ulk.acquisition_box.is_none());
                    prop_assert!(ulk.acquisition_next_due.is_none());
                }
                other => prop_assert!(false, "unexpected state {:?}", other),
            }
        }
    }

    /// Again always lands in box 1, whatever the prior box.
    #[test]
    fn pt_again_resets_to_box_1(good_reviews in 0usize..4) {
        let (_tmp, store, engine) = engine_with_word();
        let mut now = Utc::now();
        engine.start_acquisition("w", "study", true, now).unwrap();

        for _ in 0..good_reviews {
            now += Duration::days(2);
            engine
                .submit_acquisition_review(
                    &AcquisitionReviewInput {
                        lemma_id: "w",
                        rating: 3,
                        response_ms: None,
                        session_id: None,
                        review_mode: ReviewMode::Reading,
                        comprehension_signal: None,
                        client_review_id: None,
                    },
                    now,
                )
                .unwrap();
        }

        now += Duration::days(2);
        let outcome = engine
            .submit_acquisition_review(
                &AcquisitionReviewInput {
                    lemma_id: "w",
                    rating: 1,
                    response_ms: None,
                    session_id: None,
                    review_mode: ReviewMode::Reading,
                    comprehension_signal: None,
                    client_review_id: None,
                },
                now,
            )
            .unwrap();

        if outcome.new_state == KnowledgeState::Acquiring {
            prop_assert_eq!(outcome.acquisition_box, Some(1));
            let ulk = store.get_knowledge("w").unwrap().unwrap();
            prop_assert_eq!(ulk.acquisition_box, Some(1));
        }
    }

    /// Replaying the same client review id any number of times mutates the
    /// row exactly once.
    #[test]
    fn pt_replay_is_idempotent(replays in 1usize..6) {
        let (_tmp, store, engine) = engine_with_word();
        let now = Utc::now();
        engine.start_acquisition("w", "study", true, now).unwrap();

        for i in 0..replays {
            let outcome = engine
                .submit_acquisition_review(
                    &AcquisitionReviewInput {
                        lemma_id: "w",
                        rating: 3,
                        response_ms: None,
                        session_id: None,
                        review_mode: ReviewMode::Reading,
                        comprehension_signal: None,
                        client_review_id: Some("fixed-id"),
                    },
                    now,
                )
                .unwrap();
            prop_assert_eq!(outcome.duplicate, i > 0);
        }

        let ulk = store.get_knowledge("w").unwrap().unwrap();
        prop_assert_eq!(ulk.times_seen, 1);
    }

    /// Clitic stripping never yields the input itself and only yields stems
    /// of at least two characters.
    #[test]
    fn pt_strip_clitics_output_is_sane(word in "[\\u0621-\\u064A]{2,8}") {
        let stems = strip_clitics(&word);
        for stem in &stems {
            prop_assert!(stem != &word);
            prop_assert!(stem.chars().count() >= 2);
        }
    }
}

/// Greedy cover property: the union of covered due words never shrinks as
/// the session grows, and every selected sentence adds marginal coverage.
#[test]
fn greedy_cover_coverage_is_monotone() {
    use arabic_learning_backend::store::operations::knowledge::{FsrsCard, UserLemmaKnowledge};
    use arabic_learning_backend::store::operations::sentences::{Sentence, SentenceWord};

    let tmp = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(tmp.path().join("greedy.sled").to_str().unwrap()).unwrap());
    let engine = Engine::new(EngineConfig::default(), store.clone());
    let now = Utc::now();

    // Five due words, sentences with overlapping coverage.
    for i in 0..5 {
        let lid = format!("l{i}");
        store
            .upsert_lemma(&Lemma {
                lemma_id: lid.clone(),
                surface: format!("كلمة{i}"),
                bare: format!("كلمة{i}"),
                gloss_en: format!("word {i}"),
                pos: Some("noun".to_string()),
                root_id: None,
                frequency_rank: None,
                forms: Default::default(),
                canonical_lemma_id: None,
                grammar_features: Vec::new(),
                example_ar: None,
                example_en: None,
                transliteration: None,
                created_at: now,
            })
            .unwrap();
        let mut ulk = UserLemmaKnowledge::new_encountered(&lid, "study", now);
        ulk.state = KnowledgeState::Learning;
        ulk.fsrs_card = Some(FsrsCard {
            stability: 2.0 + i as f32,
            difficulty: 5.0,
            due: now - Duration::hours(1),
            last_review: Some(now - Duration::days(2)),
            reps: 3,
        });
        ulk.times_seen = 4;
        ulk.times_correct = 3;
        store.put_knowledge(&ulk).unwrap();
    }

    let coverage: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3, 4], &[4]];
    for (si, lemmas) in coverage.iter().enumerate() {
        let sid = format!("s{si}");
        let words: Vec<SentenceWord> = lemmas
            .iter()
            .enumerate()
            .map(|(pos, li)| SentenceWord {
                sentence_id: sid.clone(),
                position: pos,
                surface_form: format!("كلمة{li}"),
                lemma_id: Some(format!("l{li}")),
                is_target: pos == 0,
                is_function_word: false,
            })
            .collect();
        store
            .create_sentence_with_words(
                &Sentence {
                    sentence_id: sid.clone(),
                    arabic_text: "جملة".to_string(),
                    arabic_diacritized: "جملة".to_string(),
                    english_translation: "sentence".to_string(),
                    transliteration: None,
                    target_lemma_id: Some(format!("l{}", lemmas[0])),
                    is_active: true,
                    times_shown: 0,
                    last_reading_shown_at: None,
                    last_reading_comprehension: None,
                    last_listening_shown_at: None,
                    last_listening_comprehension: None,
                    grammar_features: Vec::new(),
                    source: "manual".to_string(),
                    created_at: now,
                },
                &words,
            )
            .unwrap();
    }

    let session = engine
        .build_session(10, ReviewMode::Reading, false, now)
        .unwrap();

    // All five due words are covered by sentences (no word-only fallbacks).
    assert_eq!(session.total_due_words, 5);
    assert_eq!(session.covered_due_words, 5);
    assert!(session.items.iter().all(|i| i.sentence_id.is_some()));

    // Each selected sentence contributed new due words: total distinct due
    // words across items equals the sum of their new contributions.
    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    for item in &session.items {
        let new_words: Vec<&str> = item
            .words
            .iter()
            .filter(|w| w.is_due)
            .filter_map(|w| w.lemma_id.as_deref())
            .filter(|lid| !seen.contains(*lid))
            .collect();
        assert!(
            !new_words.is_empty(),
            "selected sentence with no marginal coverage"
        );
        for lid in new_words {
            seen.insert(lid.to_string());
        }
    }
    assert_eq!(seen.len(), 5);
}

/// The lookup index stays consistent with committed lemma rows: every bare
/// form and every inflected form resolves to its canonical lemma.
#[test]
fn lookup_index_reflects_committed_rows() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = Store::open(tmp.path().join("index.sled").to_str().unwrap()).unwrap();
    let now = Utc::now();

    let mut forms = std::collections::BTreeMap::new();
    forms.insert("plural".to_string(), "كُتُب".to_string());
    store
        .upsert_lemma(&Lemma {
            lemma_id: "book".to_string(),
            surface: "كِتَاب".to_string(),
            bare: "كتاب".to_string(),
            gloss_en: "book".to_string(),
            pos: Some("noun".to_string()),
            root_id: None,
            frequency_rank: None,
            forms,
            canonical_lemma_id: None,
            grammar_features: Vec::new(),
            example_ar: None,
            example_en: None,
            transliteration: None,
            created_at: now,
        })
        .unwrap();

    let index = LemmaIndex::build(&store.list_lemmas().unwrap());
    for surface in ["كتاب", "الكتاب", "كتب", "الكتب", "وكتابه", "بالكتاب"] {
        assert_eq!(index.resolve_surface(surface), Some("book"), "{surface}");
    }
}
