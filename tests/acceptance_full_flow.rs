//! End-to-end: import vocabulary, acquire a word through the boxes,
//! graduate into the SRS, review it in a sentence session, undo.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};

use arabic_learning_backend::engine::acquisition::AcquisitionReviewInput;
use arabic_learning_backend::store::operations::knowledge::KnowledgeState;
use arabic_learning_backend::store::operations::sentences::ReviewMode;

use common::app::spawn_test_server;
use common::fixtures::seed_sentence;
use common::http::{request, response_json};

fn acquisition_review(lemma_id: &str, rating: u8) -> AcquisitionReviewInput<'_> {
    AcquisitionReviewInput {
        lemma_id,
        rating,
        response_ms: None,
        session_id: Some("flow"),
        review_mode: ReviewMode::Reading,
        comprehension_signal: None,
        client_review_id: None,
    }
}

#[tokio::test]
async fn it_full_learning_flow() {
    let app = spawn_test_server().await;

    // 1. Import vocabulary over HTTP; clitic-form duplicates merge.
    let import = request(
        &app.app,
        Method::POST,
        "/api/lemmas/import",
        Some(serde_json::json!({
            "lemmas": [
                {"surface": "كِتَاب", "glossEn": "book", "pos": "noun", "root": "ك.ت.ب", "rootMeaning": "writing"},
                {"surface": "الكتاب", "glossEn": "the book", "pos": "noun"},
                {"surface": "وَلَد", "glossEn": "boy", "pos": "noun"},
            ]
        })),
    )
    .await;
    let (status, _, body) = response_json(import).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["imported"], 2);
    assert_eq!(body["data"]["merged"], 1);

    let lemmas = app.store.list_lemmas().unwrap();
    let book = lemmas.iter().find(|l| l.gloss_en == "book").unwrap().clone();
    let boy = lemmas.iter().find(|l| l.gloss_en == "boy").unwrap().clone();

    // 2. Start acquisition over HTTP.
    let start = request(
        &app.app,
        Method::POST,
        "/api/review/start-acquisition",
        Some(serde_json::json!({"lemmaId": book.lemma_id, "dueImmediately": true})),
    )
    .await;
    let (status, _, body) = response_json(start).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "acquiring");
    assert_eq!(body["data"]["acquisitionBox"], 1);

    // 3. Walk the boxes with the injected clock: day 0 ×3, day 1, day 4.
    let day0 = Utc::now();
    app.engine
        .submit_acquisition_review(&acquisition_review(&book.lemma_id, 3), day0)
        .unwrap();
    app.engine
        .submit_acquisition_review(
            &acquisition_review(&book.lemma_id, 3),
            day0 + Duration::minutes(2),
        )
        .unwrap();
    app.engine
        .submit_acquisition_review(
            &acquisition_review(&book.lemma_id, 3),
            day0 + Duration::minutes(4),
        )
        .unwrap();
    app.engine
        .submit_acquisition_review(
            &acquisition_review(&book.lemma_id, 3),
            day0 + Duration::days(1),
        )
        .unwrap();
    let graduated = app
        .engine
        .submit_acquisition_review(
            &acquisition_review(&book.lemma_id, 3),
            day0 + Duration::days(4),
        )
        .unwrap();
    assert!(graduated.graduated);

    let ulk = app.store.get_knowledge(&book.lemma_id).unwrap().unwrap();
    assert_eq!(ulk.state, KnowledgeState::Learning);
    assert!(ulk.fsrs_card.is_some());
    assert!(ulk.graduated_at.is_some());

    // Graduation emitted an interaction event.
    let events = app.store.recent_interactions(50).unwrap();
    assert!(events.iter().any(|e| e.event == "word_graduated"));

    // 4. Force the card due, give the word a sentence, pull a session.
    let mut ulk = app.store.get_knowledge(&book.lemma_id).unwrap().unwrap();
    let mut card = ulk.fsrs_card.clone().unwrap();
    card.due = Utc::now() - Duration::hours(1);
    ulk.fsrs_card = Some(card);
    app.store.put_knowledge(&ulk).unwrap();

    seed_sentence(
        &app.store,
        "s1",
        "هذا كتاب الولد",
        &book.lemma_id,
        &[
            ("هذا", None),
            ("كتاب", Some(book.lemma_id.as_str())),
            ("الولد", Some(boy.lemma_id.as_str())),
        ],
    );

    let session = request(&app.app, Method::GET, "/api/review/next-sentences", None).await;
    let (status, _, body) = response_json(session).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["sentenceId"], "s1");
    assert_eq!(items[0]["primaryLemmaId"], book.lemma_id.as_str());

    // session_start was recorded
    let events = app.store.recent_interactions(10).unwrap();
    assert!(events.iter().any(|e| e.event == "session_start"));
    assert!(events.iter().any(|e| e.event == "sentence_selected"));

    // 5. Review it; the unknown scaffold becomes encountered.
    let submit = request(
        &app.app,
        Method::POST,
        "/api/review/submit-sentence",
        Some(serde_json::json!({
            "sentenceId": "s1",
            "primaryLemmaId": book.lemma_id,
            "comprehensionSignal": "understood",
            "reviewMode": "reading",
            "clientReviewId": "flow-review",
        })),
    )
    .await;
    let (status, _, body) = response_json(submit).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["data"]["wordResults"].as_array().unwrap();
    assert_eq!(results.len(), 2);

    let boy_result = results
        .iter()
        .find(|w| w["lemmaId"] == boy.lemma_id.as_str())
        .unwrap();
    assert_eq!(boy_result["creditType"], "encounter");
    let boy_ulk = app.store.get_knowledge(&boy.lemma_id).unwrap().unwrap();
    assert_eq!(boy_ulk.state, KnowledgeState::Encountered);

    // 6. Undo restores the pre-review card.
    let card_post = app
        .store
        .get_knowledge(&book.lemma_id)
        .unwrap()
        .unwrap()
        .fsrs_card;
    let undo = request(
        &app.app,
        Method::POST,
        "/api/review/undo-sentence",
        Some(serde_json::json!({"clientReviewId": "flow-review"})),
    )
    .await;
    let (status, _, body) = response_json(undo).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["undone"], true);
    let card_restored = app
        .store
        .get_knowledge(&book.lemma_id)
        .unwrap()
        .unwrap()
        .fsrs_card;
    assert_ne!(card_restored, card_post);

    // 7. Acquisition stats over HTTP reflect the graduated word.
    let stats = request(&app.app, Method::GET, "/api/stats/acquisition", None).await;
    let (status, _, body) = response_json(stats).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalAcquiring"], 0);
}
