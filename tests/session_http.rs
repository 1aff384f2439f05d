mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};

use arabic_learning_backend::store::operations::knowledge::KnowledgeState;
use arabic_learning_backend::store::operations::sentences::{Comprehension, ReviewMode};

use common::app::spawn_test_server;
use common::fixtures::{seed_lemma, seed_sentence, seed_srs_word};
use common::http::{request, response_json};

#[tokio::test]
async fn it_empty_state_returns_empty_session() {
    let app = spawn_test_server().await;

    let resp = request(&app.app, Method::GET, "/api/review/next-sentences", None).await;
    let (status, _, body) = response_json(resp).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["totalDueWords"], 0);
    assert_eq!(body["data"]["coveredDueWords"], 0);
}

#[tokio::test]
async fn it_greedy_cover_prefers_higher_coverage() {
    let app = spawn_test_server().await;

    for (id, surface) in [("l1", "كتاب"), ("l2", "ولد"), ("l3", "مدرسة")] {
        seed_lemma(&app.store, id, surface, "gloss");
        seed_srs_word(&app.store, id, KnowledgeState::Learning, 5.0, -2);
    }
    // S1 covers l1+l2, S2 covers only l3
    seed_sentence(
        &app.store,
        "s1",
        "الولد كتاب",
        "l1",
        &[("الولد", Some("l2")), ("كتاب", Some("l1"))],
    );
    seed_sentence(
        &app.store,
        "s2",
        "هذه مدرسة",
        "l3",
        &[("هذه", None), ("مدرسة", Some("l3"))],
    );

    let resp = request(&app.app, Method::GET, "/api/review/next-sentences", None).await;
    let (status, _, body) = response_json(resp).await;

    assert_eq!(status, StatusCode::OK);
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(body["data"]["totalDueWords"], 3);
    assert_eq!(body["data"]["coveredDueWords"], 3);

    let ids: Vec<&str> = items
        .iter()
        .map(|i| i["sentenceId"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"s1"));
    assert!(ids.contains(&"s2"));
}

#[tokio::test]
async fn it_listening_mode_drops_unready_scaffold() {
    let app = spawn_test_server().await;

    seed_lemma(&app.store, "l1", "كتاب", "book");
    seed_lemma(&app.store, "l2", "ولد", "boy");
    seed_srs_word(&app.store, "l1", KnowledgeState::Learning, 5.0, -2);
    // Scaffold l2: not due, but has never had a positive review
    let now = Utc::now();
    let mut scaffold = arabic_learning_backend::store::operations::knowledge::UserLemmaKnowledge::new_encountered("l2", "study", now);
    scaffold.state = KnowledgeState::Learning;
    scaffold.fsrs_card = Some(arabic_learning_backend::store::operations::knowledge::FsrsCard {
        stability: 5.0,
        difficulty: 5.0,
        due: now + Duration::days(5),
        last_review: Some(now - Duration::days(1)),
        reps: 2,
    });
    scaffold.times_seen = 2;
    scaffold.times_correct = 0;
    app.store.put_knowledge(&scaffold).unwrap();

    seed_sentence(
        &app.store,
        "s1",
        "الولد كتاب",
        "l1",
        &[("الولد", Some("l2")), ("كتاب", Some("l1"))],
    );

    // Listening: sentence excluded, falls back to a word-only item
    let resp = request(
        &app.app,
        Method::GET,
        "/api/review/next-sentences?mode=listening",
        None,
    )
    .await;
    let (_, _, body) = response_json(resp).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0]["sentenceId"].is_null());
    assert_eq!(items[0]["primaryLemmaId"], "l1");

    // Reading: the same sentence is usable
    let resp = request(&app.app, Method::GET, "/api/review/next-sentences", None).await;
    let (_, _, body) = response_json(resp).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["sentenceId"], "s1");
}

#[tokio::test]
async fn it_recency_gate_falls_back_to_word_only_items() {
    let app = spawn_test_server().await;

    seed_lemma(&app.store, "l1", "كتاب", "book");
    seed_srs_word(&app.store, "l1", KnowledgeState::Learning, 5.0, -2);
    seed_sentence(
        &app.store,
        "s1",
        "هذا كتاب",
        "l1",
        &[("هذا", None), ("كتاب", Some("l1"))],
    );

    // Shown an hour ago and understood → gated for 7 days
    let mut sentence = app.store.get_sentence("s1").unwrap().unwrap();
    sentence.record_shown(
        ReviewMode::Reading,
        Comprehension::Understood,
        Utc::now() - Duration::hours(1),
    );
    app.store.update_sentence(&sentence).unwrap();

    let resp = request(&app.app, Method::GET, "/api/review/next-sentences", None).await;
    let (_, _, body) = response_json(resp).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0]["sentenceId"].is_null());
    assert_eq!(items[0]["primaryLemmaId"], "l1");
    assert_eq!(body["data"]["coveredDueWords"], 1);
}

#[tokio::test]
async fn it_struggling_words_become_reintro_cards() {
    let app = spawn_test_server().await;

    seed_lemma(&app.store, "l1", "كتاب", "book");
    common::fixtures::seed_struggling_word(&app.store, "l1");

    let resp = request(&app.app, Method::GET, "/api/review/next-sentences", None).await;
    let (_, _, body) = response_json(resp).await;

    // The struggling word is pulled out of the sentence pool entirely
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["data"]["totalDueWords"], 1);
    let cards = body["data"]["reintroCards"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["lemmaId"], "l1");
}

#[tokio::test]
async fn it_listening_endpoint_never_suggests_intros() {
    let app = spawn_test_server().await;

    seed_lemma(&app.store, "l1", "كتاب", "book");
    seed_lemma(&app.store, "l2", "قلم", "pen");
    seed_srs_word(&app.store, "l1", KnowledgeState::Known, 30.0, -2);

    let resp = request(&app.app, Method::GET, "/api/review/next-listening", None).await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["introCandidates"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn it_invalid_mode_is_rejected() {
    let app = spawn_test_server().await;
    let resp = request(
        &app.app,
        Method::GET,
        "/api/review/next-sentences?mode=osmosis",
        None,
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    common::http::assert_json_error(&body, "INVALID_MODE");
}
