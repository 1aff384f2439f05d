mod common;

use axum::http::{Method, StatusCode};

use arabic_learning_backend::store::operations::knowledge::KnowledgeState;

use common::app::spawn_test_server;
use common::fixtures::{card_of, seed_lemma, seed_sentence, seed_srs_word};
use common::http::{assert_status_ok_json, request, response_json};

fn submit_body(client_review_id: &str) -> serde_json::Value {
    serde_json::json!({
        "sentenceId": "s1",
        "primaryLemmaId": "l1",
        "comprehensionSignal": "understood",
        "missedLemmaIds": [],
        "confusedLemmaIds": [],
        "reviewMode": "reading",
        "clientReviewId": client_review_id,
    })
}

async fn seed_reviewable(app: &common::app::TestApp) {
    seed_lemma(&app.store, "l1", "كتاب", "book");
    seed_lemma(&app.store, "l2", "ولد", "boy");
    seed_srs_word(&app.store, "l1", KnowledgeState::Learning, 5.0, -2);
    seed_srs_word(&app.store, "l2", KnowledgeState::Learning, 8.0, -1);
    seed_sentence(
        &app.store,
        "s1",
        "الولد كتاب",
        "l1",
        &[("الولد", Some("l2")), ("كتاب", Some("l1"))],
    );
}

#[tokio::test]
async fn it_submit_sentence_fans_out_word_results() {
    let app = spawn_test_server().await;
    seed_reviewable(&app).await;

    let resp = request(
        &app.app,
        Method::POST,
        "/api/review/submit-sentence",
        Some(submit_body("K")),
    )
    .await;
    let (status, _, body) = response_json(resp).await;

    assert_status_ok_json(status, &body);
    let results = body["data"]["wordResults"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    for wr in results {
        assert_eq!(wr["rating"], 3);
    }
    let primary = results.iter().find(|w| w["lemmaId"] == "l1").unwrap();
    assert_eq!(primary["creditType"], "primary");
    let collateral = results.iter().find(|w| w["lemmaId"] == "l2").unwrap();
    assert_eq!(collateral["creditType"], "collateral");
}

#[tokio::test]
async fn it_replay_is_idempotent() {
    let app = spawn_test_server().await;
    seed_reviewable(&app).await;

    let first = request(
        &app.app,
        Method::POST,
        "/api/review/submit-sentence",
        Some(submit_body("K")),
    )
    .await;
    let (_, _, first_body) = response_json(first).await;
    assert_eq!(first_body["data"]["duplicate"], false);

    let card_after = card_of(&app.store, "l1");

    let second = request(
        &app.app,
        Method::POST,
        "/api/review/submit-sentence",
        Some(submit_body("K")),
    )
    .await;
    let (status, _, second_body) = response_json(second).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(second_body["data"]["duplicate"], true);
    assert_eq!(second_body["data"]["wordResults"].as_array().unwrap().len(), 0);

    // No second mutation, exactly one per-lemma log under the suffixed id
    assert_eq!(card_of(&app.store, "l1"), card_after);
    let logs = app.store.reviews_for_lemma("l1", 10).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].client_review_id.as_deref(), Some("K:l1"));
}

#[tokio::test]
async fn it_undo_restores_pre_review_cards() {
    let app = spawn_test_server().await;
    seed_reviewable(&app).await;

    let card_pre_l1 = card_of(&app.store, "l1");
    let card_pre_l2 = card_of(&app.store, "l2");

    let resp = request(
        &app.app,
        Method::POST,
        "/api/review/submit-sentence",
        Some(submit_body("K")),
    )
    .await;
    let (status, _, _) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(card_of(&app.store, "l1"), card_pre_l1);

    let undo = request(
        &app.app,
        Method::POST,
        "/api/review/undo-sentence",
        Some(serde_json::json!({"clientReviewId": "K"})),
    )
    .await;
    let (status, _, body) = response_json(undo).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["undone"], true);
    assert_eq!(body["data"]["reviewsRemoved"], 2);
    assert_eq!(card_of(&app.store, "l1"), card_pre_l1);
    assert_eq!(card_of(&app.store, "l2"), card_pre_l2);
    assert!(app.store.reviews_for_lemma("l1", 10).unwrap().is_empty());

    // The id can be reused after undo
    let resubmit = request(
        &app.app,
        Method::POST,
        "/api/review/submit-sentence",
        Some(submit_body("K")),
    )
    .await;
    let (_, _, resubmit_body) = response_json(resubmit).await;
    assert_eq!(resubmit_body["data"]["duplicate"], false);
}

#[tokio::test]
async fn it_sync_reports_per_item_status() {
    let app = spawn_test_server().await;
    seed_reviewable(&app).await;

    // First submission lands normally, so the sync replay is a duplicate
    request(
        &app.app,
        Method::POST,
        "/api/review/submit-sentence",
        Some(submit_body("dup-1")),
    )
    .await;

    let sync_body = serde_json::json!({
        "reviews": [
            {
                "type": "sentence",
                "clientReviewId": "dup-1",
                "payload": submit_body("dup-1"),
            },
            {
                "type": "sentence",
                "clientReviewId": "new-1",
                "payload": {
                    "sentenceId": "s1",
                    "primaryLemmaId": "l1",
                    "comprehensionSignal": "partial",
                    "missedLemmaIds": ["l2"],
                    "confusedLemmaIds": [],
                    "reviewMode": "reading",
                },
            },
            {
                "type": "word",
                "clientReviewId": "bad-1",
                "payload": submit_body("bad-1"),
            },
        ]
    });

    let resp = request(&app.app, Method::POST, "/api/review/sync", Some(sync_body)).await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);

    let results = body["data"]["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["status"], "duplicate");
    assert_eq!(results[1]["status"], "ok");
    assert_eq!(results[2]["status"], "error");
}

#[tokio::test]
async fn it_reintro_result_maps_to_ratings() {
    let app = spawn_test_server().await;
    seed_lemma(&app.store, "l1", "كتاب", "book");
    seed_srs_word(&app.store, "l1", KnowledgeState::Learning, 2.0, -2);

    let resp = request(
        &app.app,
        Method::POST,
        "/api/review/reintro-result",
        Some(serde_json::json!({
            "lemmaId": "l1",
            "result": "remember",
            "clientReviewId": "reintro-1",
        })),
    )
    .await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["rating"], 3);

    let log = app.store.reviews_for_lemma("l1", 1).unwrap().remove(0);
    assert_eq!(log.rating, 3);
    assert!(matches!(
        log.review_mode,
        arabic_learning_backend::store::operations::sentences::ReviewMode::Reintro
    ));
}

#[tokio::test]
async fn it_word_lookup_returns_details_and_logs_event() {
    let app = spawn_test_server().await;
    seed_lemma(&app.store, "l1", "كتاب", "book");

    let resp = request(&app.app, Method::GET, "/api/review/word-lookup/l1", None).await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["surface"], "كتاب");
    assert_eq!(body["data"]["isFunctionWord"], false);

    let events = app.store.recent_interactions(5).unwrap();
    assert!(events.iter().any(|e| e.event == "review_word_lookup"));
}

#[tokio::test]
async fn it_word_lookup_missing_is_404() {
    let app = spawn_test_server().await;
    let resp = request(&app.app, Method::GET, "/api/review/word-lookup/nope", None).await;
    let (status, _, body) = response_json(resp).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}
