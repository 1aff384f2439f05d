use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::arabic::function_words::is_function_word;
use crate::constants::{DEFAULT_SESSION_LIMIT, MAX_SESSION_LIMIT};
use crate::engine::dispatcher::SentenceReviewInput;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::review_logs::CreditType;
use crate::store::operations::sentences::{Comprehension, ReviewMode};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/next-sentences", get(next_sentences))
        .route("/next-listening", get(next_listening))
        .route("/submit-sentence", post(submit_sentence))
        .route("/sync", post(sync_reviews))
        .route("/reintro-result", post(reintro_result))
        .route("/undo-sentence", post(undo_sentence))
        .route("/word-lookup/:lemma_id", get(word_lookup))
        .route("/start-acquisition", post(start_acquisition))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextSentencesQuery {
    limit: Option<usize>,
    mode: Option<String>,
    #[serde(default)]
    prefetch: bool,
}

fn parse_mode(raw: Option<&str>) -> Result<ReviewMode, AppError> {
    match raw.unwrap_or("reading") {
        "reading" => Ok(ReviewMode::Reading),
        "listening" => Ok(ReviewMode::Listening),
        other => Err(AppError::bad_request(
            "INVALID_MODE",
            &format!("unknown review mode '{other}'"),
        )),
    }
}

async fn next_sentences(
    State(state): State<AppState>,
    Query(query): Query<NextSentencesQuery>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SESSION_LIMIT)
        .clamp(1, MAX_SESSION_LIMIT);
    let mode = parse_mode(query.mode.as_deref())?;

    let mut session = state
        .engine()
        .build_session(limit, mode, !query.prefetch, Utc::now())?;

    // Listening practice is for already-learned words only, so never suggest
    // introductions there.
    if mode == ReviewMode::Listening {
        session.intro_candidates.clear();
    }

    if !query.prefetch {
        state.store().log_interaction(
            "session_start",
            serde_json::json!({
                "sessionId": session.session_id,
                "reviewMode": mode,
                "totalDueWords": session.total_due_words,
                "coveredDueWords": session.covered_due_words,
                "sentenceCount": session.items.iter().filter(|i| i.sentence_id.is_some()).count(),
                "fallbackCount": session.items.iter().filter(|i| i.sentence_id.is_none()).count(),
                "introCandidates": session.intro_candidates.len(),
            }),
        )?;
    }

    Ok(ok(session))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextListeningQuery {
    limit: Option<usize>,
}

async fn next_listening(
    State(state): State<AppState>,
    Query(query): Query<NextListeningQuery>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SESSION_LIMIT)
        .clamp(1, MAX_SESSION_LIMIT);
    let mut session =
        state
            .engine()
            .build_session(limit, ReviewMode::Listening, true, Utc::now())?;
    session.intro_candidates.clear();
    Ok(ok(session))
}

async fn submit_sentence(
    State(state): State<AppState>,
    Json(body): Json<SentenceReviewInput>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let outcome = state.engine().submit_sentence_review(&body, Utc::now())?;
    Ok(ok(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncItem {
    #[serde(rename = "type")]
    kind: String,
    client_review_id: String,
    payload: SentenceReviewInput,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkSyncRequest {
    reviews: Vec<SyncItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResult {
    client_review_id: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Bulk replay of offline reviews. Items are processed independently: one
/// failure never aborts the batch, and duplicates report as such.
async fn sync_reviews(
    State(state): State<AppState>,
    Json(body): Json<BulkSyncRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let now = Utc::now();
    let mut results = Vec::with_capacity(body.reviews.len());

    for item in body.reviews {
        if item.kind != "sentence" {
            results.push(SyncResult {
                client_review_id: item.client_review_id,
                status: "error".to_string(),
                error: Some(format!("Unknown type: {}", item.kind)),
            });
            continue;
        }

        let mut input = item.payload;
        input.client_review_id = Some(item.client_review_id.clone());
        match state.engine().submit_sentence_review(&input, now) {
            Ok(outcome) => results.push(SyncResult {
                client_review_id: item.client_review_id,
                status: if outcome.duplicate {
                    "duplicate".to_string()
                } else {
                    "ok".to_string()
                },
                error: None,
            }),
            Err(err) => results.push(SyncResult {
                client_review_id: item.client_review_id,
                status: "error".to_string(),
                error: Some(err.to_string()),
            }),
        }
    }

    Ok(ok(serde_json::json!({ "results": results })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReintroResultRequest {
    lemma_id: String,
    result: String,
    session_id: Option<String>,
    client_review_id: Option<String>,
}

/// Re-introduction card outcome: "remember" maps to Good, "show_again" to
/// Again.
async fn reintro_result(
    State(state): State<AppState>,
    Json(body): Json<ReintroResultRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let (rating, signal) = match body.result.as_str() {
        "remember" => (3, Comprehension::Understood),
        "show_again" => (1, Comprehension::NoIdea),
        other => {
            return Err(AppError::bad_request(
                "INVALID_RESULT",
                &format!("unknown reintro result '{other}'"),
            ))
        }
    };

    let outcome = state.engine().submit_srs_review(
        &body.lemma_id,
        rating,
        None,
        body.session_id.as_deref(),
        ReviewMode::Reintro,
        Some(signal),
        CreditType::Primary,
        None,
        body.client_review_id.as_deref(),
        Utc::now(),
    )?;

    state.store().log_interaction(
        &format!("reintro_{}", body.result),
        serde_json::json!({
            "lemmaId": body.lemma_id,
            "rating": rating,
            "sessionId": body.session_id,
        }),
    )?;

    Ok(ok(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UndoRequest {
    client_review_id: String,
}

async fn undo_sentence(
    State(state): State<AppState>,
    Json(body): Json<UndoRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let outcome = state.engine().undo_sentence_review(&body.client_review_id)?;
    Ok(ok(outcome))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WordLookupResponse {
    lemma_id: String,
    surface: String,
    gloss_en: String,
    transliteration: Option<String>,
    pos: Option<String>,
    root: Option<String>,
    root_meaning: Option<String>,
    root_id: Option<String>,
    forms: std::collections::BTreeMap<String, String>,
    example_ar: Option<String>,
    example_en: Option<String>,
    grammar_details: Vec<GrammarDetail>,
    is_function_word: bool,
    frequency_rank: Option<u32>,
    root_family: Vec<crate::engine::word_selector::FamilyMember>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GrammarDetail {
    feature_key: String,
    category: Option<String>,
    label_en: String,
    label_ar: Option<String>,
}

/// Word details during review, with the root family for known-root
/// prediction.
async fn word_lookup(
    State(state): State<AppState>,
    Path(lemma_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let lemma = state.store().require_lemma(&lemma_id)?;
    let root = match &lemma.root_id {
        Some(rid) => state.store().get_root(rid)?,
        None => None,
    };

    let mut grammar_details = Vec::with_capacity(lemma.grammar_features.len());
    for key in &lemma.grammar_features {
        match state.store().get_grammar_feature(key)? {
            Some(feature) => grammar_details.push(GrammarDetail {
                feature_key: feature.feature_key,
                category: feature.category,
                label_en: feature.label_en,
                label_ar: feature.label_ar,
            }),
            None => grammar_details.push(GrammarDetail {
                feature_key: key.clone(),
                category: None,
                label_en: key.replace('_', " "),
                label_ar: None,
            }),
        }
    }

    let root_family = match &lemma.root_id {
        Some(rid) => state
            .engine()
            .root_family(rid)?
            .into_iter()
            .filter(|m| m.lemma_id != lemma_id)
            .collect(),
        None => Vec::new(),
    };

    state.store().log_interaction(
        "review_word_lookup",
        serde_json::json!({
            "lemmaId": lemma_id,
            "wordAr": lemma.surface,
            "wordEn": lemma.gloss_en,
            "root": root.as_ref().map(|r| r.root.clone()),
        }),
    )?;

    Ok(ok(WordLookupResponse {
        lemma_id: lemma.lemma_id.clone(),
        surface: lemma.surface.clone(),
        gloss_en: lemma.gloss_en.clone(),
        transliteration: lemma.transliteration.clone(),
        pos: lemma.pos.clone(),
        root: root.as_ref().map(|r| r.root.clone()),
        root_meaning: root.as_ref().and_then(|r| r.core_meaning_en.clone()),
        root_id: lemma.root_id.clone(),
        forms: lemma.forms.clone(),
        example_ar: lemma.example_ar.clone(),
        example_en: lemma.example_en.clone(),
        grammar_details,
        is_function_word: is_function_word(&lemma.bare),
        frequency_rank: lemma.frequency_rank,
        root_family,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartAcquisitionRequest {
    lemma_id: String,
    source: Option<String>,
    #[serde(default)]
    due_immediately: bool,
}

async fn start_acquisition(
    State(state): State<AppState>,
    Json(body): Json<StartAcquisitionRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let ulk = state.engine().start_acquisition(
        &body.lemma_id,
        body.source.as_deref().unwrap_or("study"),
        body.due_immediately,
        Utc::now(),
    )?;
    Ok(ok(ulk))
}
