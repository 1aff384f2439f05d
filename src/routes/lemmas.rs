use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::arabic::lookup::LemmaIndex;
use crate::arabic::{normalize_arabic, sanitize_arabic_word};
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::knowledge::KnowledgeState;
use crate::store::operations::lemmas::{Lemma, Root};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_lemmas))
        .route("/import", post(import_lemmas))
        .route("/:lemma_id", get(get_lemma))
        .route("/:lemma_id/suspend", post(suspend_lemma))
        .route("/:lemma_id/unsuspend", post(unsuspend_lemma))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn list_lemmas(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let limit = query.limit.unwrap_or(100).min(500);
    let offset = query.offset.unwrap_or(0);

    let mut lemmas = state.store().list_lemmas()?;
    lemmas.sort_by(|a, b| a.bare.cmp(&b.bare));
    let page: Vec<Lemma> = lemmas.into_iter().skip(offset).take(limit).collect();
    Ok(ok(page))
}

async fn get_lemma(
    State(state): State<AppState>,
    Path(lemma_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let lemma = state.store().require_lemma(&lemma_id)?;
    Ok(ok(lemma))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportLemma {
    surface: String,
    gloss_en: String,
    pos: Option<String>,
    frequency_rank: Option<u32>,
    #[serde(default)]
    forms: BTreeMap<String, String>,
    root: Option<String>,
    root_meaning: Option<String>,
    transliteration: Option<String>,
    example_ar: Option<String>,
    example_en: Option<String>,
    #[serde(default)]
    grammar_features: Vec<String>,
    source: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportRequest {
    lemmas: Vec<ImportLemma>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportResult {
    imported: usize,
    merged: usize,
    skipped: Vec<String>,
}

/// Batch lemma import. The bare form is derived from the surface; words that
/// resolve to an existing lemma through the clitic-aware index are merged
/// instead of duplicated (وكتاب, بالكتاب, الكتاب all collapse onto كتاب).
async fn import_lemmas(
    State(state): State<AppState>,
    Json(body): Json<ImportRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let now = Utc::now();
    let mut imported = 0usize;
    let mut merged = 0usize;
    let mut skipped: Vec<String> = Vec::new();

    let mut existing = state.store().list_lemmas()?;

    for entry in body.lemmas {
        let Some(clean_surface) = sanitize_arabic_word(&entry.surface) else {
            skipped.push(entry.surface);
            continue;
        };
        let bare = normalize_arabic(&clean_surface);

        // Rebuilt per item so forms added earlier in the batch dedup later
        // entries too.
        let index = LemmaIndex::build(&existing);
        if index.lookup(&bare).is_some() {
            merged += 1;
            continue;
        }

        let root_id = match &entry.root {
            Some(root_text) => {
                let existing_root = existing
                    .iter()
                    .filter_map(|l| l.root_id.clone())
                    .find(|rid| {
                        state
                            .store()
                            .get_root(rid)
                            .ok()
                            .flatten()
                            .map(|r| r.root == *root_text)
                            .unwrap_or(false)
                    });
                match existing_root {
                    Some(rid) => Some(rid),
                    None => {
                        let root = Root {
                            root_id: uuid::Uuid::new_v4().to_string(),
                            root: root_text.clone(),
                            core_meaning_en: entry.root_meaning.clone(),
                            created_at: now,
                        };
                        state.store().upsert_root(&root)?;
                        Some(root.root_id)
                    }
                }
            }
            None => None,
        };

        let lemma = Lemma {
            lemma_id: uuid::Uuid::new_v4().to_string(),
            surface: clean_surface,
            bare,
            gloss_en: entry.gloss_en,
            pos: entry.pos,
            root_id,
            frequency_rank: entry.frequency_rank,
            forms: entry.forms,
            canonical_lemma_id: None,
            grammar_features: entry.grammar_features,
            example_ar: entry.example_ar,
            example_en: entry.example_en,
            transliteration: entry.transliteration,
            created_at: now,
        };
        state.store().upsert_lemma(&lemma)?;
        existing.push(lemma);
        imported += 1;
    }

    state.store().log_interaction(
        "lemmas_imported",
        serde_json::json!({"imported": imported, "merged": merged, "skipped": skipped.len()}),
    )?;

    Ok(created(ImportResult {
        imported,
        merged,
        skipped,
    }))
}

async fn suspend_lemma(
    State(state): State<AppState>,
    Path(lemma_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    set_suspended(&state, &lemma_id, true)
}

async fn unsuspend_lemma(
    State(state): State<AppState>,
    Path(lemma_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    set_suspended(&state, &lemma_id, false)
}

/// Suspension parks a word outside scheduling without losing its history.
/// Unsuspending re-enters through the box phase when no card exists.
fn set_suspended(
    state: &AppState,
    lemma_id: &str,
    suspend: bool,
) -> Result<axum::response::Response, AppError> {
    use axum::response::IntoResponse;

    let mut ulk = state
        .store()
        .get_knowledge(lemma_id)?
        .ok_or_else(|| AppError::not_found(&format!("No knowledge row for lemma {lemma_id}")))?;

    if suspend {
        ulk.state = KnowledgeState::Suspended;
    } else if ulk.fsrs_card.is_some() {
        ulk.state = KnowledgeState::Learning;
    } else if ulk.acquisition_box.is_some() {
        ulk.state = KnowledgeState::Acquiring;
    } else {
        ulk.state = KnowledgeState::Encountered;
    }
    state.store().put_knowledge(&ulk)?;
    Ok(ok(ulk).into_response())
}
