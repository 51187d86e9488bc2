use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use scribe_types::api::{Claims, CreateNoteRequest, CreateNoteResponse, SetPrivacyRequest};
use scribe_types::models::{AuthorId, NewNote, NoteId, Privacy};

use crate::auth::AppState;
use crate::error::{run_blocking, run_write};

const MAX_PAGE: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

pub async fn create_note(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let privacy = match req.privacy {
        Some(code) => Privacy::try_from(code).map_err(|_| StatusCode::BAD_REQUEST)?,
        None => Privacy::default(),
    };

    let note = NewNote {
        author_id: claims.sub,
        content: req.content,
        created_at: chrono::Utc::now().timestamp(),
        privacy,
        render_hint: req.render_hint,
    };
    let id = run_write(&state, move |notes| notes.create_note(note)).await?;

    Ok((StatusCode::CREATED, Json(CreateNoteResponse { id })))
}

pub async fn get_note(
    State(state): State<AppState>,
    Path(note_id): Path<NoteId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let note = run_blocking(&state, move |notes| notes.get_note(claims.sub, note_id)).await?;
    Ok(Json(note))
}

pub async fn recent_notes(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = query.limit.min(MAX_PAGE);
    let ids = run_blocking(&state, move |notes| notes.recent_notes(claims.sub, limit)).await?;
    Ok(Json(ids))
}

/// `note_ids` is a comma-separated id list, e.g. `/notes/titles/3,1,2`.
pub async fn get_titles(
    State(state): State<AppState>,
    Path(note_ids): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let ids = parse_id_list(&note_ids).ok_or(StatusCode::BAD_REQUEST)?;
    let titles = run_blocking(&state, move |notes| notes.titles(claims.sub, &ids)).await?;
    Ok(Json(titles))
}

pub async fn search_notes(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let limit = query.limit.min(MAX_PAGE) as usize;
    let hits = run_blocking(&state, move |notes| notes.search(claims.sub, &query.q, limit)).await?;
    Ok(Json(hits))
}

pub async fn set_privacy(
    State(state): State<AppState>,
    Path(note_id): Path<NoteId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SetPrivacyRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    run_write(&state, move |notes| {
        notes.set_note_privacy(claims.sub, note_id, req.privacy)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn share_with(
    State(state): State<AppState>,
    Path(sharee_id): Path<AuthorId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    run_write(&state, move |notes| notes.share_with(claims.sub, sharee_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_sharees(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let ids = run_blocking(&state, move |notes| notes.list_sharees(claims.sub)).await?;
    Ok(Json(ids))
}

pub async fn get_author(
    State(state): State<AppState>,
    Path(author_id): Path<AuthorId>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let author = run_blocking(&state, move |notes| notes.get_author(author_id)).await?;
    Ok(Json(author))
}

fn parse_id_list(raw: &str) -> Option<Vec<NoteId>> {
    raw.split(',')
        .map(|s| s.trim().parse::<NoteId>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists() {
        assert_eq!(parse_id_list("1,2, 3"), Some(vec![1, 2, 3]));
        assert_eq!(parse_id_list("1,x"), None);
        assert_eq!(parse_id_list(""), None);
    }
}
