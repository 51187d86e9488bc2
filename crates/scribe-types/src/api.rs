use serde::{Deserialize, Serialize};

use crate::models::{AuthorId, NoteId};

// -- JWT Claims --

/// Token claims minted at login/registration and checked by the API middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: AuthorId,
    pub name: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub author_id: AuthorId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub author_id: AuthorId,
    pub name: String,
    pub token: String,
}

// -- Notes --

/// `privacy` is the raw integer code so out-of-range values reach the core's
/// validation instead of failing JSON extraction.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNoteRequest {
    pub content: String,
    pub privacy: Option<i64>,
    #[serde(default)]
    pub render_hint: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateNoteResponse {
    pub id: NoteId,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPrivacyRequest {
    pub privacy: i64,
}
