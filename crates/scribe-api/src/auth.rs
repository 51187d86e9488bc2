use std::sync::Arc;
use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use scribe_core::Notes;
use scribe_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use scribe_types::models::AuthorId;

use crate::error::{run_blocking, run_write};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub notes: Notes,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub request_timeout: Duration,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    if req.name.len() < 3 || req.name.len() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let name = req.name.clone();
    let author_id = run_write(&state, move |notes| notes.create_author(&req.name, &req.password))
        .await?;

    let token = create_token(&state, author_id, &name).map_err(|e| {
        error!("Token creation failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { author_id, token }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    info!("Login {}", req.name);

    let author = run_blocking(&state, move |notes| notes.verify_credentials(&req.name, &req.password))
        .await
        .map_err(|status| match status {
            StatusCode::FORBIDDEN => StatusCode::UNAUTHORIZED,
            other => other,
        })?;

    let token = create_token(&state, author.id, &author.name).map_err(|e| {
        error!("Token creation failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(LoginResponse {
        author_id: author.id,
        name: author.name,
        token,
    }))
}

pub fn create_token(state: &AppStateInner, author_id: AuthorId, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: author_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}
