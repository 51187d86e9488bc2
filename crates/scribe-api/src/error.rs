use axum::http::StatusCode;
use scribe_core::{CoreError, CoreResult, Notes};
use tokio::task::JoinError;
use tracing::{debug, error, warn};

use crate::auth::AppState;

pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::Authorization(_) => StatusCode::FORBIDDEN,
        CoreError::Conflict(_) => StatusCode::CONFLICT,
        CoreError::Store(_) | CoreError::Index(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_and_map(err: CoreError) -> StatusCode {
    let status = status_for(&err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        debug!("Request rejected ({}): {}", status, err);
    }
    status
}

/// Runs a read-only note-service call off the async runtime, bounded by the
/// configured request timeout.
///
/// A timed-out task is abandoned, not cancelled, so only calls without side
/// effects go through here.
pub async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Notes) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let shared = state.clone();
    let task = tokio::task::spawn_blocking(move || f(&shared.notes));

    match tokio::time::timeout(state.request_timeout, task).await {
        Err(_) => {
            warn!("Note service call exceeded {:?}", state.request_timeout);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
        Ok(joined) => joined_result(joined),
    }
}

/// Runs a mutating note-service call off the async runtime and waits for it
/// to finish, so the response always reports whether the write happened.
/// Store waits are bounded by the connection's busy timeout instead.
pub async fn run_write<T, F>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Notes) -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let shared = state.clone();
    joined_result(tokio::task::spawn_blocking(move || f(&shared.notes)).await)
}

fn joined_result<T>(joined: Result<CoreResult<T>, JoinError>) -> Result<T, StatusCode> {
    match joined {
        Err(e) => {
            error!("spawn_blocking join error: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Ok(result) => result.map_err(log_and_map),
    }
}
