use axum::extract::State;
use axum::http::header;
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, token};
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::AuthSession;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

// -- Cookie helpers --

// SameSite=None + Secure so the cookie survives cross-site requests from
// the browser front end.
fn session_cookie(name: &str, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=None; Secure; Path=/",
        name, token
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=None; Secure; Path=/; Max-Age=0", name)
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile))
        .route("/logout", post(logout))
}

// -- Handlers --

async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> AppResult<Json<User>> {
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "username and password are required".into(),
        ));
    }

    let password_hash = password::hash(&req.password)?;
    let user_id = uuid::Uuid::now_v7().to_string();

    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, ?3)",
        params![user_id, username, password_hash],
    )
    .map_err(|e| match e.sqlite_error_code() {
        Some(rusqlite::ErrorCode::ConstraintViolation) => {
            AppError::BadRequest("username already taken".into())
        }
        _ => AppError::Database(e),
    })?;

    let user = conn.query_row(
        "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
        params![user_id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )?;

    tracing::info!("Registered user {}", user.username);
    Ok(Json(user))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> AppResult<Response> {
    let row: Option<(String, String)> = {
        let conn = state.db.get()?;
        conn.query_row(
            "SELECT id, password_hash FROM users WHERE username = ?1",
            params![req.username],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .ok()
    };

    let (user_id, password_hash) =
        row.ok_or_else(|| AppError::BadRequest("User not found".into()))?;

    if !password::verify(&req.password, &password_hash) {
        return Err(AppError::BadRequest("wrong credentials".into()));
    }

    let token = token::issue(&state.config.auth.secret, &user_id, &req.username)?;
    let cookie = session_cookie(&state.config.auth.cookie_name, &token);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "id": user_id, "username": req.username })),
    )
        .into_response())
}

/// Echo the verified session claims back to the client.
async fn profile(session: AuthSession) -> AppResult<Json<token::Claims>> {
    Ok(Json(session.claims))
}

async fn logout(State(state): State<AppState>) -> Response {
    let cookie = clear_session_cookie(&state.config.auth.cookie_name);
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!("ok")),
    )
        .into_response()
}
