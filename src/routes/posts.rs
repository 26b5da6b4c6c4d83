use std::path::PathBuf;

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::params;
use serde_json::json;

use crate::db::models::{Author, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::AuthSession;
use crate::media;
use crate::state::AppState;

/// Uploaded covers can be larger than axum's 2 MB default.
const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;

// -- Multipart form --

#[derive(Default)]
struct PostForm {
    id: Option<String>,
    title: Option<String>,
    summary: Option<String>,
    content: Option<String>,
    /// Original client filename and the file bytes, when a cover was sent.
    upload: Option<(String, Vec<u8>)>,
}

async fn read_post_form(mut multipart: Multipart) -> AppResult<PostForm> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.upload = Some((original, bytes.to_vec()));
            }
            "id" => form.id = Some(field.text().await.unwrap_or_default()),
            "title" => form.title = Some(field.text().await.unwrap_or_default()),
            "summary" => form.summary = Some(field.text().await.unwrap_or_default()),
            "content" => form.content = Some(field.text().await.unwrap_or_default()),
            _ => {}
        }
    }

    Ok(form)
}

/// Store the raw upload under a unique transient name, then normalize it to
/// WebP. Returns the client-facing cover path ("uploads/<name>.webp").
///
/// Conversion is awaited here, so nothing is persisted unless the derived
/// file exists; on failure the transient original stays on disk and the
/// request fails with 500.
async fn store_cover(state: &AppState, original_name: &str, bytes: &[u8]) -> AppResult<String> {
    // The original filename's extension is only recorded, never trusted
    // to pick an encoding.
    tracing::debug!("Received upload {:?} ({} bytes)", original_name, bytes.len());

    let file_name = uuid::Uuid::now_v7().to_string();
    let dest: PathBuf = state.config.uploads_path().join(&file_name);
    tokio::fs::write(&dest, bytes).await?;

    let converted = media::convert_to_webp(dest).await?;
    let converted_name = converted
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Internal("converted path has no file name".into()))?;

    Ok(format!("uploads/{}", converted_name))
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/post",
            post(create_post).get(list_posts).put(update_post),
        )
        .route("/post/{id}", get(get_post).delete(delete_post))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

// -- Handlers --

async fn create_post(
    State(state): State<AppState>,
    session: AuthSession,
    multipart: Multipart,
) -> AppResult<Json<Post>> {
    let form = read_post_form(multipart).await?;

    let (original_name, bytes) = form
        .upload
        .ok_or_else(|| AppError::BadRequest("No file uploaded".into()))?;
    let cover = store_cover(&state, &original_name, &bytes).await?;

    let post_id = uuid::Uuid::now_v7().to_string();
    let conn = state.db.get()?;
    conn.execute(
        "INSERT INTO posts (id, title, summary, content, cover, author_id) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            post_id,
            form.title.unwrap_or_default(),
            form.summary.unwrap_or_default(),
            form.content.unwrap_or_default(),
            cover,
            session.user_id,
        ],
    )?;

    let post = query_post(&conn, &post_id)?;
    Ok(Json(post))
}

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    let conn = state.db.get()?;
    let posts = query_latest_posts(&conn, 20)?;
    Ok(Json(posts))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Post>> {
    let conn = state.db.get()?;
    let post = query_post(&conn, &id)?;
    Ok(Json(post))
}

async fn update_post(
    State(state): State<AppState>,
    session: AuthSession,
    multipart: Multipart,
) -> AppResult<Json<Post>> {
    let form = read_post_form(multipart).await?;
    let post_id = form
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("post id is required".into()))?;

    // Normalize a replacement cover before touching the stored post
    let new_cover = match &form.upload {
        Some((original_name, bytes)) => Some(store_cover(&state, original_name, bytes).await?),
        None => None,
    };

    let conn = state.db.get()?;
    let (author_id, old_cover): (String, Option<String>) = conn
        .query_row(
            "SELECT author_id, cover FROM posts WHERE id = ?1",
            params![post_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(|_| AppError::NotFound)?;

    // Only the original author may touch the post
    if author_id != session.user_id {
        return Err(AppError::NotAuthor);
    }

    conn.execute(
        "UPDATE posts SET title = ?1, summary = ?2, content = ?3, cover = ?4 WHERE id = ?5",
        params![
            form.title.unwrap_or_default(),
            form.summary.unwrap_or_default(),
            form.content.unwrap_or_default(),
            new_cover.or(old_cover),
            post_id,
        ],
    )?;

    let post = query_post(&conn, &post_id)?;
    Ok(Json(post))
}

async fn delete_post(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Response> {
    let conn = state.db.get()?;
    let deleted = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Post deleted successfully" })),
    )
        .into_response())
}

// -- Query helpers --

const POST_SELECT: &str = "SELECT p.id, p.title, p.summary, p.content, p.cover, p.created_at, \
     u.id, u.username \
     FROM posts p JOIN users u ON u.id = p.author_id";

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        content: row.get(3)?,
        cover: row.get(4)?,
        created_at: row.get(5)?,
        author: Author {
            id: row.get(6)?,
            username: row.get(7)?,
        },
    })
}

fn query_post(conn: &rusqlite::Connection, id: &str) -> Result<Post, AppError> {
    conn.query_row(
        &format!("{} WHERE p.id = ?1", POST_SELECT),
        params![id],
        row_to_post,
    )
    .map_err(|_| AppError::NotFound)
}

fn query_latest_posts(conn: &rusqlite::Connection, limit: i64) -> Result<Vec<Post>, AppError> {
    // UUIDv7 ids are time-ordered, breaking ties within one datetime second
    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY p.created_at DESC, p.id DESC LIMIT ?1",
        POST_SELECT
    ))?;
    let posts = stmt
        .query_map(params![limit], row_to_post)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::state::DbPool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_pool() -> DbPool {
        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        db::run_migrations(&pool).unwrap();
        pool
    }

    fn seed_user(conn: &rusqlite::Connection, id: &str, username: &str) {
        conn.execute(
            "INSERT INTO users (id, username, password_hash) VALUES (?1, ?2, 'h')",
            params![id, username],
        )
        .unwrap();
    }

    fn seed_post(conn: &rusqlite::Connection, id: &str, author: &str, created_at: &str) {
        conn.execute(
            "INSERT INTO posts (id, title, author_id, created_at) VALUES (?1, 't', ?2, ?3)",
            params![id, author, created_at],
        )
        .unwrap();
    }

    #[test]
    fn query_post_resolves_author_username() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn, "u1", "alice");
        seed_post(&conn, "p1", "u1", "2024-01-01 10:00:00");

        let post = query_post(&conn, "p1").unwrap();
        assert_eq!(post.author.id, "u1");
        assert_eq!(post.author.username, "alice");
        assert!(post.cover.is_none());
    }

    #[test]
    fn query_post_missing_is_not_found() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(matches!(
            query_post(&conn, "nope"),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn latest_posts_are_newest_first_and_capped() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn, "u1", "alice");
        for i in 0..25 {
            seed_post(
                &conn,
                &uuid::Uuid::now_v7().to_string(),
                "u1",
                &format!("2024-01-01 10:00:{:02}", i % 60),
            );
        }

        let posts = query_latest_posts(&conn, 20).unwrap();
        assert_eq!(posts.len(), 20);
        for pair in posts.windows(2) {
            assert!(pair[0].created_at >= pair[1].created_at);
        }
    }

    #[test]
    fn latest_posts_tie_break_on_id() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        seed_user(&conn, "u1", "alice");
        // Same second; v7 ids keep insertion order
        let first = uuid::Uuid::now_v7().to_string();
        let second = uuid::Uuid::now_v7().to_string();
        seed_post(&conn, &first, "u1", "2024-01-01 10:00:00");
        seed_post(&conn, &second, "u1", "2024-01-01 10:00:00");

        let posts = query_latest_posts(&conn, 20).unwrap();
        assert_eq!(posts[0].id, second);
        assert_eq!(posts[1].id, first);
    }
}
