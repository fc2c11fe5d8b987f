use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use vibesync_db::models::{CommentRow, LikeRow, PostRow};
use vibesync_db::queries::{DeleteCommentOutcome, ToggleLikeOutcome};
use vibesync_types::api::{AddCommentRequest, CommentResponse, CreatePostRequest, PostResponse};

use crate::auth::AppState;
use crate::convert::{parse_created_at, parse_uuid};
use crate::error::ApiError;
use crate::middleware::Claims;

/// Comments shown per post in the feed listing. Full history stays
/// available through the per-post and per-user reads.
const FEED_COMMENT_LIMIT: usize = 3;

pub async fn feed(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    // Run blocking DB reads off the async runtime
    let db = state.clone();
    let (rows, likes, comments) = tokio::task::spawn_blocking(move || {
        let rows = db.db.feed_posts()?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let likes = db.db.likes_for_posts(&ids)?;
        let comments = db.db.comments_for_posts(&ids)?;
        anyhow::Ok((rows, likes, comments))
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    Ok(Json(build_responses(
        rows,
        likes,
        comments,
        Some(FEED_COMMENT_LIMIT),
    )))
}

pub async fn user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let (rows, likes, comments) = tokio::task::spawn_blocking(move || {
        let rows = db.db.posts_by_author(&user_id.to_string())?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let likes = db.db.likes_for_posts(&ids)?;
        let comments = db.db.comments_for_posts(&ids)?;
        anyhow::Ok((rows, likes, comments))
    })
    .await
    .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {}", e))??;

    Ok(Json(build_responses(rows, likes, comments, None)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::InvalidArgument("text is required".into()));
    }

    // Resolve the display name at call time — the post carries a
    // snapshot, not a live reference.
    let author = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user not found"))?;

    let post_id = Uuid::new_v4();
    state
        .db
        .insert_post(&post_id.to_string(), &author.id, &author.name, text)?;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: post_id,
            author_id: claims.sub,
            author_name: author.name,
            text: text.to_string(),
            likes: vec![],
            comments: vec![],
            created_at: chrono::Utc::now(),
        }),
    ))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    match state
        .db
        .toggle_like(&post_id.to_string(), &claims.sub.to_string())?
    {
        ToggleLikeOutcome::Liked | ToggleLikeOutcome::Unliked => {}
        ToggleLikeOutcome::PostMissing => return Err(ApiError::NotFound("post not found")),
        ToggleLikeOutcome::OwnPost => {
            return Err(ApiError::InvalidArgument(
                "you cannot like your own post".into(),
            ));
        }
    }

    let post = load_post(&state, post_id)?.ok_or(ApiError::NotFound("post not found"))?;
    Ok(Json(post))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::InvalidArgument("comment cannot be empty".into()));
    }

    let author = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound("user not found"))?;

    let comment_id = Uuid::new_v4();
    let inserted = state.db.insert_comment(
        &comment_id.to_string(),
        &post_id.to_string(),
        &author.id,
        &author.name,
        text,
    )?;
    if !inserted {
        return Err(ApiError::NotFound("post not found"));
    }

    let post = load_post(&state, post_id)?.ok_or(ApiError::NotFound("post not found"))?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    // A non-owner sees the same not-found as a missing post — the
    // ownership and existence checks are one lookup.
    let deleted = state
        .db
        .delete_post(&post_id.to_string(), &claims.sub.to_string())?;
    if !deleted {
        return Err(ApiError::NotFound("post not found"));
    }

    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    match state.db.delete_comment(
        &post_id.to_string(),
        &comment_id.to_string(),
        &claims.sub.to_string(),
    )? {
        DeleteCommentOutcome::Deleted => {}
        DeleteCommentOutcome::PostMissing => return Err(ApiError::NotFound("post not found")),
        DeleteCommentOutcome::CommentMissing => {
            return Err(ApiError::NotFound("comment not found"));
        }
        DeleteCommentOutcome::NotAuthor => {
            return Err(ApiError::Forbidden("not the comment author"));
        }
    }

    let post = load_post(&state, post_id)?.ok_or(ApiError::NotFound("post not found"))?;
    Ok(Json(post))
}

fn load_post(state: &AppState, post_id: Uuid) -> Result<Option<PostResponse>, ApiError> {
    let id = post_id.to_string();
    let Some(row) = state.db.get_post(&id)? else {
        return Ok(None);
    };

    let ids = vec![id];
    let likes = state.db.likes_for_posts(&ids)?;
    let comments = state.db.comments_for_posts(&ids)?;

    Ok(build_responses(vec![row], likes, comments, None).pop())
}

/// Assemble wire responses from batch-fetched rows. Likes and comments
/// are grouped per post in memory — one query each, no N+1.
fn build_responses(
    rows: Vec<PostRow>,
    likes: Vec<LikeRow>,
    comments: Vec<CommentRow>,
    comment_limit: Option<usize>,
) -> Vec<PostResponse> {
    let mut like_map: HashMap<String, Vec<Uuid>> = HashMap::new();
    for like in &likes {
        like_map
            .entry(like.post_id.clone())
            .or_default()
            .push(parse_uuid(&like.user_id, "like user id"));
    }

    let mut comment_map: HashMap<String, Vec<CommentResponse>> = HashMap::new();
    for comment in comments {
        comment_map
            .entry(comment.post_id.clone())
            .or_default()
            .push(CommentResponse {
                id: parse_uuid(&comment.id, "comment id"),
                author_id: parse_uuid(&comment.author_id, "comment author id"),
                author_name: comment.author_name,
                text: comment.text,
                created_at: parse_created_at(&comment.created_at, "comment"),
            });
    }

    rows.into_iter()
        .map(|row| {
            let mut comments = comment_map.remove(&row.id).unwrap_or_default();
            if let Some(limit) = comment_limit {
                comments.truncate(limit);
            }

            PostResponse {
                id: parse_uuid(&row.id, "post id"),
                author_id: parse_uuid(&row.author_id, "post author id"),
                author_name: row.author_name,
                text: row.text,
                likes: like_map.remove(&row.id).unwrap_or_default(),
                comments,
                created_at: parse_created_at(&row.created_at, "post"),
            }
        })
        .collect()
}
