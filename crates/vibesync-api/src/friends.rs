use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use vibesync_db::models::UserRow;
use vibesync_db::queries::{AddFriendOutcome, RemoveFriendOutcome};
use vibesync_types::api::{UserDetail, UserSummary};

use crate::auth::AppState;
use crate::convert::parse_uuid;
use crate::error::ApiError;
use crate::middleware::Claims;

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    5
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

pub async fn add_friend(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    if target_id == claims.sub {
        return Err(ApiError::InvalidArgument(
            "cannot friend yourself".into(),
        ));
    }

    match state
        .db
        .add_friend(&claims.sub.to_string(), &target_id.to_string())?
    {
        AddFriendOutcome::Added => {}
        AddFriendOutcome::AlreadyFriends => return Err(ApiError::AlreadyFriends),
        AddFriendOutcome::NoSuchUser => return Err(ApiError::NotFound("user not found")),
    }

    let friends = state.db.friends_of(&claims.sub.to_string())?;
    Ok((StatusCode::CREATED, Json(summaries(friends))))
}

pub async fn unfriend(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    match state
        .db
        .remove_friend(&claims.sub.to_string(), &target_id.to_string())?
    {
        RemoveFriendOutcome::Removed => {}
        RemoveFriendOutcome::NoSuchUser => return Err(ApiError::NotFound("user not found")),
    }

    let friends = state.db.friends_of(&claims.sub.to_string())?;
    Ok(Json(summaries(friends)))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state.db.friends_of(&claims.sub.to_string())?;
    Ok(Json(summaries(friends)))
}

pub async fn suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let count = query.count.min(20);
    let users = state.db.suggest_users(&claims.sub.to_string(), count)?;
    Ok(Json(summaries(users)))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::InvalidArgument("search query is required".into()));
    }

    let users = state.db.search_users(q)?;
    Ok(Json(summaries(users)))
}

/// Another user's profile: name and friend list. The profile page and
/// suggestion filtering both read this.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<UserDetail>, ApiError> {
    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or(ApiError::NotFound("user not found"))?;

    let friends = state.db.friends_of(&user.id)?;

    Ok(Json(UserDetail {
        id: parse_uuid(&user.id, "user id"),
        name: user.name,
        friends: summaries(friends),
    }))
}

fn summaries(users: Vec<UserRow>) -> Vec<UserSummary> {
    users
        .into_iter()
        .map(|u| UserSummary {
            id: parse_uuid(&u.id, "user id"),
            name: u.name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AppStateInner;
    use std::sync::Arc;
    use vibesync_db::Database;

    fn test_state() -> AppState {
        Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
        })
    }

    fn claims(sub: Uuid, name: &str) -> Claims {
        Claims {
            sub,
            name: name.into(),
            exp: 0,
        }
    }

    #[tokio::test]
    async fn user_detail_includes_friend_list() {
        let state = test_state();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        state
            .db
            .create_user(&a.to_string(), "Ana", "ana@example.com", "hash")
            .unwrap();
        state
            .db
            .create_user(&b.to_string(), "Ben", "ben@example.com", "hash")
            .unwrap();
        state.db.add_friend(&a.to_string(), &b.to_string()).unwrap();

        // Ben views Ana's profile.
        let Json(detail) = get_user(State(state), Path(a), Extension(claims(b, "Ben")))
            .await
            .unwrap();

        assert_eq!(detail.id, a);
        assert_eq!(detail.name, "Ana");
        assert_eq!(detail.friends.len(), 1);
        assert_eq!(detail.friends[0].id, b);
        assert_eq!(detail.friends[0].name, "Ben");
    }

    #[tokio::test]
    async fn unknown_user_detail_is_not_found() {
        let state = test_state();
        let viewer = Uuid::new_v4();
        state
            .db
            .create_user(&viewer.to_string(), "Ana", "ana@example.com", "hash")
            .unwrap();

        let err = get_user(
            State(state),
            Path(Uuid::new_v4()),
            Extension(claims(viewer, "Ana")),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
