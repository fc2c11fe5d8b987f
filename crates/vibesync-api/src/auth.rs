use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use vibesync_db::Database;
use vibesync_types::api::{AuthResponse, LoginRequest, SignupRequest, UserProfile};

use crate::error::ApiError;
use crate::middleware::Claims;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    let email = req.email.trim();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::InvalidArgument("all fields are required".into()));
    }

    if state
        .db
        .get_user_by_email(email)?
        .is_some()
    {
        return Err(ApiError::AlreadyExists("user already exists"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    let user_id = Uuid::new_v4();

    // The pre-check above is only a fast path: a concurrent signup with
    // the same email loses the race at the UNIQUE constraint instead.
    let created = state
        .db
        .create_user(&user_id.to_string(), name, email, &password_hash)?;
    if !created {
        return Err(ApiError::AlreadyExists("user already exists"));
    }

    let token = create_token(&state.jwt_secret, user_id, name)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserProfile {
                id: user_id,
                name: name.to_string(),
                email: email.to_string(),
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Unknown email and wrong password produce the same response — no
    // account-existence oracle.
    let user = state
        .db
        .get_user_by_email(req.email.trim())?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored credential unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&state.jwt_secret, user_id, &user.name)?;

    Ok(Json(AuthResponse {
        token,
        user: UserProfile {
            id: user_id,
            name: user.name,
            email: user.email,
        },
    }))
}

fn create_token(secret: &str, user_id: Uuid, name: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"hunter42", &salt)
            .unwrap()
            .to_string();

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"hunter42", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong", &parsed)
                .is_err()
        );
    }
}
