use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use vibesync_api::auth::{self, AppState, AppStateInner};
use vibesync_api::middleware::require_auth;
use vibesync_api::{friends, messages, posts};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vibesync=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("VIBESYNC_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("VIBESYNC_DB_PATH").unwrap_or_else(|_| "vibesync.db".into());
    let host = std::env::var("VIBESYNC_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("VIBESYNC_PORT")
        .unwrap_or_else(|_| "5000".into())
        .parse()?;

    // Init database
    let db = vibesync_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    // Routes
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/posts", get(posts::feed).post(posts::create_post))
        .route("/posts/user/{user_id}", get(posts::user_posts))
        .route("/posts/{post_id}", delete(posts::delete_post))
        .route("/posts/{post_id}/like", patch(posts::toggle_like))
        .route("/posts/{post_id}/comments", post(posts::add_comment))
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            delete(posts::delete_comment),
        )
        .route("/friends", get(friends::list_friends))
        .route(
            "/friends/{user_id}",
            post(friends::add_friend).delete(friends::unfriend),
        )
        .route("/users/suggestions", get(friends::suggestions))
        .route("/users/search", get(friends::search))
        .route("/users/{user_id}", get(friends::get_user))
        .route("/messages", get(messages::chat_partners))
        .route(
            "/messages/{user_id}",
            get(messages::thread).post(messages::send_message),
        )
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("VibeSync server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
