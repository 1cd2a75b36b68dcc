use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::{auth, handlers, AppState};

/// Room for the multipart framing and text fields around the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// All routes of the app. The session layer is added by the caller so
/// that tests can run against an in-memory store.
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.upload_store.max_bytes())
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let upload_routes = Router::new()
        .route("/play/dare/proof", post(handlers::dare_proof_handler))
        .route(
            "/memes",
            get(handlers::memes_page).post(handlers::upload_meme_handler),
        )
        .route(
            "/twister/recording",
            post(handlers::twister_recording_handler),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    let admin_routes = Router::new()
        .route("/admin/users", get(handlers::admin_users_page))
        .layer(middleware::from_fn(auth::require_admin));

    let protected_routes = Router::new()
        .route("/play", get(handlers::play_page))
        .route("/play/truth", post(handlers::new_truth_handler))
        .route("/play/dare", post(handlers::new_dare_handler))
        .route("/play/truth/answer", post(handlers::truth_answer_handler))
        .route("/twister", get(handlers::twister_page))
        .route("/twister/new", post(handlers::new_twister_handler))
        .route("/data", get(handlers::data_page))
        .route("/files/{name}", get(handlers::serve_file))
        .merge(upload_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(auth::require_auth));

    Router::new()
        .route("/", get(auth::handlers::index_handler))
        .route(
            "/login",
            get(auth::handlers::login_page).post(auth::handlers::login_handler),
        )
        .route("/logout", post(auth::handlers::logout_handler))
        .route("/health", get(health_handler))
        .merge(protected_routes)
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn(crate::middleware::add_security_headers))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}
