//! GroupDues Backend
//!
//! A REST backend for group expense tracking: members join a group via a
//! code, admins record activities and per-head expenses, and every balance
//! change is paired with an immutable ledger entry.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod notify;
mod validation;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use notify::{LogNotifier, Notifier};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub notifier: Arc<dyn Notifier>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting GroupDues Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Create application state
    let state = AppState {
        repo,
        notifier: Arc::new(LogNotifier),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone the repository for the session layer
    let repo = state.repo.clone();

    // Public routes: registration, signup, login, password reset
    let public_routes = Router::new()
        .route("/auth/register", post(api::register))
        .route("/auth/signup/admin", post(api::signup_admin))
        .route("/auth/signup/member", post(api::signup_member))
        .route("/auth/login", post(api::login))
        .route("/auth/password-reset", post(api::request_password_reset))
        .route(
            "/auth/password-reset/confirm",
            post(api::confirm_password_reset),
        );

    // Protected routes: everything operating on a session
    let protected_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        // Setup
        .route("/setup", post(api::setup_group))
        // Group
        .route("/group", get(api::get_group))
        // Members
        .route("/group/members", get(api::list_members))
        .route("/group/members", post(api::create_member))
        .route("/group/members/by-phone/{phone}", get(api::find_member_by_phone))
        .route("/group/members/{id}", get(api::get_member))
        .route("/group/members/{id}", put(api::update_member))
        .route("/group/members/{id}", delete(api::delete_member))
        // Ledger
        .route("/group/ledger", post(api::balance_update))
        .route("/group/ledger", get(api::list_ledger))
        .route("/group/me/balance", get(api::my_balance))
        .route("/group/me/ledger", get(api::my_ledger))
        // Activities
        .route("/group/activities", post(api::record_activity))
        .route("/group/activities", get(api::list_activities))
        .route("/group/activities/{name}", delete(api::remove_activity))
        // Apply session auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(repo.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
