//! Outlet Tasks Backend
//!
//! REST backend for assigning recurring work to outlet staff, tracking
//! completion and overdue tasks, and pushing live notifications.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod notify;
mod reports;
mod status;
mod sweep;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use models::{NewUser, Role};
use notify::NotificationHub;
use status::BusinessCalendar;
use sweep::OverdueSweeper;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub hub: Arc<NotificationHub>,
    pub calendar: BusinessCalendar,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Repository, config: Config) -> Self {
        Self {
            repo: Arc::new(repo),
            hub: Arc::new(NotificationHub::new(config.notify_dedup_capacity)),
            calendar: BusinessCalendar::new(config.timezone),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Outlet Tasks Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Business timezone: {}", config.timezone);

    if !config.jwt_secret_configured {
        tracing::warn!("No token secret configured (TASKS_JWT_SECRET). Using the development secret!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let state = AppState::new(Repository::new(pool), config.clone());

    bootstrap_admin(&state).await?;

    // Background overdue sweep
    let sweeper = config.sweep_interval.map(|interval| {
        tracing::info!("Overdue sweep every {:?}", interval);
        let sweeper = OverdueSweeper::new(
            Arc::clone(&state.repo),
            state.calendar,
            Arc::clone(&state.hub),
            interval,
        );
        sweeper.start();
        sweeper
    });

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    if let Some(sweeper) = sweeper {
        sweeper.stop();
    }
    Ok(())
}

/// Create the configured admin account if it does not exist yet.
pub async fn bootstrap_admin(state: &AppState) -> Result<(), errors::AppError> {
    let (Some(email), Some(password)) = (&state.config.admin_email, &state.config.admin_password)
    else {
        if !state.repo.has_admin().await? {
            tracing::warn!(
                "No admin account exists; set TASKS_ADMIN_EMAIL and TASKS_ADMIN_PASSWORD to create one"
            );
        }
        return Ok(());
    };

    if state.repo.get_user_by_email(email).await?.is_some() {
        return Ok(());
    }

    auth::validate_new_password(password)?;
    let user = state
        .repo
        .create_user(&NewUser {
            email: email.clone(),
            name: "Administrator".to_string(),
            role: Role::Admin,
            outlet_id: None,
            password_hash: auth::hash_password(password)?,
        })
        .await?;
    tracing::info!(email = %user.email, "Created bootstrap admin account");
    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes behind the session middleware
    let protected_routes = Router::new()
        .route("/auth/me", get(api::me))
        // Users and positions
        .route("/users", get(api::list_users))
        .route("/positions", get(api::list_positions).post(api::create_position))
        .route("/positions/{id}", delete(api::delete_position))
        // Tasks
        .route("/tasks", get(api::list_tasks).post(api::create_task))
        .route(
            "/tasks/{id}",
            get(api::get_task)
                .put(api::update_task)
                .delete(api::delete_task),
        )
        // Assignments
        .route(
            "/assignments",
            get(api::list_assignments).post(api::create_assignment),
        )
        .route("/assignments/sweep-overdue", post(api::trigger_sweep))
        .route(
            "/assignments/{id}",
            get(api::get_assignment)
                .put(api::update_assignment)
                .delete(api::delete_assignment),
        )
        .route("/assignments/{id}/complete", post(api::complete_assignment))
        .route("/assignments/{id}/reschedule", post(api::request_reschedule))
        .route(
            "/assignments/{id}/reschedule/approve",
            post(api::approve_reschedule),
        )
        .route(
            "/assignments/{id}/reschedule/reject",
            post(api::reject_reschedule),
        )
        // Staff
        .route("/staff", get(api::list_staff).post(api::create_staff))
        .route(
            "/staff/{id}",
            get(api::get_staff)
                .put(api::update_staff)
                .delete(api::delete_staff),
        )
        // Outlets
        .route("/outlets", get(api::list_outlets).post(api::create_outlet))
        .route(
            "/outlets/{id}",
            get(api::get_outlet)
                .put(api::update_outlet)
                .delete(api::delete_outlet),
        )
        // Schedules
        .route(
            "/schedules",
            get(api::list_schedules).post(api::create_schedule),
        )
        .route(
            "/schedules/{id}",
            get(api::get_schedule).delete(api::delete_schedule),
        )
        .route("/schedules/{id}/days", put(api::update_schedule_days))
        // Invitations
        .route(
            "/invitations",
            get(api::list_invitations).post(api::create_invitation),
        )
        .route("/invitations/{id}", delete(api::delete_invitation))
        // Reports
        .route("/dashboard", get(api::get_dashboard))
        .route("/reports/leaderboard", get(api::get_leaderboard))
        // Realtime
        .route("/events", get(api::stream_events))
        .route("/revision", get(api::get_revision))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    // Public API routes
    let public_routes = Router::new()
        .route("/auth/login", post(api::login))
        .route("/auth/accept-invitation", post(api::accept_invitation));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", protected_routes.merge(public_routes))
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
