mod alerts;
mod auth_handlers;
mod channels;
mod config;
mod dashboards;
mod error;
mod middleware;
mod queries;
mod roles;
mod state;
mod subscriptions;
mod users;

use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use config::Config;
use mitsume_core::models::{RegisterUserInput, Role, UserStatus, ADMIN_ROLE_NAME};
use mitsume_scheduler::SchedulerLoop;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use state::AppState;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;

    bootstrap_admin(&pool, &config).await?;

    let state = AppState::build(config, pool.clone()).await?;

    let scheduler = SchedulerLoop::new(pool, state.executor.clone(), state.router.clone(), mitsume_scheduler::SchedulerConfig {
        default_catalog: state.scheduler_config.default_catalog.clone(),
        default_schema: state.scheduler_config.default_schema.clone(),
    });
    let (alerts_handle, subscriptions_handle, scheduler_shutdown) = scheduler.spawn();

    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", state.config.server_port)).await?;
    tracing::info!("mitsume listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("http server drained, signalling scheduler shutdown");
    scheduler_shutdown.notify_waiters();
    let _ = tokio::join!(alerts_handle, subscriptions_handle);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}

/// Ensures the configured admin account exists and matches the configured
/// password, per spec §6: create-on-first-boot, verify-on-every-boot, abort
/// on drift. A no-op if no admin password is configured.
async fn bootstrap_admin(pool: &PgPool, config: &Config) -> anyhow::Result<()> {
    let (username, password) = match (&config.admin_username, &config.admin_password) {
        (Some(u), Some(p)) => (u, p),
        _ => {
            tracing::info!("no admin bootstrap credentials configured, skipping");
            return Ok(());
        }
    };

    if mitsume_auth::password::code_point_len(password) < config.admin_password_min_length {
        anyhow::bail!(
            "MITSUME_ADMIN_PASSWORD is shorter than the configured minimum of {} characters",
            config.admin_password_min_length
        );
    }

    let admin_role = ensure_admin_role(pool).await?;

    match mitsume_core::repository::get_user_by_identifier(pool, username).await? {
        Some(existing) => {
            let verified = mitsume_auth::verify_password(password, &existing.password_hash)?;
            if !verified {
                anyhow::bail!("MITSUME_ADMIN_PASSWORD does not match the stored hash for admin user '{}'", username);
            }
            tracing::info!("admin bootstrap: existing user '{}' verified", username);
        }
        None => {
            let password_hash = mitsume_auth::hash_password(password)?;
            let input = RegisterUserInput {
                email: None,
                username: Some(username.clone()),
                password: password.clone(),
                display_name: username.clone(),
            };
            let user = mitsume_core::repository::create_user(pool, input, password_hash, UserStatus::Active).await?;
            mitsume_core::repository::assign_role(pool, user.id, admin_role.id, user.id).await?;
            tracing::info!("admin bootstrap: created user '{}' with the admin role", username);
        }
    }

    Ok(())
}

async fn ensure_admin_role(pool: &PgPool) -> anyhow::Result<Role> {
    if let Some(role) = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
        .bind(ADMIN_ROLE_NAME)
        .fetch_optional(pool)
        .await?
    {
        return Ok(role);
    }

    let role = sqlx::query_as::<_, Role>(
        "INSERT INTO roles (id, name, description, is_system, created_at, updated_at) \
         VALUES ($1, $2, 'built-in administrator role', true, now(), now()) RETURNING *",
    )
    .bind(uuid::Uuid::new_v4())
    .bind(ADMIN_ROLE_NAME)
    .fetch_one(pool)
    .await?;
    Ok(role)
}

fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any);

    let public_auth_routes = Router::new()
        .route("/login", post(auth_handlers::login))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit_login))
        .merge(
            Router::new()
                .route("/register", post(auth_handlers::register))
                .route("/google", get(auth_handlers::google_start))
                .route("/google/callback", get(auth_handlers::google_callback))
                .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit_public)),
        );

    let authenticated_auth_routes =
        require_auth(Router::new().route("/me", get(auth_handlers::me)), &state);

    let auth_routes = public_auth_routes.merge(authenticated_auth_routes);

    let query_routes = require_auth(
        Router::new()
            .route("/execute", post(queries::execute))
            .route("/history", get(queries::history))
            .route("/saved", get(queries::list_saved_queries).post(queries::create_saved_query))
            .route(
                "/saved/{id}",
                get(queries::get_saved_query).put(queries::update_saved_query).delete(queries::delete_saved_query),
            ),
        &state,
    );

    let catalog_routes = require_auth(
        Router::new()
            .route("/", get(queries::list_catalogs))
            .route("/search", get(queries::search_metadata))
            .route("/{catalog}/schemas", get(queries::list_schemas))
            .route("/{catalog}/schemas/{schema}/tables", get(queries::list_tables))
            .route("/{catalog}/schemas/{schema}/tables/{table}/columns", get(queries::list_columns)),
        &state,
    );

    let dashboard_routes = require_auth(
        Router::new()
            .route("/", get(dashboards::list_dashboards).post(dashboards::create_dashboard))
            .route(
                "/{id}",
                get(dashboards::get_dashboard).put(dashboards::update_dashboard).delete(dashboards::delete_dashboard),
            )
            .route("/{id}/save-draft", post(dashboards::save_as_draft))
            .route("/{id}/publish", post(dashboards::publish_draft))
            .route("/{id}/widgets", get(dashboards::list_widgets).post(dashboards::create_widget))
            .route("/{id}/widgets/batch", post(dashboards::batch_widgets))
            .route(
                "/{id}/widgets/{widget_id}",
                put(dashboards::update_widget).delete(dashboards::delete_widget),
            )
            .route("/{id}/permissions", get(dashboards::list_permissions).post(dashboards::grant_permission))
            .route("/{id}/permissions/{permission_id}", delete(dashboards::revoke_permission)),
        &state,
    );

    let alert_routes = require_auth(
        Router::new()
            .route("/", get(alerts::list_alerts).post(alerts::create_alert))
            .route("/{id}", get(alerts::get_alert).put(alerts::update_alert).delete(alerts::delete_alert))
            .route("/{id}/test", post(alerts::test_alert))
            .route("/{id}/history", get(alerts::alert_history)),
        &state,
    );

    let subscription_routes = require_auth(
        Router::new()
            .route("/", get(subscriptions::list_subscriptions).post(subscriptions::create_subscription))
            .route(
                "/{id}",
                get(subscriptions::get_subscription)
                    .put(subscriptions::update_subscription)
                    .delete(subscriptions::delete_subscription),
            )
            .route("/{id}/trigger", post(subscriptions::trigger_subscription)),
        &state,
    );

    let channel_routes = require_auth(
        Router::new()
            .route("/", get(channels::list_channels).post(channels::create_channel))
            .route("/{id}", get(channels::get_channel).put(channels::update_channel).delete(channels::delete_channel))
            .route("/{id}/test", post(channels::test_channel)),
        &state,
    );

    let role_routes = require_auth(
        Router::new()
            .route("/", get(roles::list_roles).post(roles::create_role))
            .route("/{id}", put(roles::update_role).delete(roles::delete_role))
            .route("/{id}/catalogs", put(roles::set_role_catalogs)),
        &state,
    );

    let user_routes = require_auth(
        Router::new()
            .route("/", get(users::list_users))
            .route("/{id}/approve", post(users::approve_user))
            .route("/{id}/disable", post(users::disable_user))
            .route("/{id}/enable", post(users::enable_user))
            .route("/{id}/roles", get(roles::list_user_roles).post(roles::assign_user_role))
            .route("/{id}/roles/{role_id}", delete(roles::unassign_user_role)),
        &state,
    );

    Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth_routes)
        .nest("/queries", query_routes)
        .nest("/catalogs", catalog_routes)
        .nest("/dashboards", dashboard_routes)
        .nest("/alerts", alert_routes)
        .nest("/subscriptions", subscription_routes)
        .nest("/notification-channels", channel_routes)
        .nest("/roles", role_routes)
        .nest("/users", user_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Every authenticated route gets the identity check (outer) and the
/// per-user rate limiter (inner) in that order, since `rate_limit_api`
/// reads the `AuthUser` extension `auth_middleware` inserts.
fn require_auth(router: Router<Arc<AppState>>, state: &Arc<AppState>) -> Router<Arc<AppState>> {
    router
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit_api))
        .route_layer(axum::middleware::from_fn_with_state(state.pool.clone(), mitsume_auth::auth_middleware))
}

async fn health_check() -> &'static str {
    "ok"
}
