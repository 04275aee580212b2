use crate::handlers::{
    auth::{login, logout},
    health::health_check,
    users::{
        change_password, create_user, delete_user, get_user, get_users, me, replace_user,
        update_profile, update_user,
    },
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, patch, post},
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.settings.request_timeout_secs);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Session routes
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        // Current user actions
        .route("/api/v1/users/me", get(me))
        .route("/api/v1/users/update_profile", patch(update_profile))
        .route("/api/v1/users/change_password", post(change_password))
        // User CRUD routes
        .route("/api/v1/users", get(get_users).post(create_user))
        .route(
            "/api/v1/users/:user_id",
            get(get_user)
                .put(replace_user)
                .patch(update_user)
                .delete(delete_user),
        )
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Adds the Prometheus request metrics layer and its `/metrics` endpoint.
///
/// The metrics recorder is process-global, so this is only called once by
/// the server command and never from tests.
pub fn with_metrics(router: Router) -> Router {
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
    router
        .route("/metrics", get(|| async move { metric_handle.render() }))
        .layer(prometheus_layer)
}
