use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use subtle::ConstantTimeEq;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::AppState;

pub mod handlers;

/// Build the full application router: public pages, health, metrics, and
/// the admin API under `/admin`.
pub fn app_router(state: Arc<AppState>) -> Router {
    let dashboard_origin = state.config.dashboard_origin.clone();

    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(handlers::metrics))
        // Public showcase
        .route("/projects", get(handlers::published_projects))
        .nest("/admin", admin_router(state.clone()))
        .fallback(fallback_404)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                    HeaderName::from_static("x-admin-key"),
                    HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

/// Admin routes, mounted under `/admin` by `app_router`.
fn admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", get(handlers::list_projects))
        .route("/projects/refresh", post(handlers::refresh_projects))
        .route("/projects/save", post(handlers::save_projects))
        .route(
            "/credentials",
            get(handlers::list_credentials).post(handlers::create_credential),
        )
        .route("/credentials/:id", delete(handlers::delete_credential))
        .route("/credentials/:id/enable", post(handlers::enable_credential))
        .layer(middleware::from_fn_with_state(state, admin_auth))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn readiness_check() -> &'static str {
    "ok"
}

/// Middleware: validates `X-Admin-Key` (or `Authorization: Bearer`) against the
/// configured admin key. 401 if missing or wrong, 500 if no key is configured.
async fn admin_auth(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided_key = req
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| t.trim())
        });

    let Some(expected) = state.config.admin_key.as_deref() else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "FOLIO_ADMIN_KEY is not set; admin API is unavailable"
        )));
    };

    match provided_key {
        Some(k) if bool::from(k.as_bytes().ct_eq(expected.as_bytes())) => Ok(next.run(req).await),
        Some(k) => {
            // Never log the expected key or the full provided key
            let masked = match (k.len() > 8).then(|| (k.get(..4), k.get(k.len() - 4..))) {
                Some((Some(head), Some(tail))) => format!("{}…{}", head, tail),
                _ => "****".to_string(),
            };
            tracing::warn!("admin API: invalid key (provided: '{}')", masked);
            Err(AppError::Unauthorized)
        }
        None => {
            tracing::warn!("admin API: missing X-Admin-Key header");
            Err(AppError::Unauthorized)
        }
    }
}

/// Middleware: injects a unique X-Request-Id into every response.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.remove("server");

    resp
}
