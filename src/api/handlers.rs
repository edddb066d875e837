use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::credential::CredentialMeta;
use crate::models::project::{ProjectRecord, ProjectSettings};
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct RefreshForm {
    #[serde(default)]
    pub github_user: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    /// Repository names written by this run. Empty when no identifier was given.
    pub synced: Vec<String>,
    pub projects: Vec<ProjectRecord>,
}

#[derive(Deserialize)]
pub struct CreateCredentialRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct CreateCredentialResponse {
    pub inserted: bool,
}

// ── Projects ─────────────────────────────────────────────────

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProjectRecord>>, AppError> {
    let projects = state
        .stores
        .projects
        .list_projects()
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(projects))
}

/// Sync projects from GitHub, then return the full admin listing.
/// A blank `github_user` skips the sync.
pub async fn refresh_projects(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RefreshForm>,
) -> Result<Json<RefreshResponse>, AppError> {
    let identifier = form.github_user.trim();

    let synced = if identifier.is_empty() {
        Vec::new()
    } else {
        state.sync.refresh(identifier).await?.synced
    };

    let projects = state
        .stores
        .projects
        .list_projects()
        .await
        .map_err(AppError::Persistence)?;

    Ok(Json(RefreshResponse { synced, projects }))
}

/// Apply the admin's publish toggles and link overrides.
pub async fn save_projects(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<Vec<ProjectSettings>>,
) -> Result<Json<Vec<ProjectRecord>>, AppError> {
    for s in &settings {
        let found = state
            .stores
            .projects
            .update_project_settings(s)
            .await
            .map_err(AppError::Persistence)?;
        if !found {
            return Err(AppError::NotFound(format!("project {}", s.id)));
        }
    }
    tracing::info!(count = settings.len(), "saved project settings");

    let projects = state
        .stores
        .projects
        .list_projects()
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(projects))
}

/// Public showcase: enabled projects only.
pub async fn published_projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProjectRecord>>, AppError> {
    let projects = state
        .stores
        .projects
        .list_published_projects()
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(projects))
}

// ── Credentials ──────────────────────────────────────────────

pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CredentialMeta>>, AppError> {
    let creds = state
        .stores
        .credentials
        .list()
        .await
        .map_err(AppError::Persistence)?;
    Ok(Json(creds.iter().map(|c| c.meta()).collect()))
}

pub async fn create_credential(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCredentialRequest>,
) -> Result<(StatusCode, Json<CreateCredentialResponse>), AppError> {
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("token must not be empty".into()));
    }

    let inserted = state
        .stores
        .credentials
        .seed_tokens(&[token.to_string()])
        .await
        .map_err(AppError::Persistence)?
        > 0;

    let fingerprint = crate::models::credential::fingerprint(token);
    if inserted {
        tracing::info!(credential = %fingerprint, "credential added");
        Ok((StatusCode::CREATED, Json(CreateCredentialResponse { inserted })))
    } else {
        tracing::info!(credential = %fingerprint, "credential already present");
        Ok((StatusCode::OK, Json(CreateCredentialResponse { inserted })))
    }
}

pub async fn enable_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let found = state
        .stores
        .credentials
        .enable(id)
        .await
        .map_err(AppError::Persistence)?;
    if !found {
        return Err(AppError::NotFound(format!("credential {}", id)));
    }
    tracing::info!(credential_id = id, "credential re-enabled");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_credential(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let found = state
        .stores
        .credentials
        .remove(id)
        .await
        .map_err(AppError::Persistence)?;
    if !found {
        return Err(AppError::NotFound(format!("credential {}", id)));
    }
    tracing::info!(credential_id = id, "credential removed");
    Ok(StatusCode::NO_CONTENT)
}

// ── Metrics ──────────────────────────────────────────────────

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.encode(),
    )
}
