//! Dashboard API handlers
//!
//! HTTP handlers for the tracking endpoint and the admin-gated
//! reporting endpoints.

use super::controller::DashboardController;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sitepulse_core::{
    build_event, record_event, AnalyticsSnapshot, AuthClient, EventStore, PageContext, Readiness,
    ScreenSize, SitepulseError,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared dashboard state
#[derive(Clone)]
pub struct DashboardState {
    pub store: Arc<dyn EventStore>,
    pub readiness: Readiness,
    pub controller: Arc<DashboardController>,
    /// When absent, the admin gate is disabled
    pub auth: Option<Arc<AuthClient>>,
    /// Redirect target for non-admin visitors
    pub sign_in_path: String,
}

/// One page view as reported by a tracking client.
///
/// The session id is minted client-side; the server classifies the
/// user agent and stamps the view time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRequest {
    pub session_id: String,
    #[serde(default)]
    pub url: String,
    pub path: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub screen_width: u32,
    #[serde(default)]
    pub screen_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportParams {
    /// Date range in days; the controller default applies when absent
    pub days: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveUsersResponse {
    pub active_users: usize,
}

/// Handles `POST /track`.
///
/// Tracking must never surface a hard failure to the page being
/// tracked: before the store is ready, or when the insert fails, the
/// response still carries `200 OK` with `success: false`.
pub async fn handle_track(
    State(state): State<DashboardState>,
    Json(request): Json<TrackRequest>,
) -> Json<TrackResponse> {
    if !state.readiness.is_ready() {
        warn!("analytics: event store not initialized, dropping page view");
        return Json(TrackResponse {
            success: false,
            error: Some("event store not initialized".to_string()),
        });
    }

    let ctx = PageContext {
        url: request.url,
        path: request.path,
        title: request.title,
        referrer: request.referrer,
        user_agent: request.user_agent,
        screen: ScreenSize {
            width: request.screen_width,
            height: request.screen_height,
        },
    };
    let event = build_event(&ctx, request.session_id);

    match record_event(state.store.as_ref(), event).await {
        Ok(()) => {
            debug!(path = %ctx.path, "page view tracked");
            Json(TrackResponse {
                success: true,
                error: None,
            })
        }
        Err(e) => {
            warn!("analytics tracking error: {}", e);
            Json(TrackResponse {
                success: false,
                error: Some(e.to_string()),
            })
        }
    }
}

/// Handles `GET /report?days=N`. Admin only.
pub async fn handle_report(
    State(state): State<DashboardState>,
    headers: HeaderMap,
    Query(params): Query<ReportParams>,
) -> Result<Json<AnalyticsSnapshot>, DashboardError> {
    require_admin(&state, &headers).await?;

    let days = params.days.unwrap_or_else(|| state.controller.range_days());
    if days <= 0 {
        return Err(DashboardError::InvalidRequest(
            "days must be positive".to_string(),
        ));
    }

    let snapshot = state.controller.load(days).await.map_err(|e| match e {
        e @ SitepulseError::Validation { .. } => DashboardError::InvalidRequest(e.to_string()),
        e => DashboardError::InternalError(e.to_string()),
    })?;
    Ok(Json(snapshot))
}

/// Handles `GET /active`. Admin only.
pub async fn handle_active_users(
    State(state): State<DashboardState>,
    headers: HeaderMap,
) -> Result<Json<ActiveUsersResponse>, DashboardError> {
    require_admin(&state, &headers).await?;

    let active_users = state
        .controller
        .refresh_active_users()
        .await
        .map_err(|e| DashboardError::InternalError(e.to_string()))?;
    Ok(Json(ActiveUsersResponse { active_users }))
}

/// Resolve the bearer token to a profile and require the admin role.
///
/// Without a configured auth client the gate is open (local and test
/// deployments). A missing token or a non-admin profile redirects to
/// the sign-in page; a token the backend rejects gets `401`.
async fn require_admin(state: &DashboardState, headers: &HeaderMap) -> Result<(), DashboardError> {
    let Some(auth) = &state.auth else {
        return Ok(());
    };

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Err(DashboardError::SignInRequired(state.sign_in_path.clone()));
    };

    let user = auth
        .current_user(token)
        .await
        .map_err(|e| DashboardError::Unauthorized(e.to_string()))?;
    let profile = auth
        .get_profile(user.id)
        .await
        .map_err(|e| DashboardError::Unauthorized(e.to_string()))?;

    if !profile.is_admin() {
        debug!(user_id = %user.id, "non-admin dashboard access refused");
        return Err(DashboardError::SignInRequired(state.sign_in_path.clone()));
    }
    Ok(())
}

/// Dashboard handler errors
#[derive(Debug)]
pub enum DashboardError {
    /// Invalid request
    InvalidRequest(String),
    /// Credentials the backend rejected
    Unauthorized(String),
    /// No usable credentials or not an admin; redirect to sign-in
    SignInRequired(String),
    /// Internal error
    InternalError(String),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        match self {
            DashboardError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            DashboardError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response()
            }
            DashboardError::SignInRequired(path) => Redirect::to(&path).into_response(),
            DashboardError::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": msg })),
            )
                .into_response(),
        }
    }
}
