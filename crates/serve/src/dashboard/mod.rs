//! Analytics dashboard module
//!
//! Serves the tracking endpoint and the admin-gated reporting API, and
//! keeps the dashboard's chart and table models current.
//!
//! # Architecture
//!
//! - `charts`: chart specs, table models, and the replace-only registry
//! - `controller`: dashboard state, range reloads, active-user refresh
//! - `handlers`: HTTP API handlers and the admin gate
//!
//! # Endpoints
//!
//! ## POST /track
//!
//! Record one page view:
//!
//! ```text
//! POST /api/analytics/track
//! Content-Type: application/json
//!
//! {
//!   "session_id": "session_1756400000000_k3f9x2m1q",
//!   "path": "/services",
//!   "title": "Services",
//!   "referrer": "https://search.example/",
//!   "user_agent": "Mozilla/5.0 ...",
//!   "screen_width": 1920,
//!   "screen_height": 1080
//! }
//! ```
//!
//! ## GET /report?days=N
//!
//! Rebuild and return the dashboard snapshot for the last N days.
//! Requires an admin bearer token when an auth client is configured.
//!
//! ## GET /active
//!
//! Count of sessions with a view in the last five minutes.

pub mod charts;
pub mod controller;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

pub use charts::{
    ChartKind, ChartRegistry, ChartSpec, Dataset, PagesTable, PagesTableRow, ReferrersTable,
    ReferrersTableRow, NO_DATA_PLACEHOLDER,
};
pub use controller::{
    DashboardController, SLOT_DAILY_TREND, SLOT_DEVICES, SLOT_TOP_PAGES,
};
pub use handlers::{
    ActiveUsersResponse, DashboardError, DashboardState, ReportParams, TrackRequest,
    TrackResponse,
};

/// Creates dashboard routes
pub fn dashboard_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/track", post(handlers::handle_track))
        .route("/report", get(handlers::handle_report))
        .route("/active", get(handlers::handle_active_users))
        .with_state(state)
}
