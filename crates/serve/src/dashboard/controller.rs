//! Dashboard controller
//!
//! Owns every piece of dashboard state: the chart registry, the table
//! models, the selected date range and the live active-user counter.
//! A range change or manual reload rebuilds everything from a fresh
//! snapshot; a background task keeps the active-user count current.

use super::charts::{ChartRegistry, ChartSpec, PagesTable, ReferrersTable};
use parking_lot::RwLock;
use sitepulse_core::{AnalyticsAggregator, AnalyticsSnapshot, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Chart slot names
pub const SLOT_DAILY_TREND: &str = "daily_trend";
pub const SLOT_DEVICES: &str = "devices";
pub const SLOT_TOP_PAGES: &str = "top_pages";

/// Coordinates loads and refreshes for one dashboard instance
pub struct DashboardController {
    aggregator: AnalyticsAggregator,
    registry: Arc<ChartRegistry>,
    state: Arc<RwLock<ControllerState>>,
    refresh_task: RwLock<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct ControllerState {
    range_days: i64,
    snapshot: Option<AnalyticsSnapshot>,
    pages_table: Option<PagesTable>,
    referrers_table: Option<ReferrersTable>,
    active_users: usize,
}

impl DashboardController {
    pub fn new(aggregator: AnalyticsAggregator, default_range_days: i64) -> Self {
        Self {
            aggregator,
            registry: Arc::new(ChartRegistry::new()),
            state: Arc::new(RwLock::new(ControllerState {
                range_days: default_range_days,
                ..ControllerState::default()
            })),
            refresh_task: RwLock::new(None),
        }
    }

    pub fn registry(&self) -> &ChartRegistry {
        &self.registry
    }

    pub fn range_days(&self) -> i64 {
        self.state.read().range_days
    }

    pub fn active_users(&self) -> usize {
        self.state.read().active_users
    }

    pub fn snapshot(&self) -> Option<AnalyticsSnapshot> {
        self.state.read().snapshot.clone()
    }

    pub fn pages_table(&self) -> Option<PagesTable> {
        self.state.read().pages_table.clone()
    }

    pub fn referrers_table(&self) -> Option<ReferrersTable> {
        self.state.read().referrers_table.clone()
    }

    /// Reload everything for a new date range.
    ///
    /// The snapshot query runs first; on failure nothing on screen
    /// changes. On success every chart is replaced, never mutated.
    pub async fn load(&self, range_days: i64) -> Result<AnalyticsSnapshot> {
        let snapshot = self.aggregator.snapshot(range_days).await?;
        debug!(range_days, views = snapshot.total_page_views, "dashboard reload");

        self.registry
            .replace(SLOT_DAILY_TREND, ChartSpec::daily_trend(&snapshot.daily));
        self.registry
            .replace(SLOT_DEVICES, ChartSpec::device_distribution(&snapshot));
        self.registry.replace(
            SLOT_TOP_PAGES,
            ChartSpec::top_pages(&snapshot, self.aggregator.top_pages_chart_limit()),
        );

        let mut state = self.state.write();
        state.range_days = range_days;
        state.pages_table = Some(PagesTable::from_snapshot(&snapshot));
        state.referrers_table = Some(ReferrersTable::from_snapshot(&snapshot));
        state.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Recount sessions active in the last few minutes
    pub async fn refresh_active_users(&self) -> Result<usize> {
        let count = self.aggregator.active_users().await?;
        self.state.write().active_users = count;
        Ok(count)
    }

    /// Start the periodic active-user refresh.
    ///
    /// A second call replaces the previous task. Failures are logged
    /// and the loop keeps going.
    pub fn spawn_active_refresh(&self, interval: Duration) {
        let aggregator = self.aggregator.clone();
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match aggregator.active_users().await {
                    Ok(count) => state.write().active_users = count,
                    Err(e) => warn!("active user refresh failed: {}", e),
                }
            }
        });

        if let Some(previous) = self.refresh_task.write().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the refresh task and drop all rendered state
    pub fn dispose(&self) {
        if let Some(task) = self.refresh_task.write().take() {
            task.abort();
        }
        self.registry.clear();
        let mut state = self.state.write();
        state.snapshot = None;
        state.pages_table = None;
        state.referrers_table = None;
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.write().take() {
            task.abort();
        }
    }
}
