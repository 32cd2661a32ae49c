//! Chart and table view models
//!
//! The dashboard renders each metric as a chart spec or a table model.
//! Chart instances are never mutated in place: a reload drops the old
//! spec and installs a freshly built one, so no stale dataset can
//! survive a refresh.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sitepulse_core::{AnalyticsSnapshot, DailyPoint};
use std::collections::HashMap;

/// Placeholder row text for tables with no rows in range
pub const NO_DATA_PLACEHOLDER: &str = "No data available";

/// Chart rendering style
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Doughnut,
    Bar,
}

/// One labelled data series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// A fully built chart, ready to render
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// X-axis or slice labels
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl ChartSpec {
    /// Trend of daily views and visitors
    pub fn daily_trend(daily: &[DailyPoint]) -> Self {
        Self {
            kind: ChartKind::Line,
            labels: daily.iter().map(|p| p.date.clone()).collect(),
            datasets: vec![
                Dataset {
                    label: "Page Views".to_string(),
                    data: daily.iter().map(|p| p.views as f64).collect(),
                },
                Dataset {
                    label: "Unique Visitors".to_string(),
                    data: daily.iter().map(|p| p.visitors as f64).collect(),
                },
            ],
        }
    }

    /// Views per device category
    pub fn device_distribution(snapshot: &AnalyticsSnapshot) -> Self {
        Self {
            kind: ChartKind::Doughnut,
            labels: snapshot.devices.iter().map(|d| d.device.clone()).collect(),
            datasets: vec![Dataset {
                label: "Views".to_string(),
                data: snapshot.devices.iter().map(|d| d.views as f64).collect(),
            }],
        }
    }

    /// Most viewed pages, limited to the chart's page budget
    pub fn top_pages(snapshot: &AnalyticsSnapshot, limit: usize) -> Self {
        let pages = &snapshot.top_pages[..snapshot.top_pages.len().min(limit)];
        Self {
            kind: ChartKind::Bar,
            labels: pages.iter().map(|p| p.path.clone()).collect(),
            datasets: vec![Dataset {
                label: "Views".to_string(),
                data: pages.iter().map(|p| p.views as f64).collect(),
            }],
        }
    }
}

/// Table of per-page statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagesTable {
    pub rows: Vec<PagesTableRow>,
    /// Set when there are no rows in range
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagesTableRow {
    pub path: String,
    pub title: String,
    pub views: usize,
    pub visitors: usize,
    pub avg_views_per_visitor: f64,
}

impl PagesTable {
    pub fn from_snapshot(snapshot: &AnalyticsSnapshot) -> Self {
        let rows: Vec<PagesTableRow> = snapshot
            .top_pages
            .iter()
            .map(|p| PagesTableRow {
                path: p.path.clone(),
                title: p.title.clone(),
                views: p.views,
                visitors: p.visitors,
                avg_views_per_visitor: p.avg_views_per_visitor,
            })
            .collect();
        let placeholder = rows
            .is_empty()
            .then(|| NO_DATA_PLACEHOLDER.to_string());
        Self { rows, placeholder }
    }
}

/// Table of traffic sources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferrersTable {
    pub rows: Vec<ReferrersTableRow>,
    pub placeholder: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferrersTableRow {
    pub label: String,
    pub views: usize,
    pub percentage: f64,
}

impl ReferrersTable {
    pub fn from_snapshot(snapshot: &AnalyticsSnapshot) -> Self {
        let rows: Vec<ReferrersTableRow> = snapshot
            .top_referrers
            .iter()
            .map(|r| ReferrersTableRow {
                label: r.label.clone(),
                views: r.views,
                percentage: r.percentage,
            })
            .collect();
        let placeholder = rows
            .is_empty()
            .then(|| NO_DATA_PLACEHOLDER.to_string());
        Self { rows, placeholder }
    }
}

/// Holds the live chart for each slot.
///
/// `replace` removes the previous spec before installing the new one
/// and bumps a generation counter, making the swap observable to tests
/// and debuggers.
#[derive(Debug, Default)]
pub struct ChartRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    charts: HashMap<&'static str, ChartSpec>,
    generation: u64,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any chart in `slot`, then install `spec`
    pub fn replace(&self, slot: &'static str, spec: ChartSpec) {
        let mut inner = self.inner.write();
        inner.charts.remove(slot);
        inner.charts.insert(slot, spec);
        inner.generation += 1;
    }

    pub fn get(&self, slot: &str) -> Option<ChartSpec> {
        self.inner.read().charts.get(slot).cloned()
    }

    /// Monotonic count of replacements
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Remove every chart
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.charts.clear();
        inner.generation += 1;
    }
}
