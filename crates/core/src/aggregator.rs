//! Analytics aggregation
//!
//! Computes derived metrics from a time-windowed set of page-view rows:
//! overview counters, a daily trend series, device distribution, top
//! pages, and top referrers. Aggregation is a full recompute on every
//! query; no state is held between calls, and the heavy lifting lives in
//! a pure function so it can be tested without a backend.

use crate::store::{EventQuery, EventStore};
use crate::types::PageViewEvent;
use crate::{Result, SitepulseError};
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Display label for views with no referrer
pub const DIRECT_REFERRER_LABEL: &str = "Direct (No Referrer)";

/// Aggregator configuration
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Pages shown on the top-pages chart
    pub top_pages_chart: usize,
    /// Pages shown in the top-pages table
    pub top_pages_table: usize,
    /// Referrers shown in the referrers table
    pub top_referrers: usize,
    /// Window for the active-user count
    pub active_window: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            top_pages_chart: 5,
            top_pages_table: 10,
            top_referrers: 10,
            active_window: Duration::minutes(5),
        }
    }
}

/// One day of the visitor trend series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyPoint {
    /// Calendar date label, `%Y-%m-%d`
    pub date: String,
    pub views: usize,
    /// Distinct session ids seen that day
    pub visitors: usize,
}

/// One slice of the device distribution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSlice {
    /// Capitalized device label; `"Unknown"` for rows without one
    pub device: String,
    pub views: usize,
}

/// Per-page statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageStats {
    pub path: String,
    /// Title from the first event seen for this path
    pub title: String,
    pub views: usize,
    pub visitors: usize,
    /// `views / visitors`, 2 decimals
    pub avg_views_per_visitor: f64,
}

/// Per-referrer statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferrerStats {
    pub referrer: String,
    /// Display label; `"direct"` gets a distinguished one
    pub label: String,
    pub views: usize,
    /// `views / total * 100`, 1 decimal
    pub percentage: f64,
}

/// Full set of derived metrics for one date range.
///
/// Never persisted; recomputed from the raw query result on every load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSnapshot {
    /// Date range this snapshot covers, in days back from now
    pub range_days: i64,
    pub total_page_views: usize,
    pub unique_visitors: usize,
    /// `total / unique`, 2 decimals; 0 when there are no visitors
    pub avg_pages_per_visitor: f64,
    pub daily: Vec<DailyPoint>,
    pub devices: Vec<DeviceSlice>,
    /// Sorted descending by views; length bounded by the table limit
    pub top_pages: Vec<PageStats>,
    /// Sorted descending by views; length bounded by the referrer limit
    pub top_referrers: Vec<ReferrerStats>,
    pub generated_at: DateTime<Utc>,
}

/// Analytics aggregator over an event store
#[derive(Clone)]
pub struct AnalyticsAggregator {
    store: Arc<dyn EventStore>,
    config: AggregatorConfig,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn EventStore>, config: AggregatorConfig) -> Self {
        Self { store, config }
    }

    /// Aggregator with default limits
    pub fn with_defaults(store: Arc<dyn EventStore>) -> Self {
        Self::new(store, AggregatorConfig::default())
    }

    /// Query the last `range_days` days of events and aggregate them.
    ///
    /// A query failure aborts the load; no partial snapshot is produced.
    /// Ranges that are non-positive or overflow the datetime domain are
    /// rejected as validation errors.
    pub async fn snapshot(&self, range_days: i64) -> Result<AnalyticsSnapshot> {
        let start = Duration::try_days(range_days)
            .filter(|_| range_days > 0)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                SitepulseError::validation(format!("date range out of bounds: {} days", range_days))
            })?;
        let events = self.store.query_page_views(&EventQuery::since(start)).await?;
        debug!(rows = events.len(), range_days, "aggregating analytics");
        Ok(self.aggregate(&events, range_days))
    }

    /// Count distinct sessions with a view inside the active window
    pub async fn active_users(&self) -> Result<usize> {
        let since = Utc::now() - self.config.active_window;
        let events = self.store.query_page_views(&EventQuery::since(since)).await?;
        let sessions: HashSet<&str> = events.iter().map(|e| e.session_id.as_str()).collect();
        Ok(sessions.len())
    }

    /// Pure aggregation over an already-fetched window of events
    pub fn aggregate(&self, events: &[PageViewEvent], range_days: i64) -> AnalyticsSnapshot {
        let total_page_views = events.len();
        let unique_visitors: usize = events
            .iter()
            .map(|e| e.session_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        let avg_pages_per_visitor = if unique_visitors > 0 {
            round2(total_page_views as f64 / unique_visitors as f64)
        } else {
            0.0
        };

        AnalyticsSnapshot {
            range_days,
            total_page_views,
            unique_visitors,
            avg_pages_per_visitor,
            daily: daily_series(events),
            devices: device_distribution(events),
            top_pages: top_pages(events, self.config.top_pages_table),
            top_referrers: top_referrers(events, self.config.top_referrers),
            generated_at: Utc::now(),
        }
    }

    /// Chart limit for top pages (the table keeps more rows)
    pub fn top_pages_chart_limit(&self) -> usize {
        self.config.top_pages_chart
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Group by calendar date; labels sort ascending by date string
fn daily_series(events: &[PageViewEvent]) -> Vec<DailyPoint> {
    let mut buckets: IndexMap<String, (usize, HashSet<&str>)> = IndexMap::new();
    for event in events {
        let date = event.viewed_at.format("%Y-%m-%d").to_string();
        let bucket = buckets.entry(date).or_default();
        bucket.0 += 1;
        bucket.1.insert(event.session_id.as_str());
    }

    let mut points: Vec<DailyPoint> = buckets
        .into_iter()
        .map(|(date, (views, visitors))| DailyPoint {
            date,
            views,
            visitors: visitors.len(),
        })
        .collect();
    points.sort_by(|a, b| a.date.cmp(&b.date));
    points
}

/// Count views per device category, `"Unknown"` when the row has none
fn device_distribution(events: &[PageViewEvent]) -> Vec<DeviceSlice> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for event in events {
        let label = event.device_type.map(|d| d.label()).unwrap_or("Unknown");
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(device, views)| DeviceSlice {
            device: device.to_string(),
            views,
        })
        .collect()
}

/// Per-path stats, sorted descending by views, truncated to `limit`
fn top_pages(events: &[PageViewEvent], limit: usize) -> Vec<PageStats> {
    struct PathBucket<'a> {
        title: &'a str,
        views: usize,
        visitors: HashSet<&'a str>,
    }

    let mut buckets: IndexMap<&str, PathBucket<'_>> = IndexMap::new();
    for event in events {
        let bucket = buckets
            .entry(event.page_path.as_str())
            .or_insert_with(|| PathBucket {
                title: &event.page_title,
                views: 0,
                visitors: HashSet::new(),
            });
        bucket.views += 1;
        bucket.visitors.insert(event.session_id.as_str());
    }

    let mut pages: Vec<PageStats> = buckets
        .into_iter()
        .map(|(path, bucket)| {
            let visitors = bucket.visitors.len();
            PageStats {
                path: path.to_string(),
                title: bucket.title.to_string(),
                views: bucket.views,
                visitors,
                avg_views_per_visitor: if visitors > 0 {
                    round2(bucket.views as f64 / visitors as f64)
                } else {
                    0.0
                },
            }
        })
        .collect();
    pages.sort_by(|a, b| b.views.cmp(&a.views));
    pages.truncate(limit);
    pages
}

/// Per-referrer counts with percentage of the untruncated total
fn top_referrers(events: &[PageViewEvent], limit: usize) -> Vec<ReferrerStats> {
    let total = events.len();
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for event in events {
        let referrer = if event.referrer.is_empty() {
            "direct"
        } else {
            event.referrer.as_str()
        };
        *counts.entry(referrer).or_insert(0) += 1;
    }

    let mut referrers: Vec<ReferrerStats> = counts
        .into_iter()
        .map(|(referrer, views)| ReferrerStats {
            label: if referrer == "direct" {
                DIRECT_REFERRER_LABEL.to_string()
            } else {
                referrer.to_string()
            },
            referrer: referrer.to_string(),
            views,
            percentage: if total > 0 {
                round1(views as f64 / total as f64 * 100.0)
            } else {
                0.0
            },
        })
        .collect();
    referrers.sort_by(|a, b| b.views.cmp(&a.views));
    referrers.truncate(limit);
    referrers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::DeviceType;

    fn event(session: &str, path: &str, referrer: &str, at: DateTime<Utc>) -> PageViewEvent {
        PageViewEvent {
            session_id: session.to_string(),
            page_path: path.to_string(),
            page_title: format!("Title of {}", path),
            referrer: referrer.to_string(),
            browser: "Chrome".to_string(),
            device_type: Some(DeviceType::Desktop),
            screen_width: 1920,
            screen_height: 1080,
            viewed_at: at,
        }
    }

    fn aggregator() -> AnalyticsAggregator {
        AnalyticsAggregator::with_defaults(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_snapshot_rejects_out_of_bounds_range() {
        let agg = aggregator();

        assert!(agg.snapshot(i64::MAX).await.is_err());
        assert!(agg.snapshot(0).await.is_err());
        assert!(agg.snapshot(-7).await.is_err());
        assert!(agg.snapshot(30).await.is_ok());
    }

    #[test]
    fn test_empty_window_all_zeros() {
        let snapshot = aggregator().aggregate(&[], 30);

        assert_eq!(snapshot.total_page_views, 0);
        assert_eq!(snapshot.unique_visitors, 0);
        assert_eq!(snapshot.avg_pages_per_visitor, 0.0);
        assert!(snapshot.daily.is_empty());
        assert!(snapshot.devices.is_empty());
        assert!(snapshot.top_pages.is_empty());
        assert!(snapshot.top_referrers.is_empty());
    }

    #[test]
    fn test_ten_views_two_sessions_one_day() {
        let now = Utc::now();
        let events: Vec<PageViewEvent> = (0..10)
            .map(|i| {
                let session = if i % 2 == 0 { "s1" } else { "s2" };
                event(session, "/", "direct", now)
            })
            .collect();

        let snapshot = aggregator().aggregate(&events, 30);

        assert_eq!(snapshot.total_page_views, 10);
        assert_eq!(snapshot.unique_visitors, 2);
        assert_eq!(snapshot.avg_pages_per_visitor, 5.0);
        assert_eq!(snapshot.daily.len(), 1);
        assert_eq!(snapshot.daily[0].views, 10);
        assert_eq!(snapshot.daily[0].visitors, 2);
    }

    #[test]
    fn test_avg_rounded_to_two_decimals() {
        let now = Utc::now();
        let events = vec![
            event("s1", "/", "direct", now),
            event("s1", "/a", "direct", now),
            event("s2", "/", "direct", now),
            event("s3", "/", "direct", now),
        ];

        let snapshot = aggregator().aggregate(&events, 7);
        // 4 / 3 = 1.333... -> 1.33
        assert_eq!(snapshot.avg_pages_per_visitor, 1.33);
    }

    #[test]
    fn test_daily_labels_sorted_ascending() {
        let day = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .unwrap()
                .with_timezone(&Utc)
        };
        let events = vec![
            event("s1", "/", "direct", day("2026-08-03T10:00:00Z")),
            event("s1", "/", "direct", day("2026-08-01T10:00:00Z")),
            event("s2", "/", "direct", day("2026-08-02T10:00:00Z")),
        ];

        let snapshot = aggregator().aggregate(&events, 30);
        let labels: Vec<&str> = snapshot.daily.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(labels, vec!["2026-08-01", "2026-08-02", "2026-08-03"]);
    }

    #[test]
    fn test_device_distribution_with_unknown() {
        let now = Utc::now();
        let mut events = vec![event("s1", "/", "direct", now); 2];
        events[1].device_type = Some(DeviceType::Mobile);
        let mut legacy = event("s2", "/", "direct", now);
        legacy.device_type = None;
        events.push(legacy);

        let snapshot = aggregator().aggregate(&events, 30);
        let find = |label: &str| {
            snapshot
                .devices
                .iter()
                .find(|d| d.device == label)
                .map(|d| d.views)
        };
        assert_eq!(find("Desktop"), Some(1));
        assert_eq!(find("Mobile"), Some(1));
        assert_eq!(find("Unknown"), Some(1));
    }

    #[test]
    fn test_top_pages_sorted_and_limited() {
        let now = Utc::now();
        let mut events = Vec::new();
        // 12 distinct paths; path i gets i+1 views
        for i in 0..12 {
            for _ in 0..=i {
                events.push(event("s1", &format!("/page-{}", i), "direct", now));
            }
        }

        let snapshot = aggregator().aggregate(&events, 30);
        assert_eq!(snapshot.top_pages.len(), 10);
        assert_eq!(snapshot.top_pages[0].path, "/page-11");
        assert_eq!(snapshot.top_pages[0].views, 12);
        assert!(snapshot
            .top_pages
            .windows(2)
            .all(|w| w[0].views >= w[1].views));
    }

    #[test]
    fn test_page_avg_views_per_visitor() {
        let now = Utc::now();
        let events = vec![
            event("s1", "/", "direct", now),
            event("s1", "/", "direct", now),
            event("s1", "/", "direct", now),
            event("s2", "/", "direct", now),
        ];

        let snapshot = aggregator().aggregate(&events, 30);
        let page = &snapshot.top_pages[0];
        assert_eq!(page.views, 4);
        assert_eq!(page.visitors, 2);
        assert_eq!(page.avg_views_per_visitor, 2.0);
        assert_eq!(page.title, "Title of /");
    }

    #[test]
    fn test_referrer_percentages() {
        let now = Utc::now();
        let mut events = Vec::new();
        for _ in 0..7 {
            events.push(event("s1", "/", "direct", now));
        }
        for _ in 0..3 {
            events.push(event("s2", "/", "https://search.example", now));
        }

        let snapshot = aggregator().aggregate(&events, 30);
        assert_eq!(snapshot.top_referrers[0].referrer, "direct");
        assert_eq!(snapshot.top_referrers[0].label, DIRECT_REFERRER_LABEL);
        assert_eq!(snapshot.top_referrers[0].percentage, 70.0);
        assert_eq!(snapshot.top_referrers[1].percentage, 30.0);
    }

    #[test]
    fn test_referrer_percentages_truncation_sums_below_total() {
        let now = Utc::now();
        let mut events = Vec::new();
        // 12 distinct referrers, 1 view each; top 10 covers 10/12 of views
        for i in 0..12 {
            events.push(event("s1", "/", &format!("https://ref-{}.example", i), now));
        }

        let snapshot = aggregator().aggregate(&events, 30);
        assert_eq!(snapshot.top_referrers.len(), 10);
        let sum: f64 = snapshot.top_referrers.iter().map(|r| r.percentage).sum();
        assert!(sum <= 100.0);
        for referrer in &snapshot.top_referrers {
            // 1/12 * 100 = 8.333... -> 8.3 at 1 decimal
            assert_eq!(referrer.percentage, 8.3);
        }
    }

    #[test]
    fn test_empty_referrer_field_counts_as_direct() {
        let now = Utc::now();
        let events = vec![event("s1", "/", "", now)];
        let snapshot = aggregator().aggregate(&events, 30);
        assert_eq!(snapshot.top_referrers[0].referrer, "direct");
    }

    #[tokio::test]
    async fn test_snapshot_filters_by_range() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .insert_page_view(event("s1", "/", "direct", now))
            .await
            .unwrap();
        store
            .insert_page_view(event("s2", "/", "direct", now - Duration::days(45)))
            .await
            .unwrap();

        let aggregator = AnalyticsAggregator::with_defaults(store);
        let snapshot = aggregator.snapshot(30).await.unwrap();
        assert_eq!(snapshot.total_page_views, 1);
        assert_eq!(snapshot.unique_visitors, 1);
    }

    #[tokio::test]
    async fn test_active_users_window() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .insert_page_view(event("s1", "/", "direct", now))
            .await
            .unwrap();
        store
            .insert_page_view(event("s1", "/a", "direct", now - Duration::minutes(2)))
            .await
            .unwrap();
        store
            .insert_page_view(event("s2", "/", "direct", now - Duration::minutes(10)))
            .await
            .unwrap();

        let aggregator = AnalyticsAggregator::with_defaults(store);
        // s1 is active twice over (still one session); s2 aged out
        assert_eq!(aggregator.active_users().await.unwrap(), 1);
    }
}
