//! Event store abstraction
//!
//! The remote backend owns persistence of page-view events and visitor
//! sessions; the client only appends and upserts. This module defines the
//! typed query surface the aggregator and recorder depend on, an
//! in-process [`MemoryStore`] used by tests and the standalone dashboard,
//! and the readiness signal the tracker awaits before recording.
//!
//! # Architecture
//!
//! - `EventQuery`: explicit query parameters (time range, ordering,
//!   limit) replacing chained duck-typed filter calls.
//! - `EventStore`: the minimal async trait both the REST-backed store and
//!   the in-memory fake implement.
//! - `readiness()`: a one-shot readiness future replacing retry-until-
//!   ready polling at startup.

pub mod rest;

use crate::types::{PageViewEvent, VisitorSessionRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

pub use rest::{RestStore, RestStoreConfig};

/// Sort direction for time-ordered queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Typed query parameters for page-view selects.
///
/// One struct per query instead of a chained filter builder, so
/// aggregation logic stays unit-testable against a fake store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    /// Inclusive lower bound on `viewed_at`
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `viewed_at`
    pub until: Option<DateTime<Utc>>,
    /// Ordering by `viewed_at`
    pub order: SortOrder,
    /// Maximum number of rows
    pub limit: Option<usize>,
}

impl EventQuery {
    /// Events at or after `since`, ascending by time
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    /// Whether an event falls inside this query's time range
    pub fn matches(&self, event: &PageViewEvent) -> bool {
        if let Some(since) = self.since {
            if event.viewed_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.viewed_at > until {
                return false;
            }
        }
        true
    }
}

/// Remote event store contract.
///
/// Page views are append-only; visitor sessions are found by session id
/// and either touched or inserted. The find-then-write sequence is not
/// atomic across concurrent recorders (see the recorder docs).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one page-view row
    async fn insert_page_view(&self, event: PageViewEvent) -> Result<()>;

    /// Select page views matching the query
    async fn query_page_views(&self, query: &EventQuery) -> Result<Vec<PageViewEvent>>;

    /// Find the visitor-session row for a session id, if any
    async fn find_visitor_session(&self, session_id: &str)
        -> Result<Option<VisitorSessionRecord>>;

    /// Insert a new visitor-session row
    async fn insert_visitor_session(&self, record: VisitorSessionRecord) -> Result<()>;

    /// Refresh `last_seen` on an existing visitor-session row
    async fn touch_visitor_session(
        &self,
        session_id: &str,
        last_seen: DateTime<Utc>,
    ) -> Result<()>;
}

/// In-memory event store.
///
/// The injectable fake behind aggregation tests, and the backing store
/// for the dashboard's own `/track` ingestion endpoint. Visitor sessions
/// are kept as an append-ordered list (first match wins on find) so the
/// duplicate-row window of the remote store's read-then-write sequence is
/// reproduced rather than silently fixed by a unique key.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    page_views: Arc<RwLock<Vec<PageViewEvent>>>,
    visitor_sessions: Arc<RwLock<Vec<VisitorSessionRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored page views (tests)
    pub async fn page_view_count(&self) -> usize {
        self.page_views.read().await.len()
    }

    /// Number of visitor-session rows (tests)
    pub async fn visitor_session_count(&self) -> usize {
        self.visitor_sessions.read().await.len()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_page_view(&self, event: PageViewEvent) -> Result<()> {
        self.page_views.write().await.push(event);
        Ok(())
    }

    async fn query_page_views(&self, query: &EventQuery) -> Result<Vec<PageViewEvent>> {
        let views = self.page_views.read().await;
        let mut rows: Vec<PageViewEvent> =
            views.iter().filter(|e| query.matches(e)).cloned().collect();

        match query.order {
            SortOrder::Ascending => rows.sort_by_key(|e| e.viewed_at),
            SortOrder::Descending => {
                rows.sort_by_key(|e| e.viewed_at);
                rows.reverse();
            }
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn find_visitor_session(
        &self,
        session_id: &str,
    ) -> Result<Option<VisitorSessionRecord>> {
        let sessions = self.visitor_sessions.read().await;
        Ok(sessions
            .iter()
            .find(|s| s.session_id == session_id)
            .cloned())
    }

    async fn insert_visitor_session(&self, record: VisitorSessionRecord) -> Result<()> {
        self.visitor_sessions.write().await.push(record);
        Ok(())
    }

    async fn touch_visitor_session(
        &self,
        session_id: &str,
        last_seen: DateTime<Utc>,
    ) -> Result<()> {
        let mut sessions = self.visitor_sessions.write().await;
        if let Some(session) = sessions.iter_mut().find(|s| s.session_id == session_id) {
            session.last_seen = last_seen;
        }
        Ok(())
    }
}

/// Marks the store ready; held by whoever initializes the backend client
#[derive(Debug)]
pub struct ReadinessSignal {
    tx: watch::Sender<bool>,
}

impl ReadinessSignal {
    /// Mark the store as ready; wakes every waiting tracker
    pub fn set_ready(&self) {
        let _ = self.tx.send(true);
    }
}

/// Awaitable store readiness.
///
/// Replaces the retry-until-ready timer loop: a tracker awaits this once
/// at startup, while direct `record_page_view` calls before readiness
/// degrade to logged no-ops.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<bool>,
}

impl Readiness {
    /// A readiness that is already satisfied
    pub fn ready() -> Self {
        let (signal, readiness) = readiness();
        signal.set_ready();
        readiness
    }

    /// Non-blocking readiness check
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the store is marked ready.
    ///
    /// Resolves immediately when already ready; also resolves if the
    /// signal was dropped, since waiting forever would pin the tracker.
    pub async fn wait(&mut self) {
        // wait_for returns Err only when the sender is gone
        let _ = self.rx.wait_for(|ready| *ready).await;
    }
}

/// Create a readiness signal/receiver pair
pub fn readiness() -> (ReadinessSignal, Readiness) {
    let (tx, rx) = watch::channel(false);
    (ReadinessSignal { tx }, Readiness { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceType;
    use chrono::Duration;

    fn event_at(session: &str, at: DateTime<Utc>) -> PageViewEvent {
        PageViewEvent {
            session_id: session.to_string(),
            page_path: "/".to_string(),
            page_title: "Home".to_string(),
            referrer: "direct".to_string(),
            browser: "Chrome".to_string(),
            device_type: Some(DeviceType::Desktop),
            screen_width: 1920,
            screen_height: 1080,
            viewed_at: at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.insert_page_view(event_at("s1", now)).await.unwrap();
        store
            .insert_page_view(event_at("s2", now - Duration::days(2)))
            .await
            .unwrap();

        let query = EventQuery::since(now - Duration::days(1));
        let rows = store.query_page_views(&query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_id, "s1");
    }

    #[tokio::test]
    async fn test_query_ordering_and_limit() {
        let store = MemoryStore::new();
        let now = Utc::now();

        for offset in [3, 1, 2] {
            store
                .insert_page_view(event_at("s1", now - Duration::hours(offset)))
                .await
                .unwrap();
        }

        let asc = store
            .query_page_views(&EventQuery::since(now - Duration::days(1)))
            .await
            .unwrap();
        assert!(asc.windows(2).all(|w| w[0].viewed_at <= w[1].viewed_at));

        let limited = store
            .query_page_views(&EventQuery {
                since: Some(now - Duration::days(1)),
                order: SortOrder::Descending,
                limit: Some(2),
                ..EventQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert!(limited[0].viewed_at >= limited[1].viewed_at);
    }

    #[tokio::test]
    async fn test_visitor_session_find_touch_insert() {
        let store = MemoryStore::new();
        let now = Utc::now();

        assert!(store.find_visitor_session("s1").await.unwrap().is_none());

        store
            .insert_visitor_session(VisitorSessionRecord {
                session_id: "s1".to_string(),
                first_seen: now,
                last_seen: now,
            })
            .await
            .unwrap();

        let later = now + Duration::minutes(5);
        store.touch_visitor_session("s1", later).await.unwrap();

        let found = store.find_visitor_session("s1").await.unwrap().unwrap();
        assert_eq!(found.first_seen, now);
        assert_eq!(found.last_seen, later);
    }

    #[tokio::test]
    async fn test_duplicate_visitor_sessions_allowed() {
        // The store imposes no uniqueness constraint; the recorder's
        // read-then-write race may insert twice and the first row wins.
        let store = MemoryStore::new();
        let now = Utc::now();
        for _ in 0..2 {
            store
                .insert_visitor_session(VisitorSessionRecord {
                    session_id: "s1".to_string(),
                    first_seen: now,
                    last_seen: now,
                })
                .await
                .unwrap();
        }
        assert_eq!(store.visitor_session_count().await, 2);
        assert!(store.find_visitor_session("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_readiness_wait_resolves_after_signal() {
        let (signal, mut ready) = readiness();
        assert!(!ready.is_ready());

        signal.set_ready();
        ready.wait().await;
        assert!(ready.is_ready());
    }

    #[tokio::test]
    async fn test_readiness_ready_shortcut() {
        let mut ready = Readiness::ready();
        assert!(ready.is_ready());
        ready.wait().await;
    }
}
