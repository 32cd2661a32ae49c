//! Page view recorder
//!
//! Fire-and-forget page-view tracking: on each navigation a
//! [`PageViewEvent`] is assembled from the host's [`PageContext`] and
//! appended to the remote store, followed by a visitor-session upsert.
//! Every failure in that sequence is caught, logged, and swallowed; the
//! caller never observes an error.

use crate::session::{KeyValueStore, SessionStore};
use crate::store::{EventStore, Readiness};
use crate::types::{PageContext, PageViewEvent, VisitorSessionRecord};
use crate::{ua, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Records page views against the remote event store.
pub struct PageViewRecorder<K: KeyValueStore> {
    store: Arc<dyn EventStore>,
    sessions: SessionStore<K>,
    readiness: Readiness,
}

impl<K: KeyValueStore> PageViewRecorder<K> {
    /// Create a recorder.
    ///
    /// `readiness` gates recording: until the store is marked ready,
    /// calls are no-ops with a logged warning. No retry is performed
    /// here; a tracker that wants to wait for readiness awaits it once
    /// before its loop (see [`crate::navigation::Tracker`]).
    pub fn new(store: Arc<dyn EventStore>, sessions: SessionStore<K>, readiness: Readiness) -> Self {
        Self {
            store,
            sessions,
            readiness,
        }
    }

    /// Record one page view. Errors are logged, never returned.
    pub async fn record_page_view(&self, ctx: &PageContext) {
        if !self.readiness.is_ready() {
            warn!("analytics: event store not initialized, dropping page view");
            return;
        }

        if let Err(e) = self.record_inner(ctx).await {
            warn!("analytics tracking error: {}", e);
        }
    }

    async fn record_inner(&self, ctx: &PageContext) -> Result<()> {
        let session_id = self.sessions.get_or_create();
        let event = build_event(ctx, session_id.clone());
        record_event(self.store.as_ref(), event).await?;
        debug!(session_id = %session_id, path = %ctx.path, "page view tracked");
        Ok(())
    }
}

/// Append one event and keep its visitor-session row current.
///
/// The event insert runs first; a failure there aborts the sequence
/// with no visitor-session write. The find-then-write upsert is not
/// atomic: two concurrent calls for the same session can both insert.
pub async fn record_event(store: &dyn EventStore, event: PageViewEvent) -> Result<()> {
    let session_id = event.session_id.clone();
    store.insert_page_view(event).await?;

    let now = Utc::now();
    match store.find_visitor_session(&session_id).await? {
        Some(_) => store.touch_visitor_session(&session_id, now).await?,
        None => {
            store
                .insert_visitor_session(VisitorSessionRecord {
                    session_id,
                    first_seen: now,
                    last_seen: now,
                })
                .await?
        }
    }
    Ok(())
}

/// Assemble a page-view event from the host context
pub fn build_event(ctx: &PageContext, session_id: String) -> PageViewEvent {
    PageViewEvent {
        session_id,
        page_path: ctx.path.clone(),
        page_title: ctx.title.clone(),
        referrer: ctx.referrer_or_direct().to_string(),
        browser: ua::classify_browser(&ctx.user_agent).to_string(),
        device_type: Some(ua::classify_device(&ctx.user_agent)),
        screen_width: ctx.screen.width,
        screen_height: ctx.screen.height,
        viewed_at: Utc::now(),
    }
}
