//! Navigation event sources
//!
//! The recorder depends only on [`NavigationSource`]; hosts pick the
//! implementation that matches how they learn about navigations. Server-
//! rendered multi-page sites feed raw page observations (the mutation-
//! observer heuristic) through [`UrlChangeDetector`], which emits only
//! when the full URL string actually changed; single-page hosts with real
//! route events use the pass-through [`RouteEvents`] source.

use crate::recorder::PageViewRecorder;
use crate::session::KeyValueStore;
use crate::store::Readiness;
use crate::types::PageContext;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// A stream of detected navigations.
///
/// `None` means the source is exhausted (the host page is gone).
#[async_trait]
pub trait NavigationSource: Send {
    async fn next_navigation(&mut self) -> Option<PageContext>;
}

/// URL-change detector over raw page observations.
///
/// Each observation carries the full current URL; an observation is a
/// navigation only when that string differs from the last observed one.
/// Rapid DOM churn without a URL change therefore never re-triggers
/// recording, and no debouncing is applied. Successive observations are
/// handled one at a time in arrival order; each comparison uses the URL
/// captured in the observation itself, not a re-read of live state.
pub struct UrlChangeDetector {
    observations: mpsc::Receiver<PageContext>,
    last_url: Option<String>,
}

impl UrlChangeDetector {
    /// Create a detector and the sender the host feeds observations into
    pub fn new(buffer: usize) -> (mpsc::Sender<PageContext>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            tx,
            Self {
                observations: rx,
                last_url: None,
            },
        )
    }
}

#[async_trait]
impl NavigationSource for UrlChangeDetector {
    async fn next_navigation(&mut self) -> Option<PageContext> {
        while let Some(ctx) = self.observations.recv().await {
            if self.last_url.as_deref() != Some(ctx.url.as_str()) {
                self.last_url = Some(ctx.url.clone());
                return Some(ctx);
            }
            debug!(url = %ctx.url, "observation without URL change, ignoring");
        }
        None
    }
}

/// Pass-through source for hosts with native route-change events
pub struct RouteEvents {
    events: mpsc::Receiver<PageContext>,
}

impl RouteEvents {
    pub fn new(buffer: usize) -> (mpsc::Sender<PageContext>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { events: rx })
    }
}

#[async_trait]
impl NavigationSource for RouteEvents {
    async fn next_navigation(&mut self) -> Option<PageContext> {
        self.events.recv().await
    }
}

/// Drives a recorder from a navigation source.
pub struct Tracker<K: KeyValueStore> {
    recorder: PageViewRecorder<K>,
    readiness: Readiness,
}

impl<K: KeyValueStore> Tracker<K> {
    pub fn new(recorder: PageViewRecorder<K>, readiness: Readiness) -> Self {
        Self {
            recorder,
            readiness,
        }
    }

    /// Await store readiness once, then record one page view per
    /// navigation until the source is exhausted.
    pub async fn run<S: NavigationSource>(&self, mut source: S) {
        let mut readiness = self.readiness.clone();
        readiness.wait().await;
        info!("analytics tracker started");

        while let Some(ctx) = source.next_navigation().await {
            self.recorder.record_page_view(&ctx).await;
        }
        info!("navigation source closed, tracker stopping");
    }
}
