//! Core types for the Sitepulse analytics pipeline
//!
//! This module defines the data structures shared across the tracker and
//! the dashboard: the page-view event row, the visitor-session summary
//! row, and the page context handed in by the host environment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device classification derived from user-agent pattern matching.
///
/// Heuristic categorization, not guaranteed accurate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Phones and small handhelds
    Mobile,
    /// Tablets (checked before the generic mobile pattern)
    Tablet,
    /// Everything else
    Desktop,
}

impl DeviceType {
    /// Display label with the first letter capitalized, as shown on the
    /// device distribution chart.
    pub fn label(self) -> &'static str {
        match self {
            Self::Mobile => "Mobile",
            Self::Tablet => "Tablet",
            Self::Desktop => "Desktop",
        }
    }
}

/// Screen dimensions reported by the host environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// One immutable record of a single page render.
///
/// Appended to the remote `page_views` collection on every navigation;
/// never mutated or deleted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageViewEvent {
    /// Session this view belongs to
    pub session_id: String,
    /// Path component of the page URL
    pub page_path: String,
    /// Document title at render time
    pub page_title: String,
    /// Referrer URL, `"direct"` when the document had none
    pub referrer: String,
    /// Browser name classification
    pub browser: String,
    /// Device classification; absent on rows written by older trackers
    #[serde(default)]
    pub device_type: Option<DeviceType>,
    /// Screen width in pixels
    pub screen_width: u32,
    /// Screen height in pixels
    pub screen_height: u32,
    /// Timestamp of the view
    pub viewed_at: DateTime<Utc>,
}

/// Visitor-session summary row, upserted into `visitor_sessions`.
///
/// Exactly one row per distinct session id is intended; `first_seen` is
/// set once on creation and `last_seen` refreshed on every repeat
/// navigation within the same session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitorSessionRecord {
    pub session_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// Everything the host environment knows about the current page.
///
/// The recorder derives a [`PageViewEvent`] from this; navigation sources
/// emit one per detected navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// Full URL, used by the URL-change detector for comparison
    pub url: String,
    /// Path component
    pub path: String,
    /// Document title
    pub title: String,
    /// Referrer, empty when the document had none
    pub referrer: String,
    /// Raw user-agent string
    pub user_agent: String,
    /// Screen dimensions
    pub screen: ScreenSize,
}

impl PageContext {
    /// Referrer with the `"direct"` default applied
    pub fn referrer_or_direct(&self) -> &str {
        if self.referrer.is_empty() {
            "direct"
        } else {
            &self.referrer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> PageViewEvent {
        PageViewEvent {
            session_id: "session_1700000000000_abc123def".to_string(),
            page_path: "/services.html".to_string(),
            page_title: "Services".to_string(),
            referrer: "direct".to_string(),
            browser: "Chrome".to_string(),
            device_type: Some(DeviceType::Desktop),
            screen_width: 1920,
            screen_height: 1080,
            viewed_at: Utc::now(),
        }
    }

    #[test]
    fn test_page_view_event_serialization() {
        let event = sample_event();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""device_type":"desktop""#));

        let deserialized: PageViewEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
    }

    #[test]
    fn test_device_type_absent_defaults_to_none() {
        let json = r#"{
            "session_id": "s1",
            "page_path": "/",
            "page_title": "Home",
            "referrer": "direct",
            "browser": "Unknown",
            "screen_width": 800,
            "screen_height": 600,
            "viewed_at": "2026-08-01T00:00:00Z"
        }"#;

        let event: PageViewEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.device_type, None);
    }

    #[test]
    fn test_device_labels() {
        assert_eq!(DeviceType::Mobile.label(), "Mobile");
        assert_eq!(DeviceType::Tablet.label(), "Tablet");
        assert_eq!(DeviceType::Desktop.label(), "Desktop");
    }

    #[test]
    fn test_referrer_or_direct() {
        let mut ctx = PageContext {
            url: "https://example.com/".to_string(),
            path: "/".to_string(),
            title: "Home".to_string(),
            referrer: String::new(),
            user_agent: "Mozilla/5.0".to_string(),
            screen: ScreenSize::default(),
        };
        assert_eq!(ctx.referrer_or_direct(), "direct");

        ctx.referrer = "https://search.example".to_string();
        assert_eq!(ctx.referrer_or_direct(), "https://search.example");
    }

    #[test]
    fn test_visitor_session_serialization() {
        let now = Utc::now();
        let record = VisitorSessionRecord {
            session_id: "s1".to_string(),
            first_seen: now,
            last_seen: now,
        };

        let json = serde_json::to_string(&record).unwrap();
        let deserialized: VisitorSessionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }
}
