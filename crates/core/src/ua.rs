//! User-agent classification
//!
//! Heuristic device and browser categorization from user-agent strings.
//! The patterns mirror widely deployed tracker heuristics: the tablet
//! pattern must be checked before the generic mobile pattern because
//! tablet user agents usually also contain mobile substrings, and the
//! browser checks are ordered because several agents carry more than one
//! vendor token (every Chrome UA also says Safari, Edge also says Chrome).

use crate::types::DeviceType;
use once_cell::sync::Lazy;
use regex::Regex;

static TABLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)tablet|ipad|playbook|silk").unwrap());

static MOBILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Mobile|Android|iP(hone|od)|IEMobile|BlackBerry|Kindle|Silk-Accelerated|(hpw|web)OS|Opera M(obi|ini)")
        .unwrap()
});

/// Classify the device type from a user-agent string.
///
/// Android with no mobile token after it is a tablet; the regex crate
/// has no lookahead, so that clause scans the tail of each "android"
/// occurrence by hand. A "mobi" that only precedes "android" does not
/// disqualify the tablet match.
pub fn classify_device(user_agent: &str) -> DeviceType {
    let lower = user_agent.to_ascii_lowercase();
    let android_tablet = lower
        .match_indices("android")
        .any(|(at, token)| !lower[at + token.len()..].contains("mobi"));
    if TABLET_RE.is_match(user_agent) || android_tablet {
        return DeviceType::Tablet;
    }
    if MOBILE_RE.is_match(user_agent) {
        return DeviceType::Mobile;
    }
    DeviceType::Desktop
}

/// Classify the browser name from a user-agent string.
///
/// Ordered substring checks; first match wins.
pub fn classify_browser(user_agent: &str) -> &'static str {
    if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("SamsungBrowser") {
        "Samsung Browser"
    } else if user_agent.contains("Opera") || user_agent.contains("OPR") {
        "Opera"
    } else if user_agent.contains("Trident") {
        "IE"
    } else if user_agent.contains("Edge") {
        "Edge"
    } else if user_agent.contains("Chrome") {
        "Chrome"
    } else if user_agent.contains("Safari") {
        "Safari"
    } else {
        "Unknown"
    }
}
