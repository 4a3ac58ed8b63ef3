//! Link classification.
//!
//! Turns anything a user may paste (a canonical page URL, a share short link,
//! or a whole share blurb with a link inside) into a [`LinkClass`]. This is a
//! pure function: short links are reported as such and resolved elsewhere.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};
use crate::link::target::{LinkClass, ResolutionTarget, TargetKind};

/// First http(s) URL in a block of text. Stops at whitespace and the CJK
/// punctuation share blurbs wrap links in.
static URL_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"'，。！？【】「」（）]+"#).expect("valid url regex")
});

static NUMERIC_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,32}$").expect("valid id regex"));

static SEC_UID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{4,128}$").expect("valid sec_uid regex"));

static ROOM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,64}$").expect("valid room regex"));

const SHORT_HOSTS: [&str; 2] = ["v.douyin.com", "v.iesdouyin.com"];
const LIVE_HOST: &str = "live.douyin.com";

/// Classify a raw link.
pub fn classify_link(raw: &str) -> Result<LinkClass> {
    let raw = raw.trim();
    let unrecognized = || Error::UnrecognizedLinkKind(raw.to_string());

    let candidate = extract_url(raw).ok_or_else(unrecognized)?;
    let url = Url::parse(candidate).map_err(|_| unrecognized())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(unrecognized());
    }

    let host = url.host_str().ok_or_else(unrecognized)?.to_ascii_lowercase();
    if !is_platform_host(&host) {
        return Err(unrecognized());
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if SHORT_HOSTS.contains(&host.as_str()) {
        if segments.is_empty() {
            return Err(unrecognized());
        }
        return Ok(LinkClass::ShortLink {
            url: url.to_string(),
            raw_link: raw.to_string(),
        });
    }

    if host == LIVE_HOST {
        let room = segments.first().ok_or_else(unrecognized)?;
        if !ROOM_ID.is_match(room) {
            return Err(unrecognized());
        }
        return Ok(LinkClass::Target(target(TargetKind::LiveRoom, room, raw)));
    }

    classify_page(&url, &segments, raw)
        .map(LinkClass::Target)
        .ok_or_else(unrecognized)
}

/// Classify the canonical URL a short link redirected to.
///
/// Keeps the user's original link as `raw_link`. Landing on another short
/// link is treated as a failed redirect rather than followed again.
pub fn classify_redirected(canonical: &str, raw_link: &str) -> Result<ResolutionTarget> {
    match classify_link(canonical) {
        Ok(LinkClass::Target(mut target)) => {
            target.raw_link = raw_link.to_string();
            Ok(target)
        }
        Ok(LinkClass::ShortLink { .. }) | Err(Error::UnrecognizedLinkKind(_)) => {
            Err(Error::RedirectNotFound(format!("{} -> {}", raw_link, canonical)))
        }
        Err(e) => Err(e),
    }
}

/// Extract the first URL from pasted text.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_IN_TEXT
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')', ']']))
}

fn is_platform_host(host: &str) -> bool {
    ["douyin.com", "iesdouyin.com"]
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

fn classify_page(url: &Url, segments: &[&str], raw: &str) -> Option<ResolutionTarget> {
    // A profile or feed page with an item opened in the overlay.
    if let Some(id) = query_param(url, "modal_id") {
        return NUMERIC_ID
            .is_match(&id)
            .then(|| target(TargetKind::SingleItem, &id, raw));
    }

    if let Some(id) = segment_after(segments, &["video"]).or_else(|| segment_after(segments, &["note"])) {
        return NUMERIC_ID
            .is_match(id)
            .then(|| target(TargetKind::SingleItem, id, raw));
    }

    if let Some(id) = segment_after(segments, &["user"]) {
        return SEC_UID
            .is_match(id)
            .then(|| target(TargetKind::UserProfile, id, raw));
    }

    if segments.contains(&"user") {
        // Old share pages carry the profile in the query string.
        let id = query_param(url, "sec_uid")?;
        return SEC_UID
            .is_match(&id)
            .then(|| target(TargetKind::UserProfile, &id, raw));
    }

    if let Some(id) = segment_after(segments, &["collection"])
        .or_else(|| segment_after(segments, &["mix", "detail"]))
    {
        return NUMERIC_ID
            .is_match(id)
            .then(|| target(TargetKind::Collection, id, raw));
    }

    if let Some(id) = segment_after(segments, &["music"]) {
        return NUMERIC_ID
            .is_match(id)
            .then(|| target(TargetKind::MusicPage, id, raw));
    }

    None
}

/// The segment that follows the `marker` sequence, if any.
fn segment_after<'a>(segments: &[&'a str], marker: &[&str]) -> Option<&'a str> {
    segments
        .windows(marker.len() + 1)
        .find(|w| w[..marker.len()] == *marker)
        .map(|w| w[marker.len()])
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn target(kind: TargetKind, id: &str, raw: &str) -> ResolutionTarget {
    ResolutionTarget::new(kind, id, raw)
}
