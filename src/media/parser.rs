//! Normalization of upstream items into [`ContentItem`]s.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::api::types::{Aweme, LiveEnterData, UrlList, LIVE_STATUS_ON_AIR};
use crate::error::{Error, Result};
use crate::media::item::{ContentItem, ItemKind, MediaAsset, MediaRole};

/// URL fragments that mark the better-quality variants of a picture.
const QUALITY_MARKERS: [&str; 3] = ["1080", "origin", "high"];

/// Normalize one upstream item.
///
/// Image sets win over video (image posts also carry a placeholder video),
/// then video, then a bare music track.
pub fn normalize_aweme(aweme: Aweme) -> Result<ContentItem> {
    let mut assets = Vec::new();

    let images: Vec<_> = aweme
        .images
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|img| !img.url_list.is_empty())
        .collect();

    let video_urls = aweme.video.as_ref().map(video_candidates).unwrap_or_default();
    let music_urls = aweme
        .music
        .as_ref()
        .and_then(|m| m.play_url.as_ref())
        .map(|u| dedup_urls(u.url_list.clone()))
        .unwrap_or_default();

    let kind = if !images.is_empty() {
        for (i, image) in images.iter().enumerate() {
            assets.push(MediaAsset::image(
                i as u32 + 1,
                rank_by_quality(image.url_list.clone()),
            ));
        }
        ItemKind::ImageSet
    } else if !video_urls.is_empty() {
        assets.push(MediaAsset::new(MediaRole::Video, video_urls));
        ItemKind::Video
    } else if !music_urls.is_empty() {
        ItemKind::Audio
    } else {
        return Err(Error::UpstreamSchema(format!(
            "item {} has no downloadable media",
            aweme.aweme_id
        )));
    };

    if let Some(cover) = aweme.video.as_ref().and_then(|v| {
        non_empty(v.origin_cover.as_ref()).or_else(|| non_empty(v.cover.as_ref()))
    }) {
        assets.push(MediaAsset::new(
            MediaRole::Cover,
            rank_by_quality(cover.url_list.clone()),
        ));
    }

    if let Some(avatar) = aweme.author.as_ref().and_then(|a| {
        non_empty(a.avatar_larger.as_ref()).or_else(|| non_empty(a.avatar_thumb.as_ref()))
    }) {
        assets.push(MediaAsset::new(
            MediaRole::Avatar,
            dedup_urls(avatar.url_list.clone()),
        ));
    }

    if !music_urls.is_empty() {
        assets.push(MediaAsset::new(MediaRole::Music, music_urls));
    }

    let author = aweme
        .author
        .as_ref()
        .map(|a| a.nickname.clone())
        .unwrap_or_default();

    let mut metadata = BTreeMap::new();
    metadata.insert("aweme_id".to_string(), json!(aweme.aweme_id));
    metadata.insert("kind".to_string(), json!(kind.to_string()));
    metadata.insert("desc".to_string(), json!(aweme.desc));
    metadata.insert("create_time".to_string(), json!(aweme.create_time));
    if let Some(a) = &aweme.author {
        metadata.insert(
            "author".to_string(),
            json!({ "nickname": a.nickname, "uid": a.uid, "sec_uid": a.sec_uid }),
        );
    }
    if let Some(m) = &aweme.music {
        metadata.insert(
            "music".to_string(),
            json!({ "id": m.id, "title": m.title, "author": m.author }),
        );
    }
    if let Some(stats) = &aweme.statistics {
        metadata.insert("statistics".to_string(), serde_json::to_value(stats)?);
    }
    if let Some(video) = &aweme.video {
        if video.duration > 0 {
            metadata.insert("duration_ms".to_string(), json!(video.duration));
        }
    }

    Ok(ContentItem {
        item_id: aweme.aweme_id,
        kind,
        title: aweme.desc,
        author,
        created_at: aweme.create_time,
        assets,
        metadata,
    })
}

/// Normalize a live room into a snapshot item captured at `captured_at`.
pub fn normalize_live(
    room_id: &str,
    data: LiveEnterData,
    captured_at: DateTime<Utc>,
) -> Result<ContentItem> {
    let room = data
        .data
        .into_iter()
        .next()
        .ok_or_else(|| Error::ItemUnavailable(format!("live room {}", room_id)))?;

    if room.status != LIVE_STATUS_ON_AIR {
        return Err(Error::ItemUnavailable(format!(
            "live room {} is not streaming (status {})",
            room_id, room.status
        )));
    }

    let cover = non_empty(room.cover.as_ref())
        .ok_or_else(|| Error::UpstreamSchema(format!("live room {} has no cover", room_id)))?;

    let mut assets = vec![MediaAsset::new(
        MediaRole::Cover,
        rank_by_quality(cover.url_list.clone()),
    )];

    let nickname = data.user.as_ref().map(|u| u.nickname.clone()).unwrap_or_default();
    if let Some(avatar) = data.user.as_ref().and_then(|u| non_empty(u.avatar_thumb.as_ref())) {
        assets.push(MediaAsset::new(
            MediaRole::Avatar,
            dedup_urls(avatar.url_list.clone()),
        ));
    }

    let streams = room.stream_url.clone().unwrap_or_default();
    let mut metadata = BTreeMap::new();
    metadata.insert("room_id".to_string(), json!(room_id));
    metadata.insert("kind".to_string(), json!(ItemKind::Live.to_string()));
    metadata.insert("title".to_string(), json!(room.title));
    metadata.insert("nickname".to_string(), json!(nickname));
    metadata.insert("captured_at".to_string(), json!(captured_at.to_rfc3339()));
    metadata.insert("flv_pull_url".to_string(), json!(streams.flv_pull_url));
    metadata.insert("hls_pull_url_map".to_string(), json!(streams.hls_pull_url_map));
    if let Some(viewers) = &room.user_count_str {
        metadata.insert("user_count".to_string(), Value::String(viewers.clone()));
    }

    Ok(ContentItem {
        item_id: format!("{}_{}", room_id, captured_at.timestamp()),
        kind: ItemKind::Live,
        title: room.title,
        author: nickname,
        created_at: captured_at.timestamp(),
        assets,
        metadata,
    })
}

/// Video candidates, best first: highest bit rate variants, then the plain
/// play address, then the H.264 and download addresses.
fn video_candidates(video: &crate::api::types::VideoInfo) -> Vec<String> {
    let mut variants: Vec<_> = video.bit_rate.as_deref().unwrap_or_default().iter().collect();
    variants.sort_by(|a, b| b.bit_rate.cmp(&a.bit_rate));

    let urls = variants
        .into_iter()
        .filter_map(|v| v.play_addr.as_ref())
        .chain(video.play_addr.as_ref())
        .chain(video.play_addr_h264.as_ref())
        .chain(video.download_addr.as_ref())
        .flat_map(|list| list.url_list.iter())
        .map(|url| upgrade_video_url(url))
        .collect();

    dedup_urls(urls)
}

/// Swap the watermarked play endpoint for the clean one.
pub fn upgrade_video_url(url: &str) -> String {
    url.replace("/playwm/", "/play/")
}

/// Order URLs so the higher-quality variants come first. Stable otherwise.
pub fn rank_by_quality(urls: Vec<String>) -> Vec<String> {
    let mut urls = dedup_urls(urls);
    urls.sort_by_key(|url| !QUALITY_MARKERS.iter().any(|m| url.contains(m)));
    urls
}

fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .filter(|url| !url.is_empty() && seen.insert(url.clone()))
        .collect()
}

fn non_empty(list: Option<&UrlList>) -> Option<&UrlList> {
    list.filter(|l| !l.url_list.is_empty())
}
