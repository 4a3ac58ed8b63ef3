//! API response type definitions.
//!
//! These mirror only the parts of the upstream JSON the downloader reads.
//! Everything is normalized into [`crate::media::ContentItem`] right after
//! parsing; nothing below leaves the `api` and `media` modules.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Listing page shared by the post, favorite, mix and music endpoints.
#[derive(Debug, Deserialize)]
pub struct AwemeListResponse {
    #[serde(default)]
    pub aweme_list: Option<Vec<Aweme>>,

    /// Post and favorite listings page with `max_cursor`.
    #[serde(default, deserialize_with = "flexible_string")]
    pub max_cursor: Option<String>,

    /// Mix and music listings page with `cursor`.
    #[serde(default, deserialize_with = "flexible_string")]
    pub cursor: Option<String>,

    #[serde(default, deserialize_with = "flexible_bool")]
    pub has_more: bool,
}

impl AwemeListResponse {
    pub fn next_cursor(&self) -> Option<String> {
        self.max_cursor.clone().or_else(|| self.cursor.clone())
    }
}

/// Single item lookup.
#[derive(Debug, Deserialize)]
pub struct AwemeDetailResponse {
    pub aweme_detail: Option<Aweme>,
}

/// A user's collection list.
#[derive(Debug, Deserialize)]
pub struct MixListResponse {
    #[serde(default)]
    pub mix_infos: Option<Vec<MixInfo>>,

    #[serde(default, deserialize_with = "flexible_string")]
    pub cursor: Option<String>,

    #[serde(default, deserialize_with = "flexible_bool")]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MixInfo {
    #[serde(deserialize_with = "required_string")]
    pub mix_id: String,
    #[serde(default)]
    pub mix_name: String,
}

/// One platform item ("aweme").
#[derive(Debug, Clone, Deserialize)]
pub struct Aweme {
    #[serde(deserialize_with = "required_string")]
    pub aweme_id: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub create_time: i64,
    pub author: Option<Author>,
    pub video: Option<VideoInfo>,
    pub images: Option<Vec<ImageInfo>>,
    pub music: Option<MusicInfo>,
    pub statistics: Option<Statistics>,
}

/// A URL list as the platform ships every asset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UrlList {
    #[serde(default)]
    pub url_list: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub nickname: String,
    #[serde(default, deserialize_with = "flexible_string")]
    pub uid: Option<String>,
    #[serde(default)]
    pub sec_uid: Option<String>,
    pub avatar_thumb: Option<UrlList>,
    pub avatar_larger: Option<UrlList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoInfo {
    pub play_addr: Option<UrlList>,
    pub play_addr_h264: Option<UrlList>,
    pub download_addr: Option<UrlList>,
    pub cover: Option<UrlList>,
    pub origin_cover: Option<UrlList>,
    #[serde(default)]
    pub bit_rate: Option<Vec<BitRate>>,
    #[serde(default)]
    pub duration: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitRate {
    #[serde(default)]
    pub bit_rate: u64,
    pub play_addr: Option<UrlList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    #[serde(default)]
    pub url_list: Vec<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MusicInfo {
    #[serde(default, deserialize_with = "flexible_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub play_url: Option<UrlList>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Statistics {
    #[serde(default)]
    pub digg_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub share_count: u64,
    #[serde(default)]
    pub collect_count: u64,
}

/// Live room lookup.
#[derive(Debug, Deserialize)]
pub struct LiveEnterResponse {
    pub data: Option<LiveEnterData>,
}

#[derive(Debug, Deserialize)]
pub struct LiveEnterData {
    #[serde(default)]
    pub data: Vec<LiveRoom>,
    pub user: Option<LiveUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveRoom {
    #[serde(default, deserialize_with = "flexible_string")]
    pub id_str: Option<String>,
    /// 2 while streaming, 4 when the room is offline.
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub title: String,
    pub cover: Option<UrlList>,
    pub stream_url: Option<StreamUrl>,
    #[serde(default)]
    pub user_count_str: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamUrl {
    #[serde(default)]
    pub flv_pull_url: BTreeMap<String, String>,
    #[serde(default)]
    pub hls_pull_url_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveUser {
    #[serde(default)]
    pub nickname: String,
    pub avatar_thumb: Option<UrlList>,
}

/// Live room status code while streaming.
pub const LIVE_STATUS_ON_AIR: i64 = 2;

/// Accepts a string or a number.
fn flexible_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    flexible_string(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("expected a non-empty id"))
}

/// Accepts `true`/`false` or `0`/`1`.
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_page_numeric_fields() {
        let page: AwemeListResponse = serde_json::from_str(
            r#"{"aweme_list":[{"aweme_id":"1"}],"max_cursor":1700000000000,"has_more":1}"#,
        )
        .unwrap();
        assert_eq!(page.aweme_list.as_ref().unwrap().len(), 1);
        assert_eq!(page.next_cursor().as_deref(), Some("1700000000000"));
        assert!(page.has_more);
    }

    #[test]
    fn test_list_page_null_list() {
        let page: AwemeListResponse =
            serde_json::from_str(r#"{"aweme_list":null,"cursor":"0","has_more":false}"#).unwrap();
        assert!(page.aweme_list.is_none());
        assert!(!page.has_more);
    }

    #[test]
    fn test_numeric_aweme_id() {
        let aweme: Aweme = serde_json::from_str(r#"{"aweme_id":7283528505362566450}"#).unwrap();
        assert_eq!(aweme.aweme_id, "7283528505362566450");
    }

    #[test]
    fn test_empty_aweme_id_rejected() {
        assert!(serde_json::from_str::<Aweme>(r#"{"aweme_id":""}"#).is_err());
    }
}
