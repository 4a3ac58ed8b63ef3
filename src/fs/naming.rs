//! File and folder name generation.

use crate::error::{Error, Result};
use crate::fs::atomic::TEMP_NAME_OVERHEAD;
use crate::media::{ContentItem, MediaAsset, MediaRole};

/// Longest title kept in an item folder name, in characters.
pub const MAX_TITLE_CHARS: usize = 50;

/// Longest author kept in an item folder name, in bytes.
pub const MAX_AUTHOR_BYTES: usize = 45;

/// Filesystem limit for a single path component, in bytes.
const NAME_MAX: usize = 255;

/// Longest `<suffix>_<index>.<ext>` appended to the folder name in a file name.
const MAX_FILE_TAIL_BYTES: usize = 24;

/// Longest picture extension taken from a URL.
const MAX_EXTENSION_BYTES: usize = 5;

/// Byte budget of an item folder name. The folder name is repeated in every
/// file name inside it, and temp files add their own overhead on top.
pub const MAX_FOLDER_BYTES: usize = NAME_MAX - TEMP_NAME_OVERHEAD - MAX_FILE_TAIL_BYTES;

/// Sanitize a single path component.
///
/// Separators, reserved characters and control characters become `_`.
/// Trailing dots and spaces are trimmed. Names that end up empty or that
/// would address a parent directory are rejected.
pub fn sanitize_component(name: &str) -> Result<String> {
    if name.contains('\0') {
        return Err(Error::InvalidFilename(format!(
            "Null bytes not allowed: '{}'",
            name.replace('\0', "\\0")
        )));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized.trim().trim_end_matches(['.', ' ']).to_string();

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(Error::InvalidFilename(format!(
            "Path component '{}' is empty after sanitizing",
            name
        )));
    }

    Ok(sanitized)
}

/// Like [`sanitize_component`] but falls back to `fallback` instead of failing.
fn sanitize_or(name: &str, fallback: &str) -> String {
    sanitize_component(name).unwrap_or_else(|_| fallback.to_string())
}

/// First `max` characters of `s`.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Longest prefix of `s` that fits in `max` bytes, cut on a char boundary.
pub fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Folder holding every file of `item`:
/// `<YYYY-MM-DD_HH-MM-SS>_<author>_<title>_<item id>`, timestamps in UTC.
pub fn item_folder_name(item: &ContentItem) -> Result<String> {
    let stamp = item
        .created_at_utc()
        .map(|dt| dt.format("%Y-%m-%d_%H-%M-%S").to_string())
        .unwrap_or_else(|| "0000-00-00_00-00-00".to_string());

    let author = sanitize_or(truncate_bytes(&item.author, MAX_AUTHOR_BYTES), "unknown");
    let id = sanitize_component(&item.item_id)?;

    // Whatever the fixed parts and the three separators leave goes to the title.
    let title_budget = MAX_FOLDER_BYTES.saturating_sub(stamp.len() + author.len() + id.len() + 3);
    let title: String = item.title.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = truncate_bytes(truncate_chars(&title, MAX_TITLE_CHARS), title_budget);
    let title = sanitize_or(title, "no_title");

    Ok(format!("{}_{}_{}_{}", stamp, author, title, id))
}

/// Folder for a ledger scope: `post:MS4w` becomes `post_MS4w`.
pub fn scope_folder_name(scope: &str) -> Result<String> {
    sanitize_component(&scope.replace(':', "_"))
}

/// File name of one asset inside the item folder.
pub fn asset_file_name(folder: &str, asset: &MediaAsset) -> String {
    let index = match (asset.role, asset.index) {
        (MediaRole::Image, Some(i)) => format!("_{:02}", i),
        _ => String::new(),
    };
    let ext = asset_extension(asset);
    format!("{}{}{}.{}", folder, asset.role.suffix(), index, ext)
}

/// File name of the metadata sidecar.
pub fn sidecar_file_name(folder: &str) -> String {
    format!(
        "{}{}.{}",
        folder,
        MediaRole::Json.suffix(),
        MediaRole::Json.default_extension()
    )
}

/// Pictures keep the extension their URL path shows, if it is an image type.
fn asset_extension(asset: &MediaAsset) -> String {
    if asset.role.is_picture() {
        if let Some(ext) = asset.primary_url().and_then(picture_extension) {
            return ext;
        }
    }
    asset.role.default_extension().to_string()
}

fn picture_extension(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    let last = url.path_segments()?.next_back()?;
    // CDN paths often look like `abc.jpeg~tplv-dy-resize:720.webp`.
    let last = last.split('~').next_back()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > MAX_EXTENSION_BYTES {
        return None;
    }

    let mime = mime_guess::from_ext(&ext).first()?;
    (mime.type_() == mime_guess::mime::IMAGE).then_some(ext)
}
