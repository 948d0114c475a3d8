//! Reading the JSON block embedded in a watch page.
//!
//! The page carries a `<script id="__UNIVERSAL_DATA_FOR_REHYDRATION__">`
//! element whose body is a JSON document. The media variants live under
//! [`VARIANTS_PATH`] and the uploader under [`USERNAME_PATH`].

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ExtractError;
use crate::patterns::compile_static_regex;

/// Key path to the list of media variants.
pub const VARIANTS_PATH: [&str; 6] = [
    "__DEFAULT_SCOPE__",
    "webapp.video-detail",
    "itemInfo",
    "itemStruct",
    "video",
    "bitrateInfo",
];

/// Key path to the uploader's unique name.
pub const USERNAME_PATH: [&str; 6] = [
    "__DEFAULT_SCOPE__",
    "webapp.video-detail",
    "itemInfo",
    "itemStruct",
    "author",
    "uniqueId",
];

/// Index into `PlayAddr.UrlList` of the address used for downloads.
const DOWNLOAD_URL_INDEX: usize = 1;

static EMBEDDED_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r#"(?is)<script[^>]*\bid\s*=\s*["']__UNIVERSAL_DATA_FOR_REHYDRATION__["'][^>]*>(.*?)</script>"#,
    )
});

/// Media address and size of the chosen variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDetails {
    pub address: String,
    pub byte_size: u64,
}

/// Parses the embedded data block out of `html`.
///
/// # Errors
///
/// [`ExtractError::SourceDataMissing`] when the script element is absent or
/// empty, [`ExtractError::MalformedSourceData`] when its body is not JSON.
pub fn parse_embedded_data(html: &str, url: &str) -> Result<Value, ExtractError> {
    let body = EMBEDDED_DATA_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|body| !body.is_empty())
        .ok_or_else(|| ExtractError::SourceDataMissing {
            url: url.to_string(),
        })?;

    serde_json::from_str(body).map_err(|source| ExtractError::MalformedSourceData {
        url: url.to_string(),
        source,
    })
}

/// Follows `keys` from `data`, reporting the first key that cannot be followed.
///
/// # Errors
///
/// [`ExtractError::StructureMismatch`] naming the path up to the failing key.
pub fn walk<'a>(data: &'a Value, keys: &[&str], what: &'static str) -> Result<&'a Value, ExtractError> {
    keys.iter()
        .enumerate()
        .try_fold(data, |current, (depth, key)| {
            current
                .get(*key)
                .ok_or_else(|| ExtractError::structure_mismatch(what, keys, depth))
        })
}

/// Returns the media variant list.
///
/// # Errors
///
/// [`ExtractError::StructureMismatch`] if the path is broken or does not end
/// in an array.
pub fn download_variants(data: &Value) -> Result<&Vec<Value>, ExtractError> {
    const WHAT: &str = "download addresses";
    walk(data, &VARIANTS_PATH, WHAT)?
        .as_array()
        .ok_or_else(|| ExtractError::structure_mismatch(WHAT, &VARIANTS_PATH, VARIANTS_PATH.len() - 1))
}

/// Returns the uploader name.
///
/// # Errors
///
/// [`ExtractError::StructureMismatch`] if the path is broken.
pub fn username(data: &Value) -> Result<String, ExtractError> {
    let value = walk(data, &USERNAME_PATH, "username")?;
    Ok(match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Picks the variant with the largest pixel area, breaking ties by bitrate.
///
/// Missing numbers count as zero; among equal scores the first wins.
#[must_use]
pub fn best_variant(variants: &[Value]) -> Option<&Value> {
    variants
        .iter()
        .fold(None::<(&Value, (u64, u64))>, |best, variant| {
            let score = quality_score(variant);
            match best {
                Some((_, best_score)) if best_score >= score => best,
                _ => Some((variant, score)),
            }
        })
        .map(|(variant, _)| variant)
}

fn quality_score(variant: &Value) -> (u64, u64) {
    let play = &variant["PlayAddr"];
    let width = play["Width"].as_u64().unwrap_or(0);
    let height = play["Height"].as_u64().unwrap_or(0);
    let bitrate = variant["Bitrate"].as_u64().unwrap_or(0);
    (width.saturating_mul(height), bitrate)
}

/// Reads the download address and byte size of a variant.
///
/// # Errors
///
/// [`ExtractError::StructureMismatch`] if either field is missing.
pub fn media_details(variant: &Value) -> Result<MediaDetails, ExtractError> {
    const ADDRESS_PATH: [&str; 3] = ["PlayAddr", "UrlList", "1"];
    const SIZE_PATH: [&str; 2] = ["PlayAddr", "DataSize"];

    let address = variant["PlayAddr"]["UrlList"]
        .get(DOWNLOAD_URL_INDEX)
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractError::structure_mismatch("download address", &ADDRESS_PATH, 2))?;

    let size = &variant["PlayAddr"]["DataSize"];
    let byte_size = size
        .as_u64()
        .or_else(|| size.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| ExtractError::structure_mismatch("file size", &SIZE_PATH, 1))?;

    Ok(MediaDetails {
        address: address.to_string(),
        byte_size,
    })
}
