//! Link classification and identity decoding.
//!
//! Three link shapes are accepted:
//!
//! - full watch links, `https://www.tiktok.com/@user/video/<id>`
//! - short redirect links, `https://vt.tiktok.com/<code>/`
//! - a bare 19-digit identity
//!
//! The identity is a 64-bit integer whose upper 32 bits are the upload time in
//! Unix seconds.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::patterns::compile_static_regex;

/// Number of decimal digits in a bare identity.
pub const VIDEO_ID_LENGTH: usize = 19;

static FULL_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"^https?://(www\.)?tiktok\.com/@[\w.\-]+/video/\d+(\?.*)?$")
});

static SHORT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^(https?://)?(vt|vm)\.tiktok\.com/\S+$"));

static VIDEO_PATH_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/video/(\d+)"));

static MEDIA_FILE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/(\d+)_original\.mp4"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"/@([\w.\-]+)/video/\d+"));

/// Shape of an accepted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Full watch link carrying the username and identity.
    Full,
    /// Short link that must be followed to find the full form.
    Short,
    /// Bare decimal identity.
    BareId,
}

/// Classifies `link`, returning `None` for anything not accepted.
#[must_use]
pub fn classify_link(link: &str) -> Option<LinkKind> {
    let link = link.trim();
    if is_bare_id(link) {
        Some(LinkKind::BareId)
    } else if FULL_LINK_RE.is_match(link) {
        Some(LinkKind::Full)
    } else if SHORT_LINK_RE.is_match(link) {
        Some(LinkKind::Short)
    } else {
        None
    }
}

/// Returns true if `value` is exactly [`VIDEO_ID_LENGTH`] ASCII digits.
#[must_use]
pub fn is_bare_id(value: &str) -> bool {
    value.len() == VIDEO_ID_LENGTH && value.bytes().all(|b| b.is_ascii_digit())
}

/// Extracts the numeric identity from a normalized link.
///
/// Tries, in order: a bare identity, a `/video/<digits>` path segment, and a
/// `/<digits>_original.mp4` media file name.
#[must_use]
pub fn extract_video_id(link: &str) -> Option<u64> {
    let link = link.trim();
    if is_bare_id(link) {
        return link.parse().ok();
    }
    [&*VIDEO_PATH_ID_RE, &*MEDIA_FILE_ID_RE]
        .into_iter()
        .find_map(|re| re.captures(link))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Decodes the upload time carried in the top 32 bits of `id`.
#[must_use]
pub fn upload_time(id: u64) -> DateTime<Utc> {
    let seconds = i64::from(u32::try_from(id >> 32).unwrap_or(u32::MAX));
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// Extracts the uploader name from a full watch link.
#[must_use]
pub fn extract_username(link: &str) -> Option<String> {
    USERNAME_RE
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FULL: &str = "https://www.tiktok.com/@alice.b-c/video/7123456789012345678";

    // ===== classify_link =====

    #[test]
    fn test_classify_full_link() {
        assert_eq!(classify_link(FULL), Some(LinkKind::Full));
        assert_eq!(
            classify_link("http://tiktok.com/@bob/video/7123456789012345678?is_from_webapp=1"),
            Some(LinkKind::Full)
        );
    }

    #[test]
    fn test_classify_short_link() {
        assert_eq!(
            classify_link("https://vt.tiktok.com/ZSabc123/"),
            Some(LinkKind::Short)
        );
        assert_eq!(classify_link("vt.tiktok.com/ZSabc123/"), Some(LinkKind::Short));
        assert_eq!(
            classify_link("https://vm.tiktok.com/ZMabc/"),
            Some(LinkKind::Short)
        );
    }

    #[test]
    fn test_classify_bare_id() {
        assert_eq!(classify_link("7123456789012345678"), Some(LinkKind::BareId));
        assert_eq!(classify_link("  7123456789012345678 "), Some(LinkKind::BareId));
    }

    #[test]
    fn test_classify_rejects_other_input() {
        assert_eq!(classify_link(""), None);
        assert_eq!(classify_link("712345678901234567"), None);
        assert_eq!(classify_link("https://example.com/@a/video/1"), None);
        assert_eq!(classify_link("https://www.tiktok.com/@alice"), None);
        assert_eq!(classify_link("not a link"), None);
    }

    // ===== extract_video_id =====

    #[test]
    fn test_extract_id_from_full_link() {
        assert_eq!(extract_video_id(FULL), Some(7_123_456_789_012_345_678));
    }

    #[test]
    fn test_extract_id_from_bare_id() {
        assert_eq!(
            extract_video_id("7123456789012345678"),
            Some(7_123_456_789_012_345_678)
        );
    }

    #[test]
    fn test_extract_id_from_media_file_name() {
        assert_eq!(
            extract_video_id("https://cdn.example/v/7123456789012345678_original.mp4"),
            Some(7_123_456_789_012_345_678)
        );
    }

    #[test]
    fn test_extract_id_missing() {
        assert_eq!(extract_video_id("https://www.tiktok.com/@alice"), None);
        assert_eq!(extract_video_id("https://vt.tiktok.com/ZSabc/"), None);
    }

    #[test]
    fn test_extract_id_overflow_is_none() {
        assert_eq!(
            extract_video_id("https://www.tiktok.com/@a/video/99999999999999999999999"),
            None
        );
    }

    // ===== upload_time =====

    #[test]
    fn test_upload_time_uses_top_32_bits() {
        let seconds: u64 = 1_682_899_200; // 2023-05-01T00:00:00Z
        let id = (seconds << 32) | 0xDEAD_BEEF;
        assert_eq!(
            upload_time(id),
            Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_upload_time_small_id_is_epoch() {
        assert_eq!(upload_time(123), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_upload_time_matches_binary_prefix() {
        let id: u64 = 7_123_456_789_012_345_678;
        let bits = format!("{id:064b}");
        let expected = i64::from_str_radix(&bits[..32], 2).unwrap();
        assert_eq!(upload_time(id).timestamp(), expected);
    }

    // ===== extract_username =====

    #[test]
    fn test_extract_username_from_full_link() {
        assert_eq!(extract_username(FULL).as_deref(), Some("alice.b-c"));
    }

    #[test]
    fn test_extract_username_absent() {
        assert_eq!(extract_username("7123456789012345678"), None);
        assert_eq!(extract_username("https://vt.tiktok.com/ZSabc/"), None);
    }
}
