//! Filename templates.
//!
//! A template is a string with placeholders, rendered to a file name with an
//! `.mp4` extension appended:
//!
//! - `{video_id}` (required)
//! - `{username}`
//! - `{date}` or `{date:FORMAT}`, the upload time in UTC formatted with
//!   strftime-style specifiers (default [`DEFAULT_DATE_FORMAT`])

use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::patterns::compile_static_regex;

/// Format used for a bare `{date}` placeholder.
pub const DEFAULT_DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

const VIDEO_ID_PLACEHOLDER: &str = "{video_id}";
const USERNAME_PLACEHOLDER: &str = "{username}";
const ILLEGAL_CHARACTERS: [char; 10] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\0'];

static DATE_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"\{date(?::(.*?))?\}"));

/// Reasons a template is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("filename template must contain {{video_id}}")]
    MissingVideoId,

    #[error("date placeholder has an empty format; use {{date}} or {{date:%Y%m%d}}")]
    EmptyDateFormat,

    #[error("date format '{format}' contains illegal filename character {character:?}")]
    IllegalCharacter { format: String, character: char },

    #[error("date format '{format}' is not a valid strftime format")]
    InvalidDateFormat { format: String },

    #[error("date format '{format}' contains a brace; placeholders cannot be nested")]
    NestedPlaceholder { format: String },
}

/// A validated filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    raw: String,
}

impl FilenameTemplate {
    /// Validates `raw` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns a [`TemplateError`] when `{video_id}` is missing outside the
    /// date placeholders, or any date placeholder has an empty, nested,
    /// illegal or unparseable format.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        for caps in DATE_PLACEHOLDER_RE.captures_iter(raw) {
            let Some(format) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            validate_date_format(format)?;
        }

        if !DATE_PLACEHOLDER_RE
            .replace_all(raw, "")
            .contains(VIDEO_ID_PLACEHOLDER)
        {
            return Err(TemplateError::MissingVideoId);
        }

        Ok(Self {
            raw: raw.to_string(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Renders the file name for a video, including the `.mp4` extension.
    ///
    /// Only the first date placeholder is substituted.
    #[must_use]
    pub fn render(&self, video_id: u64, username: &str, uploaded_at: DateTime<Utc>) -> String {
        let with_date = DATE_PLACEHOLDER_RE.replace(&self.raw, |caps: &regex::Captures<'_>| {
            let format = caps.get(1).map_or(DEFAULT_DATE_FORMAT, |m| m.as_str());
            let mut formatted = String::new();
            // Formats were validated in `parse`, so this cannot fail.
            let _ = write!(formatted, "{}", uploaded_at.format(format));
            formatted
        });

        let mut name = with_date
            .replace(USERNAME_PLACEHOLDER, username)
            .replace(VIDEO_ID_PLACEHOLDER, &video_id.to_string());
        name.push_str(".mp4");
        name
    }
}

impl FromStr for FilenameTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// File name used when no template is configured.
#[must_use]
pub(crate) fn default_file_name(video_id: u64) -> String {
    format!("{video_id}.mp4")
}

fn validate_date_format(format: &str) -> Result<(), TemplateError> {
    if format.is_empty() {
        return Err(TemplateError::EmptyDateFormat);
    }
    if format.contains(['{', '}']) {
        return Err(TemplateError::NestedPlaceholder {
            format: format.to_string(),
        });
    }
    if let Some(character) = format.chars().find(|c| ILLEGAL_CHARACTERS.contains(c)) {
        return Err(TemplateError::IllegalCharacter {
            format: format.to_string(),
            character,
        });
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(TemplateError::InvalidDateFormat {
            format: format.to_string(),
        });
    }
    Ok(())
}
