//! Run configuration: defaults, config-file values and CLI overrides.
//!
//! Raw values arrive as [`Settings`] (every field optional) from the config
//! file and from the command line. [`Settings::merged_over`] layers them
//! (CLI over file), and [`RunConfig::from_settings`] validates the result and
//! fills in defaults. Validation happens before any link is touched.

mod file;

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub use file::{
    CONFIG_FILE_NAME, LoadedConfig, load_config_file, load_default_config, parse_config_str,
    resolve_default_config_path,
};

use crate::download::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY};
use crate::extract::{ExtractorKind, ExtractorSettings};
use crate::http_client::validate_proxy;
use crate::resolver::{DuplicateCheck, OutputLayout};
use crate::video::{FilenameTemplate, TemplateError};

/// Folder name under the user's downloads directory.
pub const APP_DIR_NAME: &str = "Tikfetch";

/// Folder name for config and data directories.
pub const APP_ID: &str = "tikfetch";

/// Default pause between extraction starts, in seconds.
pub const DEFAULT_EXTRACTION_DELAY_SECS: f64 = 1.0;

/// Upper bound for the extraction delay, in seconds.
pub const MAX_EXTRACTION_DELAY_SECS: f64 = 60.0;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config value for `{key}`: {value}. Expected {expected}")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid filename template `{template}`: {source}")]
    Template {
        template: String,
        #[source]
        source: TemplateError,
    },

    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Could not determine a download directory. Set `download_dir` in the config file")]
    NoDownloadDir,
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl ToString, expected: &'static str) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
            expected,
        }
    }
}

/// Unvalidated settings from one source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub extractor: Option<String>,
    /// Seconds between extraction starts.
    pub extraction_delay: Option<f64>,
    pub max_concurrent_downloads: Option<i64>,
    pub filename_template: Option<String>,
    pub lazy_duplicate_check: Option<bool>,
    /// Overwrite existing files instead of skipping them.
    pub overwrite: Option<bool>,
    pub proxy: Option<String>,
    pub download_dir: Option<PathBuf>,
}

impl Settings {
    /// Returns `self` with unset fields taken from `lower`.
    #[must_use]
    pub fn merged_over(self, lower: Settings) -> Settings {
        Settings {
            extractor: self.extractor.or(lower.extractor),
            extraction_delay: self.extraction_delay.or(lower.extraction_delay),
            max_concurrent_downloads: self
                .max_concurrent_downloads
                .or(lower.max_concurrent_downloads),
            filename_template: self.filename_template.or(lower.filename_template),
            lazy_duplicate_check: self.lazy_duplicate_check.or(lower.lazy_duplicate_check),
            overwrite: self.overwrite.or(lower.overwrite),
            proxy: self.proxy.or(lower.proxy),
            download_dir: self.download_dir.or(lower.download_dir),
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub extractor: ExtractorKind,
    pub extraction_delay: Duration,
    pub max_concurrent_downloads: usize,
    pub filename_template: Option<FilenameTemplate>,
    pub duplicate_check: DuplicateCheck,
    pub proxy: Option<String>,
    pub download_dir: PathBuf,
    pub browser_profile_dir: PathBuf,
}

impl RunConfig {
    /// Validates `settings` and applies defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidValue`] or [`ConfigError::Template`] naming the
    /// first offending key; [`ConfigError::NoDownloadDir`] when no download
    /// directory is configured and none can be derived.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let extractor = match settings.extractor.as_deref() {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::invalid("extractor", raw, "one of: tikwm, direct"))?,
            None => ExtractorKind::default(),
        };

        let delay_secs = settings
            .extraction_delay
            .unwrap_or(DEFAULT_EXTRACTION_DELAY_SECS);
        if !delay_secs.is_finite() || delay_secs <= 0.0 || delay_secs > MAX_EXTRACTION_DELAY_SECS {
            return Err(ConfigError::invalid(
                "extraction_delay",
                delay_secs,
                "a number of seconds in (0, 60]",
            ));
        }

        let max_concurrent_downloads = match settings.max_concurrent_downloads {
            None => DEFAULT_CONCURRENCY,
            Some(raw) => usize::try_from(raw)
                .ok()
                .filter(|c| (MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(c))
                .ok_or_else(|| {
                    ConfigError::invalid("max_concurrent_downloads", raw, "range: 1..=16")
                })?,
        };

        let filename_template = settings
            .filename_template
            .as_deref()
            .map(|raw| {
                FilenameTemplate::parse(raw).map_err(|source| ConfigError::Template {
                    template: raw.to_string(),
                    source,
                })
            })
            .transpose()?;

        let duplicate_check = if settings.overwrite.unwrap_or(false) {
            DuplicateCheck::Off
        } else {
            DuplicateCheck::from_lazy_flag(settings.lazy_duplicate_check.unwrap_or(false))
        };

        let proxy = settings
            .proxy
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| {
                validate_proxy(p)
                    .map(|()| p.to_string())
                    .map_err(|_| ConfigError::invalid("proxy", p, "a proxy URL such as http://host:port"))
            })
            .transpose()?;

        let download_dir = match &settings.download_dir {
            Some(dir) => dir.clone(),
            None => default_download_dir().ok_or(ConfigError::NoDownloadDir)?,
        };

        Ok(Self {
            extractor,
            extraction_delay: Duration::from_secs_f64(delay_secs),
            max_concurrent_downloads,
            filename_template,
            duplicate_check,
            proxy,
            browser_profile_dir: default_browser_profile_dir(&download_dir),
            download_dir,
        })
    }

    /// Output layout for this run.
    #[must_use]
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(
            self.download_dir.clone(),
            self.filename_template.clone(),
            self.duplicate_check,
        )
    }

    /// Extractor settings for this run.
    #[must_use]
    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            kind: self.extractor,
            delay: self.extraction_delay,
            browser_profile_dir: self.browser_profile_dir.clone(),
        }
    }
}

/// `<downloads>/Tikfetch`, falling back to `~/Downloads/Tikfetch`.
#[must_use]
pub fn default_download_dir() -> Option<PathBuf> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .map(|dir| dir.join(APP_DIR_NAME))
}

/// `<data dir>/tikfetch/chrome_user_data`, falling back to a hidden folder
/// inside the download directory.
fn default_browser_profile_dir(download_dir: &std::path::Path) -> PathBuf {
    dirs::data_dir().map_or_else(
        || download_dir.join(".chrome_user_data"),
        |data| data.join(APP_ID).join("chrome_user_data"),
    )
}
