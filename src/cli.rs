//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::PossibleValuesParser;

use tikfetch_core::Settings;

/// Batch download watermark-free short videos.
///
/// Pass video links, short links or bare video IDs as arguments, or one per
/// line in a file. Files are saved under `<download dir>/<username>/`.
#[derive(Parser, Debug)]
#[command(name = "tikfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Video links, short links or 19-digit video IDs
    pub links: Vec<String>,

    /// Read links from a file, one per line
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Extraction strategy [default: tikwm]
    #[arg(short, long, value_parser = PossibleValuesParser::new(["tikwm", "direct"]))]
    pub extractor: Option<String>,

    /// Seconds to wait between extraction requests (0 < s <= 60) [default: 1]
    #[arg(long, value_name = "SECONDS")]
    pub extraction_delay: Option<f64>,

    /// Maximum concurrent downloads (1-16) [default: 4]
    #[arg(short = 'c', long, value_parser = clap::value_parser!(i64).range(1..=16))]
    pub max_concurrent_downloads: Option<i64>,

    /// Output file name, e.g. "{username}_{date:%Y%m%d}_{video_id}"
    #[arg(short = 't', long, value_name = "TEMPLATE")]
    pub filename_template: Option<String>,

    /// Only skip a video when its exact output file exists
    #[arg(long)]
    pub lazy_duplicate_check: bool,

    /// Download even if the video already exists on disk
    #[arg(long, conflicts_with = "lazy_duplicate_check")]
    pub overwrite: bool,

    /// Proxy URL for all requests
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Root directory for downloads
    #[arg(short = 'd', long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip the config file entirely
    #[arg(long, conflicts_with = "config")]
    pub no_config: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Args {
    /// True when no link source was given.
    pub fn has_no_input(&self) -> bool {
        self.links.is_empty() && self.file.is_none()
    }

    /// Settings given on the command line. Unset flags stay `None` so the
    /// config file can supply them.
    pub fn settings(&self) -> Settings {
        Settings {
            extractor: self.extractor.clone(),
            extraction_delay: self.extraction_delay,
            max_concurrent_downloads: self.max_concurrent_downloads,
            filename_template: self.filename_template.clone(),
            lazy_duplicate_check: self.lazy_duplicate_check.then_some(true),
            overwrite: self.overwrite.then_some(true),
            proxy: self.proxy.clone(),
            download_dir: self.download_dir.clone(),
        }
    }
}
