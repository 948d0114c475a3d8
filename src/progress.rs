//! Progress bars for the download stage.

use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use tikfetch_core::{ProgressSink, VideoStatus};

const BAR_TEMPLATE: &str =
    "{msg:28!} [{bar:30.cyan/blue}] {bytes:>10}/{total_bytes:<10} {bytes_per_sec:>12}";

/// One bar per active download, stacked in a [`MultiProgress`].
pub(crate) struct BarProgress {
    multi: MultiProgress,
    style: ProgressStyle,
    bars: Mutex<HashMap<u64, ProgressBar>>,
}

impl BarProgress {
    pub(crate) fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::with_draw_target(target),
            style,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar(&self, video_id: u64) -> Option<ProgressBar> {
        self.bars.lock().ok()?.get(&video_id).cloned()
    }
}

impl ProgressSink for BarProgress {
    fn started(&self, video_id: u64, label: &str, total_bytes: u64) {
        let bar = self.multi.add(ProgressBar::new(total_bytes));
        bar.set_style(self.style.clone());
        bar.set_message(label.to_string());
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(video_id, bar);
        }
    }

    fn advanced(&self, video_id: u64, bytes: u64) {
        if let Some(bar) = self.bar(video_id) {
            bar.inc(bytes);
        }
    }

    fn finished(&self, video_id: u64, status: VideoStatus) {
        let Some(bar) = self.bars.lock().ok().and_then(|mut bars| bars.remove(&video_id)) else {
            return;
        };
        if status == VideoStatus::Completed {
            bar.finish();
        } else {
            bar.abandon_with_message(format!("{video_id} {status}"));
        }
    }
}
