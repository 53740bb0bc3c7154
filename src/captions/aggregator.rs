//! Turns caption events into the stocked-captions text buffer

use tracing::trace;

use crate::constants::{CONTINUATION_GLYPH, FORM_FEED};
use crate::filters::CaptionHandler;
use crate::types::{CaptionEvent, FormatRun, LanguageInfo};

#[derive(Debug, Default)]
pub struct CaptionAggregator {
    accumulated:          String,
    last_was_clear:       bool,
    continuation_pending: bool,
    ignore_small:         bool,
}

impl CaptionAggregator {
    pub fn new(ignore_small: bool) -> Self {
        Self { ignore_small, ..Self::default() }
    }

    pub fn get_stocked_captions(&self) -> String {
        self.accumulated.clone()
    }

    /// Empties the text; decoder-side flags are kept
    pub fn clear_stocked_captions(&mut self) {
        self.accumulated.clear();
    }

    pub fn init_captions(&mut self, seed: &str) {
        self.accumulated = seed.to_owned();
    }

    pub fn last_was_clear(&self) -> bool {
        self.last_was_clear
    }

    pub fn continuation_pending(&self) -> bool {
        self.continuation_pending
    }

    pub fn on_caption(&mut self, event: &CaptionEvent) {
        if event.text.is_empty() {
            return;
        }

        if event.text.chars().all(|c| c == FORM_FEED) {
            // a clear carries no text; repeats of it are dropped without touching state
            if !self.last_was_clear && !self.continuation_pending {
                self.last_was_clear = true;
            }
            return;
        }
        self.last_was_clear = false;

        let mut text: Vec<char> = event.text.chars().collect();
        if !event.is_one_seg && self.ignore_small {
            strip_small_runs(&mut text, &event.format_runs);
        }

        let mut out = String::with_capacity(event.text.len());
        for (i, c) in text.into_iter().enumerate() {
            match c {
                FORM_FEED if i == 0 && !self.continuation_pending => out.push('\n'),
                FORM_FEED => {}
                c => out.push(c),
            }
        }

        if out.chars().count() > 1 && out.ends_with(CONTINUATION_GLYPH) {
            out.pop();
            self.continuation_pending = true;
        } else {
            self.continuation_pending = false;
        }

        trace!(appended = %out.escape_debug(), continuation = self.continuation_pending, "caption stocked");
        self.accumulated.push_str(&out);
    }
}

/// Deletes every small-size run, last run first
fn strip_small_runs(text: &mut Vec<char>, runs: &[FormatRun]) {
    for (i, run) in runs.iter().enumerate().rev() {
        if !run.char_size.is_small() {
            continue;
        }
        let end = runs.get(i + 1).map_or(text.len(), |next| next.start_offset).min(text.len());
        let start = run.start_offset.min(end);
        text.drain(start..end);
    }
}

impl CaptionHandler for CaptionAggregator {
    fn on_language_update(&mut self, _languages: &[LanguageInfo]) {}

    fn on_caption(&mut self, event: &CaptionEvent) {
        CaptionAggregator::on_caption(self, event);
    }
}
