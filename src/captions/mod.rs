//! Caption session: byte channel, demultiplexing pipeline and aggregator
//! wired together behind a polling API.

pub mod aggregator;

use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use tracing::warn;

use crate::constants::JST_OFFSET_SUFFIX;
use crate::engine::{Filter, TsEngine};
use crate::error::Result;
use crate::filters::{AnalyzerHandle, CaptionFilter, CaptionHandler, CaptionService, PacketFramer, PsiAnalyzer};
use crate::stats::StatusCounters;
use crate::stream::ByteChannel;
use crate::types::{CaptionEvent, CaptionsConfig, EngineStatus, LanguageInfo, PipelineState};

pub use aggregator::CaptionAggregator;

/// Lets the pipeline worker and the polling side share one aggregator
#[derive(Clone)]
pub struct SharedAggregator(Arc<Mutex<CaptionAggregator>>);

impl CaptionHandler for SharedAggregator {
    fn on_language_update(&mut self, languages: &[LanguageInfo]) {
        self.0.lock().on_language_update(languages);
    }

    fn on_caption(&mut self, event: &CaptionEvent) {
        self.0.lock().on_caption(event);
    }
}

/// `YYYY-MM-DDTHH:MM:SS+09:00`
pub fn format_jst(time: NaiveDateTime) -> String {
    format!("{}{}", time.format("%Y-%m-%dT%H:%M:%S"), JST_OFFSET_SUFFIX)
}

pub struct Captions {
    engine:     TsEngine,
    channel:    Arc<ByteChannel>,
    aggregator: SharedAggregator,
    analyzer:   AnalyzerHandle,
}

impl Captions {
    pub fn new(initial_text: &str) -> Self {
        Self::with_config(initial_text, CaptionsConfig::default())
    }

    /// Builds the pipeline and binds it to a fresh channel. A failed open
    /// is kept in `state()` / `last_error()` and can be retried.
    pub fn with_config(initial_text: &str, config: CaptionsConfig) -> Self {
        let counters = Arc::new(StatusCounters::new());
        let channel = Arc::new(ByteChannel::new(config.buffer_capacity));

        let mut agg = CaptionAggregator::new(config.ignore_small_text);
        agg.init_captions(initial_text);
        let aggregator = SharedAggregator(Arc::new(Mutex::new(agg)));

        let analyzer = AnalyzerHandle::new();
        let filters: Vec<Box<dyn Filter>> = vec![
            Box::new(PacketFramer::new(Arc::clone(&counters))),
            Box::new(PsiAnalyzer::new(analyzer.clone())),
            Box::new(CaptionFilter::new(analyzer.clone(), Box::new(aggregator.clone()), Arc::clone(&counters))),
        ];
        let mut engine = TsEngine::build_engine(filters, &config, counters);
        if let Err(e) = engine.open_source(channel.clone()) {
            warn!("captions created without a running pipeline: {e}");
        }

        Self { engine, channel, aggregator, analyzer }
    }

    /// Queues raw TS bytes; never blocks
    pub fn feed_packet(&self, data: &[u8]) -> usize {
        self.channel.write(data)
    }

    pub fn get_stocked_captions(&self) -> String {
        self.aggregator.0.lock().get_stocked_captions()
    }

    pub fn clear_stocked_captions(&self) {
        self.aggregator.0.lock().clear_stocked_captions();
    }

    pub fn init_captions(&self, seed: &str) {
        self.aggregator.0.lock().init_captions(seed);
    }

    /// Bytes queued in the channel and not yet pulled by the pipeline
    pub fn buffered_bytes(&self) -> usize {
        self.channel.size()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.channel.capacity()
    }

    /// Broadcast time advanced by PCR, or None before the first TDT/TOT
    pub fn get_interpolated_time(&self) -> Option<String> {
        self.analyzer.interpolated_time().map(format_jst)
    }

    pub fn get_tot_time(&self) -> String {
        self.get_interpolated_time().unwrap_or_default()
    }

    pub fn caption_service(&self) -> Option<CaptionService> {
        self.analyzer.caption_service()
    }

    pub fn reopen_source(&mut self) -> Result<()> {
        self.engine.open_source(self.channel.clone())
    }

    pub fn process_pending(&self) -> Result<usize> {
        self.engine.process_pending()
    }

    /// Joins the streaming worker, then drains the channel on this thread.
    /// Every byte fed before the call has reached the aggregator on return.
    pub fn flush(&mut self) -> Result<usize> {
        if self.engine.state() == PipelineState::Streaming {
            self.engine.stop_streaming()?;
        }
        self.engine.process_pending()
    }

    pub fn state(&self) -> PipelineState {
        self.engine.state()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.engine.last_error()
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.status()
    }
}

impl Default for Captions {
    fn default() -> Self {
        Self::new("")
    }
}

impl Drop for Captions {
    fn drop(&mut self) {
        // the worker must be gone before the channel is released
        self.engine.close_source();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jst_format() {
        let t = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .unwrap();
        assert_eq!(format_jst(t), "2024-01-02T03:04:05+09:00");
    }

    #[test]
    fn fresh_session_is_empty_and_seeded() {
        let captions = Captions::with_config(
            "seed",
            CaptionsConfig { start_streaming_on_open: false, ..CaptionsConfig::default() },
        );
        assert_eq!(captions.state(), PipelineState::Built);
        assert_eq!(captions.get_stocked_captions(), "seed");
        assert_eq!(captions.get_tot_time(), "");
        assert!(captions.get_interpolated_time().is_none());

        assert_eq!(captions.feed_packet(&[0u8; 10]), 10);
        assert_eq!(captions.process_pending().unwrap(), 10);
        captions.clear_stocked_captions();
        assert_eq!(captions.get_stocked_captions(), "");
    }

    #[test]
    fn reopen_keeps_streaming() {
        let mut captions = Captions::new("");
        assert_eq!(captions.state(), PipelineState::Streaming);
        captions.reopen_source().unwrap();
        assert_eq!(captions.state(), PipelineState::Streaming);
        assert!(captions.last_error().is_none());
    }
}
