//! Demultiplexing pipeline: a source stage linked to a chain of filters,
//! plus the protocol for rebinding the source while the chain stays intact.

pub mod graph;
pub mod source;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::stats::StatusCounters;
use crate::stream::ByteSource;
use crate::types::{CaptionsConfig, EngineStatus, PipelineState};

pub use graph::{Filter, FilterChain, SharedChain};
pub use source::{BindableSource, StreamSource};

/// Position in the graph: 0 is the source stage, chain stages follow
pub type FilterId = usize;

pub const SOURCE_FILTER_ID: FilterId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDirection {
    Upstream,
    Downstream,
}

pub struct TsEngine {
    source:        StreamSource,
    chain:         SharedChain,
    counters:      Arc<StatusCounters>,
    state:         PipelineState,
    last_error:    Option<String>,
    start_on_open: bool,
}

impl TsEngine {
    /// Links the source stage to `filters` in order
    pub fn build_engine(filters: Vec<Box<dyn Filter>>, config: &CaptionsConfig, counters: Arc<StatusCounters>) -> Self {
        let chain: SharedChain = Arc::new(Mutex::new(FilterChain::new(filters)));
        let source = StreamSource::new(
            Arc::clone(&counters),
            Duration::from_millis(config.poll_interval_ms),
            config.read_chunk_size,
        );
        source.connect_output(Arc::clone(&chain));
        debug!(stages = chain.lock().len() + 1, "engine built");

        Self {
            source,
            chain,
            counters,
            state: PipelineState::Built,
            last_error: None,
            start_on_open: config.start_streaming_on_open,
        }
    }

    pub fn set_start_streaming_on_source_open(&mut self, start: bool) {
        self.start_on_open = start;
    }

    pub fn filter_id(&self, name: &str) -> Option<FilterId> {
        self.chain.lock().position(name).map(|i| i + 1)
    }

    pub fn connect_filter(&mut self, id: FilterId, direction: ConnectDirection) -> Result<()> {
        self.set_link(id, direction, true)
    }

    pub fn disconnect_filter(&mut self, id: FilterId, direction: ConnectDirection) -> Result<()> {
        self.set_link(id, direction, false)
    }

    pub fn is_connected(&self, id: FilterId, direction: ConnectDirection) -> bool {
        match (id, direction) {
            (SOURCE_FILTER_ID, ConnectDirection::Downstream) | (1, ConnectDirection::Upstream) => {
                self.source.is_output_connected()
            }
            (SOURCE_FILTER_ID, ConnectDirection::Upstream) => false,
            (n, ConnectDirection::Downstream) => self.chain.lock().is_linked(n - 1),
            (n, ConnectDirection::Upstream) => self.chain.lock().is_linked(n - 2),
        }
    }

    fn set_link(&mut self, id: FilterId, direction: ConnectDirection, connected: bool) -> Result<()> {
        let stages = self.chain.lock().len();
        if id > stages {
            return Err(PipelineError::UnknownFilter(id));
        }
        // normalise to "downstream link of stage `from`"
        let from = match direction {
            ConnectDirection::Downstream => id,
            ConnectDirection::Upstream if id == SOURCE_FILTER_ID => return Ok(()),
            ConnectDirection::Upstream => id - 1,
        };
        if from == SOURCE_FILTER_ID {
            if connected {
                self.source.connect_output(Arc::clone(&self.chain));
            } else {
                self.source.disconnect_output();
            }
        } else if !self.chain.lock().set_link(from - 1, connected) {
            return Err(PipelineError::UnknownFilter(id));
        }
        Ok(())
    }

    /// Rebinds the source stage. The downstream link is detached while the
    /// source changes and restored whether or not the bind succeeds.
    pub fn open_source(&mut self, input: Arc<dyn ByteSource>) -> Result<()> {
        self.close_source();
        self.state = PipelineState::SourceOpening;

        self.source.disconnect_output();
        let bound = self.source.open_source(input);
        self.source.connect_output(Arc::clone(&self.chain));

        if let Err(e) = bound {
            warn!("failed to open source: {e}");
            self.last_error = Some(e.to_string());
            self.state = PipelineState::Error;
            return Err(e);
        }

        if self.start_on_open {
            if let Err(e) = self.source.start_streaming() {
                warn!("failed to start streaming: {e}");
                self.last_error = Some(e.to_string());
                self.state = PipelineState::Error;
                return Err(e);
            }
        }

        self.reset_status();
        self.last_error = None;
        self.state = if self.source.is_streaming() { PipelineState::Streaming } else { PipelineState::Built };
        info!(streaming = self.source.is_streaming(), "source opened");
        Ok(())
    }

    /// Stops the worker and unbinds the source; partial stage state is dropped
    pub fn close_source(&mut self) {
        if !self.source.has_source() && !self.source.is_streaming() {
            return;
        }
        self.source.close_source();
        self.chain.lock().reset();
        self.state = PipelineState::Built;
    }

    pub fn start_streaming(&mut self) -> Result<()> {
        self.source.start_streaming()?;
        self.state = PipelineState::Streaming;
        Ok(())
    }

    pub fn stop_streaming(&mut self) -> Result<()> {
        if !self.source.is_streaming() {
            return Err(PipelineError::NotStreaming("stream source"));
        }
        self.source.stop_streaming();
        self.state = PipelineState::Built;
        Ok(())
    }

    /// Pushes everything buffered in the source through the chain on the
    /// caller's thread. Only valid while the worker is stopped.
    pub fn process_pending(&self) -> Result<usize> {
        self.source.pull_pending()
    }

    pub fn reset_status(&self) {
        self.counters.reset();
    }

    pub fn status(&self) -> EngineStatus {
        self.counters.snapshot()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Drop for TsEngine {
    fn drop(&mut self) {
        self.close_source();
    }
}
