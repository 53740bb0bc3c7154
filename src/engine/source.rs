//! Source stage: binds a [`ByteSource`] and pushes what it reads into the
//! downstream chain, either from a worker thread or on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::engine::graph::SharedChain;
use crate::error::{PipelineError, Result};
use crate::stats::StatusCounters;
use crate::stream::ByteSource;

const SOURCE_NAME: &str = "stream source";

/// A stage that can be (re)bound to an upstream byte source
pub trait BindableSource {
    fn open_source(&mut self, source: Arc<dyn ByteSource>) -> Result<()>;
    fn close_source(&mut self);
    fn start_streaming(&mut self) -> Result<()>;
    fn stop_streaming(&mut self);
    fn is_streaming(&self) -> bool;
}

type Link = Arc<Mutex<Option<SharedChain>>>;

struct Worker {
    stop:   Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct StreamSource {
    input:         Option<Arc<dyn ByteSource>>,
    output:        Link,
    worker:        Option<Worker>,
    counters:      Arc<StatusCounters>,
    poll_interval: Duration,
    chunk_size:    usize,
}

impl StreamSource {
    pub fn new(counters: Arc<StatusCounters>, poll_interval: Duration, chunk_size: usize) -> Self {
        Self {
            input: None,
            output: Arc::new(Mutex::new(None)),
            worker: None,
            counters,
            poll_interval,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn connect_output(&self, chain: SharedChain) {
        *self.output.lock() = Some(chain);
    }

    pub fn disconnect_output(&self) {
        *self.output.lock() = None;
    }

    pub fn is_output_connected(&self) -> bool {
        self.output.lock().is_some()
    }

    pub fn has_source(&self) -> bool {
        self.input.is_some()
    }

    /// Drains the bound source on the caller's thread.
    /// Fails while the worker owns the source.
    pub fn pull_pending(&self) -> Result<usize> {
        if self.is_streaming() {
            return Err(PipelineError::AlreadyStreaming(SOURCE_NAME));
        }
        let input = self.input.as_ref().ok_or(PipelineError::NoSource(SOURCE_NAME))?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0;
        loop {
            let n = pull_once(input.as_ref(), &self.output, &mut buf, &self.counters);
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }
}

fn pull_once(input: &dyn ByteSource, output: &Link, buf: &mut [u8], counters: &StatusCounters) -> usize {
    let n = input.read_into(buf);
    if n == 0 {
        return 0;
    }
    counters.add_bytes(n);
    // data read while the link is detached is dropped
    let chain = output.lock().clone();
    if let Some(chain) = chain {
        chain.lock().push(&buf[..n]);
    }
    n
}

impl BindableSource for StreamSource {
    fn open_source(&mut self, source: Arc<dyn ByteSource>) -> Result<()> {
        if self.is_streaming() {
            return Err(PipelineError::AlreadyStreaming(SOURCE_NAME));
        }
        if !source.is_open() {
            return Err(PipelineError::SourceNotOpen);
        }
        self.input = Some(source);
        debug!("byte source bound");
        Ok(())
    }

    fn close_source(&mut self) {
        self.stop_streaming();
        if self.input.take().is_some() {
            debug!("byte source released");
        }
    }

    fn start_streaming(&mut self) -> Result<()> {
        if self.is_streaming() {
            return Err(PipelineError::AlreadyStreaming(SOURCE_NAME));
        }
        let input = self.input.clone().ok_or(PipelineError::NoSource(SOURCE_NAME))?;
        let output = Arc::clone(&self.output);
        let counters = Arc::clone(&self.counters);
        let stop = Arc::new(AtomicBool::new(false));
        let poll_interval = self.poll_interval;
        let mut buf = vec![0u8; self.chunk_size];

        let handle = thread::Builder::new()
            .name("ts-source".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || {
                    trace!("streaming worker started");
                    while !stop.load(Ordering::Acquire) {
                        if pull_once(input.as_ref(), &output, &mut buf, &counters) == 0 {
                            thread::sleep(poll_interval);
                        }
                    }
                    trace!("streaming worker stopped");
                }
            })?;

        self.worker = Some(Worker { stop, handle });
        info!("streaming started");
        Ok(())
    }

    fn stop_streaming(&mut self) {
        let Some(worker) = self.worker.take() else { return };
        worker.stop.store(true, Ordering::Release);
        if worker.handle.join().is_err() {
            tracing::error!("streaming worker panicked");
        }
        info!("streaming stopped");
    }

    fn is_streaming(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}
