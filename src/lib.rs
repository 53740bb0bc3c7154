// src/lib.rs
pub mod captioner {
    pub use crate::types::Options;

    /// Async entry-point; returns at end of input, on Ctrl-C or on a socket error
    pub async fn run(opts: Options) -> anyhow::Result<()> {
        crate::core::run(opts).await
    }
}

pub mod arib;
pub mod captions;
pub mod constants;
pub mod engine;
pub mod error;
pub mod filters;
pub mod network;
pub mod psi;
pub mod report;
pub mod stats;
pub mod stream;
pub mod types;

mod core;

pub use captions::{CaptionAggregator, Captions};
pub use error::PipelineError;
pub use stream::{ByteChannel, ByteSource};
pub use types::{CaptionEvent, CaptionsConfig, CharSize, EngineStatus, FormatRun, LanguageInfo, PipelineState};
