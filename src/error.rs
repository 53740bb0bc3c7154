use thiserror::Error;

use crate::engine::FilterId;

/// Failures surfaced by the pipeline's opening protocol
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("byte source is not open")]
    SourceNotOpen,

    #[error("no byte source bound to {0}")]
    NoSource(&'static str),

    #[error("{0} is already streaming")]
    AlreadyStreaming(&'static str),

    #[error("{0} is not streaming")]
    NotStreaming(&'static str),

    #[error("failed to spawn streaming worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("filter {0} not found in graph")]
    UnknownFilter(FilterId),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
