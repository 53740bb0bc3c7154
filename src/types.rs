use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_BUFFER_CAPACITY;

/// Glyph size classes selected by SSZ / MSZ / NSZ / SZX
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CharSize {
    Small,
    Medium,
    Normal,
    Micro,
    DoubleHeight,
    DoubleWidth,
    DoubleSize,
    Special1,
    Special2,
}

impl CharSize {
    /// Small-size runs carry annotations (mostly ruby) that can be stripped
    pub fn is_small(self) -> bool {
        self == CharSize::Small
    }
}

/// Start of a sub-range of caption text drawn with one glyph size.
/// Offsets count chars, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatRun {
    pub start_offset: usize,
    pub char_size: CharSize,
}

/// One decoded statement-body data unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptionEvent {
    pub language_id: u8,
    pub text: String,
    pub format_runs: Vec<FormatRun>,
    pub is_one_seg: bool,
}

/// Language entry announced by caption management data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageInfo {
    pub language_tag: u8,
    pub dmf: u8,
    pub iso_639: String,
    pub format: u8,
    pub tcs: u8,
    pub rollup_mode: u8,
}

/// Lifecycle of the demultiplexing pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    /// Stages linked, no data flowing
    Built,
    /// Source stage being rebound, downstream link detached
    SourceOpening,
    /// Worker pulling from the byte source
    Streaming,
    /// Last open failed; retry is allowed
    Error,
}

/// Snapshot of the engine-wide status counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub bytes_read: u64,
    pub packets: u64,
    pub resyncs: u64,
    pub pes_errors: u64,
    pub data_group_crc_errors: u64,
    pub caption_events: u64,
}

/// Construction-time settings for [`crate::captions::Captions`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionsConfig {
    /// Capacity of the ingress byte channel
    pub buffer_capacity: usize,
    /// Drop small-size (annotation) runs from full-seg captions
    pub ignore_small_text: bool,
    /// Start the streaming worker as soon as the source is bound
    pub start_streaming_on_open: bool,
    /// Worker sleep after an empty read
    pub poll_interval_ms: u64,
    /// Upper bound on bytes pulled per read
    pub read_chunk_size: usize,
}

impl Default for CaptionsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            ignore_small_text: true,
            start_streaming_on_open: true,
            poll_interval_ms: 5,
            read_chunk_size: 188 * 256,
        }
    }
}

/// Options for the command-line host
pub struct Options {
    pub addr: Option<std::net::SocketAddr>,
    pub input: Option<std::path::PathBuf>,
    pub refresh_secs: u64,
    pub clear_after_report: bool,
    pub config: CaptionsConfig,
}
