//! Pipeline stages that sit behind the source stage

pub mod analyzer;
pub mod caption;
pub mod framer;

pub use analyzer::{AnalyzerHandle, CaptionService, PsiAnalyzer};
pub use caption::{CaptionFilter, CaptionHandler};
pub use framer::PacketFramer;
