pub mod section;
pub mod pat;
pub mod pmt;
pub mod tdt;

pub use pat::{parse_pat, PatEntry, PatSection};
pub use pmt::{parse_pmt, Descriptor, PmtSection, StreamInfo};
pub use tdt::{parse_tdt_tot, TdtTot};
pub use section::SectionAssembler;
