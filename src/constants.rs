//! Constants for MPEG-TS demultiplexing and ARIB caption decoding

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;

/// PES packet constants
pub const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
pub const PES_PRIVATE_STREAM_1: u8 = 0xBD; // synchronised PES
pub const PES_PRIVATE_STREAM_2: u8 = 0xBF; // asynchronous PES

/// PCR constants
pub const PCR_CLOCK_HZ: u64 = 27_000_000; // 27 MHz
pub const PCR_WRAP_THRESHOLD: u64 = (1u64 << 33) * 300; // PCR wrap-around point

/// Well-known PIDs
pub const PAT_PID: u16 = 0x0000;
pub const TOT_PID: u16 = 0x0014; // TDT/TOT

/// One-seg PMT PIDs (ARIB TR-B14)
pub const ONESEG_PMT_PID_FIRST: u16 = 0x1FC8;
pub const ONESEG_PMT_PID_LAST: u16 = 0x1FCF;

/// Table ids
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;
pub const TABLE_ID_TDT: u8 = 0x70;
pub const TABLE_ID_TOT: u8 = 0x73;

/// PMT stream type carrying ARIB captions (PES private data)
pub const STREAM_TYPE_PRIVATE_PES: u8 = 0x06;

/// Descriptor tags
pub const DESC_STREAM_IDENTIFIER: u8 = 0x52;

/// Component tags identifying caption elementary streams
pub const CAPTION_COMPONENT_TAG_FIRST: u8 = 0x30;
pub const CAPTION_COMPONENT_TAG_LAST: u8 = 0x37;
pub const ONESEG_CAPTION_COMPONENT_TAG: u8 = 0x87;

/// ARIB STD-B24 PES data
pub const DATA_IDENTIFIER_CAPTION: u8 = 0x80;
pub const PRIVATE_STREAM_ID: u8 = 0xFF;

/// Data unit parameters
pub const UNIT_SEPARATOR: u8 = 0x1F;
pub const DATA_UNIT_STATEMENT_BODY: u8 = 0x20;

/// Default capacity of the ingress byte channel (about 1 MiB)
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024 * 1024;

/// Characters with special meaning for stocked captions
pub const FORM_FEED: char = '\u{0C}';
pub const CONTINUATION_GLYPH: char = '\u{2192}'; // →
pub const GETA_MARK: char = '\u{3013}'; // 〓, substituted for DRCS glyphs

/// Suffix of the broadcast local time (JST) string
pub const JST_OFFSET_SUFFIX: &str = "+09:00";
