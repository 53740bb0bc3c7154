use crate::constants::*;
use crate::psi::section::SectionReader;

/// ─────────── PMT ───────────
#[derive(Clone, Debug)]
pub struct PmtSection {
    pub version:        u8,
    pub program_number: u16,
    pub pcr_pid:        u16,
    pub streams:        Vec<StreamInfo>,
}
#[derive(Clone, Debug)]
pub struct StreamInfo {
    pub stream_type:    u8,
    pub elementary_pid: u16,
    pub descriptors:    Vec<Descriptor>,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub tag:  u8,
    pub data: Vec<u8>,
}

impl StreamInfo {
    /// component_tag from the stream identifier descriptor
    pub fn component_tag(&self) -> Option<u8> {
        self.descriptors
            .iter()
            .find(|d| d.tag == DESC_STREAM_IDENTIFIER)
            .and_then(|d| d.data.first().copied())
    }

    /// ARIB caption ES: private PES with a caption component tag
    pub fn is_caption(&self) -> bool {
        self.stream_type == STREAM_TYPE_PRIVATE_PES
            && matches!(
                self.component_tag(),
                Some(CAPTION_COMPONENT_TAG_FIRST..=CAPTION_COMPONENT_TAG_LAST)
                    | Some(ONESEG_CAPTION_COMPONENT_TAG)
            )
    }
}

fn parse_descriptors(mut b: &[u8]) -> Vec<Descriptor> {
    let mut out = Vec::new();
    while b.len() >= 2 {
        let len = b[1] as usize;
        if 2 + len > b.len() { break; }
        out.push(Descriptor { tag: b[0], data: b[2..2 + len].to_vec() });
        b = &b[2 + len..];
    }
    out
}

pub fn parse_pmt(payload:&[u8]) -> anyhow::Result<PmtSection> {
    let sec = SectionReader::new(payload)?;
    if sec.table_id != TABLE_ID_PMT { anyhow::bail!("not PMT"); }
    let b = sec.body;
    if b.len() < 4 { anyhow::bail!("short PMT body"); }

    /* ── fixed header inside the body ── */
    let pcr_pid       = (((b[0] & 0x1F) as u16) << 8) | (b[1] as u16);
    let prog_info_len = (((b[2] & 0x0F) as usize) << 8) | (b[3] as usize);
    let mut idx       = 4 + prog_info_len;          // skip program descriptors

    /* ── ES loop ── */
    let mut streams = Vec::new();
    while idx + 5 <= b.len() {
        let stype = b[idx];
        let pid   = (((b[idx+1] & 0x1F) as u16) << 8) | (b[idx+2] as u16);
        let eslen = (((b[idx+3] & 0x0F) as usize) << 8) | (b[idx+4] as usize);
        let desc_end = (idx + 5 + eslen).min(b.len());
        streams.push(StreamInfo{
            stream_type: stype,
            elementary_pid: pid,
            descriptors: parse_descriptors(&b[idx+5 .. desc_end]),
        });
        idx += 5 + eslen;
    }

    Ok(PmtSection{ version:sec.version,
                   program_number:sec.table_id_ext,
                   pcr_pid,
                   streams })
}
