use crate::constants::TABLE_ID_PAT;
use crate::psi::section::SectionReader;

/// ─────────── PAT ───────────
#[derive(Clone, Debug)]
pub struct PatSection {
    pub version:      u8,
    pub current_next: bool,
    pub programs:     Vec<PatEntry>,
}
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatEntry {
    pub program_number: u16,
    pub pmt_pid:        u16,
}

pub fn parse_pat(payload:&[u8]) -> anyhow::Result<PatSection> {
    let sec = SectionReader::new(payload)?;
    if sec.table_id != TABLE_ID_PAT { anyhow::bail!("not PAT"); }

    let programs = sec.body
        .chunks_exact(4)
        .map(|e| PatEntry {
            program_number: u16::from_be_bytes([e[0], e[1]]),
            pmt_pid:        (((e[2] & 0x1F) as u16) << 8) | (e[3] as u16),
        })
        .filter(|e| e.program_number != 0)   // NIT entry
        .collect();

    Ok(PatSection{ version:sec.version, current_next:sec.current_next, programs })
}
