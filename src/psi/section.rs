// psi/section.rs
//! Generic PSI / SI section reader with CRC-32 (MPEG-2) validation.

use crc::{Crc, CRC_32_MPEG_2};

/// Returned by [`SectionReader::new`].
pub struct SectionReader<'a> {
    pub table_id:       u8,
    pub version:        u8,
    pub current_next:   bool,
    pub section_number: u8,
    pub last_section:   u8,
    pub table_id_ext:   u16,       // program_number / transport_stream_id
    pub body:           &'a [u8],  // bytes between fixed header & CRC
}

pub const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Skips the pointer field of a section-starting payload and returns
/// `(table_id, whole section incl. header)`.
pub fn locate_section(payload: &[u8]) -> anyhow::Result<(u8, &[u8])> {
    if payload.is_empty() { anyhow::bail!("payload empty") }
    let start = 1 + payload[0] as usize;
    if payload.len() < start + 3 { anyhow::bail!("short section") }

    let table_id = payload[start];
    let sec_len  = ((payload[start+1] & 0x0F) as usize) << 8 | payload[start+2] as usize;
    let end      = start + 3 + sec_len;
    if end > payload.len() { anyhow::bail!("truncated section") }
    Ok((table_id, &payload[start..end]))
}

/// CRC-32 over a full section; the last 4 bytes hold the expected value
pub fn crc_ok(section: &[u8]) -> bool {
    if section.len() < 4 { return false }
    let (data, crc) = section.split_at(section.len() - 4);
    CRC_MPEG.checksum(data) == u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]])
}

impl<'a> SectionReader<'a> {
    /// Validates pointer, length and CRC-32 of a long-form section.
    pub fn new(payload: &'a [u8]) -> anyhow::Result<Self> {
        let (table_id, sec) = locate_section(payload)?;
        if sec.len() < 12 { anyhow::bail!("invalid section_length") }
        if !crc_ok(sec) { anyhow::bail!("CRC-32 mismatch") }

        Ok(Self {
            table_id,
            version:        (sec[5] & 0x3E) >> 1,
            current_next:   sec[5] & 0x01 != 0,
            section_number: sec[6],
            last_section:   sec[7],
            table_id_ext:   u16::from_be_bytes([sec[3], sec[4]]),
            body:           &sec[8 .. sec.len()-4],
        })
    }
}

/// Collects the sections of one PID across TS packets.
///
/// Completed sections are handed out with a zero pointer_field in front,
/// so they go straight into the `parse_*` functions.
#[derive(Default)]
pub struct SectionAssembler {
    buf:     Vec<u8>, // pointer_field + partial section, empty when idle
    last_cc: Option<u8>,
}

impl SectionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the payload of one packet and returns every section it completes
    pub fn push(&mut self, cc: u8, payload_unit_start: bool, payload: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        if let Some(prev) = self.last_cc {
            if cc == prev {
                return out; // duplicate packet
            }
            if cc != (prev + 1) & 0x0F {
                self.buf.clear();
            }
        }
        self.last_cc = Some(cc);

        if payload_unit_start {
            let Some((&pointer, rest)) = payload.split_first() else { return out };
            let pointer = (pointer as usize).min(rest.len());
            if !self.buf.is_empty() {
                self.buf.extend_from_slice(&rest[..pointer]);
                self.take_complete(&mut out);
            }
            self.buf.clear();
            self.buf.push(0x00);
            self.buf.extend_from_slice(&rest[pointer..]);
        } else if !self.buf.is_empty() {
            self.buf.extend_from_slice(payload);
        }
        self.take_complete(&mut out);
        out
    }

    fn take_complete(&mut self, out: &mut Vec<Vec<u8>>) {
        while self.buf.len() >= 4 {
            if self.buf[1] == 0xFF {
                self.buf.clear(); // stuffing after the last section
                return;
            }
            let end = 4 + ((((self.buf[2] & 0x0F) as usize) << 8) | self.buf[3] as usize);
            if self.buf.len() < end {
                return;
            }
            out.push(self.buf[..end].to_vec());
            self.buf.drain(1..end);
            if self.buf.len() == 1 {
                self.buf.clear();
            }
        }
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.last_cc = None;
    }
}
