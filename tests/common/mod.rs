//! Builders for transport streams carrying ARIB captions

#![allow(dead_code)]

use std::collections::HashMap;

use crc::{Crc, CRC_16_XMODEM, CRC_32_MPEG_2};

pub const PROGRAM_NUMBER: u16 = 0x0400;
pub const PMT_PID: u16 = 0x01F0;
pub const ONESEG_PMT_PID: u16 = 0x1FC8;
pub const PCR_PID: u16 = 0x01FF;
pub const CAPTION_PID: u16 = 0x0130;
pub const PCR_HZ: u64 = 27_000_000;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Keeps per-PID continuity counters
#[derive(Default)]
pub struct TsWriter {
    cc: HashMap<u16, u8>,
}

impl TsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// One packet; short payloads are padded with adaptation-field stuffing
    pub fn packet(&mut self, pid: u16, pusi: bool, payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= 184);
        let cc = self.cc.entry(pid).or_insert(0x0F);
        *cc = (*cc + 1) & 0x0F;

        let mut p = vec![0x47, (u8::from(pusi) << 6) | (pid >> 8) as u8, pid as u8];
        if payload.len() == 184 {
            p.push(0x10 | *cc);
        } else {
            p.push(0x30 | *cc);
            let af_len = 183 - payload.len();
            p.push(af_len as u8);
            if af_len > 0 {
                p.push(0x00);
                p.resize(p.len() + af_len - 1, 0xFF);
            }
        }
        p.extend_from_slice(payload);
        assert_eq!(p.len(), 188);
        p
    }

    pub fn pat(&mut self, pmt_pid: u16) -> Vec<u8> {
        let body = [
            (PROGRAM_NUMBER >> 8) as u8,
            PROGRAM_NUMBER as u8,
            0xE0 | (pmt_pid >> 8) as u8,
            pmt_pid as u8,
        ];
        let payload = psi(0x00, 0x0001, &body);
        self.packet(0x0000, true, &payload)
    }

    pub fn pmt(&mut self, pmt_pid: u16, component_tag: u8) -> Vec<u8> {
        let payload = psi(0x02, PROGRAM_NUMBER, &pmt_body(component_tag, 0));
        self.packet(pmt_pid, true, &payload)
    }

    /// PMT listing `extra_streams` video ES ahead of the caption ES, split over packets
    pub fn pmt_split(&mut self, pmt_pid: u16, component_tag: u8, extra_streams: u16) -> Vec<Vec<u8>> {
        let payload = psi(0x02, PROGRAM_NUMBER, &pmt_body(component_tag, extra_streams));
        payload
            .chunks(184)
            .enumerate()
            .map(|(i, chunk)| self.packet(pmt_pid, i == 0, chunk))
            .collect()
    }

    /// Adaptation-only packet carrying a PCR in 27 MHz ticks
    pub fn pcr(&mut self, pcr: u64) -> Vec<u8> {
        let base = pcr / 300;
        let ext = pcr % 300;
        let cc = *self.cc.get(&PCR_PID).unwrap_or(&0);
        let mut p = vec![0x47, (PCR_PID >> 8) as u8, PCR_PID as u8, 0x20 | cc, 183, 0x10];
        p.extend_from_slice(&[
            (base >> 25) as u8,
            (base >> 17) as u8,
            (base >> 9) as u8,
            (base >> 1) as u8,
            (((base & 1) << 7) as u8) | 0x7E | (ext >> 8) as u8,
            ext as u8,
        ]);
        p.resize(188, 0xFF);
        p
    }

    /// TOT with an empty descriptor loop; time fields are BCD
    pub fn tot(&mut self, mjd: u16, hour: u8, minute: u8, second: u8) -> Vec<u8> {
        let bcd = |v: u8| ((v / 10) << 4) | (v % 10);
        let mut sec = vec![0x73, 0x70, 0x0B];
        sec.extend_from_slice(&mjd.to_be_bytes());
        sec.extend_from_slice(&[bcd(hour), bcd(minute), bcd(second), 0xF0, 0x00]);
        let crc = CRC32.checksum(&sec);
        sec.extend_from_slice(&crc.to_be_bytes());

        let mut payload = vec![0x00];
        payload.extend(sec);
        self.packet(0x0014, true, &payload)
    }

    /// Synchronised caption PES holding one data group, in one packet
    pub fn caption(&mut self, group: &[u8]) -> Vec<u8> {
        let payload = caption_pes(group);
        self.packet(CAPTION_PID, true, &payload)
    }

    /// Caption PES split over as many packets as it needs
    pub fn caption_split(&mut self, group: &[u8], first_len: usize) -> Vec<Vec<u8>> {
        let pes = caption_pes(group);
        let (head, tail) = pes.split_at(first_len.min(pes.len()));
        let mut out = vec![self.packet(CAPTION_PID, true, head)];
        for chunk in tail.chunks(184) {
            out.push(self.packet(CAPTION_PID, false, chunk));
        }
        out
    }
}

fn pmt_body(component_tag: u8, extra_streams: u16) -> Vec<u8> {
    let mut body = vec![0xE0 | (PCR_PID >> 8) as u8, PCR_PID as u8, 0xF0, 0x00];
    for i in 0..extra_streams {
        let pid = 0x0200 + i;
        body.extend_from_slice(&[0x1B, 0xE0 | (pid >> 8) as u8, pid as u8, 0xF0, 0x03, 0x52, 0x01, 0x00]);
    }
    body.extend_from_slice(&[
        0x06,
        0xE0 | (CAPTION_PID >> 8) as u8,
        CAPTION_PID as u8,
        0xF0,
        0x03,
        0x52,
        0x01,
        component_tag,
    ]);
    body
}

/// Pointer field + long-form section with CRC-32
pub fn psi(table_id: u8, table_id_ext: u16, body: &[u8]) -> Vec<u8> {
    let sec_len = 5 + body.len() + 4;
    let mut sec = vec![
        table_id,
        0xB0 | (sec_len >> 8) as u8,
        sec_len as u8,
        (table_id_ext >> 8) as u8,
        table_id_ext as u8,
        0xC1,
        0x00,
        0x00,
    ];
    sec.extend_from_slice(body);
    let crc = CRC32.checksum(&sec);
    sec.extend_from_slice(&crc.to_be_bytes());

    let mut payload = vec![0x00];
    payload.extend(sec);
    payload
}

pub fn caption_pes(group: &[u8]) -> Vec<u8> {
    // stream 0xBD, PTS only, then data_identifier / private_stream_id / header length 0
    let mut pes = vec![0x00, 0x00, 0x01, 0xBD, 0x00, 0x00, 0x80, 0x80, 0x05, 0x21, 0x00, 0x01, 0x00, 0x01];
    pes.extend_from_slice(&[0x80, 0xFF, 0xF0]);
    pes.extend_from_slice(group);
    let len = (pes.len() - 6) as u16;
    pes[4..6].copy_from_slice(&len.to_be_bytes());
    pes
}

pub fn data_group(id: u8, data: &[u8]) -> Vec<u8> {
    let mut g = vec![id << 2, 0x00, 0x00];
    g.extend_from_slice(&(data.len() as u16).to_be_bytes());
    g.extend_from_slice(data);
    let crc = CRC16.checksum(&g);
    g.extend_from_slice(&crc.to_be_bytes());
    g
}

fn unit_loop(units: &[(u8, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (param, data) in units {
        body.extend_from_slice(&[0x1F, *param]);
        body.extend_from_slice(&(data.len() as u32).to_be_bytes()[1..]);
        body.extend_from_slice(data);
    }
    let mut out = (body.len() as u32).to_be_bytes()[1..].to_vec();
    out.extend(body);
    out
}

/// Caption statement data with one statement-body unit
pub fn statement(body: &[u8]) -> Vec<u8> {
    let mut s = vec![0x3F];
    s.extend(unit_loop(&[(0x20, body)]));
    s
}

/// Caption management data announcing Japanese as language 0
pub fn management() -> Vec<u8> {
    let mut m = vec![0x3F, 0x01, 0x1F, b'j', b'p', b'n', 0x00];
    m.extend(unit_loop(&[]));
    m
}

/// Statement text in the alphanumeric set: LS1 then ASCII
pub fn alnum(text: &str) -> Vec<u8> {
    let mut b = vec![0x0E];
    b.extend_from_slice(text.as_bytes());
    b
}
