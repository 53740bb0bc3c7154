//! PSI analysis stage: follows PAT / PMT to find the caption service,
//! tracks PCR on the service's PCR PID and records TDT/TOT time.
//! Packets pass through unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use parking_lot::RwLock;
use tracing::{debug, info, trace};

use crate::constants::*;
use crate::engine::Filter;
use crate::psi::{parse_pat, parse_pmt, parse_tdt_tot, PatSection, PmtSection, SectionAssembler};

pub const ANALYZER_NAME: &str = "psi analyzer";

/// Interpolation is abandoned past this PCR distance from the last TOT
const MAX_INTERPOLATION: u64 = 3600 * PCR_CLOCK_HZ;

/// Caption elementary stream picked from the PMTs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionService {
    pub program_number: u16,
    pub pid:            u16,
    pub one_seg:        bool,
}

#[derive(Debug, Default)]
struct Shared {
    service:    Option<CaptionService>,
    pcr_pid:    Option<u16>,
    tot:        Option<NaiveDateTime>,
    pcr_at_tot: Option<u64>,
    last_pcr:   Option<u64>,
}

/// Read side of the analyzer, cloned into the caption stage and the facade
#[derive(Clone, Default)]
pub struct AnalyzerHandle(Arc<RwLock<Shared>>);

impl AnalyzerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caption_service(&self) -> Option<CaptionService> {
        self.0.read().service
    }

    /// Most recent TDT/TOT time, JST
    pub fn tot_time(&self) -> Option<NaiveDateTime> {
        self.0.read().tot
    }

    /// TOT advanced by the PCR elapsed since it arrived
    pub fn interpolated_time(&self) -> Option<NaiveDateTime> {
        let s = self.0.read();
        let tot = s.tot?;
        let (Some(at), Some(now)) = (s.pcr_at_tot, s.last_pcr) else { return Some(tot) };
        let elapsed = pcr_delta(at, now);
        if elapsed > MAX_INTERPOLATION {
            return Some(tot);
        }
        let ms = (elapsed * 1000 / PCR_CLOCK_HZ) as i64;
        tot.checked_add_signed(Duration::milliseconds(ms)).or(Some(tot))
    }

    fn reset(&self) {
        *self.0.write() = Shared::default();
    }
}

/// Ticks from `from` to `to`, allowing for one wrap of the 27 MHz clock
pub fn pcr_delta(from: u64, to: u64) -> u64 {
    if to >= from { to - from } else { to + PCR_WRAP_THRESHOLD - from }
}

pub struct PsiAnalyzer {
    pat:      Option<PatSection>,
    pmt_map:  HashMap<u16, PmtSection>,       // pmt_pid -> PMT
    sections: HashMap<u16, SectionAssembler>, // pid -> partial section
    pcr_pid:  Option<u16>,
    handle:   AnalyzerHandle,
}

impl PsiAnalyzer {
    pub fn new(handle: AnalyzerHandle) -> Self {
        Self { pat: None, pmt_map: HashMap::new(), sections: HashMap::new(), pcr_pid: None, handle }
    }

    fn analyze(&mut self, chunk: &[u8]) {
        if chunk.len() < TS_PACKET_SIZE || chunk[0] != TS_SYNC_BYTE {
            return;
        }
        if chunk[1] & 0x80 != 0 {
            return; // transport_error_indicator
        }

        let pid = (((chunk[1] & 0x1F) as u16) << 8) | (chunk[2] as u16);
        let payload_unit_start = chunk[1] & 0x40 != 0;
        let adaption_field_ctrl = (chunk[3] & 0x30) >> 4;
        let mut payload_offset = 4usize;

        if adaption_field_ctrl & 0x02 != 0 {
            let ad_len = chunk[4] as usize;
            if Some(pid) == self.pcr_pid && ad_len >= 7 && chunk[5] & 0x10 != 0 {
                self.on_pcr(read_pcr(&chunk[6..12]));
            }
            payload_offset += 1 + ad_len;
        }
        if adaption_field_ctrl & 0x01 == 0 || payload_offset >= TS_PACKET_SIZE {
            return;
        }
        if pid != PAT_PID && pid != TOT_PID && !self.is_pmt_pid(pid) {
            return;
        }

        let payload = &chunk[payload_offset..];
        let cc = chunk[3] & 0x0F;
        let sections = self.sections.entry(pid).or_default().push(cc, payload_unit_start, payload);
        for section in sections {
            self.on_section(pid, &section);
        }
    }

    /// `payload` is one complete section behind a zero pointer_field
    fn on_section(&mut self, pid: u16, payload: &[u8]) {
        if pid == PAT_PID {
            match parse_pat(payload) {
                Ok(pat) => self.on_pat(pat),
                Err(e) => trace!("PAT rejected: {e}"),
            }
        } else if pid == TOT_PID {
            match parse_tdt_tot(payload) {
                Ok((table_id, t)) => self.on_time(table_id, t.time()),
                Err(e) => trace!("TDT/TOT rejected: {e}"),
            }
        } else if self.is_pmt_pid(pid) {
            match parse_pmt(payload) {
                Ok(pmt) => self.on_pmt(pid, pmt),
                Err(e) => trace!(pid, "PMT rejected: {e}"),
            }
        }
    }

    fn is_pmt_pid(&self, pid: u16) -> bool {
        self.pat.as_ref().is_some_and(|pat| pat.programs.iter().any(|e| e.pmt_pid == pid))
    }

    fn on_pat(&mut self, pat: PatSection) {
        if self.pat.as_ref().is_some_and(|old| old.version == pat.version && old.programs == pat.programs) {
            return;
        }
        debug!(version = pat.version, programs = pat.programs.len(), "PAT updated");
        self.pmt_map.retain(|pid, _| pat.programs.iter().any(|e| e.pmt_pid == *pid));
        self.sections.retain(|pid, _| {
            *pid == PAT_PID || *pid == TOT_PID || pat.programs.iter().any(|e| e.pmt_pid == *pid)
        });
        self.pat = Some(pat);
        self.select_service();
    }

    fn on_pmt(&mut self, pid: u16, pmt: PmtSection) {
        if self.pmt_map.get(&pid).is_some_and(|old| old.version == pmt.version) {
            return;
        }
        debug!(pid, version = pmt.version, program = pmt.program_number, "PMT updated");
        self.pmt_map.insert(pid, pmt);
        self.select_service();
    }

    /// First program in PAT order whose PMT carries a caption ES
    fn select_service(&mut self) {
        let Some(pat) = &self.pat else { return };

        let mut service = None;
        let mut pcr_pid = None;
        for entry in &pat.programs {
            let Some(pmt) = self.pmt_map.get(&entry.pmt_pid) else { continue };
            pcr_pid.get_or_insert(pmt.pcr_pid);
            if let Some(es) = pmt.streams.iter().find(|s| s.is_caption()) {
                let one_seg = (ONESEG_PMT_PID_FIRST..=ONESEG_PMT_PID_LAST).contains(&entry.pmt_pid)
                    || es.component_tag() == Some(ONESEG_CAPTION_COMPONENT_TAG);
                service = Some(CaptionService {
                    program_number: entry.program_number,
                    pid: es.elementary_pid,
                    one_seg,
                });
                pcr_pid = Some(pmt.pcr_pid);
                break;
            }
        }

        self.pcr_pid = pcr_pid;
        let mut shared = self.handle.0.write();
        if shared.pcr_pid != pcr_pid {
            shared.last_pcr = None;
            shared.pcr_at_tot = None;
            shared.pcr_pid = pcr_pid;
        }
        if shared.service != service {
            match &service {
                Some(s) => info!(program = s.program_number, pid = s.pid, one_seg = s.one_seg, "caption service selected"),
                None => debug!("no caption service"),
            }
            shared.service = service;
        }
    }

    fn on_pcr(&mut self, pcr: u64) {
        self.handle.0.write().last_pcr = Some(pcr);
    }

    fn on_time(&mut self, table_id: u8, time: NaiveDateTime) {
        debug!(table_id, %time, "broadcast time");
        let mut shared = self.handle.0.write();
        shared.tot = Some(time);
        shared.pcr_at_tot = shared.last_pcr;
    }
}

/// 33-bit base * 300 + 9-bit extension, in 27 MHz ticks
fn read_pcr(p: &[u8]) -> u64 {
    let base = ((p[0] as u64) << 25)
            | ((p[1] as u64) << 17)
            | ((p[2] as u64) << 9)
            | ((p[3] as u64) << 1)
            | ((p[4] as u64) >> 7);
    let ext = (((p[4] & 0x01) as u64) << 8) | (p[5] as u64);
    base * 300 + ext
}

impl Filter for PsiAnalyzer {
    fn name(&self) -> &'static str {
        ANALYZER_NAME
    }

    fn receive(&mut self, data: &[u8], output: &mut dyn FnMut(&[u8])) {
        self.analyze(data);
        output(data);
    }

    fn reset(&mut self) {
        self.pat = None;
        self.pmt_map.clear();
        self.sections.clear();
        self.pcr_pid = None;
        self.handle.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcr_fields() {
        // base = 1, ext = 2
        assert_eq!(read_pcr(&[0x00, 0x00, 0x00, 0x00, 0x80, 0x02]), 302);
    }

    #[test]
    fn delta_handles_wrap() {
        assert_eq!(pcr_delta(100, 400), 300);
        assert_eq!(pcr_delta(PCR_WRAP_THRESHOLD - 10, 5), 15);
    }

    #[test]
    fn interpolation_adds_elapsed_pcr() {
        let handle = AnalyzerHandle::new();
        assert!(handle.interpolated_time().is_none());

        let tot = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap();
        {
            let mut s = handle.0.write();
            s.tot = Some(tot);
            s.pcr_at_tot = Some(1_000);
            s.last_pcr = Some(1_000 + 3 * PCR_CLOCK_HZ / 2);
        }
        assert_eq!(handle.interpolated_time(), Some(tot + Duration::milliseconds(1500)));
        assert_eq!(handle.tot_time(), Some(tot));

        handle.0.write().last_pcr = Some(1_000 + 2 * MAX_INTERPOLATION);
        assert_eq!(handle.interpolated_time(), Some(tot));
    }
}
