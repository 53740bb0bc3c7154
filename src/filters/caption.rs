//! Caption stage: reassembles caption PES on the PID chosen by the
//! analyzer, validates data groups and emits one [`CaptionEvent`] per
//! statement-body data unit.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use bytes::BytesMut;
use tracing::{debug, trace, warn};

use crate::arib::{parse_data_group, parse_management, parse_statement, pes_data_group, AribStringDecoder};
use crate::constants::*;
use crate::engine::Filter;
use crate::filters::analyzer::AnalyzerHandle;
use crate::stats::StatusCounters;
use crate::types::{CaptionEvent, LanguageInfo};

pub const CAPTION_FILTER_NAME: &str = "caption filter";

/// Receives what the caption stage decodes
pub trait CaptionHandler: Send {
    fn on_language_update(&mut self, languages: &[LanguageInfo]) {
        let _ = languages;
    }

    fn on_caption(&mut self, event: &CaptionEvent);
}

impl CaptionHandler for Sender<CaptionEvent> {
    fn on_caption(&mut self, event: &CaptionEvent) {
        // receiver gone: nothing left to deliver to
        let _ = self.send(event.clone());
    }
}

pub struct CaptionFilter {
    analyzer:     AnalyzerHandle,
    handler:      Box<dyn CaptionHandler>,
    counters:     Arc<StatusCounters>,
    decoder:      AribStringDecoder,
    pid:          Option<u16>,
    one_seg:      bool,
    last_cc:      Option<u8>,
    pes:          BytesMut,
    pes_len:      Option<usize>,
    group_b:      Option<bool>, // group of the latest management data
    languages:    Vec<LanguageInfo>,
}

impl CaptionFilter {
    pub fn new(analyzer: AnalyzerHandle, handler: Box<dyn CaptionHandler>, counters: Arc<StatusCounters>) -> Self {
        Self {
            analyzer,
            handler,
            counters,
            decoder: AribStringDecoder::new(false),
            pid: None,
            one_seg: false,
            last_cc: None,
            pes: BytesMut::new(),
            pes_len: None,
            group_b: None,
            languages: Vec::new(),
        }
    }

    fn follow_service(&mut self) -> Option<u16> {
        let service = self.analyzer.caption_service()?;
        if self.pid != Some(service.pid) || self.one_seg != service.one_seg {
            debug!(pid = service.pid, one_seg = service.one_seg, "following caption PID");
            self.clear_stream();
            self.pid = Some(service.pid);
            self.one_seg = service.one_seg;
            self.decoder.set_one_seg(service.one_seg);
        }
        self.pid
    }

    fn clear_stream(&mut self) {
        self.pes.clear();
        self.pes_len = None;
        self.last_cc = None;
        self.group_b = None;
    }

    fn drop_partial(&mut self) {
        if !self.pes.is_empty() {
            self.counters.inc_pes_errors();
        }
        self.pes.clear();
        self.pes_len = None;
    }

    fn on_packet(&mut self, chunk: &[u8]) {
        if chunk.len() < TS_PACKET_SIZE || chunk[0] != TS_SYNC_BYTE {
            return;
        }
        let Some(target) = self.follow_service() else { return };
        let pid = (((chunk[1] & 0x1F) as u16) << 8) | (chunk[2] as u16);
        if pid != target {
            return;
        }
        if chunk[1] & 0x80 != 0 {
            self.drop_partial();
            return;
        }

        let payload_unit_start = chunk[1] & 0x40 != 0;
        let adaption_field_ctrl = (chunk[3] & 0x30) >> 4;
        if adaption_field_ctrl & 0x01 == 0 {
            return;
        }

        let cc = chunk[3] & 0x0F;
        if let Some(prev) = self.last_cc {
            if cc == prev {
                return; // duplicate packet
            }
            if cc != (prev + 1) & 0x0F {
                trace!(pid, expected = (prev + 1) & 0x0F, got = cc, "continuity error");
                self.drop_partial();
            }
        }
        self.last_cc = Some(cc);

        let mut payload_offset = 4usize;
        if adaption_field_ctrl & 0x02 != 0 {
            payload_offset += 1 + chunk[4] as usize;
        }
        let Some(payload) = chunk.get(payload_offset..) else { return };

        if payload_unit_start {
            if !self.pes.is_empty() {
                // unbounded PES ends at the next unit start; a bounded one is short
                match self.pes_len {
                    Some(_) => self.drop_partial(),
                    None => self.flush_pes(),
                }
            }
            self.pes.extend_from_slice(payload);
            self.pes_len = (self.pes.len() >= 6)
                .then(|| u16::from_be_bytes([self.pes[4], self.pes[5]]) as usize)
                .filter(|&len| len != 0)
                .map(|len| 6 + len);
        } else if !self.pes.is_empty() {
            self.pes.extend_from_slice(payload);
        }

        if self.pes_len.is_some_and(|len| self.pes.len() >= len) {
            self.flush_pes();
        }
    }

    fn flush_pes(&mut self) {
        let pes = self.pes.split().freeze();
        self.pes_len = None;
        self.handle_pes(&pes);
    }

    fn handle_pes(&mut self, pes: &[u8]) {
        let group = match pes_data_group(pes) {
            Ok(g) => g,
            Err(e) => {
                self.counters.inc_pes_errors();
                trace!("caption PES rejected: {e}");
                return;
            }
        };
        let dg = match parse_data_group(group) {
            Ok(dg) => dg,
            Err(e) => {
                self.counters.inc_crc_errors();
                warn!("data group rejected: {e}");
                return;
            }
        };

        if dg.is_management() {
            match parse_management(dg.data) {
                Ok(mgmt) => {
                    self.group_b = Some(dg.is_group_b());
                    if mgmt.languages != self.languages {
                        debug!(count = mgmt.languages.len(), "caption languages updated");
                        self.languages = mgmt.languages;
                        self.handler.on_language_update(&self.languages);
                    }
                }
                Err(e) => warn!("caption management data rejected: {e}"),
            }
            return;
        }

        // statements only count for the group of the last management data
        if self.group_b.is_some_and(|b| b != dg.is_group_b()) {
            return;
        }
        let Some(language_id) = dg.language_tag() else { return };

        let stmt = match parse_statement(dg.data) {
            Ok(s) => s,
            Err(e) => {
                warn!("caption statement data rejected: {e}");
                return;
            }
        };
        for unit in stmt.units.iter().filter(|u| u.parameter == DATA_UNIT_STATEMENT_BODY) {
            let decoded = self.decoder.decode_caption(unit.data);
            let event = CaptionEvent {
                language_id,
                text: decoded.text,
                format_runs: decoded.format_runs,
                is_one_seg: self.one_seg,
            };
            trace!(language_id, text = %event.text.escape_debug(), "caption");
            self.counters.inc_caption_events();
            self.handler.on_caption(&event);
        }
    }
}

impl Filter for CaptionFilter {
    fn name(&self) -> &'static str {
        CAPTION_FILTER_NAME
    }

    fn receive(&mut self, data: &[u8], output: &mut dyn FnMut(&[u8])) {
        self.on_packet(data);
        output(data);
    }

    fn reset(&mut self) {
        self.clear_stream();
        self.pid = None;
        self.languages.clear();
    }
}
