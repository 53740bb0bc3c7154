//! Engine-wide status counters shared between the streaming worker and
//! whoever polls them

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::EngineStatus;

#[derive(Default)]
pub struct StatusCounters {
    bytes_read: AtomicU64,
    packets: AtomicU64,
    resyncs: AtomicU64,
    pes_errors: AtomicU64,
    data_group_crc_errors: AtomicU64,
    caption_events: AtomicU64,
}

impl StatusCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, n: usize) {
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn inc_packets(&self) {
        self.packets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resyncs(&self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pes_errors(&self) {
        self.pes_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_crc_errors(&self) {
        self.data_group_crc_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_caption_events(&self) {
        self.caption_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Zeroes every counter
    pub fn reset(&self) {
        for c in [
            &self.bytes_read,
            &self.packets,
            &self.resyncs,
            &self.pes_errors,
            &self.data_group_crc_errors,
            &self.caption_events,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> EngineStatus {
        EngineStatus {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            packets: self.packets.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            pes_errors: self.pes_errors.load(Ordering::Relaxed),
            data_group_crc_errors: self.data_group_crc_errors.load(Ordering::Relaxed),
            caption_events: self.caption_events.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_zeroes_snapshot() {
        let s = StatusCounters::new();
        s.add_bytes(376);
        s.inc_packets();
        s.inc_packets();
        s.inc_caption_events();
        let snap = s.snapshot();
        assert_eq!(snap.bytes_read, 376);
        assert_eq!(snap.packets, 2);
        assert_eq!(snap.caption_events, 1);

        s.reset();
        assert_eq!(s.snapshot(), EngineStatus::default());
    }
}
