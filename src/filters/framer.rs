//! Splits the raw byte stream into 188-byte transport packets,
//! re-acquiring sync after garbage or a dropped byte.

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::debug;

use crate::constants::{TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::engine::Filter;
use crate::stats::StatusCounters;

pub const FRAMER_NAME: &str = "ts framer";

pub struct PacketFramer {
    pending:  BytesMut,
    in_sync:  bool,
    counters: Arc<StatusCounters>,
}

impl PacketFramer {
    pub fn new(counters: Arc<StatusCounters>) -> Self {
        Self { pending: BytesMut::with_capacity(TS_PACKET_SIZE * 64), in_sync: true, counters }
    }

    fn lose_sync(&mut self) {
        if self.in_sync {
            self.in_sync = false;
            self.counters.inc_resyncs();
            debug!("lost TS sync");
        }
    }
}

impl Filter for PacketFramer {
    fn name(&self) -> &'static str {
        FRAMER_NAME
    }

    fn receive(&mut self, data: &[u8], output: &mut dyn FnMut(&[u8])) {
        self.pending.extend_from_slice(data);

        while self.pending.len() >= TS_PACKET_SIZE {
            if self.pending[0] != TS_SYNC_BYTE {
                self.lose_sync();
                match self.pending.iter().position(|&b| b == TS_SYNC_BYTE) {
                    Some(skip) => self.pending.advance(skip),
                    None => self.pending.clear(),
                }
                continue;
            }
            // a sync byte that is not followed by another one a packet later is a false hit
            if self.pending.len() > TS_PACKET_SIZE && self.pending[TS_PACKET_SIZE] != TS_SYNC_BYTE {
                self.lose_sync();
                self.pending.advance(1);
                continue;
            }

            let packet = self.pending.split_to(TS_PACKET_SIZE);
            self.in_sync = true;
            self.counters.inc_packets();
            output(&packet[..]);
        }
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.in_sync = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(tag: u8) -> Vec<u8> {
        let mut p = vec![tag; TS_PACKET_SIZE];
        p[0] = TS_SYNC_BYTE;
        p
    }

    fn run(framer: &mut PacketFramer, data: &[u8]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        framer.receive(data, &mut |p| out.push(p.to_vec()));
        out
    }

    #[test]
    fn packets_split_across_reads() {
        let counters = Arc::new(StatusCounters::new());
        let mut framer = PacketFramer::new(Arc::clone(&counters));
        let stream = [packet(1), packet(2)].concat();

        assert!(run(&mut framer, &stream[..100]).is_empty());
        let got = run(&mut framer, &stream[100..]);
        assert_eq!(got, vec![packet(1), packet(2)]);
        assert_eq!(counters.snapshot().packets, 2);
        assert_eq!(counters.snapshot().resyncs, 0);
    }

    #[test]
    fn resyncs_after_garbage() {
        let counters = Arc::new(StatusCounters::new());
        let mut framer = PacketFramer::new(Arc::clone(&counters));
        let mut stream = vec![0x00, 0x11, 0x22];
        stream.extend(packet(3));
        stream.extend(packet(4));

        let got = run(&mut framer, &stream);
        assert_eq!(got, vec![packet(3), packet(4)]);
        assert_eq!(counters.snapshot().resyncs, 1);
    }

    #[test]
    fn false_sync_byte_is_skipped() {
        let counters = Arc::new(StatusCounters::new());
        let mut framer = PacketFramer::new(Arc::clone(&counters));
        // stray 0x47 not followed by a packet boundary
        let mut stream = vec![TS_SYNC_BYTE, 0x00];
        stream.extend(packet(5));
        stream.extend(packet(6));

        let got = run(&mut framer, &stream);
        assert_eq!(got, vec![packet(5), packet(6)]);
        assert_eq!(counters.snapshot().resyncs, 1);
    }
}
