//! Bounded, thread-safe FIFO byte channel acting as a virtual stream device.
//!
//! Writers never block and never fail: when the channel is full the oldest
//! bytes are evicted to make room. Readers drain whatever is buffered and
//! never wait for more.

use std::collections::VecDeque;
use std::io;

use parking_lot::Mutex;

use crate::constants::DEFAULT_BUFFER_CAPACITY;

/// Something the source stage can pull bytes from
pub trait ByteSource: Send + Sync {
    /// Moves up to `buf.len()` bytes into `buf`, returning the count
    fn read_into(&self, buf: &mut [u8]) -> usize;

    /// Whether the source can be bound right now
    fn is_open(&self) -> bool {
        true
    }

    /// Discards buffered data
    fn close(&self);
}

pub struct ByteChannel {
    buffer: Mutex<VecDeque<u8>>,
    capacity: usize,
}

impl ByteChannel {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(capacity.min(64 * 1024))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `data`, evicting the oldest bytes on overflow.
    /// Always reports the full input length.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }
        if self.capacity == 0 {
            return data.len();
        }

        let mut buf = self.buffer.lock();
        if data.len() >= self.capacity {
            // only the tail of this write can survive
            buf.clear();
            buf.extend(&data[data.len() - self.capacity..]);
        } else {
            let overflow = (buf.len() + data.len()).saturating_sub(self.capacity);
            if overflow > 0 {
                buf.drain(..overflow);
            }
            buf.extend(data);
        }
        data.len()
    }

    /// Removes and returns up to `max_len` bytes from the front
    pub fn read(&self, max_len: usize) -> Vec<u8> {
        let mut buf = self.buffer.lock();
        let n = max_len.min(buf.len());
        buf.drain(..n).collect()
    }

    pub fn size(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Clears the buffer; the channel stays usable
    pub fn close(&self) {
        let mut buf = self.buffer.lock();
        buf.clear();
        buf.shrink_to(64 * 1024);
    }

    /// Seeking is never supported
    pub fn set_pos(&self, _pos: u64) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "byte channel is not seekable"))
    }
}

impl Default for ByteChannel {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl ByteSource for ByteChannel {
    fn read_into(&self, out: &mut [u8]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let mut buf = self.buffer.lock();
        let n = out.len().min(buf.len());
        for (dst, src) in out.iter_mut().zip(buf.drain(..n)) {
            *dst = src;
        }
        n
    }

    fn close(&self) {
        ByteChannel::close(self);
    }
}

impl io::Read for &ByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf))
    }
}

impl io::Write for &ByteChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(ByteChannel::write(self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for &ByteChannel {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(p) => p,
            _ => 0,
        };
        self.set_pos(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn overflow_keeps_the_newest_bytes_in_order() {
        let ch = ByteChannel::new(8);
        let data: Vec<u8> = (0..20).collect();
        assert_eq!(ch.write(&data), 20);
        assert_eq!(ch.size(), 8);
        assert_eq!(ch.read(8), (12..20).collect::<Vec<u8>>());
        assert!(ch.is_empty());
    }

    #[test]
    fn incremental_writes_evict_oldest() {
        let ch = ByteChannel::new(5);
        ch.write(&[1, 2, 3]);
        ch.write(&[4, 5, 6, 7]);
        assert_eq!(ch.read(100), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn short_and_empty_reads() {
        let ch = ByteChannel::new(16);
        assert!(ch.read(4).is_empty());
        ch.write(&[9, 8, 7]);
        assert_eq!(ch.read(2), vec![9, 8]);
        assert_eq!(ch.read(10), vec![7]);
        assert_eq!(ch.read(10), Vec::<u8>::new());
    }

    #[test]
    fn zero_length_calls_are_no_ops() {
        let ch = ByteChannel::new(4);
        assert_eq!(ch.write(&[]), 0);
        ch.write(&[1]);
        let mut empty: [u8; 0] = [];
        assert_eq!(ch.read_into(&mut empty), 0);
        assert_eq!(ch.size(), 1);
    }

    #[test]
    fn close_clears_but_channel_stays_usable() {
        let ch = ByteChannel::new(4);
        ch.write(&[1, 2, 3]);
        ch.close();
        assert!(ch.is_empty());
        assert!(ch.read(3).is_empty());
        ch.write(&[4]);
        assert_eq!(ch.read(3), vec![4]);
    }

    #[test]
    fn seeking_fails() {
        let ch = ByteChannel::new(4);
        let mut r = &ch;
        assert!(r.seek(SeekFrom::Start(0)).is_err());
        assert_eq!(
            ch.set_pos(3).unwrap_err().kind(),
            std::io::ErrorKind::Unsupported
        );
    }

    #[test]
    fn io_read_drains() {
        let ch = ByteChannel::new(4);
        ch.write(b"abcd");
        let mut out = [0u8; 3];
        let mut r = &ch;
        assert_eq!(Read::read(&mut r, &mut out).unwrap(), 3);
        assert_eq!(&out, b"abc");
        assert_eq!(ch.size(), 1);
    }

    #[test]
    fn concurrent_producer_and_consumer_preserve_order() {
        let ch = Arc::new(ByteChannel::new(1 << 20));
        let producer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || {
                for i in 0..1000u32 {
                    ch.write(&i.to_be_bytes());
                }
            })
        };

        let mut got = Vec::new();
        while got.len() < 4000 {
            got.extend(ch.read(64));
            if got.len() < 4000 {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        for (i, chunk) in got.chunks_exact(4).enumerate() {
            assert_eq!(u32::from_be_bytes(chunk.try_into().unwrap()), i as u32);
        }
    }
}
