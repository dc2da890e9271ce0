//! Output tap - the single point where the mixed stream leaves the core
//!
//! # Byte layout
//!
//! Signed 16-bit little-endian PCM, channels interleaved in engine order
//! (`L0 R0 L1 R1 ...` for stereo), no header:
//!
//! ```text
//! byte:   0        1        2        3
//!       [ ch0 lo | ch0 hi | ch1 lo | ch1 hi ] [ next frame ... ]
//! ```
//!
//! A float sample `x` is encoded as `round(clamp(x, -1, 1) * 32767)`, so
//! `0.5 -> 16384 -> [0x00, 0x40]` and `-0.5 -> -16384 -> [0x00, 0xC0]`.
//!
//! # Real-time behaviour
//!
//! The tap is a bounded lock-free SPSC ring (`rtrb`). A block that does not
//! fit is dropped whole and counted; the writer never waits on a slow
//! consumer. The audio thread reaches the producer through `try_lock` only.

use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::types::Sample;

/// Encode one float sample as 16-bit PCM
#[inline]
pub fn encode_sample(sample: Sample) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Decode little-endian 16-bit PCM back to floats (for downstream consumers)
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16le(bytes: &[u8]) -> Vec<Sample> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as Sample / i16::MAX as Sample)
        .collect()
}

/// Write side of the output tap
pub struct OutputTap {
    producer: Mutex<rtrb::Producer<u8>>,
    reader: TapReader,
    capacity: usize,
    dropped_blocks: AtomicU64,
    written_bytes: AtomicU64,
}

impl OutputTap {
    /// Create a tap holding at most `capacity_bytes` of unread PCM
    pub fn new(capacity_bytes: usize) -> Self {
        let capacity = capacity_bytes.max(2);
        let (producer, consumer) = rtrb::RingBuffer::<u8>::new(capacity);
        log::debug!("Output tap created with capacity {} bytes", capacity);

        Self {
            producer: Mutex::new(producer),
            reader: TapReader {
                consumer: Arc::new(Mutex::new(consumer)),
                closed: Arc::new(AtomicBool::new(false)),
            },
            capacity,
            dropped_blocks: AtomicU64::new(0),
            written_bytes: AtomicU64::new(0),
        }
    }

    /// Append a block from the control plane
    ///
    /// Returns `false` if the block was dropped (tap full or closed).
    pub fn write(&self, samples: &[Sample]) -> bool {
        let mut producer = self
            .producer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.push_block(&mut producer, samples)
    }

    /// Append a block from the real-time path (never waits)
    ///
    /// A contended producer counts as a dropped block.
    pub fn try_write(&self, samples: &[Sample]) -> bool {
        match self.producer.try_lock() {
            Ok(mut producer) => self.push_block(&mut producer, samples),
            Err(_) => {
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    fn push_block(&self, producer: &mut rtrb::Producer<u8>, samples: &[Sample]) -> bool {
        if self.is_closed() {
            return false;
        }
        let needed = samples.len() * 2;
        match producer.write_chunk_uninit(needed) {
            Ok(chunk) => {
                chunk.fill_from_iter(
                    samples
                        .iter()
                        .flat_map(|&sample| encode_sample(sample).to_le_bytes()),
                );
                self.written_bytes.fetch_add(needed as u64, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.dropped_blocks.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Get a reader handle onto the tap
    pub fn reader(&self) -> TapReader {
        self.reader.clone()
    }

    /// Close the tap: writes are refused, readers drain then see EOF
    pub fn close(&self) {
        self.reader.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_closed()
    }

    /// Capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Blocks dropped because the tap was full or contended
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks.load(Ordering::Relaxed)
    }

    /// Total bytes accepted since creation
    pub fn written_bytes(&self) -> u64 {
        self.written_bytes.load(Ordering::Relaxed)
    }
}

/// Read side of the output tap
///
/// Clones share one stream: bytes read through one handle are gone for the
/// others. `Read` returns `WouldBlock` while the tap is open but empty and
/// `Ok(0)` once it is closed and drained.
#[derive(Clone)]
pub struct TapReader {
    consumer: Arc<Mutex<rtrb::Consumer<u8>>>,
    closed: Arc<AtomicBool>,
}

impl TapReader {
    /// Bytes ready to be read
    pub fn available(&self) -> usize {
        self.lock().slots()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Copy up to `buf.len()` available bytes, returning how many were copied
    pub fn read_available(&self, buf: &mut [u8]) -> usize {
        let mut consumer = self.lock();
        let n = consumer.slots().min(buf.len());
        if n == 0 {
            return 0;
        }
        match consumer.read_chunk(n) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                buf[..first.len()].copy_from_slice(first);
                buf[first.len()..n].copy_from_slice(second);
                chunk.commit_all();
                n
            }
            Err(_) => 0,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, rtrb::Consumer<u8>> {
        self.consumer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Read for TapReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.read_available(buf) {
            0 if self.is_closed() => Ok(0),
            0 => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "output tap has no data yet",
            )),
            n => Ok(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_scale_encoding() {
        let tap = OutputTap::new(64);
        assert!(tap.write(&[0.5, -0.5]));

        let mut reader = tap.reader();
        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[0x00, 0x40, 0x00, 0xC0]);
    }

    #[test]
    fn test_full_scale_is_clamped() {
        assert_eq!(encode_sample(1.0), i16::MAX);
        assert_eq!(encode_sample(3.0), i16::MAX);
        assert_eq!(encode_sample(-1.0), -i16::MAX);
        assert_eq!(encode_sample(0.0), 0);
    }

    #[test]
    fn test_full_tap_drops_whole_block() {
        let tap = OutputTap::new(8);
        assert!(tap.write(&[0.1, 0.2, 0.3]));
        // 6 of 8 bytes used; a 2-sample block needs 4
        assert!(!tap.try_write(&[0.4, 0.5]));
        assert_eq!(tap.dropped_blocks(), 1);
        assert_eq!(tap.reader().available(), 6);
    }

    #[test]
    fn test_empty_reader_would_block_then_eof_after_close() {
        let tap = OutputTap::new(16);
        let mut reader = tap.reader();
        let mut buf = [0u8; 4];

        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

        tap.write(&[0.25]);
        tap.close();
        assert_eq!(reader.read(&mut buf).unwrap(), 2);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(!tap.write(&[0.25]));
    }

    #[test]
    fn test_decode_roundtrip_within_quantization() {
        let tap = OutputTap::new(64);
        tap.write(&[0.25, -0.75, 0.0]);
        let mut buf = [0u8; 6];
        tap.reader().read_available(&mut buf);
        let decoded = decode_pcm16le(&buf);
        assert!((decoded[0] - 0.25).abs() < 1e-4);
        assert!((decoded[1] + 0.75).abs() < 1e-4);
        assert_eq!(decoded[2], 0.0);
    }
}
