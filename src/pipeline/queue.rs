//! Bounded FIFO hand-off between the detection producer and the render
//! consumer.
//!
//! Capacity is fixed at construction. `put` blocks with a bounded timeout
//! when full (backpressure: the producer stalls and retries, it never
//! drops); `get` blocks with a timeout and reports emptiness as a normal
//! outcome. FIFO order is strict: single producer, single consumer, no
//! reordering under any configuration change.

use std::time::Duration;

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::capture::Frame;
use crate::detect::DetectionResult;

/// One unit of hand-off: a frame paired with its detections.
#[derive(Clone)]
pub struct FramePacket {
    pub frame: Frame,
    pub result: DetectionResult,
}

#[derive(Default)]
struct Stats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    put_timeouts: AtomicU64,
    get_timeouts: AtomicU64,
}

/// Queue statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub put_timeouts: u64,
    pub get_timeouts: u64,
}

pub struct FrameQueue {
    tx: flume::Sender<FramePacket>,
    rx: flume::Receiver<FramePacket>,
    capacity: usize,
    stats: CachePadded<Stats>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = flume::bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            stats: CachePadded::new(Stats::default()),
        }
    }

    /// Enqueue a packet, blocking up to `timeout` while the queue is full.
    /// On timeout the packet is handed back so the caller can retry; it is
    /// never silently dropped.
    pub fn put(&self, packet: FramePacket, timeout: Duration) -> Result<(), FramePacket> {
        match self.tx.send_timeout(packet, timeout) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(flume::SendTimeoutError::Timeout(packet))
            | Err(flume::SendTimeoutError::Disconnected(packet)) => {
                self.stats.put_timeouts.fetch_add(1, Ordering::Relaxed);
                Err(packet)
            }
        }
    }

    /// Dequeue the next packet, blocking up to `timeout`. `None` means the
    /// queue stayed empty; callers treat that as a frequent, normal
    /// condition (e.g. while the producer is paused), not an error.
    pub fn get(&self, timeout: Duration) -> Option<FramePacket> {
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(packet)
            }
            Err(_) => {
                self.stats.get_timeouts.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.stats.enqueued.load(Ordering::Relaxed),
            dequeued: self.stats.dequeued.load(Ordering::Relaxed),
            put_timeouts: self.stats.put_timeouts.load(Ordering::Relaxed),
            get_timeouts: self.stats.get_timeouts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameMetadata, PixelFormat};
    use std::sync::Arc;
    use std::time::Instant;

    fn packet(sequence: u64) -> FramePacket {
        FramePacket {
            frame: Frame {
                data: bytes::Bytes::new(),
                meta: Arc::new(FrameMetadata {
                    sequence,
                    width: 0,
                    height: 0,
                    format: PixelFormat::Rgb24,
                }),
                timestamp: Instant::now(),
            },
            result: DetectionResult {
                sequence,
                detections: Vec::new(),
            },
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let q = FrameQueue::new(8);
        for seq in 1..=5 {
            assert!(q.put(packet(seq), Duration::from_millis(10)).is_ok());
        }
        for seq in 1..=5 {
            let got = q.get(Duration::from_millis(10)).unwrap();
            assert_eq!(got.frame.sequence(), seq);
        }
    }

    #[test]
    fn put_times_out_when_full_and_returns_packet() {
        let q = FrameQueue::new(2);
        assert!(q.put(packet(1), Duration::from_millis(5)).is_ok());
        assert!(q.put(packet(2), Duration::from_millis(5)).is_ok());

        let Err(rejected) = q.put(packet(3), Duration::from_millis(20)) else {
            panic!("queue accepted a packet beyond capacity");
        };
        assert_eq!(rejected.frame.sequence(), 3);
        assert_eq!(q.len(), 2);
        assert_eq!(q.stats().put_timeouts, 1);
    }

    #[test]
    fn get_reports_empty_as_none() {
        let q = FrameQueue::new(2);
        assert!(q.get(Duration::from_millis(10)).is_none());
        assert_eq!(q.stats().get_timeouts, 1);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let q = FrameQueue::new(3);
        for seq in 0..10 {
            let _ = q.put(packet(seq), Duration::from_millis(1));
        }
        assert_eq!(q.len(), 3);
    }
}
