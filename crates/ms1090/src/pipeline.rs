//! The producer/consumer boundary between sample capture and the
//! demod/decode/registry chain: the sample thread assembles a
//! double-buffer and hands it off over a rendezvous channel (never a
//! busy-wait spin on a raw flag byte); a full channel means the
//! consumer hasn't kept up, so the oldest buffer is dropped rather than
//! blocking the producer.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::demod::{self, DemodOptions};
use crate::magnitude::MagnitudeMap;

/// Bytes of overlap carried from one buffer to the next so a preamble
/// straddling a buffer boundary is never missed: `4*(FULL_LEN-1)`.
pub const OVERLAP_BYTES: usize = 4 * (16 + 2 * 112 - 1);
pub const DATA_LEN: usize = 16 * 16384;

/// The producer side of the handoff: owns the carried overlap tail and
/// pushes assembled buffers to a single consumer. Holds its own receiver
/// handle purely to drain a stale queued buffer on overtake — it never
/// consumes a buffer meant for the real `Consumer`.
pub struct Producer {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    carry: Vec<u8>,
}

/// The consumer side: blocks for the next assembled buffer.
pub struct Consumer {
    rx: Receiver<Vec<u8>>,
}

/// Builds the bounded(1) rendezvous pair. Bounding at 1 is what makes
/// "overtake drops the older buffer" hold without any extra bookkeeping:
/// a full channel means the consumer is still on the previous one.
pub fn channel() -> (Producer, Consumer) {
    let (tx, rx) = bounded(1);
    (
        Producer {
            tx,
            rx: rx.clone(),
            carry: vec![127u8; OVERLAP_BYTES],
        },
        Consumer { rx },
    )
}

impl Producer {
    /// Appends up to `DATA_LEN` fresh I/Q bytes to the carried overlap
    /// from the previous call and offers the combined buffer to the
    /// consumer. Never blocks: if the channel is still full, the stale
    /// queued buffer is drained and replaced with the fresh one.
    pub fn produce(&mut self, fresh: &[u8]) {
        let mut buffer = std::mem::take(&mut self.carry);
        buffer.extend_from_slice(fresh);

        let tail_start = buffer.len().saturating_sub(OVERLAP_BYTES);
        self.carry = buffer[tail_start..].to_vec();

        if let Err(TrySendError::Full(buffer)) = self.tx.try_send(buffer) {
            let _ = self.rx.try_recv();
            let _ = self.tx.try_send(buffer);
        }
    }
}

impl Consumer {
    /// Blocks until a buffer is ready, then takes it.
    pub fn consume_blocking(&self) -> Option<Vec<u8>> {
        self.rx.recv().ok()
    }
}

/// Runs one consumer-side pass: magnitude conversion then demodulation.
/// `FrameDecoder`/registry ingestion happen downstream in the daemon,
/// which owns the `IcaoCache` and `AircraftRegistry` locks.
pub fn process_buffer(
    mag_map: &MagnitudeMap,
    iq: &[u8],
    opts: &DemodOptions,
) -> Vec<demod::RawFrame> {
    let magnitude = mag_map.convert_buffer(iq);
    demod::demodulate(&magnitude, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produce_then_consume_round_trips_fresh_bytes() {
        let (mut producer, consumer) = channel();
        producer.produce(&[1, 2, 3, 4]);
        let buf = consumer.consume_blocking().expect("buffer ready");
        assert_eq!(&buf[OVERLAP_BYTES..], &[1, 2, 3, 4]);
    }

    #[test]
    fn overtaking_producer_drops_the_older_buffer() {
        let (mut producer, consumer) = channel();
        producer.produce(&[1]);
        producer.produce(&[2]);
        let buf = consumer.consume_blocking().expect("buffer ready");
        assert_eq!(buf.last(), Some(&2));
    }

    #[test]
    fn overlap_tail_is_carried_into_the_next_buffer() {
        let (mut producer, consumer) = channel();
        producer.produce(&[9, 9, 9]);
        let _ = consumer.consume_blocking();
        producer.produce(&[1]);
        let second = consumer.consume_blocking().expect("buffer ready");
        assert_eq!(second[second.len() - 4..], [9, 9, 9, 1]);
    }
}
