//! Sync marker framing for the serial link.
//!
//! On the serial link every request is preceded by a two byte marker.
//! Responses travel unmarked because the requesting side is already waiting
//! for exactly one reply.
//!
//! ```text
//! +------+------+---------------------------+
//! | 0xBB | 0xBB | request (see `message`)   |
//! +------+------+---------------------------+
//! ```
//!
//! A reader that lost its place discards bytes until it has seen two
//! consecutive marker bytes. Marker bytes inside a payload are harmless: the
//! scanner only runs between frames.

/// Bytes preceding each request on the serial link.
pub const SYNC_MARKER: [u8; 2] = [0xBB, 0xBB];

const MARKER_BYTE: u8 = 0xBB;

/// Resynchronization state machine.
///
/// Tracks a single flag: whether the previous byte was a marker byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncScanner {
    seen_first: bool,
    discarded: u64,
}

impl SyncScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one byte. Returns true once a full marker has been seen, after
    /// which the scanner is reset for the next frame.
    pub fn feed(&mut self, byte: u8) -> bool {
        if byte == MARKER_BYTE {
            if self.seen_first {
                self.seen_first = false;
                return true;
            }
            self.seen_first = true;
        } else {
            if self.seen_first {
                // The lone marker byte turned out to be noise too.
                self.discarded += 1;
            }
            self.seen_first = false;
            self.discarded += 1;
        }
        false
    }

    /// Scans `bytes` for a marker, returning the offset just past it.
    pub fn scan(&mut self, bytes: &[u8]) -> Option<usize> {
        bytes
            .iter()
            .position(|&b| self.feed(b))
            .map(|index| index + 1)
    }

    /// Number of bytes thrown away since the scanner was created or reset.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Encoder;
    use crate::message::{Operation, Request};
    use bytes::Bytes;
    use proptest::prelude::*;

    #[test]
    fn test_marker_at_start() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0xBB, 0xBB, 0x02, 0x00]), Some(2));
        assert_eq!(scanner.discarded(), 0);
    }

    #[test]
    fn test_garbage_before_marker() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0x00, 0x13, 0xBB, 0xBB]), Some(4));
        assert_eq!(scanner.discarded(), 2);
    }

    #[test]
    fn test_lone_marker_byte_resets() {
        let mut scanner = SyncScanner::new();
        assert!(!scanner.feed(0xBB));
        assert!(!scanner.feed(0x41));
        // The earlier marker byte no longer counts.
        assert!(!scanner.feed(0xBB));
        assert!(scanner.feed(0xBB));
        assert_eq!(scanner.discarded(), 2);
    }

    #[test]
    fn test_three_marker_bytes() {
        // The first pair syncs; the third byte belongs to the frame.
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0xBB, 0xBB, 0xBB]), Some(2));
        assert_eq!(scanner, SyncScanner::default());
    }

    #[test]
    fn test_marker_split_across_scans() {
        let mut scanner = SyncScanner::new();
        assert_eq!(scanner.scan(&[0x01, 0xBB]), None);
        assert_eq!(scanner.scan(&[0xBB, 0x02]), Some(1));
    }

    #[test]
    fn test_reset() {
        let mut scanner = SyncScanner::new();
        scanner.feed(0x01);
        scanner.feed(0xBB);
        scanner.reset();
        assert_eq!(scanner, SyncScanner::default());
    }

    proptest! {
        #[test]
        fn prop_resync_after_garbage(
            garbage in prop::collection::vec(any::<u8>(), 0..256),
            data in prop::collection::vec(any::<u8>(), 0..128),
        ) {
            // Garbage never ends in a marker byte, or the frame's marker would
            // pair with it one byte early.
            let mut garbage = garbage;
            if garbage.last() == Some(&0xBB) {
                garbage.push(0x00);
            }
            let request = Request::new(Operation::Insert).with_data(data);
            let framed = Encoder::encode_marked_request(&request).unwrap();

            let mut stream = garbage.clone();
            stream.extend_from_slice(&framed);

            let mut scanner = SyncScanner::new();
            let start = scanner.scan(&stream).unwrap();
            // A marker pair may hide inside the garbage itself; keep scanning
            // until the decoded frame is the one we sent.
            let mut offset = start;
            loop {
                let mut body = Bytes::copy_from_slice(&stream[offset..]);
                if let Ok(decoded) = Request::decode(&mut body) {
                    if decoded == request && body.is_empty() {
                        break;
                    }
                }
                let next = scanner.scan(&stream[offset..]);
                prop_assert!(next.is_some(), "lost the frame");
                offset += next.unwrap();
            }
            prop_assert_eq!(offset, garbage.len() + 2);
        }

        #[test]
        fn prop_payload_markers_are_opaque(
            runs in prop::collection::vec(0usize..8, 1..16),
        ) {
            // Payload made of marker runs separated by other bytes.
            let mut data: Vec<u8> = Vec::new();
            for run in runs {
                data.extend(std::iter::repeat(0xBB).take(run));
                data.push(0x42);
            }
            let request = Request::new(Operation::Update)
                .with_data(data.clone())
                .with_key(vec![0xBB; 4]);
            let framed = Encoder::encode_marked_request(&request).unwrap();

            let mut scanner = SyncScanner::new();
            let start = scanner.scan(&framed).unwrap();
            prop_assert_eq!(start, 2);

            let mut body = Bytes::copy_from_slice(&framed[start..]);
            let decoded = Request::decode(&mut body).unwrap();
            prop_assert_eq!(decoded.data.as_ref(), &data[..]);
            prop_assert!(body.is_empty());
        }
    }
}
