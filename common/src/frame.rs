use tracing::debug;

use crate::proto::{FRAME_LEN, Frame, MESSAGE_LEN, TERMINATOR};

/// Noise with no terminator in sight is trimmed back to this many bytes.
const MAX_BUFFERED: usize = 4096;

/// Accumulates raw serial bytes and cuts the latest complete [`Frame`] out of them.
#[derive(Debug, Default)]
pub struct FrameExtractor {
    buffer: Vec<u8>,
}

impl FrameExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the most recent frame in the buffer, if any.
    ///
    /// Everything up to and including the last terminator is consumed, whether or not a
    /// full frame preceded it. Bytes after the terminator stay for the next call.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.buffer.len() < MESSAGE_LEN {
            return None;
        }

        let Some(start) = self
            .buffer
            .windows(TERMINATOR.len())
            .rposition(|window| window == TERMINATOR)
        else {
            if self.buffer.len() > MAX_BUFFERED {
                let excess = self.buffer.len() - MAX_BUFFERED;
                debug!(excess, "no terminator in buffered serial data, trimming");
                self.buffer.drain(..excess);
            }
            return None;
        };
        // index of the last terminator byte
        let end = start + TERMINATOR.len() - 1;

        if start < FRAME_LEN {
            debug!(end, "discarding incomplete message");
            self.buffer.drain(..=end);
            return None;
        }

        let frame = Frame::try_from(&self.buffer[start - FRAME_LEN..start]).ok();
        self.buffer.drain(..=end);
        frame
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn message(payload: [u8; FRAME_LEN]) -> Vec<u8> {
        let mut bytes = payload.to_vec();
        bytes.extend_from_slice(&TERMINATOR);
        bytes
    }

    fn payload(seed: u8) -> [u8; FRAME_LEN] {
        core::array::from_fn(|i| seed.wrapping_add(i as u8) & 0x7F)
    }

    #[test]
    fn clean_message_yields_its_payload() {
        let mut extractor = FrameExtractor::new();
        extractor.extend(&message(payload(1)));
        assert_eq!(extractor.next_frame(), Some(Frame::new(payload(1))));
        assert!(extractor.buffered().is_empty());
        assert_eq!(extractor.next_frame(), None);
    }

    #[test]
    fn short_buffers_never_yield() {
        let full = message(payload(3));
        for len in 0..MESSAGE_LEN {
            let mut extractor = FrameExtractor::new();
            extractor.extend(&full[full.len() - len..]);
            assert_eq!(extractor.next_frame(), None, "len {len}");
            assert_eq!(extractor.buffered().len(), len);
        }
    }

    #[test]
    fn latest_frame_wins() {
        let mut extractor = FrameExtractor::new();
        extractor.extend(&message(payload(1)));
        extractor.extend(&message(payload(40)));
        assert_eq!(extractor.next_frame(), Some(Frame::new(payload(40))));
        assert!(extractor.buffered().is_empty());
    }

    #[test]
    fn trailing_partial_message_is_kept() {
        let mut extractor = FrameExtractor::new();
        extractor.extend(&message(payload(1)));
        extractor.extend(&payload(9)[..5]);
        assert_eq!(extractor.next_frame(), Some(Frame::new(payload(1))));
        assert_eq!(extractor.buffered(), &payload(9)[..5]);

        extractor.extend(&payload(9)[5..]);
        extractor.extend(&TERMINATOR);
        assert_eq!(extractor.next_frame(), Some(Frame::new(payload(9))));
    }

    #[test]
    fn incomplete_message_is_discarded() {
        let mut extractor = FrameExtractor::new();
        extractor.extend(&[1, 2, 3, 4, 5]);
        extractor.extend(&TERMINATOR);
        extractor.extend(&[7; 11]);
        assert_eq!(extractor.next_frame(), None);
        assert_eq!(extractor.buffered(), &[7; 11]);
    }

    #[test]
    fn leading_noise_is_dropped() {
        let mut extractor = FrameExtractor::new();
        extractor.extend(&[0x13, 0x37, 0x42]);
        extractor.extend(&message(payload(5)));
        assert_eq!(extractor.next_frame(), Some(Frame::new(payload(5))));
        assert!(extractor.buffered().is_empty());
    }

    #[test]
    fn payload_ending_in_ff_uses_the_last_terminator() {
        let mut frame = [0; FRAME_LEN];
        frame[FRAME_LEN - 1] = 0xFF;
        frame[FRAME_LEN - 3] = 0xFF;
        let mut extractor = FrameExtractor::new();
        extractor.extend(&message(frame));
        assert_eq!(extractor.next_frame(), Some(Frame::new(frame)));
    }

    #[test]
    fn endless_noise_is_bounded() {
        let mut extractor = FrameExtractor::new();
        extractor.extend(&vec![0x11; MAX_BUFFERED * 2]);
        assert_eq!(extractor.next_frame(), None);
        assert_eq!(extractor.buffered().len(), MAX_BUFFERED);
    }
}
