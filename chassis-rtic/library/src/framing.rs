use chassis_message::heapless::Vec;
use chassis_message::MAX_FRAME_LEN;

/// Splits a byte stream into text frames.
///
/// A frame ends at `\n`, `\r` or `\0`, so `\r\n` line endings and NUL terminated
/// strings both work. Empty frames are skipped. A frame longer than `N` bytes is
/// dropped up to its terminator, the frames after it are unaffected.
pub struct FrameAssembler<const N: usize> {
    buffer: [u8; N],
    index: usize,
    overflowed: bool,
}

fn is_terminator(byte: u8) -> bool {
    matches!(byte, b'\n' | b'\r' | b'\0')
}

impl<const N: usize> FrameAssembler<N> {
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            index: 0,
            overflowed: false,
        }
    }

    /// Feeds a chunk of received bytes and calls `callback` for every completed frame.
    pub fn push(&mut self, data: &[u8], mut callback: impl FnMut(&str)) {
        for &byte in data {
            self.push_byte(byte, &mut callback);
        }
    }

    /// Bytes of the frame currently being assembled.
    pub fn pending(&self) -> usize {
        self.index
    }

    fn push_byte<F: FnMut(&str)>(&mut self, byte: u8, callback: &mut F) {
        if is_terminator(byte) {
            if self.overflowed {
                #[cfg(feature = "defmt")]
                defmt::warn!("dropped frame longer than {} bytes", N);
                self.overflowed = false;
            } else if self.index > 0 {
                match core::str::from_utf8(&self.buffer[..self.index]) {
                    Ok(frame) => callback(frame),
                    Err(_) => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("invalid utf8 received");
                    }
                }
            }
            self.index = 0;
            return;
        }

        if self.overflowed {
            return;
        }
        if self.index >= N {
            self.overflowed = true;
            self.index = 0;
            return;
        }
        self.buffer[self.index] = byte;
        self.index += 1;
    }
}

impl<const N: usize> Default for FrameAssembler<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes newline terminated frames to a link that may accept only part of a write.
///
/// A line the link took part of is finished before the next frame goes out, so
/// the receiver never sees two frames glued together.
pub struct LineSender {
    backlog: Vec<u8, { MAX_FRAME_LEN + 1 }>,
}

impl LineSender {
    pub const fn new() -> Self {
        Self {
            backlog: Vec::new(),
        }
    }

    /// Forgets a half sent line, for when the link was reopened.
    pub fn clear(&mut self) {
        self.backlog.clear();
    }

    /// Sends `frame` and its terminator. `write` hands bytes to the link and returns
    /// how many it accepted. Returns false when the frame was dropped because the
    /// link is still busy with an earlier line or accepted nothing.
    pub fn send(&mut self, frame: &str, mut write: impl FnMut(&[u8]) -> usize) -> bool {
        if !self.backlog.is_empty() {
            let written = write(&self.backlog);
            drain_front(&mut self.backlog, written);
            if !self.backlog.is_empty() {
                return false;
            }
        }

        if frame.len() > MAX_FRAME_LEN {
            return false;
        }
        let mut line: Vec<u8, { MAX_FRAME_LEN + 1 }> = Vec::new();
        // both fit, the length was checked above
        line.extend_from_slice(frame.as_bytes()).ok();
        line.push(b'\n').ok();

        let written = write(&line);
        if written == 0 {
            return false;
        }
        drain_front(&mut line, written);
        self.backlog = line;
        true
    }
}

impl Default for LineSender {
    fn default() -> Self {
        Self::new()
    }
}

fn drain_front<const N: usize>(line: &mut Vec<u8, N>, count: usize) {
    let count = count.min(line.len());
    let remaining = line.len() - count;
    line.copy_within(count.., 0);
    line.truncate(remaining);
}

#[cfg(test)]
mod tests {
    use std::string::{String, ToString};
    use std::vec::Vec;

    use super::*;

    #[test]
    fn test_frames_across_chunks() {
        let input = [
            "RST:\n",
            "VEL:0.5,",
            "0.0\r\n",
            "CFG:wheel_radius=0.05\0",
            "\n\n",
            "1,0.5;2,0.3\nRST:\n",
            "0,0",
            ";0,0\r",
        ];

        let mut frames: Vec<String> = Vec::new();

        let mut assembler: FrameAssembler<64> = FrameAssembler::new();
        for chunk in input {
            assembler.push(chunk.as_bytes(), |f| frames.push(f.to_string()));
        }
        assert_eq!(
            frames,
            vec![
                "RST:",
                "VEL:0.5,0.0",
                "CFG:wheel_radius=0.05",
                "1,0.5;2,0.3",
                "RST:",
                "0,0;0,0",
            ]
        );
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_overlong_frame_is_dropped() {
        let mut assembler: FrameAssembler<8> = FrameAssembler::new();
        let mut frames: Vec<String> = Vec::new();
        assembler.push(b"0123456789abcdef\nRST:\n", |f| frames.push(f.to_string()));
        assert_eq!(frames, vec!["RST:"]);
    }

    #[test]
    fn test_invalid_utf8_is_skipped() {
        let mut assembler: FrameAssembler<16> = FrameAssembler::new();
        let mut frames: Vec<String> = Vec::new();
        assembler.push(&[0xff, 0xfe, b'\n'], |f| frames.push(f.to_string()));
        assembler.push(b"RST:\n", |f| frames.push(f.to_string()));
        assert_eq!(frames, vec!["RST:"]);
    }

    #[test]
    fn test_partial_frame_is_kept() {
        let mut assembler: FrameAssembler<16> = FrameAssembler::new();
        let mut frames: Vec<String> = Vec::new();
        assembler.push(b"VEL:1", |f| frames.push(f.to_string()));
        assert!(frames.is_empty());
        assert_eq!(assembler.pending(), 5);
        assembler.push(b",0\n", |f| frames.push(f.to_string()));
        assert_eq!(frames, vec!["VEL:1,0"]);
    }

    /// Link that takes at most `room` bytes per call and records everything taken.
    struct TightLink {
        received: Vec<u8>,
        room: usize,
    }

    impl TightLink {
        fn write(&mut self, data: &[u8]) -> usize {
            let count = data.len().min(self.room);
            self.received.extend_from_slice(&data[..count]);
            self.room -= count;
            count
        }
    }

    #[test]
    fn test_line_sender_finishes_partial_lines() {
        let mut link = TightLink {
            received: Vec::new(),
            room: 4,
        };
        let mut sender = LineSender::new();

        // only "1,10" fits, the rest is kept back
        assert!(sender.send("1,100;0,0", |d| link.write(d)));
        assert_eq!(link.received, b"1,10");

        // still busy: the tail goes first and the new frame is dropped
        link.room = 3;
        assert!(!sender.send("2,200;0,0", |d| link.write(d)));
        assert_eq!(link.received, b"1,100;0");

        link.room = 100;
        assert!(sender.send("0,0;0,0", |d| link.write(d)));
        assert_eq!(String::from_utf8(link.received).unwrap(), "1,100;0,0\n0,0;0,0\n");
    }

    #[test]
    fn test_line_sender_full_link() {
        let mut sender = LineSender::new();
        assert!(!sender.send("RST:", |_| 0));
        let mut received = Vec::new();
        assert!(sender.send("RST:", |d| {
            received.extend_from_slice(d);
            d.len()
        }));
        assert_eq!(received, b"RST:\n");
    }
}
