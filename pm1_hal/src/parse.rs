//! Streaming byte → frame parser with resynchronisation.
//!
//! `ParseEngine` is fed one byte at a time and emits at most one event per byte: a completed
//! `Frame`, a `CrcError`, or nothing while a frame is still in progress. It retains no buffer
//! across outer calls beyond the in-progress frame, so it is cheap to own per-reader and
//! trivially restartable after any error.

use pm1_common::consts::HEAD;

use crate::codec::{self, Frame, NO_DATA_LEN, WITH_DATA_LEN};

/// Outcome of feeding one byte into the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// A frame's CRC did not match; the engine has already resynchronised to `Head`.
    CrcError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Scanning for the next `0xFE` sentinel.
    Head,
    /// Accumulating `HEADER0, HEADER1, TYPE`.
    Header,
    /// Accumulating either the 9-byte data field or the 1-byte `RESERVED`.
    DataOrCrc,
    /// Accumulating the trailing `CRC` byte.
    Crc,
}

/// A restartable byte-fed CAN-over-serial frame parser.
#[derive(Debug)]
pub struct ParseEngine {
    state: State,
    buf: [u8; WITH_DATA_LEN],
    count: usize,
    data_field: bool,
    target_len: usize,
}

impl ParseEngine {
    pub fn new() -> Self {
        Self {
            state: State::Head,
            buf: [0u8; WITH_DATA_LEN],
            count: 0,
            data_field: false,
            target_len: NO_DATA_LEN,
        }
    }

    /// Reset to the initial `Head`-scanning state, discarding any in-progress frame.
    fn resync(&mut self) {
        self.state = State::Head;
        self.count = 0;
    }

    /// Feed one byte. Returns `Some(Ok(frame))` on a complete, CRC-valid frame,
    /// `Some(Err(CrcError))` once per lost frame, or `None` while still accumulating.
    pub fn feed(&mut self, byte: u8) -> Option<Result<Frame, ParseError>> {
        match self.state {
            State::Head => {
                if byte == HEAD {
                    self.buf[0] = HEAD;
                    self.count = 1;
                    self.state = State::Header;
                }
                None
            }
            State::Header => {
                self.buf[self.count] = byte;
                self.count += 1;
                if self.count == 4 {
                    self.data_field = codec::data_field_flag(self.buf[1]);
                    self.target_len = if self.data_field {
                        WITH_DATA_LEN
                    } else {
                        NO_DATA_LEN
                    };
                    self.state = State::DataOrCrc;
                }
                None
            }
            State::DataOrCrc => {
                self.buf[self.count] = byte;
                self.count += 1;
                if self.count == self.target_len - 1 {
                    self.state = State::Crc;
                }
                None
            }
            State::Crc => {
                self.buf[self.count] = byte;
                self.count += 1;
                let frame = Frame::from_wire(&self.buf[..self.target_len]);
                self.resync();
                if frame.crc_ok() {
                    Some(Ok(frame))
                } else {
                    tracing::debug!(descriptor = ?frame.descriptor(), "dropped frame with bad crc");
                    Some(Err(ParseError::CrcError))
                }
            }
        }
    }
}

impl Default for ParseEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed every byte of `bytes` into a fresh `ParseEngine`, collecting all emitted events in
/// order. Convenience for tests and simple offline decoding.
pub fn parse_all(bytes: &[u8]) -> Vec<Result<Frame, ParseError>> {
    let mut engine = ParseEngine::new();
    bytes.iter().filter_map(|&b| engine.feed(b)).collect()
}
