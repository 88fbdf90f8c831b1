//! Streaming hex codec for pulse trains.
//!
//! Every 16-bit duration travels as four hex characters. The nibble order
//! within a value is a fixed permutation keyed by the cursor position
//! modulo 4:
//!
//! | phase | bits emitted |
//! |-------|--------------|
//! | 0     | 4-7          |
//! | 1     | 0-3          |
//! | 2     | 12-15        |
//! | 3     | 8-11         |
//!
//! Encoded frames are terminated by a single `\n`; transmit commands accept
//! `\r` or `\n`. Decode is case-insensitive, encode emits lowercase.

use crate::train::{PulseTrain, GUARD_GAP_US, MAX_TRAIN_LEN};

/// Extract the nibble of `value` selected by the cursor phase.
const fn nibble_at(value: u16, phase: usize) -> u8 {
    (match phase & 3 {
        0 => value >> 4,
        1 => value,
        2 => value >> 12,
        _ => value >> 8,
    } & 0xF) as u8
}

/// Insert a nibble into the slot selected by the cursor phase.
const fn nibble_into(value: u16, phase: usize, nibble: u8) -> u16 {
    let nibble = nibble as u16;
    match phase & 3 {
        0 => nibble << 4,
        1 => (value & 0xFFF0) | nibble,
        2 => (value & 0x0FFF) | (nibble << 12),
        _ => (value & 0xF0FF) | (nibble << 8),
    }
}

/// Lowercase hex character for a nibble.
const fn hex_char(nibble: u8) -> u8 {
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'a' - 10 + nibble
    }
}

/// Nibble value of a hex character, case-insensitive.
///
/// Bytes outside `[0-9a-fA-F]` decode as zero, matching the device's
/// historical behavior of never rejecting a command for a stray character.
const fn hex_value(byte: u8) -> u8 {
    match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte + 10 - b'a',
        b'A'..=b'F' => byte + 10 - b'A',
        _ => 0,
    }
}

/// Streaming encoder for one captured frame (the session read path).
///
/// Emits four hex characters per duration followed by a single `\n`, across
/// as many `read` calls as the caller needs. The cursor is monotonic within
/// the frame, so bytes can never be reordered or repeated.
#[derive(Debug)]
pub struct FrameEncoder {
    train: PulseTrain,
    /// Nibble cursor; `cursor / 4` is the duration slot, `cursor % 4` the phase.
    cursor: usize,
    done: bool,
}

impl FrameEncoder {
    /// Start encoding a finished pulse train.
    #[must_use]
    pub fn new(train: PulseTrain) -> Self {
        Self {
            train,
            cursor: 0,
            done: false,
        }
    }

    /// Fill `buf` with the next encoded bytes, returning how many were
    /// written. Standard partial-read semantics: any count up to
    /// `buf.len()` may be returned, and the frame ends with the byte after
    /// which [`is_done`](Self::is_done) turns true (the `\n` terminator).
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let durations = self.train.durations();
        let mut written = 0;
        while written < buf.len() && !self.done {
            let slot = self.cursor / 4;
            if slot >= durations.len() {
                buf[written] = b'\n';
                self.done = true;
            } else {
                buf[written] = hex_char(nibble_at(durations[slot], self.cursor));
            }
            self.cursor += 1;
            written += 1;
        }
        written
    }

    /// Whether the terminating newline has been emitted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }
}

/// Outcome of feeding one byte to a [`CommandDecoder`].
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeStep {
    /// Byte accepted; keep feeding.
    Consumed,
    /// A terminator completed a non-empty command: here is the train to
    /// transmit, guard gap included. The decoder is reset.
    Dispatch(PulseTrain),
    /// The byte would exceed the slot capacity. Decoder state is unchanged;
    /// the caller decides between partial success and outright failure.
    Overflow,
}

/// Streaming decoder for transmit commands (the session write path).
///
/// Hex characters accumulate into 16-bit slots through the same nibble
/// permutation the encoder uses. A `\r` or `\n` finishes the command:
/// the guard gap is appended as a new slot when the command holds an odd
/// number of complete values (it ends on a mark), or overwrites the final
/// slot when the count is even (the client's own trailing gap is replaced).
/// A terminator with no complete value just resets the cursor.
#[derive(Debug)]
pub struct CommandDecoder {
    slots: Vec<u16>,
    /// Nibbles accepted since the last terminator.
    cursor: usize,
    capacity: usize,
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandDecoder {
    /// Decoder with the standard slot capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MAX_TRAIN_LEN)
    }

    /// Decoder with a reduced slot capacity (tests exercise the overflow
    /// boundary without feeding a thousand nibbles).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            cursor: 0,
            capacity: capacity.min(MAX_TRAIN_LEN),
        }
    }

    /// Feed one byte of a command stream.
    pub fn push(&mut self, byte: u8) -> DecodeStep {
        if byte == b'\r' || byte == b'\n' {
            return self.finish();
        }

        let slot = self.cursor / 4;
        if slot >= self.capacity {
            return DecodeStep::Overflow;
        }

        let nibble = hex_value(byte);
        if self.cursor % 4 == 0 {
            self.slots.push(nibble_into(0, 0, nibble));
        } else if let Some(last) = self.slots.last_mut() {
            *last = nibble_into(*last, self.cursor, nibble);
        }
        self.cursor += 1;
        DecodeStep::Consumed
    }

    /// Number of complete 16-bit values accumulated so far.
    #[must_use]
    pub fn complete_values(&self) -> usize {
        self.cursor / 4
    }

    fn finish(&mut self) -> DecodeStep {
        let complete = self.cursor / 4;
        self.cursor = 0;
        // drop any half-written value
        self.slots.truncate(complete);
        let mut slots = std::mem::take(&mut self.slots);
        if complete == 0 {
            return DecodeStep::Consumed;
        }

        if complete % 2 == 1 {
            // command ends on a mark: append the guard gap
            slots.push(GUARD_GAP_US);
        } else if let Some(last) = slots.last_mut() {
            // command already ends on a gap: standardize it
            *last = GUARD_GAP_US;
        }

        match PulseTrain::from_durations(slots) {
            Ok(train) => DecodeStep::Dispatch(train),
            Err(_) => DecodeStep::Overflow,
        }
    }
}
