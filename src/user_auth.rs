//! Scanner for the user-auth blob that sshd exposes through `SSH_USER_AUTH`
//! when `ExposeAuthInfo` is enabled.
//!
//! The blob has one line per authentication method that succeeded. Public key
//! lines look like `publickey <key-type> <base64-key>\n`. The scanner makes a
//! single pass over the bytes and stops at the first well-formed line.

use crate::buffer::{ByteBuffer, OutOfBounds};
use std::ops::Range;

const LITERAL: &[u8] = b"publickey";

/// Byte ranges of the first well-formed public key line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKeyLine {
    pub key_type: Range<usize>,
    /// The base64 encoded key, not decoded.
    pub key: Range<usize>,
}

impl PublicKeyLine {
    /// Resolves both ranges against the buffer they were found in.
    pub fn slices(&self, content: &ByteBuffer) -> Result<(ByteBuffer, ByteBuffer), OutOfBounds> {
        Ok((
            content.range(self.key_type.clone())?,
            content.range(self.key.clone())?,
        ))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    BeginLine,
    /// The first `n` bytes of `publickey` have been matched.
    Literal(usize),
    Whitespace1,
    KeyType,
    Whitespace2,
    Key,
    IgnoreToEndOfLine,
    Success,
}

#[derive(Default)]
struct Marks {
    key_type_start: Option<usize>,
    key_type_end: Option<usize>,
    key_start: Option<usize>,
    key_end: Option<usize>,
}

impl Marks {
    fn line(&self) -> Option<PublicKeyLine> {
        Some(PublicKeyLine {
            key_type: self.key_type_start?..self.key_type_end?,
            key: self.key_start?..self.key_end?,
        })
    }
}

struct Scanner {
    state: State,
    marks: Marks,
}

impl Scanner {
    fn new() -> Self {
        Scanner {
            state: State::BeginLine,
            marks: Marks::default(),
        }
    }

    fn reset_for_new_line(&mut self) -> State {
        self.marks = Marks::default();
        State::BeginLine
    }

    fn expect(&self, matched: usize, byte: u8) -> State {
        if byte == LITERAL[matched] {
            State::Literal(matched + 1)
        } else {
            State::IgnoreToEndOfLine
        }
    }

    /// Consumes the byte at `offset` and moves to the next state.
    fn step(&mut self, offset: usize, byte: u8) {
        if is_new_line(byte) {
            self.state = match self.state {
                State::Key => {
                    self.marks.key_end = Some(offset);
                    State::Success
                }
                State::Success => State::Success,
                _ => self.reset_for_new_line(),
            };
            return;
        }

        self.state = match self.state {
            State::BeginLine => self.expect(0, byte),
            State::Literal(matched) if matched < LITERAL.len() => self.expect(matched, byte),
            State::Literal(_) if is_white_space(byte) => State::Whitespace1,
            State::Literal(_) => State::IgnoreToEndOfLine,
            State::Whitespace1 if is_white_space(byte) => State::Whitespace1,
            State::Whitespace1 => {
                self.marks.key_type_start = Some(offset);
                State::KeyType
            }
            State::KeyType if is_white_space(byte) => {
                self.marks.key_type_end = Some(offset);
                State::Whitespace2
            }
            State::KeyType => State::KeyType,
            State::Whitespace2 if is_base64(byte) => {
                self.marks.key_start = Some(offset);
                State::Key
            }
            State::Whitespace2 if is_white_space(byte) => State::Whitespace2,
            State::Whitespace2 => State::IgnoreToEndOfLine,
            State::Key if is_base64(byte) => State::Key,
            State::Key => State::IgnoreToEndOfLine,
            State::IgnoreToEndOfLine => State::IgnoreToEndOfLine,
            State::Success => State::Success,
        };
    }
}

/// Finds the first line of the form `publickey <key-type> <base64-key>\n`.
///
/// The key type is not checked against anything here, callers decide what
/// they accept. A line is only recognized once its terminating newline has
/// been seen, so an unterminated last line never matches.
pub fn find_public_key(content: &[u8]) -> Option<PublicKeyLine> {
    let mut scanner = Scanner::new();
    for (offset, byte) in content.iter().copied().enumerate() {
        scanner.step(offset, byte);
        if scanner.state == State::Success {
            return scanner.marks.line();
        }
    }
    None
}

fn is_new_line(byte: u8) -> bool {
    byte == b'\n'
}

fn is_white_space(byte: u8) -> bool {
    byte == b' ' || byte == b'\t'
}

fn is_base64(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'+' || byte == b'/' || byte == b'='
}
