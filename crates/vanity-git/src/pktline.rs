//! Git pkt-line framing.
//!
//! Each line is prefixed with a 4-character lowercase hex length that counts
//! the prefix itself. `0000` is a flush packet.

use crate::{GitError, Result};
use std::io::Write;

/// Largest total length a pkt-line may declare.
pub const MAX_PKT_LEN: usize = 65520;

/// A pkt-line packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
    /// Delimiter packet (0001).
    Delimiter,
    /// Response-end packet (0002).
    ResponseEnd,
}

impl PktLine {
    /// Creates a data packet from a string slice.
    pub fn from_string(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }

    /// Total framed length, prefix included.
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Data(data) => data.len() + 4,
            _ => 4,
        }
    }

    /// Encodes the packet to bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Data(data) => {
                let len = self.encoded_len();
                if len > MAX_PKT_LEN {
                    return Err(GitError::InvalidPktLine(format!(
                        "line of {len} bytes exceeds maximum of {MAX_PKT_LEN}"
                    )));
                }
                let mut out = Vec::with_capacity(len);
                out.extend_from_slice(format!("{len:04x}").as_bytes());
                out.extend_from_slice(data);
                Ok(out)
            }
            Self::Flush => Ok(b"0000".to_vec()),
            Self::Delimiter => Ok(b"0001".to_vec()),
            Self::ResponseEnd => Ok(b"0002".to_vec()),
        }
    }
}

/// Writer for pkt-line format.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    /// Creates a new pkt-line writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Copies already-framed bytes through untouched.
    pub fn write_raw(&mut self, framed: &[u8]) -> Result<()> {
        self.writer.write_all(framed)?;
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
