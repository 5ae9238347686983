// SPDX-License-Identifier: MIT OR Apache-2.0
//! Body compression for the BBS wire codec.
//!
//! Implements the four compression modes named by the envelope's `c` byte:
//! `NONE`, `BZIP2`, `GZIP`, `DEFLATE`. Unlike a negotiated streaming
//! protocol, each inner payload is compressed independently — there is no
//! shared dictionary or stream state across messages.

use bzip2::Compression as BzCompression;
use bzip2::read::{BzDecoder, BzEncoder};
use flate2::Compression as FlateCompression;
use flate2::read::{DeflateDecoder, DeflateEncoder, GzDecoder, GzEncoder};
use std::io::Read;

/// Which algorithm (if any) compresses a message's inner payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Payload carried uncompressed.
    None,
    /// bzip2.
    Bzip2,
    /// gzip (DEFLATE + a gzip header/trailer).
    Gzip,
    /// Raw DEFLATE, no header/trailer.
    Deflate,
}

impl CompressionMode {
    /// The wire tag for this mode, per §4.A / §6.
    pub fn tag(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Bzip2 => 1,
            Self::Gzip => 2,
            Self::Deflate => 3,
        }
    }

    /// Decode a wire tag into a mode.
    pub fn from_tag(tag: u8) -> Result<Self, CompressError> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Bzip2),
            2 => Ok(Self::Gzip),
            3 => Ok(Self::Deflate),
            other => Err(CompressError::UnsupportedEncoding(other)),
        }
    }
}

/// Errors raised by compression/decompression.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    /// The envelope's compression tag does not name a known algorithm.
    #[error("unsupported compression encoding: {0}")]
    UnsupportedEncoding(u8),
    /// The underlying codec failed to compress or decompress the payload.
    #[error("compression I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Compress `data` with `mode`, returning the raw compressed bytes (no
/// envelope framing — that is the wire codec's job).
pub fn compress(data: &[u8], mode: CompressionMode) -> Result<Vec<u8>, CompressError> {
    match mode {
        CompressionMode::None => Ok(data.to_vec()),
        CompressionMode::Bzip2 => {
            let mut encoder = BzEncoder::new(data, BzCompression::best());
            let mut out = Vec::new();
            encoder.read_to_end(&mut out)?;
            Ok(out)
        }
        CompressionMode::Gzip => {
            let mut encoder = GzEncoder::new(data, FlateCompression::best());
            let mut out = Vec::new();
            encoder.read_to_end(&mut out)?;
            Ok(out)
        }
        CompressionMode::Deflate => {
            let mut encoder = DeflateEncoder::new(data, FlateCompression::best());
            let mut out = Vec::new();
            encoder.read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

/// Decompress `data` that was produced by [`compress`] with the same `mode`.
pub fn decompress(data: &[u8], mode: CompressionMode) -> Result<Vec<u8>, CompressError> {
    match mode {
        CompressionMode::None => Ok(data.to_vec()),
        CompressionMode::Bzip2 => {
            let mut decoder = BzDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        CompressionMode::Gzip => {
            let mut decoder = GzDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
        CompressionMode::Deflate => {
            let mut decoder = DeflateDecoder::new(data);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            Ok(out)
        }
    }
}

/// Apply §4.A's emission rule: compress with `preferred`, but fall back to
/// `None` if the compressed form is not smaller than the original, or if the
/// original is under `min_size` bytes. Returns the chosen mode and the bytes
/// to place in the envelope's `d` field.
pub fn compress_for_wire(
    data: &[u8],
    preferred: CompressionMode,
    min_size: usize,
) -> Result<(CompressionMode, Vec<u8>), CompressError> {
    if preferred == CompressionMode::None || data.len() < min_size {
        return Ok((CompressionMode::None, data.to_vec()));
    }
    let compressed = compress(data, preferred)?;
    if compressed.len() >= data.len() {
        Ok((CompressionMode::None, data.to_vec()))
    } else {
        Ok((preferred, compressed))
    }
}
