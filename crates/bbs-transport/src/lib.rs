// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Stream transport abstraction for the packet-radio BBS (§4.B).
//!
//! Three implementations share one contract: an ordered byte stream with
//! explicit connection states, a chunked outbound `send_data`, and inbound
//! bytes delivered whole and in order to the decoder above. The TNC
//! transport itself (the real AX.25 link) is an external collaborator per
//! §1/§6 and is not implemented here — only the trait it must satisfy, plus
//! the in-process [`LoopbackTransport`] and filesystem [`DirectoryTransport`]
//! that stand in for it in tests.

mod directory;
mod loopback;

pub use directory::{DirectoryBouncer, DirectoryRole, DirectoryTransport};
pub use loopback::LoopbackTransport;

use std::fmt;

/// Lifecycle state of a [`Transport`], per §4.B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Handshake in progress.
    Connecting,
    /// Ready to exchange data.
    Connected,
    /// A close has been requested; draining in-flight data.
    Disconnecting,
    /// No longer usable.
    Disconnected,
}

/// Errors raised by a [`Transport`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport is not in a state that permits this operation.
    #[error("transport is {0:?}, not Connected")]
    NotConnected(TransportState),
    /// The underlying I/O failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An ordered byte stream shared by the TNC link, the in-process loopback,
/// and the directory rendezvous transport.
///
/// [`send_data`](Transport::send_data) has a default implementation that
/// chunks `payload` into back-to-back [`write_chunk`](Transport::write_chunk)
/// calls of at most [`mtu`](Transport::mtu) bytes each — per §8's testable
/// property, a payload of length `N > mtu` emits `ceil(N / mtu)` underlying
/// writes whose concatenation equals `payload`.
pub trait Transport: Send {
    /// Current lifecycle state.
    fn state(&self) -> TransportState;

    /// The peer's claimed callsign, if known yet.
    fn remote_callsign(&self) -> Option<&str>;

    /// Maximum bytes per underlying write. Defaults to
    /// [`bbs_core::DEFAULT_MTU`].
    fn mtu(&self) -> usize {
        bbs_core::DEFAULT_MTU
    }

    /// Write one chunk of at most [`mtu`](Transport::mtu) bytes.
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError>;

    /// Send `payload`, chunked to [`mtu`](Transport::mtu).
    fn send_data(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.state() != TransportState::Connected {
            return Err(TransportError::NotConnected(self.state()));
        }
        let mtu = self.mtu().max(1);
        for chunk in payload.chunks(mtu) {
            self.write_chunk(chunk)?;
        }
        Ok(())
    }

    /// Poll for the next whole inbound message, if any is available.
    /// Returns `Ok(None)` when nothing has arrived yet (not an error);
    /// returns `Ok(None)` permanently once the transport disconnects.
    fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Begin an orderly shutdown.
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingTransport {
        state: TransportState,
        writes: Vec<Vec<u8>>,
        mtu: usize,
    }

    impl Transport for RecordingTransport {
        fn state(&self) -> TransportState {
            self.state
        }

        fn remote_callsign(&self) -> Option<&str> {
            None
        }

        fn mtu(&self) -> usize {
            self.mtu
        }

        fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
            self.writes.push(chunk.to_vec());
            Ok(())
        }

        fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            Ok(None)
        }

        fn disconnect(&mut self) -> Result<(), TransportError> {
            self.state = TransportState::Disconnected;
            Ok(())
        }
    }

    #[test]
    fn send_data_chunks_to_mtu_and_preserves_bytes() {
        let mut t = RecordingTransport {
            state: TransportState::Connected,
            writes: Vec::new(),
            mtu: 3,
        };
        let payload = b"hello world!".to_vec(); // 12 bytes
        t.send_data(&payload).unwrap();
        assert_eq!(t.writes.len(), payload.len().div_ceil(3));
        let reassembled: Vec<u8> = t.writes.concat();
        assert_eq!(reassembled, payload);
        assert!(t.writes.iter().all(|w| w.len() <= 3));
    }

    #[test]
    fn send_data_refuses_when_not_connected() {
        let mut t = RecordingTransport {
            state: TransportState::Disconnected,
            writes: Vec::new(),
            mtu: 2000,
        };
        assert!(matches!(
            t.send_data(b"x"),
            Err(TransportError::NotConnected(TransportState::Disconnected))
        ));
    }

    #[test]
    fn empty_payload_emits_no_writes() {
        let mut t = RecordingTransport {
            state: TransportState::Connected,
            writes: Vec::new(),
            mtu: 10,
        };
        t.send_data(&[]).unwrap();
        assert!(t.writes.is_empty());
    }
}
