//! In-process paired transport for unit and integration tests.

use crate::{Transport, TransportError, TransportState};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One end of an in-process loopback pair. Bytes written on one end arrive,
/// whole and in order, on the other end's [`recv`](Transport::recv).
pub struct LoopbackTransport {
    state: TransportState,
    remote_callsign: Option<String>,
    outbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
    inbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl LoopbackTransport {
    /// Create a connected pair `(a, b)`: data sent on `a` arrives on `b`, and
    /// vice versa.
    pub fn pair(callsign_a: impl Into<String>, callsign_b: impl Into<String>) -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a = Arc::new(Mutex::new(VecDeque::new()));
        let a = Self {
            state: TransportState::Connected,
            remote_callsign: Some(callsign_b.into()),
            outbox: a_to_b.clone(),
            inbox: b_to_a.clone(),
        };
        let b = Self {
            state: TransportState::Connected,
            remote_callsign: Some(callsign_a.into()),
            outbox: b_to_a,
            inbox: a_to_b,
        };
        (a, b)
    }
}

impl Transport for LoopbackTransport {
    fn state(&self) -> TransportState {
        self.state
    }

    fn remote_callsign(&self) -> Option<&str> {
        self.remote_callsign.as_deref()
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        if self.state != TransportState::Connected {
            return Err(TransportError::NotConnected(self.state));
        }
        self.outbox.lock().unwrap().push_back(chunk.to_vec());
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.state == TransportState::Disconnected {
            return Ok(None);
        }
        Ok(self.inbox.lock().unwrap().pop_front())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.state = TransportState::Disconnected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_written_on_one_end_arrive_on_the_other() {
        let (mut a, mut b) = LoopbackTransport::pair("KQ4PEC", "W1AW");
        a.send_data(b"hello").unwrap();
        assert_eq!(b.recv().unwrap(), Some(b"hello".to_vec()));
        assert_eq!(b.recv().unwrap(), None);
    }

    #[test]
    fn chunks_arrive_in_order_as_separate_whole_messages() {
        let (mut a, mut b) = LoopbackTransport::pair("A", "B");
        a.write_chunk(b"one").unwrap();
        a.write_chunk(b"two").unwrap();
        assert_eq!(b.recv().unwrap(), Some(b"one".to_vec()));
        assert_eq!(b.recv().unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn remote_callsign_is_the_peer() {
        let (a, b) = LoopbackTransport::pair("KQ4PEC", "W1AW");
        assert_eq!(a.remote_callsign(), Some("W1AW"));
        assert_eq!(b.remote_callsign(), Some("KQ4PEC"));
    }

    #[test]
    fn disconnect_stops_further_sends() {
        let (mut a, _b) = LoopbackTransport::pair("A", "B");
        a.disconnect().unwrap();
        assert!(matches!(
            a.send_data(b"x"),
            Err(TransportError::NotConnected(TransportState::Disconnected))
        ));
    }
}
