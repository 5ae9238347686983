//! One read loop per connection (§4.D `onConnected`/`onReceive`, §5 "one
//! protocol read loop per connection").
//!
//! [`serve_connection`] owns exactly the parts admission leaves to "the
//! caller that owns the transport connection" per `bbs_dispatcher::admission`'s
//! doc comment: the 5s wait-for-Connected grace window, and closing a
//! blacklisted connection after it. Everything past admission is framing
//! (`StreamingUnpacker`) and routing (`bbs_dispatcher::dispatch`).

use crate::cadence::Cadence;
use bbs_compress::CompressionMode;
use bbs_dispatcher::Admission;
use bbs_store::Store;
use bbs_transport::{Transport, TransportState};
use bbs_wire::{Envelope, StreamingUnpacker, WireRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};

const CONNECTED_GRACE_WINDOW: Duration = Duration::from_secs(5);
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drive `transport` to completion: admit the connection, then loop reading
/// whole envelopes and routing requests until the transport disconnects or
/// a frame fails to decode.
pub fn serve_connection(store: &Store, cadence: &Arc<Cadence>, raw_callsign: &str, transport: &mut impl Transport) {
    let admission = match bbs_dispatcher::admit_connection(store, raw_callsign) {
        Ok(a) => a,
        Err(err) => {
            tracing::warn!(error = %err, "admission failed, closing connection");
            let _ = transport.disconnect();
            return;
        }
    };

    let base_callsign = match admission {
        Admission::Blacklisted { base_callsign } => {
            tracing::warn!(%base_callsign, "blacklisted callsign connected; closing after grace window");
            wait_for_connected(transport, CONNECTED_GRACE_WINDOW);
            let _ = transport.disconnect();
            return;
        }
        Admission::Admitted { base_callsign } => base_callsign,
    };

    if !wait_for_connected(transport, CONNECTED_GRACE_WINDOW) {
        tracing::warn!(%base_callsign, "connection never reached Connected state; closing");
        let _ = transport.disconnect();
        return;
    }

    let mut unpacker = StreamingUnpacker::new();
    loop {
        if transport.state() == TransportState::Disconnected {
            break;
        }
        match transport.recv() {
            Ok(Some(bytes)) => match unpacker.push(&bytes) {
                Ok(envelopes) => {
                    if !handle_envelopes(store, cadence, &base_callsign, transport, envelopes) {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(%base_callsign, error = %err, "bad frame, closing connection");
                    break;
                }
            },
            Ok(None) => std::thread::sleep(IDLE_POLL_INTERVAL),
            Err(err) => {
                tracing::warn!(%base_callsign, error = %err, "transport error, closing connection");
                break;
            }
        }
    }
    let _ = transport.disconnect();
}

/// Route every request envelope and send its response. Returns `false` if
/// the connection should stop (closing, or a send failed).
fn handle_envelopes(
    store: &Store,
    cadence: &Arc<Cadence>,
    caller: &str,
    transport: &mut impl Transport,
    envelopes: Vec<Envelope>,
) -> bool {
    for envelope in envelopes {
        let Envelope::Request(req) = envelope else {
            continue;
        };
        cadence.notify_request(is_quick_request(&req));

        let response = bbs_dispatcher::dispatch(store, caller, &req);

        // §5 cancellation: check closing before sending any response and
        // drop it silently otherwise.
        if transport.state() != TransportState::Connected {
            return false;
        }
        let bytes = match bbs_wire::pack(&Envelope::Response(response), CompressionMode::Gzip) {
            Ok(b) => b,
            Err(err) => {
                tracing::error!(error = %err, "failed to pack response");
                continue;
            }
        };
        if let Err(err) = transport.send_data(&bytes) {
            tracing::warn!(error = %err, "failed to send response, closing connection");
            return false;
        }
    }
    true
}

fn is_quick_request(req: &WireRequest) -> bool {
    req.vars.contains_key("quick")
}

fn wait_for_connected(transport: &mut impl Transport, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        match transport.state() {
            TransportState::Connected => return true,
            TransportState::Disconnected => return false,
            _ => {}
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
