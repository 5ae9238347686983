//! The job worker's dynamic check interval (§4.F): a base 0.5s tick decides
//! whether to actually run a queue-draining pass, gated by `I`.
//!
//! `I` defaults to 60s, tightens to 8s while requests are arriving with a
//! `quick` var, and leaves one final 5s tick after the quick window closes
//! so a quick job that finishes just after the tightened window still gets
//! collected promptly. The connection read loop (not the dispatcher, which
//! has no thread of its own to carry this state) calls [`Cadence::notify_request`]
//! after every request it routes.

use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
const QUICK_INTERVAL: Duration = Duration::from_secs(8);
const QUICK_FINAL_TICK_DELAY: Duration = Duration::from_secs(5);

/// Shared between the connection threads (writers) and the job worker
/// thread (the single reader) via an `Arc`.
pub struct Cadence {
    next_check: Mutex<Instant>,
    final_tick: Mutex<Option<Instant>>,
}

impl Cadence {
    /// A cadence whose first check is due immediately.
    pub fn new() -> Self {
        Self {
            next_check: Mutex::new(Instant::now()),
            final_tick: Mutex::new(None),
        }
    }

    /// Called once per routed request; `quick` is whether its `vars`
    /// carried the `quick` flag.
    pub fn notify_request(&self, quick: bool) {
        let now = Instant::now();
        let interval = if quick { QUICK_INTERVAL } else { DEFAULT_INTERVAL };
        let candidate = now + interval;
        let mut next = self.next_check.lock().expect("cadence lock poisoned");
        if candidate < *next {
            *next = candidate;
        }
        if quick {
            *self.final_tick.lock().expect("cadence lock poisoned") = Some(now + interval + QUICK_FINAL_TICK_DELAY);
        }
    }

    /// Whether the worker should run a tick right now. Side-effecting: a
    /// positive answer rearms the default-interval check and consumes any
    /// pending final tick.
    pub fn due(&self) -> bool {
        let now = Instant::now();
        let mut next = self.next_check.lock().expect("cadence lock poisoned");
        if now >= *next {
            *next = now + DEFAULT_INTERVAL;
            return true;
        }
        let mut final_tick = self.final_tick.lock().expect("cadence lock poisoned");
        if let Some(ft) = *final_tick {
            if now >= ft {
                *final_tick = None;
                return true;
            }
        }
        false
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cadence_is_immediately_due() {
        let cadence = Cadence::new();
        assert!(cadence.due());
    }

    #[test]
    fn due_rearms_the_default_interval() {
        let cadence = Cadence::new();
        assert!(cadence.due());
        assert!(!cadence.due());
    }

    #[test]
    fn quick_request_tightens_the_interval() {
        let cadence = Cadence::new();
        assert!(cadence.due()); // consume the initial due tick
        cadence.notify_request(true);
        // The tightened window (8s) hasn't elapsed yet, so not due.
        assert!(!cadence.due());
    }

    #[test]
    fn non_quick_request_does_not_set_a_final_tick() {
        let cadence = Cadence::new();
        assert!(cadence.due());
        cadence.notify_request(false);
        assert!(!cadence.due());
    }
}
