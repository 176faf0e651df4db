//! Session reference frame: converts absolute packet timestamps into display
//! times and inter-arrival deltas.

use crate::timestamp::Timestamp;

/// Time origin and previously displayed time of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceFrame {
    origin: Timestamp,
    last: Timestamp,
}

impl ReferenceFrame {
    /// Anchor the frame on the first packet of the session.
    ///
    /// By default the origin is the whole second of `first`, so display times
    /// start near zero while the sub-second part is preserved. With
    /// `no_offset` the origin is zero and display times are absolute.
    pub fn prime(first: Timestamp, no_offset: bool) -> Self {
        if no_offset {
            ReferenceFrame {
                origin: Timestamp::ZERO,
                last: first,
            }
        } else {
            ReferenceFrame {
                origin: Timestamp::new(first.sec(), 0),
                last: Timestamp::new(0, first.psec()),
            }
        }
    }

    /// Move the frame forward by one packet, returning `(display, delta)`.
    pub fn advance(&mut self, ts: Timestamp) -> (Timestamp, Timestamp) {
        let display = ts - self.origin;
        let delta = display - self.last;
        self.last = display;
        (display, delta)
    }

    pub fn origin(&self) -> Timestamp {
        self.origin
    }

    pub fn last(&self) -> Timestamp {
        self.last
    }
}
