//! Outbound flood control.
//!
//! IRC servers disconnect clients that push more than a burst budget of bytes
//! before the server has processed them. Instead of a timer, the pacer uses
//! the server itself as a clock: once the budget would be exceeded it sends a
//! deliberately unknown command ([`PROBE_TOKEN`]) and queues everything else.
//! The server answers the probe with 421 only after it has drained all
//! earlier input, at which point the budget is reset and the queue replayed.
//!
//! If the probe is never answered the queue stalls; there is no timeout.

use std::collections::VecDeque;

/// Deliberately invalid command used to force an "unknown command" reply.
pub const PROBE_TOKEN: &str = "FLOODCHECK";

/// Server-side receive budget in bytes.
pub const SERVER_BUDGET: usize = 1024;

/// Bytes usable for regular lines; room for the probe line is reserved.
pub const SEND_BUDGET: usize = SERVER_BUDGET - PROBE_TOKEN.len() - 3;

/// Line terminator length (CRLF).
const TERMINATOR_LEN: usize = 2;

/// Queueing priority for outbound lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Regular traffic, sent in submission order.
    #[default]
    Normal,
    /// Sent ahead of all queued normal traffic (e.g. PONG).
    High,
}

/// Byte-budget pacer with a priority-partitioned FIFO queue.
///
/// The pacer never performs I/O. [`submit`](FloodController::submit) and
/// [`acknowledge`](FloodController::acknowledge) return the lines that must
/// be written to the wire right now, in order.
#[derive(Debug, Default)]
pub struct FloodController {
    bytes_sent: usize,
    checking: bool,
    high: VecDeque<String>,
    normal: VecDeque<String>,
}

impl FloodController {
    /// Create a pacer with an empty budget and queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes counted against the budget since the last acknowledgement.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Whether a probe is in flight.
    pub fn is_checking(&self) -> bool {
        self.checking
    }

    /// Number of lines waiting for the probe reply.
    pub fn queued(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    /// Submit a line for sending.
    ///
    /// Returns the lines to write immediately: the line itself when it fits
    /// the budget, the probe when this submission opened a new window, or
    /// nothing when the line was queued behind an in-flight probe.
    pub fn submit(&mut self, line: impl Into<String>, priority: Priority) -> Vec<String> {
        let mut out = Vec::new();
        self.submit_into(line.into(), priority, &mut out);
        out
    }

    /// Handle the server's reply to the probe.
    ///
    /// Resets the budget and replays the queue (high priority first). The
    /// replay may open another window and send a new probe.
    pub fn acknowledge(&mut self) -> Vec<String> {
        self.bytes_sent = 0;
        self.checking = false;

        let high = std::mem::take(&mut self.high);
        let normal = std::mem::take(&mut self.normal);

        let mut out = Vec::new();
        for line in high {
            self.submit_into(line, Priority::High, &mut out);
        }
        for line in normal {
            self.submit_into(line, Priority::Normal, &mut out);
        }
        out
    }

    fn submit_into(&mut self, line: String, priority: Priority, out: &mut Vec<String>) {
        let cost = line.len() + TERMINATOR_LEN;
        // A line larger than the whole budget goes out alone in a fresh window.
        let fits = self.bytes_sent + cost <= SEND_BUDGET || self.bytes_sent == 0;
        if !self.checking && fits {
            self.bytes_sent += cost;
            out.push(line);
            return;
        }

        match priority {
            Priority::High => self.high.push_back(line),
            Priority::Normal => self.normal.push_back(line),
        }

        if !self.checking {
            self.checking = true;
            self.bytes_sent += PROBE_TOKEN.len() + TERMINATOR_LEN;
            out.push(PROBE_TOKEN.to_string());
        }
    }
}
