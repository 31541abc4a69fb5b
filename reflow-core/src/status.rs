//! Outgoing status lines and fault notifications.

use core::fmt::{self, Write};

use rtic_core::Mutex;

/// One formatted status or notification line
pub type StatusLine = heapless::String<64>;

/// Asynchronous notifications, sent separately from the periodic status line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Notification {
    /// The oven is in the fault state
    Fault,
    /// A thermocouple read was rejected, carrying the raw reading
    SensorFault(u16),
}

impl Notification {
    pub fn line(self) -> StatusLine {
        let mut line = StatusLine::new();
        // 64 bytes always fits
        let _ = write!(line, "{self}");
        line
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault => f.write_str("FAULT\n"),
            Self::SensorFault(raw) => writeln!(f, "TFAULT: {raw}"),
        }
    }
}

/// Receiver of fault notifications raised during a control update.
pub trait FaultSink {
    fn notify(&mut self, notification: Notification);
}

impl<F: FnMut(Notification)> FaultSink for F {
    fn notify(&mut self, notification: Notification) {
        self(notification);
    }
}

/// Single slot mailbox between the control update and the serial transmitter.
///
/// A new line is only accepted once the previous one went out, so a slow link drops status lines
/// instead of stalling the control loop.
#[derive(Debug, Default)]
pub struct Outbox {
    pending: Option<StatusLine>,
}

impl Outbox {
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Format a line into the outbox if it is free. Returns whether the line was accepted.
    pub fn offer(&mut self, format: impl FnOnce(&mut StatusLine) -> fmt::Result) -> bool {
        if self.pending.is_some() {
            return false;
        }

        let mut line = StatusLine::new();
        if format(&mut line).is_err() {
            warn!("status line truncated");
        }
        self.pending = Some(line);
        true
    }

    pub const fn pending(&self) -> Option<&StatusLine> {
        self.pending.as_ref()
    }

    pub const fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Free the slot once the pending line was transmitted.
    pub fn mark_sent(&mut self) {
        self.pending = None;
    }

    /// Hand pending lines to `send` until the slot stays free.
    ///
    /// The lock is released while `send` runs. A line offered between two locks is sent before
    /// returning. Returns the number of lines sent.
    pub fn flush<O>(outbox: &mut O, mut send: impl FnMut(&str)) -> usize
    where
        O: Mutex<T = Self>,
    {
        let mut sent = 0;
        while let Some(line) = outbox.lock(|outbox| outbox.pending().cloned()) {
            send(&line);
            outbox.lock(Self::mark_sent);
            sent += 1;
        }
        sent
    }
}
