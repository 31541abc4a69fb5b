//! Registers shared between the command parser and the control update.
//!
//! The parser writes them, the control update reads them once per slow tick and clears the
//! one-shot ones. All access goes through a resource lock.

use crate::{controller::ControlGains, thermometer::Temperature};

/// State transition requested over the serial link, honored on the next slow tick.
///
/// A single slot, so a second request before the tick replaces the first.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PendingCommand {
    #[default]
    None,
    Reset,
    Go,
    Pause,
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerContext {
    pub pending: PendingCommand,
    pub gains: ControlGains,
    /// Don't drive the outputs, still report computed commands
    pub fake_out: bool,
    /// Use `fake_top`/`fake_bottom` instead of reading the probes
    pub fake_in: bool,
    /// Drive the outputs from `manual_top`/`manual_bottom` while idle
    pub manual: bool,
    pub fake_top: Temperature,
    pub fake_bottom: Temperature,
    pub manual_top: u8,
    pub manual_bottom: u8,
    /// Idle target. Tracks the live target so switching to manual never jumps.
    pub manual_target: Temperature,
}

impl ControllerContext {
    pub const fn new(gains: ControlGains) -> Self {
        Self {
            pending: PendingCommand::None,
            gains,
            fake_out: false,
            fake_in: false,
            manual: false,
            fake_top: Temperature::ZERO,
            fake_bottom: Temperature::ZERO,
            manual_top: 0,
            manual_bottom: 0,
            manual_target: Temperature::ZERO,
        }
    }

    /// Copy the registers for one slow tick, consuming the pending command.
    pub fn take_snapshot(&mut self) -> Self {
        let snapshot = self.clone();
        self.pending = PendingCommand::None;
        snapshot
    }
}

impl Default for ControllerContext {
    fn default() -> Self {
        Self::new(ControlGains::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_consumes_pending() {
        let mut ctx = ControllerContext::default();
        ctx.pending = PendingCommand::Go;
        ctx.manual_top = 7;

        let snap = ctx.take_snapshot();
        assert_eq!(snap.pending, PendingCommand::Go);
        assert_eq!(snap.manual_top, 7);

        assert_eq!(ctx.pending, PendingCommand::None);
        assert_eq!(ctx.manual_top, 7);
    }
}
