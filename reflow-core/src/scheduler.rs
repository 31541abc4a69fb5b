//! Fast/slow tick rates.
//!
//! The fast tick refreshes the heater outputs, every [`SLOW_DIVIDER`]th fast tick runs the
//! control update.

use fugit::HertzU32;
use static_assertions::const_assert_eq;

/// Heater refresh rate
pub const FAST_RATE: HertzU32 = HertzU32::from_raw(120);
/// Control update rate
pub const SLOW_RATE: HertzU32 = HertzU32::from_raw(4);
/// Fast ticks per slow tick
pub const SLOW_DIVIDER: u32 = FAST_RATE.raw() / SLOW_RATE.raw();

const_assert_eq!(FAST_RATE.raw() % SLOW_RATE.raw(), 0);
const_assert_eq!(SLOW_DIVIDER, 30);

/// Counts fast ticks and fires once every `ratio` of them.
#[derive(Debug, Clone)]
pub struct TickDivider {
    count: u32,
    ratio: u32,
}

impl TickDivider {
    pub const fn new(ratio: u32) -> Self {
        Self { count: 0, ratio }
    }

    /// Register one fast tick. Returns `true` when the slow work is due.
    ///
    /// A ratio of 0 or 1 fires on every tick.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.ratio {
            self.count = 0;
            true
        } else {
            false
        }
    }
}

impl Default for TickDivider {
    fn default() -> Self {
        Self::new(SLOW_DIVIDER)
    }
}
