//! Table-driven setpoint ramp generator.
//!
//! A profile is a fixed list of [`ProfileStep`]s. Each slow tick the sequencer adds the current
//! step's rate to a fixed point accumulator, so the target follows a piecewise linear curve.

use fixed::types::{I22F10, I6F10};
use static_assertions::const_assert;

use crate::thermometer::{Temperature, ROOM_TEMPERATURE};

/// Temperature delta per tick, in 1/1024 degrees
pub type Rate = I6F10;

/// Accumulated target, in 1/1024 degrees
pub type Accumulator = I22F10;

/// Where a reset profile starts from
pub const BASELINE: Accumulator = Accumulator::const_from_int(25);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ProfileStep {
    /// Slow ticks to hold this ramp rate
    pub duration: u16,
    pub rate: Rate,
    /// Fan duty while this step runs, if the oven has a fan
    pub aux: Option<u8>,
}

impl ProfileStep {
    pub const fn new(duration: u16, rate: i16, aux: Option<u8>) -> Self {
        Self {
            duration,
            rate: Rate::from_bits(rate),
            aux,
        }
    }
}

/// Lead-free reflow curve with fan assisted cool-down, 0.25s per tick.
///
/// Preheat to ~150, soak, ramp to a ~218 peak and cool back down. Durations add up to 340s.
pub const REFLOW_PROFILE: &[ProfileStep] = &[
    ProfileStep::new(360, 242, Some(0)),
    ProfileStep::new(360, 114, Some(0)),
    ProfileStep::new(120, 256, Some(0)),
    ProfileStep::new(120, 282, Some(0)),
    ProfileStep::new(60, 85, Some(0)),
    ProfileStep::new(40, -128, Some(128)),
    ProfileStep::new(60, -563, Some(255)),
    ProfileStep::new(240, -661, Some(255)),
];

const_assert!(!REFLOW_PROFILE.is_empty());
const_assert!(BASELINE.to_bits() == ROOM_TEMPERATURE.to_bits() as i32 * 256);

/// Output of a single [`ProfileSequencer::advance`] call.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Setpoint {
    /// The profile has run past its last step
    pub terminal: bool,
    pub target: Temperature,
    /// Auxiliary output of the current, or last, step
    pub aux: Option<u8>,
}

pub struct ProfileSequencer {
    profile: &'static [ProfileStep],
    step: usize,
    ticks_remaining: u16,
    accumulator: Accumulator,
}

impl ProfileSequencer {
    pub const fn new(profile: &'static [ProfileStep]) -> Self {
        let ticks_remaining = match profile.first() {
            Some(step) => step.duration,
            None => 0,
        };

        Self {
            profile,
            step: 0,
            ticks_remaining,
            accumulator: BASELINE,
        }
    }

    /// Rewind to the first step and the room temperature baseline
    pub fn reset(&mut self) {
        *self = Self::new(self.profile);
    }

    pub const fn step(&self) -> usize {
        self.step
    }

    pub const fn ticks_remaining(&self) -> u16 {
        self.ticks_remaining
    }

    pub const fn accumulator(&self) -> Accumulator {
        self.accumulator
    }

    pub fn is_terminal(&self) -> bool {
        self.step >= self.profile.len()
    }

    /// Current target in device units
    pub fn target(&self) -> Temperature {
        self.accumulator.saturating_to_num()
    }

    fn aux(&self) -> Option<u8> {
        self.profile
            .get(self.step)
            .or_else(|| self.profile.last())
            .and_then(|step| step.aux)
    }

    /// Advance the profile by one tick.
    ///
    /// Once past the last step every call reports `terminal` and leaves the cursor untouched.
    pub fn advance(&mut self) -> Setpoint {
        let Some(step) = self.profile.get(self.step) else {
            return Setpoint {
                terminal: true,
                target: self.target(),
                aux: self.aux(),
            };
        };

        self.accumulator = self
            .accumulator
            .saturating_add(Accumulator::from_bits(step.rate.to_bits().into()));

        self.ticks_remaining = self.ticks_remaining.saturating_sub(1);
        if self.ticks_remaining == 0 {
            self.step += 1;
            if let Some(next) = self.profile.get(self.step) {
                trace!("profile step {=usize}", self.step);
                self.ticks_remaining = next.duration;
            }
        }

        Setpoint {
            terminal: false,
            target: self.target(),
            aux: self.aux(),
        }
    }
}
