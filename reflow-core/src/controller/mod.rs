//! Controller to manage the heating elements to follow a target temperature.

use crate::thermometer::Temperature;

pub mod pid;

/// Largest accepted gain exponent. Keeps every shifted term well inside an `i64`.
pub const MAX_GAIN_SHIFT: u8 = 16;

/// PID gains, each one a power-of-two exponent rather than a linear factor.
///
/// A term contributes `value << k`, and the sum is post-divided by [`pid::POST_SHIFT`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlGains {
    pub kp: u8,
    pub ki: u8,
    pub kd: u8,
}

impl ControlGains {
    /// Calibrated for a converted pizza oven
    pub const DEFAULT: Self = Self::new(13, 8, 2);

    /// Exponents above [`MAX_GAIN_SHIFT`] are clamped.
    pub const fn new(kp: u8, ki: u8, kd: u8) -> Self {
        const fn clamp(k: u8) -> u8 {
            if k > MAX_GAIN_SHIFT {
                MAX_GAIN_SHIFT
            } else {
                k
            }
        }

        Self {
            kp: clamp(kp),
            ki: clamp(ki),
            kd: clamp(kd),
        }
    }
}

impl Default for ControlGains {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub trait Controller {
    /// Set the target temperature in degrees Celsius
    fn set_target(&mut self, target: Temperature);

    /// Get the target temperature in degrees Celsius
    fn target(&self) -> Temperature;

    /// Run the controller for a single tick
    ///
    /// Returns 0 if the heater should be completely off, 255 if it should be completely on, or
    /// somewhere in between.
    fn run(&mut self, temp: Temperature) -> u8;

    /// Forget all accumulated state
    fn reset(&mut self);
}
