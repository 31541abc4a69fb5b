//! Fixed-point PID controller with power-of-two gains.
//!
//! Based on Tim Wescott's "PID without a PhD". Temperatures are handled as raw device units
//! (0.25 degrees), so the whole loop is integer arithmetic.

use heapless::HistoryBuffer;
use num_traits::clamp;

use crate::{
    controller::{ControlGains, Controller},
    thermometer::{Temperature, ROOM_TEMPERATURE},
};

/// Post-divide exponent shared by all three terms
pub const POST_SHIFT: u32 = 8;

/// Length of the derivative delay line, ~10s at the 4Hz control rate
pub const DERIVATIVE_DELAY: usize = 40;

pub struct PidController {
    gains: ControlGains,
    target: Temperature,
    /// Past temperatures, the oldest one is the derivative reference
    history: HistoryBuffer<Temperature, DERIVATIVE_DELAY>,
    integral: i32,
}

impl PidController {
    pub fn new(gains: ControlGains) -> Self {
        Self {
            gains,
            target: Temperature::ZERO,
            history: HistoryBuffer::new_with(ROOM_TEMPERATURE),
            integral: 0,
        }
    }

    pub const fn gains(&self) -> ControlGains {
        self.gains
    }

    pub fn set_gains(&mut self, gains: ControlGains) {
        self.gains = gains;
    }

    pub const fn integral(&self) -> i32 {
        self.integral
    }

    /// Record `temp` and return the sample it displaced from the delay line.
    fn push_history(&mut self, temp: Temperature) -> Temperature {
        // The buffer is created full, so the oldest entry is the one being overwritten.
        let oldest = self.history.oldest_ordered().next().copied().unwrap_or(temp);
        self.history.write(temp);
        oldest
    }

    /// Compute the next power command in `0..=255`.
    ///
    /// Both temperatures must be in device units. The error is positive while ramping up and the
    /// derivative negative, so the D term brakes the approach to the target.
    pub fn compute(&mut self, temp: Temperature, target: Temperature) -> u8 {
        let temp_bits = i32::from(temp.to_bits());
        let error = i32::from(target.to_bits()) - temp_bits;
        let derivative = i32::from(self.push_history(temp).to_bits()) - temp_bits;

        let command = ((i64::from(error) << self.gains.kp)
            + (i64::from(self.integral) << self.gains.ki)
            + (i64::from(derivative) << self.gains.kd))
            >> POST_SHIFT;

        // Only integrate while unsaturated, or when the error pulls back out of saturation
        if (0..=255).contains(&command) || (command > 0 && error < 0) || (command < 0 && error > 0)
        {
            self.integral = self.integral.saturating_add(error);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped")]
        let command = clamp(command, 0, 255) as u8;

        trace!(
            "pid: error={=i32} derivative={=i32} integral={=i32} command={=u8}",
            error,
            derivative,
            self.integral,
            command
        );

        command
    }
}

impl Controller for PidController {
    fn set_target(&mut self, target: Temperature) {
        self.target = target;
    }

    fn target(&self) -> Temperature {
        self.target
    }

    fn run(&mut self, temp: Temperature) -> u8 {
        self.compute(temp, self.target)
    }

    fn reset(&mut self) {
        self.history.clear_with(ROOM_TEMPERATURE);
        self.integral = 0;
    }
}
