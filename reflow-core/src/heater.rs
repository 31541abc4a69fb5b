//! Heating element and fan drivers.
//!
//! The elements switch through solid state relays, so power is delivered as a slow software PWM
//! refreshed on every fast tick.

use embedded_hal::digital::v2::OutputPin;

/// First-order sigma-delta modulator over a 255 step duty cycle.
///
/// Spreads the on ticks evenly instead of bunching them at the start of a period, so a 50% duty
/// toggles every tick.
#[derive(Debug, Default, Clone)]
pub struct SoftPwm {
    duty: u8,
    acc: u16,
}

impl SoftPwm {
    pub const fn new() -> Self {
        Self { duty: 0, acc: 0 }
    }

    pub const fn duty(&self) -> u8 {
        self.duty
    }

    pub fn set_duty(&mut self, duty: u8) {
        self.duty = duty;
    }

    /// Advance one tick, returns whether the output is on for it.
    pub fn step(&mut self) -> bool {
        self.acc += u16::from(self.duty);
        if self.acc >= u16::from(u8::MAX) {
            self.acc -= u16::from(u8::MAX);
            true
        } else {
            false
        }
    }
}

/// An on/off output driven by a [`SoftPwm`].
pub struct Heater<PIN: OutputPin> {
    pin: PIN,
    pwm: SoftPwm,
}

impl<PIN: OutputPin> Heater<PIN> {
    pub const fn new(pin: PIN) -> Self {
        Self {
            pin,
            pwm: SoftPwm::new(),
        }
    }

    pub const fn duty(&self) -> u8 {
        self.pwm.duty()
    }

    /// Set the duty cycle, 0 is always off and 255 always on.
    pub fn set_duty(&mut self, duty: u8) {
        self.pwm.set_duty(duty);
    }

    /// Drive the pin for the next fast tick.
    pub fn refresh(&mut self) -> Result<(), PIN::Error> {
        if self.pwm.step() {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }

    /// Switch off immediately and forget the duty cycle.
    pub fn off(&mut self) -> Result<(), PIN::Error> {
        self.pwm = SoftPwm::new();
        self.pin.set_low()
    }

    pub fn free(self) -> PIN {
        self.pin
    }
}

/// Duty cycles of every output for one control period.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Outputs {
    pub top: u8,
    pub bottom: u8,
    pub fan: u8,
}

impl Outputs {
    pub const OFF: Self = Self {
        top: 0,
        bottom: 0,
        fan: 0,
    };
}

/// Every output of the oven.
pub struct Actuators<PIN: OutputPin> {
    pub top: Heater<PIN>,
    pub bottom: Heater<PIN>,
    pub fan: Heater<PIN>,
}

impl<PIN: OutputPin> Actuators<PIN> {
    pub const fn new(top: PIN, bottom: PIN, fan: PIN) -> Self {
        Self {
            top: Heater::new(top),
            bottom: Heater::new(bottom),
            fan: Heater::new(fan),
        }
    }

    pub fn apply(&mut self, outputs: Outputs) {
        self.top.set_duty(outputs.top);
        self.bottom.set_duty(outputs.bottom);
        self.fan.set_duty(outputs.fan);
    }

    pub const fn outputs(&self) -> Outputs {
        Outputs {
            top: self.top.duty(),
            bottom: self.bottom.duty(),
            fan: self.fan.duty(),
        }
    }

    pub fn refresh(&mut self) -> Result<(), PIN::Error> {
        self.top.refresh()?;
        self.bottom.refresh()?;
        self.fan.refresh()
    }

    pub fn off(&mut self) -> Result<(), PIN::Error> {
        self.top.off()?;
        self.bottom.off()?;
        self.fan.off()
    }
}
