//! Temperature sensor interface

pub mod max6675;

use fixed::types::I14F2;

use crate::status::Notification;

/// I14F2 is a fixed point number with 2 fractional bits and 14 integer bits.
/// This matches the thermocouple converter's 0.25 degree Celsius resolution, so the raw bits are
/// the "device units" used on the serial link. Range is (-8192, 8192 - 0.25).
pub type Temperature = I14F2;

/// Room temperature, used to seed the averages and the derivative history.
pub const ROOM_TEMPERATURE: Temperature = Temperature::const_from_int(25);

/// Which thermocouple to read.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Probe {
    /// Top heating element, the one the PID loop follows
    Top = 0,
    Bottom = 1,
}

/// Why a thermocouple read was rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorFault {
    /// The data line read all zeros, usually a shorted or unpowered converter
    ShortedLine,
    /// The data line read all ones, usually a disconnected converter
    OpenLine,
    /// The converter reported an open thermocouple. Carries the raw word.
    OpenThermocouple(u16),
    /// Decoded reading outside the plausible band. Carries the decoded value in device units.
    OutOfRange(u16),
    /// The bus transfer itself failed, or no such probe is fitted
    Bus,
}

impl SensorFault {
    /// The raw reading reported alongside the fault, if the fault carries one.
    pub const fn raw(&self) -> Option<u16> {
        match self {
            Self::ShortedLine => Some(0x0000),
            Self::OpenLine => Some(0xFFFF),
            Self::OpenThermocouple(raw) | Self::OutOfRange(raw) => Some(*raw),
            Self::Bus => None,
        }
    }

    pub const fn notification(&self) -> Notification {
        match self.raw() {
            Some(raw) => Notification::SensorFault(raw),
            None => Notification::Fault,
        }
    }
}

pub trait Thermometer {
    /// Read the temperature of a probe.
    ///
    /// A successful read is averaged with the previous few valid reads of the same probe. A
    /// rejected read leaves the average untouched.
    fn read(&mut self, probe: Probe) -> Result<Temperature, SensorFault>;
}

/// Fake thermometer for testing
#[cfg(any(test, feature = "fake"))]
pub mod fake {
    use heapless::Deque;

    use crate::thermometer::{Probe, SensorFault, Temperature, Thermometer, ROOM_TEMPERATURE};

    /// A fake thermometer returning a fixed temperature per probe, unless a scripted result is
    /// queued for that probe.
    pub struct FakeThermometer {
        temps: [Temperature; 2],
        script: [Deque<Result<Temperature, SensorFault>, 8>; 2],
        reads: [usize; 2],
    }

    impl FakeThermometer {
        pub fn new(temp: impl Into<Temperature>) -> Self {
            let temp = temp.into();
            Self {
                temps: [temp, temp],
                script: [Deque::new(), Deque::new()],
                reads: [0, 0],
            }
        }

        /// Get a mutable reference to the steady temperature of a probe
        pub fn temp_mut(&mut self, probe: Probe) -> &mut Temperature {
            &mut self.temps[probe as usize]
        }

        /// Queue a one-shot result for the next read of `probe`
        pub fn script(&mut self, probe: Probe, result: Result<Temperature, SensorFault>) {
            if self.script[probe as usize].push_back(result).is_err() {
                panic!("fake thermometer script full");
            }
        }

        /// How many times `probe` was read
        pub fn reads(&self, probe: Probe) -> usize {
            self.reads[probe as usize]
        }
    }

    impl Default for FakeThermometer {
        fn default() -> Self {
            Self::new(ROOM_TEMPERATURE)
        }
    }

    impl Thermometer for FakeThermometer {
        fn read(&mut self, probe: Probe) -> Result<Temperature, SensorFault> {
            let idx = probe as usize;
            self.reads[idx] += 1;
            self.script[idx]
                .pop_front()
                .unwrap_or(Ok(self.temps[idx]))
        }
    }
}
