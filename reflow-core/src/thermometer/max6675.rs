//! Implementation for the MAX6675 thermocouple-to-digital converter.
//!
//! The converter shifts out a 16 bit word MSB first:
//!
//! | bit   | meaning                               |
//! |-------|---------------------------------------|
//! | 15    | dummy sign bit, always 0              |
//! | 14..3 | 12 bit temperature, 0.25 degree units |
//! | 2     | thermocouple input open               |
//! | 1..0  | device id and state                   |
//!
//! Pulling chip select high starts a new conversion, which takes ~220ms. The slow tick runs at
//! 4Hz so every read picks up the conversion started by the previous one.

use embedded_hal::{blocking::spi::Transfer, digital::v2::OutputPin};
use heapless::HistoryBuffer;

use crate::thermometer::{Probe, SensorFault, Temperature, Thermometer, ROOM_TEMPERATURE};

/// Number of valid reads averaged per probe. Must be a power of two.
pub const AVERAGE: usize = 4;

/// Open thermocouple flag
pub const OPEN_BIT: u16 = 1 << 2;
/// Status bits below the temperature
pub const STATUS_BITS: u32 = 3;

/// Lowest plausible reading in device units (2.5 degrees)
pub const MIN_READING: u16 = 10;
/// Highest plausible reading in device units (300 degrees)
pub const MAX_READING: u16 = 1200;

/// Validate and decode a raw 16 bit word.
pub const fn decode(raw: u16) -> Result<Temperature, SensorFault> {
    if raw == 0x0000 {
        return Err(SensorFault::ShortedLine);
    }
    if raw == 0xFFFF {
        return Err(SensorFault::OpenLine);
    }
    if raw & OPEN_BIT != 0 {
        return Err(SensorFault::OpenThermocouple(raw));
    }

    let code = raw >> STATUS_BITS;
    if code < MIN_READING || code > MAX_READING {
        return Err(SensorFault::OutOfRange(code));
    }

    #[allow(clippy::cast_possible_wrap, reason = "code is at most MAX_READING")]
    let bits = code as i16;
    Ok(Temperature::from_bits(bits))
}

/// Moving average over the last `N` valid readings.
pub struct MovingAverage<const N: usize> {
    samples: HistoryBuffer<Temperature, N>,
}

impl<const N: usize> MovingAverage<N> {
    const SHIFT: u32 = {
        assert!(N.is_power_of_two(), "average window must be a power of two");
        N.trailing_zeros()
    };

    /// Create an average pre-filled with `seed`, so the first few means aren't skewed towards 0.
    pub fn new(seed: Temperature) -> Self {
        Self {
            samples: HistoryBuffer::new_with(seed),
        }
    }

    pub fn push(&mut self, temp: Temperature) {
        self.samples.write(temp);
    }

    pub fn mean(&self) -> Temperature {
        let sum: i32 = self
            .samples
            .as_slice()
            .iter()
            .map(|t| i32::from(t.to_bits()))
            .sum();

        #[allow(clippy::cast_possible_truncation, reason = "mean of i16 values fits i16")]
        let mean = (sum >> Self::SHIFT) as i16;
        Temperature::from_bits(mean)
    }
}

struct Channel<CS> {
    cs: CS,
    average: MovingAverage<AVERAGE>,
}

/// Up to `N` MAX6675 converters sharing one SPI bus, one chip select each.
///
/// Index 0 is the top probe, index 1 the bottom probe.
pub struct Max6675Bank<SPI, CS, const N: usize> {
    spi: SPI,
    channels: [Channel<CS>; N],
}

impl<SPI, CS, const N: usize> Max6675Bank<SPI, CS, N>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    /// Take the bus and chip selects. Deselecting every converter starts its first conversion.
    pub fn new(spi: SPI, chip_selects: [CS; N]) -> Result<Self, CS::Error> {
        let mut channels = chip_selects.map(|cs| Channel {
            cs,
            average: MovingAverage::new(ROOM_TEMPERATURE),
        });

        for channel in &mut channels {
            channel.cs.set_high()?;
        }

        Ok(Self { spi, channels })
    }

    /// Shift in the raw word of one converter. Deselecting it afterwards starts a new conversion.
    pub fn read_raw(&mut self, index: usize) -> Result<u16, SensorFault> {
        let channel = self.channels.get_mut(index).ok_or(SensorFault::Bus)?;

        channel.cs.set_low().map_err(|_| SensorFault::Bus)?;
        let mut buf = [0xFF; 2];
        let transfer = self.spi.transfer(&mut buf).map(|_| ());
        channel.cs.set_high().map_err(|_| SensorFault::Bus)?;

        transfer.map_err(|_| SensorFault::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Current average of a probe, regardless of whether the last read succeeded.
    pub fn average(&self, probe: Probe) -> Option<Temperature> {
        self.channels
            .get(probe as usize)
            .map(|channel| channel.average.mean())
    }

    pub fn free(self) -> (SPI, [CS; N]) {
        (self.spi, self.channels.map(|channel| channel.cs))
    }
}

impl<SPI, CS, const N: usize> Thermometer for Max6675Bank<SPI, CS, N>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    fn read(&mut self, probe: Probe) -> Result<Temperature, SensorFault> {
        let index = probe as usize;
        let raw = self.read_raw(index)?;
        let temp = decode(raw)?;

        let average = &mut self.channels[index].average;
        average.push(temp);
        Ok(average.mean())
    }
}
