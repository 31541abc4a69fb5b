//! Compile-time oven configuration.

use crate::{
    controller::ControlGains,
    profile::{ProfileStep, REFLOW_PROFILE},
};

/// What a rejected thermocouple read does besides being reported.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultPolicy {
    /// Report the fault and keep controlling on the last good reading
    #[default]
    Report,
    /// Report the fault and enter the fault state, once the grace period after a reset elapsed
    Trip,
}

#[derive(Debug, Copy, Clone)]
pub struct OvenConfig {
    /// Gains loaded at startup, the serial link can change them later
    pub gains: ControlGains,
    pub fault_policy: FaultPolicy,
    /// Slow ticks after a reset during which [`FaultPolicy::Trip`] only reports.
    /// Covers the converters' first conversion and the averages filling up.
    pub fault_grace: u16,
    /// Read a separate bottom probe. With one probe the bottom reading mirrors the top one.
    pub dual_probe: bool,
    pub profile: &'static [ProfileStep],
}

impl OvenConfig {
    pub const DEFAULT: Self = Self {
        gains: ControlGains::DEFAULT,
        fault_policy: FaultPolicy::Report,
        fault_grace: 40,
        dual_probe: false,
        profile: REFLOW_PROFILE,
    };
}

impl Default for OvenConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
