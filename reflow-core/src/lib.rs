//! Control core of a reflow oven: thermocouple acquisition, profile sequencing, PID control,
//! power mixing and the oven state machine.
//!
//! Everything here is hardware agnostic. The firmware wires it to real peripherals through the
//! `embedded-hal` traits and RTIC resource locks.
#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

pub mod command;
pub mod config;
pub mod context;
pub mod controller;
pub mod heater;
pub mod mixer;
pub mod oven;
pub mod profile;
pub mod scheduler;
pub mod status;
pub mod thermometer;

pub use command::{Command, LineBuffer, MAX_LINE};
pub use config::{FaultPolicy, OvenConfig};
pub use context::{ControllerContext, PendingCommand};
pub use controller::{pid::PidController, ControlGains, Controller};
pub use heater::{Actuators, Heater, Outputs};
pub use oven::{Oven, OvenState, Report};
pub use profile::{ProfileSequencer, ProfileStep, REFLOW_PROFILE};
pub use scheduler::{TickDivider, FAST_RATE, SLOW_DIVIDER, SLOW_RATE};
pub use status::{FaultSink, Notification, Outbox, StatusLine};
pub use thermometer::{max6675::Max6675Bank, Probe, SensorFault, Temperature, Thermometer};
