//! Oven state machine, run once per slow tick.
//!
//! Each update reads the probes, honors the pending serial command, picks a target for the current
//! state, runs the PID loop on the top temperature and splits its command between the elements.

use core::fmt::{self, Write};

use rtic_core::Mutex;

use crate::{
    config::{FaultPolicy, OvenConfig},
    context::{ControllerContext, PendingCommand},
    controller::{pid::PidController, Controller},
    heater::Outputs,
    mixer::mix,
    profile::ProfileSequencer,
    status::{FaultSink, Notification, StatusLine},
    thermometer::{Probe, Temperature, Thermometer, ROOM_TEMPERATURE},
};

#[cfg(test)]
mod tests;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OvenState {
    /// Outputs off until reset. Also the state before [`Oven::start`].
    Fault,
    /// Holding the manual target, optionally under full manual control
    Idle,
    /// Following the profile
    Run,
    /// Profile finished, target 0
    Done,
    /// Profile frozen, target held
    Pause,
}

impl OvenState {
    /// Name used in the status line
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fault => "fault",
            Self::Idle => "idle",
            Self::Run => "run",
            Self::Done => "done",
            Self::Pause => "pause",
        }
    }
}

impl fmt::Display for OvenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything one update decided, for the status line and the actuators.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Report {
    pub state: OvenState,
    pub tick: u32,
    pub target: Temperature,
    pub top: Temperature,
    pub bottom: Temperature,
    /// PID command before mixing
    pub command: u8,
    /// Computed channel duties, reported even when the outputs are faked
    pub outputs: Outputs,
    /// Duties to actually drive
    pub drive: Outputs,
}

impl Report {
    /// `state,tick,target,top,bottom,command,a,b\n`, temperatures in device units
    pub fn write_status<W: Write>(&self, w: &mut W) -> fmt::Result {
        writeln!(
            w,
            "{},{},{},{},{},{},{},{}",
            self.state,
            self.tick,
            self.target.to_bits(),
            self.top.to_bits(),
            self.bottom.to_bits(),
            self.command,
            self.outputs.top,
            self.outputs.bottom,
        )
    }

    pub fn status_line(&self) -> StatusLine {
        let mut line = StatusLine::new();
        // the longest possible line is ~50 bytes
        let _ = self.write_status(&mut line);
        line
    }
}

pub struct Oven {
    config: OvenConfig,
    state: OvenState,
    pid: PidController,
    profile: ProfileSequencer,
    target: Temperature,
    /// Last good reading per probe
    temps: [Temperature; 2],
    fan: u8,
    tick: u32,
    ticks_since_reset: u16,
}

impl Oven {
    pub fn new(config: OvenConfig) -> Self {
        Self {
            config,
            state: OvenState::Fault,
            pid: PidController::new(config.gains),
            profile: ProfileSequencer::new(config.profile),
            target: Temperature::ZERO,
            temps: [ROOM_TEMPERATURE; 2],
            fan: 0,
            tick: 0,
            ticks_since_reset: 0,
        }
    }

    /// Leave the power-up fault state once the hardware is set up.
    pub fn start(&mut self) {
        if self.state == OvenState::Fault {
            self.transition(OvenState::Idle);
        }
    }

    pub const fn state(&self) -> OvenState {
        self.state
    }

    pub const fn tick(&self) -> u32 {
        self.tick
    }

    pub const fn config(&self) -> &OvenConfig {
        &self.config
    }

    pub const fn profile(&self) -> &ProfileSequencer {
        &self.profile
    }

    pub const fn pid(&self) -> &PidController {
        &self.pid
    }

    fn transition(&mut self, next: OvenState) {
        if next != self.state {
            info!("oven: {} -> {}", self.state, next);
        }
        self.state = next;
    }

    /// Forget the profile position, the PID state and the manual overrides.
    fn reset(&mut self, regs: &mut ControllerContext) {
        debug!("oven: reset");
        self.profile.reset();
        self.pid.reset();
        self.fan = 0;
        self.ticks_since_reset = 0;
        regs.manual_target = Temperature::ZERO;
        regs.manual_top = 0;
        regs.manual_bottom = 0;
        self.transition(OvenState::Idle);
    }

    /// Read one probe, falling back to its last good reading on a fault.
    ///
    /// Returns whether the fault policy asks to trip.
    fn read_probe<TH: Thermometer, F: FaultSink>(
        &mut self,
        probe: Probe,
        thermometer: &mut TH,
        faults: &mut F,
    ) -> bool {
        match thermometer.read(probe) {
            Ok(temp) => {
                self.temps[probe as usize] = temp;
                false
            }
            Err(fault) => {
                warn!("{} probe fault: {}", probe, fault);
                faults.notify(fault.notification());
                self.config.fault_policy == FaultPolicy::Trip
                    && self.ticks_since_reset >= self.config.fault_grace
            }
        }
    }

    fn read_inputs<TH: Thermometer, F: FaultSink>(
        &mut self,
        regs: &ControllerContext,
        thermometer: &mut TH,
        faults: &mut F,
    ) -> (Temperature, Temperature) {
        if regs.fake_in {
            return (regs.fake_top, regs.fake_bottom);
        }

        let mut trip = self.read_probe(Probe::Top, thermometer, faults);
        let top = self.temps[Probe::Top as usize];

        let bottom = if self.config.dual_probe {
            trip |= self.read_probe(Probe::Bottom, thermometer, faults);
            self.temps[Probe::Bottom as usize]
        } else {
            top
        };

        if trip && self.state != OvenState::Fault {
            warn!("oven: tripping on sensor fault");
            self.transition(OvenState::Fault);
        }

        (top, bottom)
    }

    /// Honor the pending command. Returns whether it was a reset.
    fn apply_pending(&mut self, regs: &mut ControllerContext) -> bool {
        let next = match (self.state, regs.pending) {
            (_, PendingCommand::Reset) => {
                self.reset(regs);
                return true;
            }
            (OvenState::Idle, PendingCommand::Go) => OvenState::Run,
            (OvenState::Run, PendingCommand::Pause) => OvenState::Pause,
            (OvenState::Pause, PendingCommand::Resume) => OvenState::Run,
            (_, PendingCommand::None) => return false,
            (state, pending) => {
                trace!("oven: {} ignored in {}", pending, state);
                return false;
            }
        };
        self.transition(next);
        false
    }

    fn next_target<F: FaultSink>(&mut self, regs: &ControllerContext, faults: &mut F) {
        match self.state {
            OvenState::Idle => {
                self.target = regs.manual_target;
                self.fan = 0;
            }
            OvenState::Run => {
                let setpoint = self.profile.advance();
                if setpoint.terminal {
                    self.transition(OvenState::Done);
                } else {
                    self.target = setpoint.target;
                    self.fan = setpoint.aux.unwrap_or(0);
                }
            }
            OvenState::Pause => {}
            OvenState::Done => self.target = Temperature::ZERO,
            OvenState::Fault => {
                self.target = Temperature::ZERO;
                self.fan = 0;
                faults.notify(Notification::Fault);
            }
        }
    }

    /// Run one slow tick.
    ///
    /// `registers` is locked twice: once to snapshot the registers and take the pending command,
    /// once to write back the manual target and clear the manual overrides.
    pub fn update<C, TH, F>(
        &mut self,
        registers: &mut C,
        thermometer: &mut TH,
        faults: &mut F,
    ) -> Report
    where
        C: Mutex<T = ControllerContext>,
        TH: Thermometer,
        F: FaultSink,
    {
        let mut regs = registers.lock(ControllerContext::take_snapshot);

        let (top, bottom) = self.read_inputs(&regs, thermometer, faults);
        let reset = self.apply_pending(&mut regs);
        self.next_target(&regs, faults);

        let command = if self.state == OvenState::Fault {
            0
        } else {
            self.pid.set_gains(regs.gains);
            self.pid.set_target(self.target);
            self.pid.run(top)
        };

        let manual = self.state == OvenState::Idle && regs.manual;
        let outputs = match self.state {
            OvenState::Fault => Outputs::OFF,
            _ if manual => Outputs {
                top: regs.manual_top,
                bottom: regs.manual_bottom,
                fan: self.fan,
            },
            _ => {
                let (a, b) = mix(command);
                Outputs {
                    top: a,
                    bottom: b,
                    fan: self.fan,
                }
            }
        };

        let drive = if regs.fake_out || self.state == OvenState::Fault {
            Outputs::OFF
        } else {
            outputs
        };

        let target = self.target;
        registers.lock(|live| {
            live.manual_target = target;
            if reset || !manual {
                live.manual_top = 0;
                live.manual_bottom = 0;
            }
        });

        let report = Report {
            state: self.state,
            tick: self.tick,
            target,
            top,
            bottom,
            command,
            outputs,
            drive,
        };

        self.tick = self.tick.wrapping_add(1);
        self.ticks_since_reset = self.ticks_since_reset.saturating_add(1);

        report
    }
}
