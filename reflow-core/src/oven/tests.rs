use rtic_core::Exclusive;

use super::*;
use crate::{
    command::Command,
    controller::ControlGains,
    profile::ProfileStep,
    thermometer::{fake::FakeThermometer, SensorFault},
};

const SHORT: &[ProfileStep] = &[ProfileStep::new(2, 256, None), ProfileStep::new(1, 0, None)];

const FAN: &[ProfileStep] = &[
    ProfileStep::new(2, 0, Some(100)),
    ProfileStep::new(2, 0, Some(200)),
];

fn t(bits: i16) -> Temperature {
    Temperature::from_bits(bits)
}

/// An oven wired to in-memory registers and probes
struct Rig {
    oven: Oven,
    ctx: ControllerContext,
    therm: FakeThermometer,
    notes: Vec<Notification>,
}

impl Rig {
    fn new(config: OvenConfig) -> Self {
        let mut oven = Oven::new(config);
        oven.start();
        Self::stopped(oven)
    }

    fn with_profile(profile: &'static [ProfileStep]) -> Self {
        Self::new(OvenConfig {
            profile,
            ..OvenConfig::DEFAULT
        })
    }

    fn stopped(oven: Oven) -> Self {
        Self {
            ctx: ControllerContext::new(oven.config().gains),
            oven,
            therm: FakeThermometer::default(),
            notes: Vec::new(),
        }
    }

    fn send(&mut self, line: &str) {
        Command::parse(line.as_bytes())
            .unwrap_or_else(|| panic!("bad command {line:?}"))
            .apply(&mut self.ctx);
    }

    fn tick(&mut self) -> Report {
        let notes = &mut self.notes;
        self.oven.update(
            &mut Exclusive(&mut self.ctx),
            &mut self.therm,
            &mut |n: Notification| notes.push(n),
        )
    }

    fn ticks(&mut self, n: usize) -> Vec<Report> {
        (0..n).map(|_| self.tick()).collect()
    }
}

#[test]
fn starts_in_fault_until_started() {
    let mut oven = Oven::new(OvenConfig::DEFAULT);
    assert_eq!(oven.state(), OvenState::Fault);
    oven.start();
    assert_eq!(oven.state(), OvenState::Idle);
}

#[test]
fn idle_status_line() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    // target 0 at room temperature, the PID output clamps to 0
    assert_eq!(rig.tick().status_line(), "idle,0,0,100,100,0,0,0\n");
    assert_eq!(rig.tick().status_line(), "idle,1,0,100,100,0,0,0\n");
}

#[test]
fn go_runs_on_next_tick() {
    let mut rig = Rig::with_profile(SHORT);
    rig.send("go");
    let report = rig.tick();
    assert_eq!(report.state, OvenState::Run);
    // (1 << 13) >> 8 = 32, mixed to 8/24 and doubled
    assert_eq!(report.status_line(), "run,0,101,100,100,32,16,48\n");
    assert_eq!(rig.ctx.pending, PendingCommand::None);
}

#[test]
fn run_finishes_without_a_command() {
    let mut rig = Rig::with_profile(SHORT);
    rig.send("go");

    let reports = rig.ticks(5);
    let summary: Vec<_> = reports.iter().map(|r| (r.state, r.target.to_bits())).collect();
    assert_eq!(
        summary,
        [
            (OvenState::Run, 101),
            (OvenState::Run, 102),
            (OvenState::Run, 102),
            // the last target is held on the transition tick
            (OvenState::Done, 102),
            (OvenState::Done, 0),
        ]
    );

    // done ignores go
    rig.send("go");
    assert_eq!(rig.tick().state, OvenState::Done);
}

#[test]
fn only_latest_command_survives() {
    let mut rig = Rig::with_profile(SHORT);
    rig.send("go");
    rig.send("pause");
    // pause is a no-op in idle, the go was overwritten
    assert_eq!(rig.tick().state, OvenState::Idle);
}

#[test]
fn ignored_commands() {
    let mut rig = Rig::with_profile(REFLOW);
    for cmd in ["pause", "resume"] {
        rig.send(cmd);
        assert_eq!(rig.tick().state, OvenState::Idle);
    }

    rig.send("go");
    rig.tick();
    for cmd in ["go", "resume"] {
        rig.send(cmd);
        assert_eq!(rig.tick().state, OvenState::Run);
    }

    rig.send("pause");
    rig.tick();
    for cmd in ["go", "pause"] {
        rig.send(cmd);
        assert_eq!(rig.tick().state, OvenState::Pause);
    }
}

const REFLOW: &[ProfileStep] = crate::profile::REFLOW_PROFILE;

#[test]
fn reset_from_every_state() {
    fn check(mut rig: Rig, from: OvenState) {
        rig.tick();
        assert_eq!(rig.oven.state(), from);

        rig.ctx.manual_target = t(400);
        rig.ctx.manual_top = 10;
        rig.ctx.manual_bottom = 20;
        rig.send("reset");

        let report = rig.tick();
        assert_eq!(report.state, OvenState::Idle, "reset from {from}");
        assert_eq!(report.target, Temperature::ZERO);
        assert_eq!(rig.ctx.manual_target, Temperature::ZERO);
        assert_eq!((rig.ctx.manual_top, rig.ctx.manual_bottom), (0, 0));
        assert_eq!(rig.oven.profile().step(), 0);
        assert_eq!(rig.oven.pid().integral(), 0);
    }

    check(Rig::stopped(Oven::new(OvenConfig::DEFAULT)), OvenState::Fault);
    check(Rig::new(OvenConfig::DEFAULT), OvenState::Idle);

    let mut run = Rig::new(OvenConfig::DEFAULT);
    run.send("go");
    check(run, OvenState::Run);

    let mut pause = Rig::new(OvenConfig::DEFAULT);
    pause.send("go");
    pause.tick();
    pause.send("pause");
    check(pause, OvenState::Pause);

    let mut done = Rig::with_profile(SHORT);
    done.send("go");
    done.ticks(4);
    check(done, OvenState::Done);
}

#[test]
fn reset_keeps_manual_mode_flags() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    rig.send("manual: 1");
    rig.send("cmd: 10, 20");
    rig.send("reset");
    let report = rig.tick();
    // the manual channel values are cleared, manual mode itself stays on
    assert!(rig.ctx.manual);
    assert_eq!((report.outputs.top, report.outputs.bottom), (0, 0));
    assert_eq!((rig.ctx.manual_top, rig.ctx.manual_bottom), (0, 0));
}

#[test]
fn pause_freezes_profile() {
    let mut rig = Rig::with_profile(REFLOW);
    rig.send("go");
    rig.ticks(3);
    rig.send("pause");
    let paused = rig.tick();
    assert_eq!(paused.state, OvenState::Pause);

    let step = rig.oven.profile().step();
    let remaining = rig.oven.profile().ticks_remaining();
    for report in rig.ticks(10) {
        assert_eq!(report.state, OvenState::Pause);
        assert_eq!(report.target, paused.target);
    }
    assert_eq!(rig.oven.profile().step(), step);
    assert_eq!(rig.oven.profile().ticks_remaining(), remaining);

    rig.send("resume");
    assert_eq!(rig.tick().state, OvenState::Run);
    assert_eq!(rig.oven.profile().ticks_remaining(), remaining - 1);
}

#[test]
fn manual_control_in_idle() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    rig.send("manual: 1");
    rig.send("cmd: 30, 40");
    rig.send("target: 200");

    let report = rig.tick();
    assert_eq!((report.outputs.top, report.outputs.bottom), (30, 40));
    assert_eq!(report.drive, report.outputs);
    // the PID still runs and is reported
    assert_eq!(report.target, t(200));
    assert_eq!(report.command, 255);
    // the manual values survive while manual control is active
    assert_eq!((rig.ctx.manual_top, rig.ctx.manual_bottom), (30, 40));
}

#[test]
fn registers_reach_the_pid() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    assert_eq!(rig.oven.pid().gains(), ControlGains::DEFAULT);

    rig.send("pid: 1, 2, 3");
    rig.send("target: 200");
    let report = rig.tick();
    assert_eq!(rig.oven.pid().gains(), ControlGains::new(1, 2, 3));
    assert_eq!(rig.oven.pid().target(), report.target);
    assert_eq!(report.target, t(200));

    // a reset clears the manual target, the gains stay
    rig.send("reset");
    rig.tick();
    assert_eq!(rig.oven.pid().target(), Temperature::ZERO);
    assert_eq!(rig.oven.pid().gains(), ControlGains::new(1, 2, 3));
}

#[test]
fn manual_values_cleared_outside_manual_control() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    rig.send("cmd: 30, 40");
    let report = rig.tick();
    assert_eq!((report.outputs.top, report.outputs.bottom), (0, 0));
    assert_eq!((rig.ctx.manual_top, rig.ctx.manual_bottom), (0, 0));

    // manual mode only applies while idle
    rig.send("manual: 1");
    rig.send("go");
    rig.tick();
    rig.send("cmd: 30, 40");
    let report = rig.tick();
    assert_eq!(report.state, OvenState::Run);
    assert_eq!(report.outputs.top, mix(report.command).0);
    assert_eq!((rig.ctx.manual_top, rig.ctx.manual_bottom), (0, 0));
}

#[test]
fn manual_target_tracks_target() {
    let mut rig = Rig::with_profile(SHORT);
    rig.send("go");
    for _ in 0..3 {
        let report = rig.tick();
        assert_eq!(rig.ctx.manual_target, report.target);
    }

    // a reset goes back to the tracked value, not a stale one
    rig.send("reset");
    rig.tick();
    rig.send("manual: 1");
    assert_eq!(rig.tick().target, Temperature::ZERO);
}

#[test]
fn fake_inputs_replace_probes() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    rig.send("fake_in: 1");
    rig.send("temp: 400, 300");

    let report = rig.tick();
    assert_eq!((report.top, report.bottom), (t(400), t(300)));
    assert_eq!(rig.therm.reads(Probe::Top), 0);
}

#[test]
fn fake_outputs_report_but_do_not_drive() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    rig.send("fake_out: 1");
    rig.send("target: 1000");

    let report = rig.tick();
    assert_eq!(report.command, 255);
    assert_eq!((report.outputs.top, report.outputs.bottom), (255, 255));
    assert_eq!(report.drive, Outputs::OFF);
}

#[test]
fn sensor_fault_reported_once_and_last_reading_held() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    let raw = (400 << 3) | 0b100;
    rig.therm.script(Probe::Top, Ok(t(400)));
    rig.therm.script(Probe::Top, Err(SensorFault::OpenThermocouple(raw)));

    assert_eq!(rig.tick().top, t(400));
    let report = rig.tick();
    assert_eq!(report.top, t(400));
    assert_eq!(report.state, OvenState::Idle);
    assert_eq!(rig.notes, [Notification::SensorFault(raw)]);

    // back to the steady reading
    assert_eq!(rig.tick().top, ROOM_TEMPERATURE);
    assert_eq!(rig.notes.len(), 1);
}

#[test]
fn bus_fault_is_generic() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    rig.therm.script(Probe::Top, Err(SensorFault::Bus));
    rig.tick();
    assert_eq!(rig.notes, [Notification::Fault]);
}

#[test]
fn trip_policy_after_grace() {
    let mut rig = Rig::new(OvenConfig {
        fault_policy: FaultPolicy::Trip,
        fault_grace: 2,
        ..OvenConfig::DEFAULT
    });
    rig.send("target: 1000");

    // inside the grace period faults are only reported
    for _ in 0..2 {
        rig.therm.script(Probe::Top, Err(SensorFault::OpenLine));
        assert_eq!(rig.tick().state, OvenState::Idle);
    }

    rig.therm.script(Probe::Top, Err(SensorFault::OpenLine));
    let report = rig.tick();
    assert_eq!(report.state, OvenState::Fault);
    assert_eq!(report.command, 0);
    assert_eq!(report.target, Temperature::ZERO);
    assert_eq!(report.outputs, Outputs::OFF);
    assert_eq!(report.drive, Outputs::OFF);
    assert_eq!(report.status_line(), "fault,2,0,100,100,0,0,0\n");
    assert_eq!(
        rig.notes,
        [
            Notification::SensorFault(0xFFFF),
            Notification::SensorFault(0xFFFF),
            Notification::SensorFault(0xFFFF),
            Notification::Fault,
        ]
    );

    // the fault state keeps reporting and ignores everything but reset
    rig.notes.clear();
    rig.send("go");
    assert_eq!(rig.tick().state, OvenState::Fault);
    assert_eq!(rig.notes, [Notification::Fault]);

    rig.send("reset");
    assert_eq!(rig.tick().state, OvenState::Idle);

    // the grace period restarts after the reset
    rig.therm.script(Probe::Top, Err(SensorFault::OpenLine));
    assert_eq!(rig.tick().state, OvenState::Idle);
}

#[test]
fn report_policy_never_trips() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    for _ in 0..100 {
        rig.therm.script(Probe::Top, Err(SensorFault::ShortedLine));
        assert_eq!(rig.tick().state, OvenState::Idle);
    }
    assert_eq!(rig.notes.len(), 100);
}

#[test]
fn single_probe_mirrors_top() {
    let mut rig = Rig::new(OvenConfig::DEFAULT);
    *rig.therm.temp_mut(Probe::Top) = t(400);
    *rig.therm.temp_mut(Probe::Bottom) = t(300);

    let report = rig.tick();
    assert_eq!((report.top, report.bottom), (t(400), t(400)));
    assert_eq!(rig.therm.reads(Probe::Bottom), 0);
}

#[test]
fn dual_probe_reads_bottom() {
    let mut rig = Rig::new(OvenConfig {
        dual_probe: true,
        ..OvenConfig::DEFAULT
    });
    *rig.therm.temp_mut(Probe::Top) = t(400);
    *rig.therm.temp_mut(Probe::Bottom) = t(300);

    let report = rig.tick();
    assert_eq!((report.top, report.bottom), (t(400), t(300)));

    rig.therm
        .script(Probe::Bottom, Err(SensorFault::OutOfRange(5000)));
    assert_eq!(rig.tick().bottom, t(300));
    assert_eq!(rig.notes, [Notification::SensorFault(5000)]);
}

#[test]
fn fan_follows_profile() {
    let mut rig = Rig::with_profile(FAN);
    assert_eq!(rig.tick().outputs.fan, 0);

    rig.send("go");
    let fans: Vec<_> = rig.ticks(3).iter().map(|r| r.outputs.fan).collect();
    assert_eq!(fans, [100, 200, 200]);

    // held while paused
    rig.send("pause");
    assert_eq!(rig.tick().outputs.fan, 200);

    // held once done
    rig.send("resume");
    let reports = rig.ticks(3);
    assert_eq!(reports.last().map(|r| r.state), Some(OvenState::Done));
    assert!(reports.iter().all(|r| r.outputs.fan == 200));

    rig.send("reset");
    assert_eq!(rig.tick().outputs.fan, 0);
}

#[test]
fn tick_counts_every_update() {
    let mut rig = Rig::stopped(Oven::new(OvenConfig::DEFAULT));
    let ticks: Vec<_> = rig.ticks(3).iter().map(|r| r.tick).collect();
    assert_eq!(ticks, [0, 1, 2]);
    rig.send("reset");
    assert_eq!(rig.tick().tick, 3);
    assert_eq!(rig.oven.tick(), 4);
}
