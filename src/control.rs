//! Control update task

use defmt::*;
use reflow_core::{Notification, OvenConfig};
use rtic::Mutex;
use stm32f0xx_hal::prelude::*;

/// Oven configuration of this board: one thermocouple on the top element, faults only reported.
pub const CONFIG: OvenConfig = OvenConfig {
    dual_probe: false,
    ..OvenConfig::DEFAULT
};

/// Run one slow tick: update the oven, drive the outputs and queue the status line.
#[allow(clippy::needless_lifetimes, reason = "clippy bug")]
#[cfg_attr(feature = "sizing", inline(never))]
pub fn control<'a>(mut cx: crate::app::control::Context<'a>) {
    trace!("control");

    let local = cx.local;
    let mut faults = |notification: Notification| {
        if local.faults.try_send(notification).is_err() {
            warn!("Notification dropped: {}", notification);
        }
    };

    let report = local
        .oven
        .update(&mut cx.shared.context, local.probes, &mut faults);

    debug!(
        "{}: target={=i16} top={=i16} bottom={=i16} cmd={=u8} drive={}",
        report.state,
        report.target.to_bits(),
        report.top.to_bits(),
        report.bottom.to_bits(),
        report.command,
        report.drive
    );

    cx.shared
        .actuators
        .lock(|actuators| actuators.apply(report.drive));

    // Skip the status line while the previous one is still going out
    let queued = cx
        .shared
        .outbox
        .lock(|outbox| outbox.offer(|line| report.write_status(line)));
    if !queued {
        debug!("Serial link busy, status line skipped");
    }
    crate::terminal::wake(local.wake_transmit);

    unwrap!(local.led.toggle());
}
