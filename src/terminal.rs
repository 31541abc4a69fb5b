use core::fmt::Write;

use defmt::*;
use rtic_sync::channel::{Sender, TrySendError};

/// Received bytes waiting for the terminal task
pub const RX_BUFFER: usize = 64;

/// Pending wake-ups per task. One is enough, a woken task drains everything it finds.
pub const WAKE_CAPACITY: usize = 1;

/// Sending half of a task wake-up
pub type Wake = Sender<'static, (), WAKE_CAPACITY>;

/// Wake the task waiting on `wake`
///
/// A full channel means the task has a wake-up queued and will see the new work anyway.
pub fn wake(wake: &mut Wake) {
    if let Err(TrySendError::NoReceiver(())) = wake.try_send(()) {
        warn!("Wake-up without a waiting task");
    }
}

/// Write a status or notification line
pub fn write_line<W: Write>(tx: &mut W, line: &str) {
    if tx.write_str(line).is_err() {
        warn!("Failed to write to UART");
    }
}
