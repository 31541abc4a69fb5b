//! Splits a single power command between the two heating elements.
//!
//! The bottom element takes the larger share. Once it saturates, the surplus spills over to the
//! top element, so a full command drives both at full duty.

/// Point past which doubling a share would overflow the duty range
const KNEE: u8 = 127;

/// Split `command` into `(top, bottom)` duties.
pub const fn mix(command: u8) -> (u8, u8) {
    let mut top = command >> 2;
    let mut bottom = command - top;

    if bottom >= KNEE {
        top += bottom - KNEE;
        bottom = u8::MAX;
    } else {
        bottom <<= 1;
    }

    if top >= KNEE {
        top = u8::MAX;
    } else {
        top <<= 1;
    }

    (top, bottom)
}
