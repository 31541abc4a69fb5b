//! Serial command protocol.
//!
//! Newline terminated ASCII lines, case-sensitive:
//!
//! ```text
//! temp: <int>, <int>            fake top/bottom temperature (device units)
//! cmd: <uint8>, <uint8>         manual top/bottom power
//! target: <int>                 manual target temperature (device units)
//! fake_out: <uint8>             nonzero disables the outputs
//! fake_in: <uint8>              nonzero uses the fake temperatures
//! manual: <uint8>               nonzero enables manual control while idle
//! pid: <uint8>, <uint8>, <uint8>  gain exponents, clamped to 16
//! reset | go | pause | resume
//! ```
//!
//! Spaces around the separators are optional. Anything else, including trailing text, is dropped.

use heapless::{Deque, Vec};
use rtic_core::Mutex;

use crate::{
    context::{ControllerContext, PendingCommand},
    controller::ControlGains,
    thermometer::Temperature,
};

/// Longest accepted line, without the newline
pub const MAX_LINE: usize = 255;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    FakeTemperature { top: Temperature, bottom: Temperature },
    ManualPower { top: u8, bottom: u8 },
    ManualTarget(Temperature),
    FakeOutput(bool),
    FakeInput(bool),
    Manual(bool),
    Gains(ControlGains),
    Queue(PendingCommand),
}

impl Command {
    /// Decode one line, without its newline. Grammars are tried in protocol order and the first
    /// match wins.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = line.trim_ascii();

        if let Some([top, bottom]) = Scanner::new(line).fields::<_, 2>(b"temp:", i16_field) {
            return Some(Self::FakeTemperature {
                top: Temperature::from_bits(top),
                bottom: Temperature::from_bits(bottom),
            });
        }
        if let Some([top, bottom]) = Scanner::new(line).fields::<_, 2>(b"cmd:", u8_field) {
            return Some(Self::ManualPower { top, bottom });
        }
        if let Some([target]) = Scanner::new(line).fields::<_, 1>(b"target:", i16_field) {
            return Some(Self::ManualTarget(Temperature::from_bits(target)));
        }
        if let Some([on]) = Scanner::new(line).fields::<_, 1>(b"fake_out:", u8_field) {
            return Some(Self::FakeOutput(on != 0));
        }
        if let Some([on]) = Scanner::new(line).fields::<_, 1>(b"fake_in:", u8_field) {
            return Some(Self::FakeInput(on != 0));
        }
        if let Some([on]) = Scanner::new(line).fields::<_, 1>(b"manual:", u8_field) {
            return Some(Self::Manual(on != 0));
        }
        if let Some([kp, ki, kd]) = Scanner::new(line).fields::<_, 3>(b"pid:", u8_field) {
            return Some(Self::Gains(ControlGains::new(kp, ki, kd)));
        }

        let pending = match line {
            b"reset" => PendingCommand::Reset,
            b"go" => PendingCommand::Go,
            b"pause" => PendingCommand::Pause,
            b"resume" => PendingCommand::Resume,
            _ => return None,
        };
        Some(Self::Queue(pending))
    }

    /// Write the command into the shared registers. Must run under the registers' lock.
    pub fn apply(self, ctx: &mut ControllerContext) {
        match self {
            Self::FakeTemperature { top, bottom } => {
                ctx.fake_top = top;
                ctx.fake_bottom = bottom;
            }
            Self::ManualPower { top, bottom } => {
                ctx.manual_top = top;
                ctx.manual_bottom = bottom;
            }
            Self::ManualTarget(target) => ctx.manual_target = target,
            Self::FakeOutput(on) => ctx.fake_out = on,
            Self::FakeInput(on) => ctx.fake_in = on,
            Self::Manual(on) => ctx.manual = on,
            Self::Gains(gains) => ctx.gains = gains,
            Self::Queue(pending) => ctx.pending = pending,
        }
    }
}

fn i16_field(value: i32) -> Option<i16> {
    i16::try_from(value).ok()
}

fn u8_field(value: i32) -> Option<u8> {
    u8::try_from(value).ok()
}

/// Cursor over a line for `keyword: value, value, ...` grammars
struct Scanner<'a> {
    rest: &'a [u8],
}

impl<'a> Scanner<'a> {
    const fn new(line: &'a [u8]) -> Self {
        Self { rest: line }
    }

    fn skip_whitespace(&mut self) {
        self.rest = self.rest.trim_ascii_start();
    }

    fn tag(&mut self, tag: &[u8]) -> Option<()> {
        self.rest = self.rest.strip_prefix(tag)?;
        Some(())
    }

    /// Optionally signed decimal integer, after optional whitespace
    fn int(&mut self) -> Option<i32> {
        self.skip_whitespace();

        let (negative, digits) = match self.rest {
            [b'-', rest @ ..] => (true, rest),
            [b'+', rest @ ..] => (false, rest),
            rest => (false, rest),
        };

        let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
        if len == 0 {
            return None;
        }

        let mut value: i32 = 0;
        for digit in &digits[..len] {
            value = value
                .checked_mul(10)?
                .checked_add(i32::from(digit - b'0'))?;
        }

        self.rest = &digits[len..];
        Some(if negative { -value } else { value })
    }

    /// Match `keyword` followed by exactly `N` comma separated integers and nothing else.
    fn fields<T: Copy + Default, const N: usize>(
        mut self,
        keyword: &[u8],
        convert: fn(i32) -> Option<T>,
    ) -> Option<[T; N]> {
        self.tag(keyword)?;

        let mut values = [T::default(); N];
        for (i, value) in values.iter_mut().enumerate() {
            if i > 0 {
                self.skip_whitespace();
                self.tag(b",")?;
            }
            *value = convert(self.int()?)?;
        }

        self.skip_whitespace();
        self.rest.is_empty().then_some(values)
    }
}

/// Assembles bytes from the serial link into lines.
///
/// Lines end on `\n` only. Lines longer than `N` bytes are dropped whole once their newline
/// arrives, and empty lines are skipped. A trailing `\r` stays in the line for
/// [`Command::parse`] to trim.
#[derive(Debug, Default)]
pub struct LineBuffer<const N: usize = MAX_LINE> {
    line: Vec<u8, N>,
    overflow: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            line: Vec::new(),
            overflow: false,
        }
    }

    /// Feed one byte. Returns the finished line when `byte` ends one.
    pub fn push(&mut self, byte: u8) -> Option<Vec<u8, N>> {
        if !is_newline(byte) {
            if !self.overflow && self.line.push(byte).is_err() {
                debug!("line longer than {=usize} bytes, dropping", N);
                self.overflow = true;
            }
            return None;
        }

        let line = core::mem::take(&mut self.line);
        if core::mem::take(&mut self.overflow) || line.is_empty() {
            return None;
        }
        Some(line)
    }

    /// Feed every byte waiting in `rx` and apply the commands they complete.
    ///
    /// `rx` is locked per byte and `registers` per command, so neither lock is held across the
    /// parse. A partial line stays buffered for the next call. Returns the number of commands
    /// applied.
    pub fn drain<B, C, const Q: usize>(&mut self, rx: &mut B, registers: &mut C) -> usize
    where
        B: Mutex<T = Deque<u8, Q>>,
        C: Mutex<T = ControllerContext>,
    {
        let mut applied = 0;
        while let Some(byte) = rx.lock(Deque::pop_front) {
            let Some(line) = self.push(byte) else {
                continue;
            };

            match Command::parse(&line) {
                Some(cmd) => {
                    debug!("command: {=[u8]:a}", &line[..]);
                    registers.lock(|ctx| cmd.apply(ctx));
                    applied += 1;
                }
                None => trace!("unknown command: {=[u8]:a}", &line[..]),
            }
        }
        applied
    }
}

#[inline]
pub const fn is_newline(b: u8) -> bool {
    b == b'\n'
}
