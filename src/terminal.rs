//! Serial command terminal.
//!
//! Line-oriented handler over any [`core::fmt::Write`] sink, so the same code
//! runs against the USART in firmware and against a string buffer in tests.

use core::fmt::Write;

use heapless::{Deque, Vec};
use num_traits::AsPrimitive;

use crate::{monitor::MonitorState, storage::Storage, thermometer::Celsius};

pub const BUFFER_SIZE: usize = 32;
const OK_STR: &str = "<ok>\r\n";

const HELP_STR: &str = "Commands:\r
    help\r
    temps\r
    offsets\r
    cal\r
    cal reset\r
    dump avgs\r
    reset\r
";

/// Actions the library cannot perform itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Reset the MCU.
    Reset,
}

/// Handle all complete lines currently in `buffer`.
///
/// Commands:
/// - `help` - Print help
/// - `temps` - Per-channel corrected temperatures and the cross-channel average
/// - `offsets` - Per-channel calibration offsets
/// - `cal` - Recalibrate all channels to their mutual average
/// - `cal reset` - Discard all calibration offsets
/// - `dump avgs` - Dump the stored history of cross-channel averages
/// - `reset` - Reset the MCU (returned as a [`Request`])
#[cfg_attr(feature = "sizing", inline(never))]
pub fn run<W: Write, const N: usize, const K: usize, const S: usize>(
    tx: &mut W,
    buffer: &mut Deque<u8, BUFFER_SIZE>,
    monitor: &mut MonitorState<N, K>,
    storage: &Storage<S>,
) -> Option<Request> {
    while let Some(line) = get_line(buffer) {
        // Split line into arguments
        let mut args = line.split(|b| is_whitespace(*b));

        match args.next() {
            None | Some(&[]) => {}
            Some(b"help") => print(tx, HELP_STR),
            Some(b"temps") => {
                for (i, value) in monitor.smoothed_values().iter().enumerate() {
                    print(tx, "t");
                    print_uint(tx, i as u32 + 1);
                    print(tx, " = ");
                    print_celsius(tx, *value);
                    print(tx, "\r\n");
                }
                print(tx, "avg = ");
                print_celsius(tx, monitor.average());
                print(tx, "\r\n");
            }
            Some(b"offsets") => {
                for (i, ch) in monitor.channels().iter().enumerate() {
                    print(tx, "c");
                    print_uint(tx, i as u32 + 1);
                    print(tx, " = ");
                    print_celsius(tx, ch.offset());
                    print(tx, "\r\n");
                }
            }
            Some(b"cal") => match args.next() {
                None | Some(&[]) => {
                    monitor.apply(crate::calibration::CalibrationEvent::Recalibrate);
                    print(tx, OK_STR);
                }
                Some(b"reset") => {
                    monitor.apply(crate::calibration::CalibrationEvent::Reset);
                    print(tx, OK_STR);
                }
                Some(b) => unknown_argument(tx, b),
            },
            Some(b"dump") => match args.next() {
                None | Some(&[]) => print(tx, "Missing argument\r\n"),
                Some(b"avgs") => {
                    for record in storage.oldest() {
                        print_uint(tx, record.secs());
                        print(tx, " ");
                        print_celsius(tx, record.value());
                        print(tx, "\r\n");
                    }
                }
                Some(b) => unknown_argument(tx, b),
            },
            Some(b"reset") => {
                print(tx, "Resetting...\r\n");
                return Some(Request::Reset);
            }
            Some(b) => {
                print(tx, "Unknown command: '");
                // SAFETY: b may not be valid UTF-8, but we don't care cause we're just printing it
                // Also, including UTF8 checks would add a lot to the binary size
                print(tx, unsafe { core::str::from_utf8_unchecked(b) });
                print(tx, "'\r\n");
            }
        }
    }

    None
}

fn get_line(buffer: &mut Deque<u8, BUFFER_SIZE>) -> Option<Vec<u8, BUFFER_SIZE>> {
    // Find newline
    let idx = buffer.iter().position(|b| is_newline(*b))?;

    // Pop line from buffer
    let mut line = Vec::<_, BUFFER_SIZE>::new();
    for _ in 0..=idx {
        // SAFETY: idx is guaranteed to be valid in buffer
        // line is guaranteed to be large enough to hold idx + 1 bytes
        unsafe {
            let b = buffer.pop_front_unchecked();
            line.push_unchecked(b);
        }
    }

    Some(line)
}

#[inline]
pub const fn is_newline(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

#[inline]
pub const fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\n' || b == b'\r' || b == b'\t'
}

fn print<W: Write>(tx: &mut W, str: &str) {
    if tx.write_str(str).is_err() {
        panic!("Failed to write to serial sink");
    }
}

fn unknown_argument<W: Write>(tx: &mut W, arg: &[u8]) {
    print(tx, "Unknown argument: '");
    // SAFETY: arg may not be valid UTF-8, but we don't care cause we're just printing it
    // Also, including UTF8 checks would add a lot to the binary size
    print(tx, unsafe { core::str::from_utf8_unchecked(arg) });
    print(tx, "'\r\n");
}

/// Print a temperature with one decimal digit, truncating like the displays.
fn print_celsius<W: Write>(tx: &mut W, value: Celsius) {
    let tenths = (value * 10.0) as i32;
    if tenths < 0 {
        print(tx, "-");
    }
    print_uint(tx, tenths.unsigned_abs() / 10);
    print(tx, ".");
    print_uint(tx, tenths.unsigned_abs() % 10);
}

fn print_uint<W: Write>(tx: &mut W, mut num: u32) {
    const BUF_SIZE: usize = 10;

    let mut buf = [0u8; BUF_SIZE];
    let mut idx = 0;

    loop {
        let digit: u8 = (num % 10).as_();
        num /= 10;

        buf[BUF_SIZE - idx - 1] = b'0' + digit;
        idx += 1;

        if num == 0 {
            break;
        }
    }

    let buf = &buf[BUF_SIZE - idx..];
    // SAFETY: buf is guaranteed to be valid ASCII
    print(tx, unsafe { core::str::from_utf8_unchecked(buf) });
}
