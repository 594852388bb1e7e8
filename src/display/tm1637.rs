//! Bit-bang driver for TM1637 4-digit 7-segment modules.
//!
//! Two open-drain lines per module, shared timing from a caller-provided
//! delay. Only the subset of the controller this firmware needs: brightness,
//! blanking, and rendering a tenths value with its decimal point.

use embedded_hal::{blocking::delay::DelayUs, digital::v2::OutputPin};

use super::{MAX_TENTHS, MIN_TENTHS};

/// Write data with auto-incrementing address.
const CMD_DATA_AUTO: u8 = 0x40;
/// Address of the first digit.
const CMD_ADDR_BASE: u8 = 0xC0;
/// Display control: on, brightness in the low 3 bits.
const CMD_DISPLAY_ON: u8 = 0x88;

const SEG_MINUS: u8 = 0x40;
const SEG_DOT: u8 = 0x80;

const DIGITS: [u8; 10] = [
    0x3F, 0x06, 0x5B, 0x4F, 0x66, 0x6D, 0x7D, 0x07, 0x7F, 0x6F,
];

/// Half-period of the bit-bang clock. The TM1637 tops out around 250 kHz;
/// 5us per edge keeps well under that.
const TICK_US: u32 = 5;

pub struct Tm1637<CLK, DIO> {
    clk: CLK,
    dio: DIO,
}

impl<CLK, DIO, E> Tm1637<CLK, DIO>
where
    CLK: OutputPin<Error = E>,
    DIO: OutputPin<Error = E>,
{
    pub const fn new(clk: CLK, dio: DIO) -> Self {
        Self { clk, dio }
    }

    /// Set brightness (0..=7) and switch the display on.
    pub fn set_brightness(
        &mut self,
        level: u8,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<(), E> {
        self.start(delay)?;
        self.write_byte(CMD_DISPLAY_ON | (level & 0x07), delay)?;
        self.stop(delay)
    }

    /// Blank all four digits.
    pub fn clear(&mut self, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        self.write_frame([0x00; 4], delay)
    }

    /// Render a tenths value, e.g. 1020 as `102.0`.
    pub fn show_tenths(&mut self, tenths: i16, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        self.write_frame(encode_tenths(tenths), delay)
    }

    fn write_frame(&mut self, segments: [u8; 4], delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        self.start(delay)?;
        self.write_byte(CMD_DATA_AUTO, delay)?;
        self.stop(delay)?;

        self.start(delay)?;
        self.write_byte(CMD_ADDR_BASE, delay)?;
        for seg in segments {
            self.write_byte(seg, delay)?;
        }
        self.stop(delay)
    }

    /// Start condition: DIO falls while CLK is high
    fn start(&mut self, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        self.clk.set_high()?;
        self.dio.set_high()?;
        delay.delay_us(TICK_US);
        self.dio.set_low()?;
        delay.delay_us(TICK_US);
        Ok(())
    }

    /// Stop condition: DIO rises while CLK is high
    fn stop(&mut self, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        self.clk.set_low()?;
        delay.delay_us(TICK_US);
        self.dio.set_low()?;
        self.clk.set_high()?;
        delay.delay_us(TICK_US);
        self.dio.set_high()?;
        delay.delay_us(TICK_US);
        Ok(())
    }

    /// Write one byte LSB-first, then clock the ACK slot with DIO released.
    fn write_byte(&mut self, byte: u8, delay: &mut impl DelayUs<u32>) -> Result<(), E> {
        for i in 0..8 {
            self.clk.set_low()?;
            if (byte >> i) & 1 == 1 {
                self.dio.set_high()?;
            } else {
                self.dio.set_low()?;
            }
            delay.delay_us(TICK_US);
            self.clk.set_high()?;
            delay.delay_us(TICK_US);
        }

        // ACK slot; the module pulls DIO low, which we don't need to verify.
        self.clk.set_low()?;
        self.dio.set_high()?;
        delay.delay_us(TICK_US);
        self.clk.set_high()?;
        delay.delay_us(TICK_US);
        self.clk.set_low()?;

        Ok(())
    }
}

/// Segment patterns for a tenths value: integer part with leading blanks,
/// decimal point on the third digit, trailing tenths digit.
fn encode_tenths(tenths: i16) -> [u8; 4] {
    let tenths = tenths.clamp(MIN_TENTHS, MAX_TENTHS);
    let mag = tenths.unsigned_abs();

    let mut segments = [0u8; 4];
    segments[3] = DIGITS[(mag % 10) as usize];
    segments[2] = DIGITS[((mag / 10) % 10) as usize] | SEG_DOT;

    let hundreds = mag / 100;
    if hundreds > 0 {
        segments[1] = DIGITS[(hundreds % 10) as usize];
    }
    if hundreds >= 10 {
        segments[0] = DIGITS[((hundreds / 10) % 10) as usize];
    }

    if tenths < 0 {
        if hundreds > 0 {
            segments[0] = SEG_MINUS;
        } else {
            segments[1] = SEG_MINUS;
        }
    }

    segments
}
