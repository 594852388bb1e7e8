//! Bit-bang driver for MAX6675 thermocouple converters.
//!
//! All converters share one clock and one data line; each has its own chip
//! select. A read shifts out one 16-bit frame:
//!
//! ```text
//! 15      dummy, always 0
//! 14..=3  temperature, 0.25 degC per LSB
//! 2       thermocouple open-circuit flag
//! 1       device id, always 0
//! 0       tri-state
//! ```

use embedded_hal::{
    blocking::delay::DelayUs,
    digital::v2::{InputPin, OutputPin},
};

use super::Celsius;

#[derive(Debug, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Pin Error
    Pin(E),

    /// The thermocouple input is open; the probe is disconnected or broken.
    OpenCircuit,
}

impl<E> Error<E> {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Error::Pin(_) => "Pin error",
            Error::OpenCircuit => "Thermocouple open",
        }
    }
}

impl<E> From<E> for Error<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}

/// The shared SPI-like bus: serial clock plus serial out.
pub struct Max6675Bus<SCK, SO> {
    sck: SCK,
    so: SO,
}

impl<SCK, SO, E> Max6675Bus<SCK, SO>
where
    SCK: OutputPin<Error = E>,
    SO: InputPin<Error = E>,
{
    pub const fn new(sck: SCK, so: SO) -> Self {
        Self { sck, so }
    }

    /// Clock one 16-bit frame out of the converter selected by `cs`.
    ///
    /// The MAX6675 shifts the next bit on each falling edge and the output is
    /// stable while the clock is high, so sample during the high phase.
    fn read_frame<CS: OutputPin<Error = E>>(
        &mut self,
        cs: &mut CS,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<u16, Error<E>> {
        self.sck.set_low()?;
        cs.set_low()?;
        delay.delay_us(1);

        let mut frame = 0u16;
        for _ in 0..16 {
            self.sck.set_high()?;
            delay.delay_us(1);

            frame <<= 1;
            if self.so.is_high()? {
                frame |= 1;
            }

            self.sck.set_low()?;
            delay.delay_us(1);
        }

        cs.set_high()?;
        Ok(frame)
    }
}

/// One probe on the shared bus.
pub struct Max6675<CS> {
    cs: CS,
}

impl<CS, E> Max6675<CS>
where
    CS: OutputPin<Error = E>,
{
    /// Takes the chip-select pin and deselects the converter.
    pub fn new(mut cs: CS) -> Result<Self, Error<E>> {
        cs.set_high()?;
        Ok(Self { cs })
    }

    /// Read the temperature in degrees Celsius.
    ///
    /// The converter updates its register every ~220 ms on its own; reads in
    /// between return the latest conversion, so this never blocks on the
    /// conversion time.
    pub fn read<SCK, SO>(
        &mut self,
        bus: &mut Max6675Bus<SCK, SO>,
        delay: &mut impl DelayUs<u32>,
    ) -> Result<Celsius, Error<E>>
    where
        SCK: OutputPin<Error = E>,
        SO: InputPin<Error = E>,
    {
        let frame = bus.read_frame(&mut self.cs, delay)?;
        decode(frame)
    }
}

fn decode<E>(frame: u16) -> Result<Celsius, Error<E>> {
    if frame & 0x0004 != 0 {
        return Err(Error::OpenCircuit);
    }
    let counts = (frame >> 3) & 0x0FFF;
    Ok(Celsius::from(counts) * 0.25)
}

#[cfg(test)]
mod tests {
    use core::convert::Infallible;

    use super::*;

    #[test]
    fn decodes_quarter_degree_counts() {
        // 100 counts = 25.00 degC
        let frame = 100u16 << 3;
        assert_eq!(decode::<Infallible>(frame).unwrap(), 25.0);
    }

    #[test]
    fn decodes_full_scale() {
        let frame = 0x0FFF << 3;
        assert_eq!(decode::<Infallible>(frame).unwrap(), 1023.75);
    }

    #[test]
    fn open_circuit_bit_is_a_fault() {
        let frame = (100u16 << 3) | 0x0004;
        assert!(matches!(
            decode::<Infallible>(frame),
            Err(Error::OpenCircuit)
        ));
    }
}
