//! Presentation-layer scaling for the 4-digit numeric displays.
//!
//! The core pipeline works in real-valued degrees; converting to the
//! display's fixed-point format happens here and nowhere else.

pub mod tm1637;

use crate::thermometer::Celsius;

/// Largest value a 4-digit display can show with one decimal digit (999.9).
pub const MAX_TENTHS: i16 = 9999;
/// Smallest value, leaving one digit for the minus sign (-99.9).
pub const MIN_TENTHS: i16 = -999;

/// Scale a temperature to display tenths, truncating toward zero and clamping
/// to the displayable range.
pub fn tenths(value: Celsius) -> i16 {
    let scaled = (value * 10.0) as i32;
    scaled.clamp(i32::from(MIN_TENTHS), i32::from(MAX_TENTHS)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_toward_zero() {
        assert_eq!(tenths(102.0), 1020);
        assert_eq!(tenths(21.57), 215);
        assert_eq!(tenths(-3.49), -34);
        assert_eq!(tenths(0.0), 0);
    }

    #[test]
    fn clamps_to_display_range() {
        assert_eq!(tenths(1023.75), MAX_TENTHS);
        assert_eq!(tenths(-250.0), MIN_TENTHS);
    }
}
