//! Rolling history of cross-channel averages for the terminal `dump` command.

use fixed::types::I14F2;
use heapless::HistoryBuffer;

use crate::thermometer::Celsius;

pub struct Storage<const N: usize> {
    records: HistoryBuffer<Record, N>,
}

impl<const N: usize> Storage<N> {
    pub const fn new() -> Self {
        Self {
            records: HistoryBuffer::new(),
        }
    }

    /// Record one average, timestamped with seconds since startup. The caller
    /// supplies the clock so the library never touches the monotonic.
    pub fn write(&mut self, secs: u32, value: Celsius) {
        self.records.write(Record::new(secs, value));
    }

    pub fn recent(&self) -> Option<Record> {
        self.records.recent().copied()
    }

    /// Records from oldest to newest.
    pub fn oldest(&self) -> impl Iterator<Item = Record> + '_ {
        self.records.oldest_ordered().copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<const N: usize> Default for Storage<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Copy, Clone)]
#[repr(C, packed)]
pub struct Record {
    /// Seconds since startup (LSB u24)
    secs: [u8; 3],
    /// Reduced precision average; 0.25 degree steps match the MAX6675.
    value: I14F2,
}

static_assertions::assert_eq_size!(Record, [u8; 5]);

impl Record {
    #[inline]
    fn new(secs: u32, value: Celsius) -> Self {
        Self {
            secs: secs.to_le_bytes()[..3].try_into().unwrap(),
            value: I14F2::saturating_from_num(value),
        }
    }

    #[inline]
    pub const fn secs(&self) -> u32 {
        u32::from_le_bytes([self.secs[0], self.secs[1], self.secs[2], 0])
    }

    #[inline]
    pub fn value(&self) -> Celsius {
        // Copy out of the packed struct before calling through a reference
        let value = self.value;
        value.to_num()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_returns_last_write() {
        let mut s = Storage::<8>::new();
        assert!(s.recent().is_none());

        s.write(1, 100.0);
        s.write(2, 102.5);

        let r = s.recent().unwrap();
        assert_eq!(r.secs(), 2);
        assert_eq!(r.value(), 102.5);
    }

    #[test]
    fn value_rounds_to_quarter_degrees() {
        let mut s = Storage::<4>::new();
        s.write(0, 101.3);
        let r = s.recent().unwrap();
        assert_eq!(r.value(), 101.25);
    }

    #[test]
    fn oldest_iterates_in_write_order_after_wrap() {
        let mut s = Storage::<3>::new();
        for i in 0..5u32 {
            s.write(i, i as Celsius);
        }
        let secs: Vec<u32> = s.oldest().map(|r| r.secs()).collect();
        assert_eq!(secs, [2, 3, 4]);
        assert_eq!(s.len(), 3);
    }

    #[test]
    fn secs_wraps_at_u24() {
        let mut s = Storage::<2>::new();
        s.write(0x0100_0001, 0.0);
        assert_eq!(s.recent().unwrap().secs(), 1);
    }
}
