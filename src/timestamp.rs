//! Fixed-point timestamps with picosecond resolution.
//!
//! A [`Timestamp`] is a whole number of seconds plus a fraction counted in
//! picoseconds. All arithmetic is exact integer arithmetic; the fraction is
//! always kept in `[0, 10^12)` and the seconds carry the sign.

use std::fmt;
use std::ops::{Add, Sub};

/// Number of picoseconds in one second.
pub const PSEC_PER_SEC: u64 = 1_000_000_000_000;

const PSEC_PER_NSEC: u64 = 1_000;
const PSEC_PER_USEC: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    sec: i32,
    psec: u64,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { sec: 0, psec: 0 };

    /// Build a timestamp, carrying whole seconds out of an over-range fraction.
    pub fn new(sec: i32, psec: u64) -> Self {
        let carry = (psec / PSEC_PER_SEC) as i32;
        Timestamp {
            sec: sec.wrapping_add(carry),
            psec: psec % PSEC_PER_SEC,
        }
    }

    pub fn from_nanos(sec: i32, nsec: u64) -> Self {
        Self::new(sec, nsec.saturating_mul(PSEC_PER_NSEC))
    }

    pub fn from_micros(sec: i32, usec: u64) -> Self {
        Self::new(sec, usec.saturating_mul(PSEC_PER_USEC))
    }

    #[inline]
    pub fn sec(&self) -> i32 {
        self.sec
    }

    #[inline]
    pub fn psec(&self) -> u64 {
        self.psec
    }

    /// True when the value lies before the epoch of its reference frame.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.sec < 0
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;

    /// Exact `self - rhs`, borrowing one second when the fraction underflows.
    /// A result before zero keeps its negative seconds and is not clamped.
    fn sub(self, rhs: Timestamp) -> Timestamp {
        let (mut sec, mut psec) = (self.sec, self.psec);
        if psec < rhs.psec {
            sec = sec.wrapping_sub(1);
            psec += PSEC_PER_SEC;
        }
        Timestamp {
            sec: sec.wrapping_sub(rhs.sec),
            psec: psec - rhs.psec,
        }
    }
}

impl Add for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Timestamp) -> Timestamp {
        let mut sec = self.sec.wrapping_add(rhs.sec);
        let mut psec = self.psec + rhs.psec;
        if psec >= PSEC_PER_SEC {
            sec = sec.wrapping_add(1);
            psec -= PSEC_PER_SEC;
        }
        Timestamp { sec, psec }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:012}", self.sec, self.psec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn subtract_without_borrow() {
        let a = Timestamp::new(10, 750_000_000_000);
        let b = Timestamp::new(4, 250_000_000_000);
        assert_eq!(a - b, Timestamp::new(6, 500_000_000_000));
    }

    #[test]
    fn subtract_borrows_across_second_boundary() {
        let a = Timestamp::new(101, 100);
        let b = Timestamp::new(100, 200);
        let d = a - b;
        assert_eq!(d.sec(), 0);
        assert_eq!(d.psec(), PSEC_PER_SEC - 100);
    }

    #[test]
    fn subtract_reordered_is_negative() {
        let a = Timestamp::new(100, 0);
        let b = Timestamp::new(100, 500_000_000_000);
        let d = a - b;
        assert!(d.is_negative());
        assert_eq!(d.sec(), -1);
        assert_eq!(d.psec(), 500_000_000_000);
    }

    #[test]
    fn new_carries_overflowing_fraction() {
        let t = Timestamp::new(1, 2 * PSEC_PER_SEC + 7);
        assert_eq!(t.sec(), 3);
        assert_eq!(t.psec(), 7);
    }

    #[test]
    fn pcap_precision_constructors() {
        assert_eq!(Timestamp::from_nanos(5, 1).psec(), 1_000);
        assert_eq!(Timestamp::from_micros(5, 1).psec(), 1_000_000);
        assert_eq!(Timestamp::from_micros(5, 999_999).sec(), 5);
    }

    #[test]
    fn display_pads_fraction_to_twelve_digits() {
        assert_eq!(Timestamp::new(0, 500_000_000_000).to_string(), "0.500000000000");
        assert_eq!(Timestamp::new(12, 42).to_string(), "12.000000000042");
        assert_eq!(Timestamp::new(-1, 1).to_string(), "-1.000000000001");
    }

    fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (-1_000_000_000i32..1_000_000_000, 0..PSEC_PER_SEC).prop_map(|(s, p)| Timestamp::new(s, p))
    }

    proptest! {
        #[test]
        fn prop_subtract_round_trips(a in arb_timestamp(), b in arb_timestamp()) {
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            let d = hi - lo;
            prop_assert!(!d.is_negative());
            prop_assert!(d.psec() < PSEC_PER_SEC);
            prop_assert_eq!(d + lo, hi);
        }

        #[test]
        fn prop_subtract_reordered_has_negative_seconds(a in arb_timestamp(), b in arb_timestamp()) {
            prop_assume!(b > a);
            let d = a - b;
            prop_assert!(d.sec() < 0);
            prop_assert!(d.psec() < PSEC_PER_SEC);
            prop_assert_eq!(d + b, a);
        }
    }
}
