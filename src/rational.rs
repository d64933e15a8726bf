//! Rational time bases and timestamp rescaling

use std::cmp::Ordering;
use std::fmt;

/// A rational number of seconds per timestamp tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i64,
    pub den: i64,
}

impl Rational {
    pub const fn new(num: i64, den: i64) -> Self {
        Self { num, den }
    }

    /// Rescale `value` from time base `from` to time base `to`.
    ///
    /// Computes `value * from / to` exactly in 128-bit arithmetic and rounds
    /// to the nearest integer, halfway cases away from zero. The mapping is
    /// monotone: `a <= b` implies `rescale(a) <= rescale(b)`.
    pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
        let num = value as i128 * from.num as i128 * to.den as i128;
        let den = from.den as i128 * to.num as i128;
        div_round_nearest(num, den) as i64
    }

    /// Compare two timestamps expressed in different time bases
    pub fn compare_ts(a: i64, a_tb: Rational, b: i64, b_tb: Rational) -> Ordering {
        let lhs = a as i128 * a_tb.num as i128 * b_tb.den as i128;
        let rhs = b as i128 * b_tb.num as i128 * a_tb.den as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

fn div_round_nearest(num: i128, den: i128) -> i128 {
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        -((-num + half) / den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_frames_to_ms() {
        let fps = Rational::new(1, 30);
        let ms = Rational::new(1, 1000);
        assert_eq!(Rational::rescale(0, fps, ms), 0);
        assert_eq!(Rational::rescale(1, fps, ms), 33);
        assert_eq!(Rational::rescale(2, fps, ms), 67);
        assert_eq!(Rational::rescale(30, fps, ms), 1000);
    }

    #[test]
    fn test_rescale_rounds_half_away_from_zero() {
        let from = Rational::new(1, 2);
        let to = Rational::new(1, 1);
        assert_eq!(Rational::rescale(1, from, to), 1);
        assert_eq!(Rational::rescale(-1, from, to), -1);
        assert_eq!(Rational::rescale(3, from, to), 2);
    }

    #[test]
    fn test_rescale_is_monotone() {
        let from = Rational::new(1, 48000);
        let to = Rational::new(1, 1000);
        let mut last = i64::MIN;
        for samples in (0..200_000).step_by(7) {
            let ts = Rational::rescale(samples, from, to);
            assert!(ts >= last);
            last = ts;
        }
    }

    #[test]
    fn test_compare_ts() {
        let video = Rational::new(1, 30);
        let audio = Rational::new(1, 48000);
        assert_eq!(Rational::compare_ts(1, video, 1600, audio), Ordering::Equal);
        assert_eq!(Rational::compare_ts(1, video, 960, audio), Ordering::Greater);
        assert_eq!(Rational::compare_ts(0, video, 960, audio), Ordering::Less);
    }
}
