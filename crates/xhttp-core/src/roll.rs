//! Shared "roll a value once from a configured range" helper.
//!
//! MuxManager's reuse/lifetime/concurrency caps, the padding byte range, and
//! the stream-up server keepalive interval are all specified as
//! `{from, to}` ranges drawn once uniformly (spec §4.5 table, §4.3). One
//! generic type serves all three call sites instead of three copies.

use serde::{Deserialize, Serialize};

/// An inclusive `[from, to]` range a value is drawn uniformly from once.
///
/// `from == to` acts as a constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRange<T> {
    /// Inclusive lower bound.
    pub from: T,
    /// Inclusive upper bound.
    pub to: T,
}

impl<T: Copy> RollRange<T> {
    /// A range that always yields `value`.
    pub const fn constant(value: T) -> Self {
        Self {
            from: value,
            to: value,
        }
    }
}

macro_rules! impl_roll_unsigned {
    ($($t:ty),*) => {
        $(
            impl RollRange<$t> {
                /// Draw one value uniformly from `[from, to]`.
                #[must_use]
                pub fn roll(&self) -> $t {
                    if self.from >= self.to {
                        self.from
                    } else {
                        fastrand::$t(self.from..=self.to)
                    }
                }
            }
        )*
    };
}

impl_roll_unsigned!(u32, u64, usize);

impl RollRange<i32> {
    /// Draw one value uniformly from `[from, to]`.
    #[must_use]
    pub fn roll(&self) -> i32 {
        if self.from >= self.to {
            self.from
        } else {
            fastrand::i32(self.from..=self.to)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_range_always_rolls_the_same_value() {
        let r = RollRange::constant(100u32);
        for _ in 0..50 {
            assert_eq!(r.roll(), 100);
        }
    }

    #[test]
    fn range_stays_within_bounds() {
        let r = RollRange { from: 10u32, to: 20 };
        for _ in 0..200 {
            let v = r.roll();
            assert!((10..=20).contains(&v));
        }
    }

    #[test]
    fn inverted_range_degrades_to_from() {
        let r = RollRange { from: 5u32, to: 5 };
        assert_eq!(r.roll(), 5);
    }
}
