// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A discrete interval encoding tree (DIET) over `u64` keys.
//!
//! Instead of storing an individual entry per value, only the inclusive
//! bounds of each run of consecutive values are stored. Adjacent runs are
//! merged on insert, so the set is always the minimal list of disjoint,
//! non-adjacent intervals. Packet-number tracking and ACK construction are
//! built on top of this structure.
//!
//! Each interval additionally carries the timestamp of the last insert
//! that touched it, which feeds the ack-delay calculation.

#![forbid(unsafe_code)]

#[cfg(test)]
mod tests;

use crate::time::Timestamp;
use alloc::collections::VecDeque;
use core::fmt;

/// A closed interval `[lo, hi]` with the timestamp of its last insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub lo: u64,
    pub hi: u64,
    pub touched: Timestamp,
}

impl Interval {
    /// Returns the number of values contained in the interval
    #[inline]
    pub fn len(&self) -> u64 {
        self.hi - self.lo + 1
    }

    /// An interval always contains at least one value
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns `true` if `n` lies within the interval bounds
    #[inline]
    pub fn contains(&self, n: u64) -> bool {
        self.lo <= n && n <= self.hi
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.lo == self.hi {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}..{}", self.lo, self.hi)
        }
    }
}

/// An ordered set of disjoint, non-adjacent `u64` intervals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: VecDeque<Interval>,
}

impl IntervalSet {
    /// Creates an empty `IntervalSet`
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `IntervalSet` with room for `capacity` intervals
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            intervals: VecDeque::with_capacity(capacity),
        }
    }

    /// Ensures `n` is in the set, merging with neighboring intervals where
    /// the bounds now touch.
    ///
    /// The interval that ends up containing `n` has its timestamp set to
    /// `t` and is returned.
    pub fn insert(&mut self, n: u64, t: Timestamp) -> Interval {
        let idx = self.intervals.partition_point(|iv| iv.hi < n);

        // `idx` is the first interval with `hi >= n`, if any
        let next_lo = self.intervals.get(idx).map(|iv| iv.lo);
        if next_lo.is_some_and(|lo| lo <= n) {
            // already contained
            let iv = &mut self.intervals[idx];
            iv.touched = t;
            return *iv;
        }

        let prev_hi = idx.checked_sub(1).map(|i| self.intervals[i].hi);
        let extends_next = n.checked_add(1).is_some_and(|m| next_lo == Some(m));
        let extends_prev = prev_hi.is_some_and(|h| h + 1 == n);

        let result = match (extends_prev, extends_next) {
            (true, true) => {
                // closes the gap between two intervals
                let hi = self.intervals[idx].hi;
                self.intervals.remove(idx);
                let prev = &mut self.intervals[idx - 1];
                prev.hi = hi;
                prev.touched = t;
                *prev
            }
            (true, false) => {
                let prev = &mut self.intervals[idx - 1];
                prev.hi = n;
                prev.touched = t;
                *prev
            }
            (false, true) => {
                let iv = &mut self.intervals[idx];
                iv.lo = n;
                iv.touched = t;
                *iv
            }
            (false, false) => {
                let singleton = Interval {
                    lo: n,
                    hi: n,
                    touched: t,
                };
                self.intervals.insert(idx, singleton);
                singleton
            }
        };
        self.check_integrity();
        result
    }

    /// Inserts every value in `[lo, hi]`, coalescing with any interval the
    /// range overlaps or touches.
    pub fn insert_range(&mut self, lo: u64, hi: u64, t: Timestamp) {
        debug_assert!(lo <= hi, "inverted interval");

        // first interval that could coalesce with the new range
        let start = self
            .intervals
            .partition_point(|iv| iv.hi.checked_add(1).is_some_and(|h| h < lo));

        let mut merged = Interval {
            lo,
            hi,
            touched: t,
        };
        let mut end = start;
        while let Some(iv) = self.intervals.get(end) {
            let touches = match hi.checked_add(1) {
                Some(h) => iv.lo <= h,
                None => true,
            };
            if !touches {
                break;
            }
            merged.lo = merged.lo.min(iv.lo);
            merged.hi = merged.hi.max(iv.hi);
            end += 1;
        }

        if end > start {
            self.intervals[start] = merged;
            self.intervals.drain(start + 1..end);
        } else {
            self.intervals.insert(start, merged);
        }
        self.check_integrity();
    }

    /// Removes `n` from the set, splitting its interval if `n` is
    /// interior. A no-op if `n` is absent.
    pub fn remove(&mut self, n: u64) {
        let idx = self.intervals.partition_point(|iv| iv.hi < n);
        let Some(iv) = self.intervals.get_mut(idx) else {
            return;
        };
        if iv.lo > n {
            return;
        }

        match (iv.lo == n, iv.hi == n) {
            (true, true) => {
                self.intervals.remove(idx);
            }
            (true, false) => iv.lo = n + 1,
            (false, true) => iv.hi = n - 1,
            (false, false) => {
                let upper = Interval {
                    lo: n + 1,
                    hi: iv.hi,
                    touched: iv.touched,
                };
                iv.hi = n - 1;
                self.intervals.insert(idx + 1, upper);
            }
        }
        self.check_integrity();
    }

    /// Removes every value in `[lo, hi]` from the set
    pub fn remove_range(&mut self, lo: u64, hi: u64) {
        debug_assert!(lo <= hi, "inverted interval");

        let mut idx = self.intervals.partition_point(|iv| iv.hi < lo);
        while let Some(iv) = self.intervals.get_mut(idx) {
            if iv.lo > hi {
                break;
            }

            if iv.lo < lo && iv.hi > hi {
                // interior removal splits the interval
                let upper = Interval {
                    lo: hi + 1,
                    hi: iv.hi,
                    touched: iv.touched,
                };
                iv.hi = lo - 1;
                self.intervals.insert(idx + 1, upper);
                break;
            } else if iv.lo < lo {
                iv.hi = lo - 1;
                idx += 1;
            } else if iv.hi > hi {
                iv.lo = hi + 1;
                break;
            } else {
                self.intervals.remove(idx);
            }
        }
        self.check_integrity();
    }

    /// Returns the interval containing `n`, if any
    #[inline]
    pub fn find(&self, n: u64) -> Option<Interval> {
        let idx = self.intervals.partition_point(|iv| iv.hi < n);
        self.intervals.get(idx).filter(|iv| iv.lo <= n).copied()
    }

    /// Returns `true` if `n` is in the set
    #[inline]
    pub fn contains(&self, n: u64) -> bool {
        self.find(n).is_some()
    }

    /// Returns the smallest contained value
    #[inline]
    pub fn min(&self) -> Option<u64> {
        self.intervals.front().map(|iv| iv.lo)
    }

    /// Returns the largest contained value
    #[inline]
    pub fn max(&self) -> Option<u64> {
        self.intervals.back().map(|iv| iv.hi)
    }

    /// Returns `true` if the set contains no values
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Returns the number of contained values
    #[inline]
    pub fn count(&self) -> u64 {
        self.intervals.iter().map(Interval::len).sum()
    }

    /// Returns the number of intervals in the set
    #[inline]
    pub fn interval_len(&self) -> usize {
        self.intervals.len()
    }

    /// Clears all values from the set
    #[inline]
    pub fn clear(&mut self) {
        self.intervals.clear()
    }

    /// Iterates the intervals in ascending order
    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Interval> + '_ {
        self.intervals.iter().copied()
    }

    #[inline]
    fn check_integrity(&self) {
        if cfg!(debug_assertions) {
            let mut prev: Option<Interval> = None;
            for iv in &self.intervals {
                assert!(iv.lo <= iv.hi, "inverted interval {iv}");
                if let Some(p) = prev {
                    assert!(
                        p.hi.checked_add(1).is_some_and(|h| h < iv.lo),
                        "interval {p} overlaps or touches {iv}"
                    );
                }
                prev = Some(*iv);
            }
        }
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for iv in &self.intervals {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{iv}")?;
            first = false;
        }
        Ok(())
    }
}
