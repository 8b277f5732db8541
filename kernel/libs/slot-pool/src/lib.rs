// SPDX-License-Identifier: MPL-2.0

//! A fixed-size pool of slots tracked by a bitmap.
//!
//! A [`SlotPool`] records which of its `N` zero-indexed slots are in use.
//! It performs no locking and no validation of the ranges handed to
//! [`SlotPool::mark_used`] or [`SlotPool::mark_free`]:
//! the owner of the pool is expected to serialize all mutations
//! and to decide which ranges are legal to mark.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

use core::{fmt::Debug, ops::Range};

use bitvec::prelude::BitVec;

/// A pool of `capacity` slots, each of which is either free or used.
#[derive(Clone)]
pub struct SlotPool {
    bitset: BitVec<u8>,
    num_used: usize,
}

impl SlotPool {
    /// Constructs a new pool in which all `capacity` slots are free.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bitset: BitVec::repeat(false, capacity),
            num_used: 0,
        }
    }

    /// Returns the number of slots in the pool.
    pub fn capacity(&self) -> usize {
        self.bitset.len()
    }

    /// Returns the number of used slots.
    pub fn num_used(&self) -> usize {
        self.num_used
    }

    /// Returns the number of free slots.
    pub fn num_free(&self) -> usize {
        self.capacity() - self.num_used
    }

    /// Returns whether the slot at `index` is free.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not smaller than the capacity.
    pub fn is_free(&self, index: usize) -> bool {
        !self.bitset[index]
    }

    /// Returns whether every slot in `range` is free.
    ///
    /// Returns `false` if the range reaches beyond the pool.
    pub fn is_range_free(&self, range: Range<usize>) -> bool {
        self.bitset
            .get(range)
            .is_some_and(|bits| bits.not_any())
    }

    /// Returns whether every slot in `range` is used.
    ///
    /// Returns `false` if the range reaches beyond the pool.
    pub fn is_range_used(&self, range: Range<usize>) -> bool {
        self.bitset.get(range).is_some_and(|bits| bits.all())
    }

    /// Marks all slots in `range` as used.
    ///
    /// Slots that are already used stay used.
    ///
    /// # Panics
    ///
    /// Panics if `range` reaches beyond the pool.
    pub fn mark_used(&mut self, range: Range<usize>) {
        let bits = &mut self.bitset[range];
        self.num_used += bits.count_zeros();
        bits.fill(true);
    }

    /// Marks all slots in `range` as free.
    ///
    /// Slots that are already free stay free.
    ///
    /// # Panics
    ///
    /// Panics if `range` reaches beyond the pool.
    pub fn mark_free(&mut self, range: Range<usize>) {
        let bits = &mut self.bitset[range];
        self.num_used -= bits.count_ones();
        bits.fill(false);
    }

    /// Returns the length of the longest run of consecutive free slots.
    pub fn largest_free_run(&self) -> usize {
        let mut largest = 0;
        let mut current = 0;
        for used in self.bitset.iter().by_vals() {
            if used {
                current = 0;
            } else {
                current += 1;
                largest = largest.max(current);
            }
        }
        largest
    }

    /// Returns an iterator over the indexes of the used slots, in ascending order.
    pub fn iter_used(&self) -> impl Iterator<Item = usize> + '_ {
        self.bitset.iter_ones()
    }
}

impl Debug for SlotPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.capacity())
            .field("num_used", &self.num_used)
            .finish()
    }
}
