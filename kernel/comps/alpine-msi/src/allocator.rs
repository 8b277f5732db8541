// SPDX-License-Identifier: MPL-2.0

//! Allocation of contiguous hardware line ranges.

use alloc::collections::BTreeMap;
use core::ops::Range;

use log::{debug, warn};
use slot_pool::SlotPool;
use spin::Mutex as SpinLock;

use crate::{
    error::{MsiError, Result},
    HwIrq,
};

/// A first-fit allocator of contiguous hardware lines.
///
/// The allocator manages the lines `base..base + capacity`.
/// Every range it hands out is recorded, so that a range can only be
/// freed by passing back exactly what was allocated.
///
/// All operations take a single pool-wide spin lock. The lock is held
/// for one scan of the pool at most and never across calls into other
/// domains.
pub struct MsixAllocator {
    base: HwIrq,
    capacity: u32,
    inner: SpinLock<AllocatorInner>,
}

struct AllocatorInner {
    pool: SlotPool,
    // Maps the first slot of each live range to its length.
    issued: BTreeMap<usize, usize>,
}

impl MsixAllocator {
    /// Creates an allocator for the lines `base..base + capacity`.
    ///
    /// Fails with [`MsiError::InvalidArgs`] if the last line does not fit in
    /// a [`HwIrq`].
    pub fn new(base: HwIrq, capacity: u32) -> Result<Self> {
        if base.checked_add(capacity).is_none() {
            return Err(MsiError::InvalidArgs);
        }
        Ok(Self {
            base,
            capacity,
            inner: SpinLock::new(AllocatorInner {
                pool: SlotPool::with_capacity(capacity as usize),
                issued: BTreeMap::new(),
            }),
        })
    }

    /// Allocates `count` contiguous lines and returns the first one.
    ///
    /// The lowest-numbered run of `count` free lines is chosen.
    /// If there is no such run, the pool is left untouched.
    pub fn allocate(&self, count: u32) -> Result<HwIrq> {
        if count == 0 {
            return Err(MsiError::InvalidArgs);
        }
        let count = count as usize;

        let mut inner = self.inner.lock();
        let Some(first) = find_first_fit(&inner.pool, count) else {
            warn!(
                "MSI-X: no {} contiguous lines left ({} of {} free)",
                count,
                inner.pool.num_free(),
                inner.pool.capacity()
            );
            return Err(MsiError::InsufficientSpace);
        };
        inner.pool.mark_used(first..first + count);
        inner.issued.insert(first, count);
        drop(inner);

        let hwirq = self.base + first as HwIrq;
        debug!("MSI-X: allocated lines {}..{}", hwirq, hwirq + count as HwIrq);
        Ok(hwirq)
    }

    /// Frees the `count` lines starting at `hwirq`.
    ///
    /// The range must be one previously returned by [`allocate`] with the same
    /// `count` and not freed since. Otherwise [`MsiError::UnknownRange`] is
    /// returned and nothing is freed.
    ///
    /// [`allocate`]: Self::allocate
    pub fn free(&self, hwirq: HwIrq, count: u32) -> Result<()> {
        let Some(first) = self.slot_of(hwirq) else {
            warn!("MSI-X: line {} is outside of the pool", hwirq);
            return Err(MsiError::UnknownRange);
        };
        let count = count as usize;

        let mut inner = self.inner.lock();
        if inner.issued.get(&first) != Some(&count) {
            warn!(
                "MSI-X: lines {}..{} were not allocated as one range",
                hwirq,
                hwirq as usize + count
            );
            return Err(MsiError::UnknownRange);
        }
        inner.issued.remove(&first);
        inner.pool.mark_free(first..first + count);
        drop(inner);

        debug!("MSI-X: freed lines {}..{}", hwirq, hwirq as usize + count);
        Ok(())
    }

    /// Returns the first line managed by the allocator.
    pub fn base(&self) -> HwIrq {
        self.base
    }

    /// Returns the number of lines managed by the allocator.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of lines currently allocated.
    pub fn num_used(&self) -> u32 {
        self.inner.lock().pool.num_used() as u32
    }

    /// Returns the number of lines currently free.
    pub fn num_free(&self) -> u32 {
        self.inner.lock().pool.num_free() as u32
    }

    /// Returns the largest `count` that [`allocate`] could currently satisfy.
    ///
    /// [`allocate`]: Self::allocate
    pub fn largest_free_run(&self) -> u32 {
        self.inner.lock().pool.largest_free_run() as u32
    }

    /// Returns whether `hwirq` is one of the lines managed by the allocator.
    pub fn contains(&self, hwirq: HwIrq) -> bool {
        self.slot_of(hwirq).is_some()
    }

    /// Returns whether `hwirq` is currently allocated.
    pub fn is_allocated(&self, hwirq: HwIrq) -> bool {
        self.slot_of(hwirq)
            .is_some_and(|slot| !self.inner.lock().pool.is_free(slot))
    }

    /// Returns the live ranges, in ascending order.
    pub fn allocated_ranges(&self) -> alloc::vec::Vec<Range<HwIrq>> {
        self.inner
            .lock()
            .issued
            .iter()
            .map(|(&first, &count)| {
                let start = self.base + first as HwIrq;
                start..start + count as HwIrq
            })
            .collect()
    }

    fn slot_of(&self, hwirq: HwIrq) -> Option<usize> {
        let slot = hwirq.checked_sub(self.base)?;
        (slot < self.capacity).then_some(slot as usize)
    }
}

impl core::fmt::Debug for MsixAllocator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MsixAllocator")
            .field("base", &self.base)
            .field("pool", &self.inner.lock().pool)
            .finish_non_exhaustive()
    }
}

/// Finds the lowest-indexed run of `count` free slots.
fn find_first_fit(pool: &SlotPool, count: usize) -> Option<usize> {
    let mut first = 0;
    let mut avail = 0;
    for index in 0..pool.capacity() {
        if !pool.is_free(index) {
            avail = 0;
            continue;
        }
        if avail == 0 {
            first = index;
        }
        avail += 1;
        if avail == count {
            return Some(first);
        }
    }
    None
}
