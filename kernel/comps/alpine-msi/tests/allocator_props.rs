// SPDX-License-Identifier: MPL-2.0

use alpine_msi::{HwIrq, MsiError, MsixAllocator};
use proptest::prelude::*;

const BASE: HwIrq = 161;

#[derive(Clone, Debug)]
enum Op {
    Alloc(u32),
    // Frees the live range at this index, modulo the number of live ranges.
    Free(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..=6).prop_map(Op::Alloc),
        any::<usize>().prop_map(Op::Free),
    ]
}

/// The lowest start of `count` consecutive free slots.
fn model_first_fit(used: &[bool], count: usize) -> Option<usize> {
    let last_start = used.len().checked_sub(count)?;
    (0..=last_start).find(|&start| used[start..start + count].iter().all(|used| !used))
}

fn used_slots(allocator: &MsixAllocator) -> Vec<bool> {
    (0..allocator.capacity())
        .map(|slot| allocator.is_allocated(BASE + slot))
        .collect()
}

proptest! {
    #[test]
    fn behaves_like_first_fit_model(
        capacity in 1u32..40,
        ops in prop::collection::vec(op_strategy(), 0..64),
    ) {
        let allocator = MsixAllocator::new(BASE, capacity).unwrap();
        let mut model = vec![false; capacity as usize];
        let mut live: Vec<(HwIrq, u32)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(count) => {
                    let expected = model_first_fit(&model, count as usize);
                    match allocator.allocate(count) {
                        Ok(hwirq) => {
                            let first = (hwirq - BASE) as usize;
                            prop_assert_eq!(Some(first), expected);
                            model[first..first + count as usize].fill(true);
                            live.push((hwirq, count));
                        }
                        Err(err) => {
                            prop_assert_eq!(err, MsiError::InsufficientSpace);
                            prop_assert_eq!(expected, None);
                        }
                    }
                }
                Op::Free(index) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (hwirq, count) = live.swap_remove(index % live.len());
                    prop_assert_eq!(allocator.free(hwirq, count), Ok(()));
                    let first = (hwirq - BASE) as usize;
                    model[first..first + count as usize].fill(false);
                }
            }

            let num_used = model.iter().filter(|used| **used).count() as u32;
            prop_assert!(allocator.num_used() <= capacity);
            prop_assert_eq!(allocator.num_used(), num_used);
            prop_assert_eq!(used_slots(&allocator), model.clone());
        }

        // Live ranges never overlap.
        let mut ranges = allocator.allocated_ranges();
        ranges.sort_by_key(|range| range.start);
        for pair in ranges.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }
        prop_assert_eq!(ranges.len(), live.len());
    }

    #[test]
    fn allocate_then_free_restores_state(
        capacity in 1u32..40,
        prefix in prop::collection::vec(1u32..=4, 0..12),
        count in 1u32..=8,
    ) {
        let allocator = MsixAllocator::new(BASE, capacity).unwrap();
        for (i, count) in prefix.iter().enumerate() {
            // Keep every other range, so the pool has holes.
            if let Ok(hwirq) = allocator.allocate(*count)
                && i % 2 == 1
            {
                allocator.free(hwirq, *count).unwrap();
            }
        }
        let before = used_slots(&allocator);
        let ranges_before = allocator.allocated_ranges();

        if let Ok(hwirq) = allocator.allocate(count) {
            prop_assert_eq!(allocator.free(hwirq, count), Ok(()));
        }
        prop_assert_eq!(used_slots(&allocator), before);
        prop_assert_eq!(allocator.allocated_ranges(), ranges_before);
    }

    #[test]
    fn alternating_pool_rejects_pairs(half in 1u32..20) {
        let capacity = half * 2;
        let allocator = MsixAllocator::new(BASE, capacity).unwrap();
        let singles: Vec<_> = (0..capacity).map(|_| allocator.allocate(1).unwrap()).collect();
        for hwirq in singles.iter().step_by(2) {
            allocator.free(*hwirq, 1).unwrap();
        }
        prop_assert_eq!(allocator.num_free(), half);
        prop_assert_eq!(allocator.allocate(2), Err(MsiError::InsufficientSpace));
        prop_assert_eq!(allocator.num_free(), half);
    }
}
