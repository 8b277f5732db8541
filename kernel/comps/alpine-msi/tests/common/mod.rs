// SPDX-License-Identifier: MPL-2.0

use std::{collections::BTreeMap, sync::Mutex, thread, time::Duration};

use alpine_msi::{
    CpuMask, GicSpec, HwIrq, MsiVectorControl, ParentDomain, ParentError, Virq,
};

/// The number of CPUs the mock parent can route interrupts to.
pub const NR_CPUS: u32 = 4;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParentCall {
    Alloc { virq: Virq, spec: GicSpec },
    Free { virq_base: Virq, nr_irqs: u32 },
    Mask(HwIrq),
    Unmask(HwIrq),
    Eoi(HwIrq),
    SetAffinity(HwIrq, CpuMask),
}

/// A parent domain that records every call it receives.
#[derive(Default)]
pub struct MockParent {
    calls: Mutex<Vec<ParentCall>>,
    live: Mutex<BTreeMap<Virq, HwIrq>>,
    rejected: Mutex<Option<HwIrq>>,
    delay: Mutex<Option<Duration>>,
}

impl MockParent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later allocation of `hwirq` fail.
    pub fn reject(&self, hwirq: HwIrq) {
        *self.rejected.lock().unwrap() = Some(hwirq);
    }

    /// Makes every later line allocation take at least `delay`.
    pub fn slow_down(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn accept_all(&self) {
        *self.rejected.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<ParentCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Returns the lines the parent currently has allocated, by virq.
    pub fn live_lines(&self) -> Vec<(Virq, HwIrq)> {
        self.live
            .lock()
            .unwrap()
            .iter()
            .map(|(&virq, &hwirq)| (virq, hwirq))
            .collect()
    }

    fn record(&self, call: ParentCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ParentDomain for MockParent {
    fn alloc_hw_line(&self, virq: Virq, spec: &GicSpec) -> Result<(), ParentError> {
        self.record(ParentCall::Alloc { virq, spec: *spec });
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if *self.rejected.lock().unwrap() == Some(spec.hwirq()) {
            return Err(ParentError::NotEnoughResources);
        }
        let mut live = self.live.lock().unwrap();
        if live.contains_key(&virq) {
            return Err(ParentError::InvalidArgs);
        }
        live.insert(virq, spec.hwirq());
        Ok(())
    }

    fn free_hw_lines(&self, virq_base: Virq, nr_irqs: u32) {
        self.record(ParentCall::Free { virq_base, nr_irqs });
        let mut live = self.live.lock().unwrap();
        for virq in virq_base..virq_base + nr_irqs {
            live.remove(&virq);
        }
    }

    fn mask(&self, hwirq: HwIrq) {
        self.record(ParentCall::Mask(hwirq));
    }

    fn unmask(&self, hwirq: HwIrq) {
        self.record(ParentCall::Unmask(hwirq));
    }

    fn eoi(&self, hwirq: HwIrq) {
        self.record(ParentCall::Eoi(hwirq));
    }

    fn set_affinity(&self, hwirq: HwIrq, cpus: CpuMask) -> Result<(), ParentError> {
        self.record(ParentCall::SetAffinity(hwirq, cpus));
        if (0..NR_CPUS).any(|cpu| cpus.contains(cpu)) {
            Ok(())
        } else {
            Err(ParentError::InvalidArgs)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorCall {
    Mask(Virq),
    Unmask(Virq),
}

/// A device MSI-X table that records masking of its vectors.
#[derive(Default)]
pub struct MockVectors {
    calls: Mutex<Vec<VectorCall>>,
}

impl MockVectors {
    pub fn calls(&self) -> Vec<VectorCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl MsiVectorControl for MockVectors {
    fn mask_vector(&self, virq: Virq) {
        self.calls.lock().unwrap().push(VectorCall::Mask(virq));
    }

    fn unmask_vector(&self, virq: Virq) {
        self.calls.lock().unwrap().push(VectorCall::Unmask(virq));
    }
}
