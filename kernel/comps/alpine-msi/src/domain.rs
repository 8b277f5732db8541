// SPDX-License-Identifier: MPL-2.0

//! The MSI-X middle interrupt domain.

use alloc::collections::BTreeMap;

use log::{debug, info, warn};
use spin::Mutex as SpinLock;

use crate::{
    allocator::MsixAllocator,
    chip::{MiddleChip, MsiVectorControl, PciMsixChip},
    config::MsixConfig,
    error::{MsiError, Result},
    msg::MsiMsg,
    parent::{GicSpec, ParentDomain},
    HwIrq, Virq,
};

/// The operations an interrupt domain offers to the domain stacked on it.
///
/// The PCI/MSI framework calls these to set up and tear down
/// the vectors of one device at a time.
pub trait IrqDomainOps {
    /// Allocates `nr_irqs` interrupts for the virtual IRQs
    /// `virq_base..virq_base + nr_irqs`.
    fn alloc(&self, virq_base: Virq, nr_irqs: u32) -> Result<()>;

    /// Frees the interrupts set up by a previous `alloc` call
    /// with the same arguments.
    fn free(&self, virq_base: Virq, nr_irqs: u32) -> Result<()>;
}

/// The MSI-X middle domain of an Alpine SoC.
///
/// It hands out contiguous hardware lines to PCI devices and forwards each
/// of them to the parent domain `P`. The domain is an ordinary value:
/// whoever probes the MSI-X controller owns it and hands out references.
pub struct AlpineMsix<P> {
    config: MsixConfig,
    allocator: MsixAllocator,
    parent: P,
    bindings: SpinLock<Bindings>,
}

#[derive(Default)]
struct Bindings {
    by_virq: BTreeMap<Virq, HwIrq>,
    // Keyed by the first virtual IRQ of each `alloc` call.
    sets: BTreeMap<Virq, IrqSet>,
}

#[derive(Clone, Copy, Debug)]
struct IrqSet {
    nr_irqs: u32,
    // `None` while the `alloc` call that claimed the virqs is in progress.
    hwirq_base: Option<HwIrq>,
}

impl<P: ParentDomain> AlpineMsix<P> {
    /// Creates the domain with the lines described by `config`,
    /// stacked on `parent`.
    pub fn new(config: MsixConfig, parent: P) -> Result<Self> {
        config.validate()?;
        info!(
            "MSI-X: registering lines {}..{}",
            config.sgi_first(),
            config.sgi_first() + config.num_irqs()
        );
        Ok(Self {
            config,
            allocator: MsixAllocator::new(config.sgi_first(), config.num_irqs())?,
            parent,
            bindings: SpinLock::new(Bindings::default()),
        })
    }

    pub fn config(&self) -> &MsixConfig {
        &self.config
    }

    pub fn allocator(&self) -> &MsixAllocator {
        &self.allocator
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    /// Returns the hardware line bound to `virq`.
    pub fn hwirq(&self, virq: Virq) -> Option<HwIrq> {
        self.bindings.lock().by_virq.get(&virq).copied()
    }

    /// Returns the number of `alloc` calls that have not been freed yet.
    pub fn num_live_sets(&self) -> usize {
        self.bindings
            .lock()
            .sets
            .values()
            .filter(|set| set.hwirq_base.is_some())
            .count()
    }

    /// Composes the MSI message that raises the hardware line `hwirq`.
    pub fn compose_message(&self, hwirq: HwIrq) -> MsiMsg {
        MsiMsg::compose(&self.config, hwirq)
    }

    /// Returns the chip of this domain.
    pub fn chip(&self) -> MiddleChip<'_, P> {
        MiddleChip::new(self)
    }

    /// Returns the chip for the PCI/MSI level above this domain.
    pub fn pci_chip<V: MsiVectorControl>(&self, vectors: V) -> PciMsixChip<'_, P, V> {
        PciMsixChip::new(self.chip(), vectors)
    }

    /// Claims the virqs `virq_base..virq_base + nr_irqs` for an `alloc` call.
    ///
    /// The claim is released with [`Self::release_virqs`] if the call fails.
    fn claim_virqs(&self, virq_base: Virq, nr_irqs: u32) -> Result<()> {
        let end = virq_base + nr_irqs;
        let mut bindings = self.bindings.lock();
        // Sets are disjoint, so only the last one starting below `end` can overlap.
        let overlaps = bindings
            .sets
            .range(..end)
            .next_back()
            .is_some_and(|(&start, set)| start + set.nr_irqs > virq_base);
        if overlaps {
            drop(bindings);
            warn!("MSI-X: virqs {}..{} are already in use", virq_base, end);
            return Err(MsiError::InvalidArgs);
        }
        bindings.sets.insert(
            virq_base,
            IrqSet {
                nr_irqs,
                hwirq_base: None,
            },
        );
        Ok(())
    }

    fn release_virqs(&self, virq_base: Virq) {
        let released = self.bindings.lock().sets.remove(&virq_base);
        debug_assert!(released.is_some_and(|set| set.hwirq_base.is_none()));
    }

    /// Asks the parent for every line of a reserved range.
    ///
    /// On failure, the lines accepted so far are handed back to the parent.
    fn commit_to_parent(&self, virq_base: Virq, hwirq_base: HwIrq, nr_irqs: u32) -> Result<()> {
        for i in 0..nr_irqs {
            let virq = virq_base + i;
            let hwirq = hwirq_base + i;
            if let Err(cause) = self.parent.alloc_hw_line(virq, &GicSpec::edge_spi(hwirq)) {
                warn!(
                    "MSI-X: parent rejected line {} for virq {}: {:?}",
                    hwirq, virq, cause
                );
                if i > 0 {
                    self.parent.free_hw_lines(virq_base, i);
                }
                return Err(MsiError::ParentAllocationFailed { virq, hwirq, cause });
            }
        }
        Ok(())
    }
}

impl<P: ParentDomain> IrqDomainOps for AlpineMsix<P> {
    fn alloc(&self, virq_base: Virq, nr_irqs: u32) -> Result<()> {
        if nr_irqs == 0 || virq_base.checked_add(nr_irqs).is_none() {
            return Err(MsiError::InvalidArgs);
        }
        self.claim_virqs(virq_base, nr_irqs)?;

        let hwirq_base = match self.allocator.allocate(nr_irqs) {
            Ok(hwirq_base) => hwirq_base,
            Err(err) => {
                self.release_virqs(virq_base);
                return Err(err);
            }
        };

        if let Err(err) = self.commit_to_parent(virq_base, hwirq_base, nr_irqs) {
            // The range was just handed out by the allocator, so it must be freeable.
            let released = self.allocator.free(hwirq_base, nr_irqs);
            debug_assert_eq!(released, Ok(()));
            self.release_virqs(virq_base);
            return Err(err);
        }

        let mut bindings = self.bindings.lock();
        for i in 0..nr_irqs {
            bindings.by_virq.insert(virq_base + i, hwirq_base + i);
        }
        bindings.sets.insert(
            virq_base,
            IrqSet {
                nr_irqs,
                hwirq_base: Some(hwirq_base),
            },
        );
        drop(bindings);

        debug!(
            "MSI-X: bound virqs {}..{} to lines {}..{}",
            virq_base,
            virq_base + nr_irqs,
            hwirq_base,
            hwirq_base + nr_irqs
        );
        Ok(())
    }

    fn free(&self, virq_base: Virq, nr_irqs: u32) -> Result<()> {
        let mut bindings = self.bindings.lock();
        // A set whose `alloc` is still in progress cannot be freed yet.
        let hwirq_base = bindings
            .sets
            .get(&virq_base)
            .filter(|set| set.nr_irqs == nr_irqs)
            .and_then(|set| set.hwirq_base);
        let Some(hwirq_base) = hwirq_base else {
            drop(bindings);
            warn!(
                "MSI-X: virqs {}..{} were not allocated together",
                virq_base,
                virq_base as u64 + nr_irqs as u64
            );
            return Err(MsiError::UnknownRange);
        };
        bindings.sets.remove(&virq_base);
        for virq in virq_base..virq_base + nr_irqs {
            bindings.by_virq.remove(&virq);
        }
        drop(bindings);

        // Every bound set owns exactly the range the allocator issued for it.
        let released = self.allocator.free(hwirq_base, nr_irqs);
        debug_assert_eq!(released, Ok(()));
        self.parent.free_hw_lines(virq_base, nr_irqs);

        debug!(
            "MSI-X: released virqs {}..{} from lines {}..{}",
            virq_base,
            virq_base + nr_irqs,
            hwirq_base,
            hwirq_base + nr_irqs
        );
        Ok(())
    }
}

impl<P> core::fmt::Debug for AlpineMsix<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AlpineMsix")
            .field("config", &self.config)
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}
