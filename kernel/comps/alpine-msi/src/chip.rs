// SPDX-License-Identifier: MPL-2.0

//! Per-interrupt chip operations.
//!
//! Two chips are stacked on top of the parent domain:
//!
//! - [`MiddleChip`] belongs to the MSI-X middle domain.
//!   It translates a virtual IRQ to its hardware line and forwards
//!   the operation to the parent unchanged. Its only operation of its
//!   own is composing the MSI message.
//! - [`PciMsixChip`] belongs to the PCI/MSI level. Masking an interrupt
//!   there also masks the vector in the device's MSI-X table.

use crate::{
    domain::AlpineMsix,
    error::{MsiError, Result},
    msg::MsiMsg,
    parent::{CpuMask, ParentDomain},
    HwIrq, Virq,
};

/// Operations on a single interrupt, addressed by its virtual IRQ.
pub trait IrqChip {
    fn name(&self) -> &'static str;

    fn mask(&self, virq: Virq) -> Result<()>;

    fn unmask(&self, virq: Virq) -> Result<()>;

    /// Signals the end of interrupt handling.
    fn eoi(&self, virq: Virq) -> Result<()>;

    /// Routes the interrupt to one of the CPUs in `cpus`.
    fn set_affinity(&self, virq: Virq, cpus: CpuMask) -> Result<()>;

    /// Returns the message the device must write to raise the interrupt.
    fn compose_msi_msg(&self, virq: Virq) -> Result<MsiMsg>;
}

/// Masking of individual vectors in a PCI device's MSI-X table.
pub trait MsiVectorControl {
    fn mask_vector(&self, virq: Virq);

    fn unmask_vector(&self, virq: Virq);
}

impl<V: MsiVectorControl + ?Sized> MsiVectorControl for &V {
    fn mask_vector(&self, virq: Virq) {
        (**self).mask_vector(virq)
    }

    fn unmask_vector(&self, virq: Virq) {
        (**self).unmask_vector(virq)
    }
}

/// The chip of the MSI-X middle domain.
pub struct MiddleChip<'a, P> {
    domain: &'a AlpineMsix<P>,
}

impl<'a, P: ParentDomain> MiddleChip<'a, P> {
    pub(crate) fn new(domain: &'a AlpineMsix<P>) -> Self {
        Self { domain }
    }

    fn hwirq(&self, virq: Virq) -> Result<HwIrq> {
        self.domain.hwirq(virq).ok_or(MsiError::NotMapped(virq))
    }
}

impl<P: ParentDomain> IrqChip for MiddleChip<'_, P> {
    fn name(&self) -> &'static str {
        "MSIx"
    }

    fn mask(&self, virq: Virq) -> Result<()> {
        self.domain.parent().mask(self.hwirq(virq)?);
        Ok(())
    }

    fn unmask(&self, virq: Virq) -> Result<()> {
        self.domain.parent().unmask(self.hwirq(virq)?);
        Ok(())
    }

    fn eoi(&self, virq: Virq) -> Result<()> {
        self.domain.parent().eoi(self.hwirq(virq)?);
        Ok(())
    }

    fn set_affinity(&self, virq: Virq, cpus: CpuMask) -> Result<()> {
        if cpus.is_empty() {
            return Err(MsiError::InvalidArgs);
        }
        let hwirq = self.hwirq(virq)?;
        self.domain.parent().set_affinity(hwirq, cpus)?;
        Ok(())
    }

    fn compose_msi_msg(&self, virq: Virq) -> Result<MsiMsg> {
        Ok(self.domain.compose_message(self.hwirq(virq)?))
    }
}

/// The chip of the PCI/MSI level, stacked on [`MiddleChip`].
pub struct PciMsixChip<'a, P, V> {
    middle: MiddleChip<'a, P>,
    vectors: V,
}

impl<'a, P: ParentDomain, V: MsiVectorControl> PciMsixChip<'a, P, V> {
    pub(crate) fn new(middle: MiddleChip<'a, P>, vectors: V) -> Self {
        Self { middle, vectors }
    }
}

impl<P: ParentDomain, V: MsiVectorControl> IrqChip for PciMsixChip<'_, P, V> {
    fn name(&self) -> &'static str {
        "MSIx"
    }

    fn mask(&self, virq: Virq) -> Result<()> {
        // An unmapped virq must leave the device untouched.
        self.middle.hwirq(virq)?;
        self.vectors.mask_vector(virq);
        self.middle.mask(virq)
    }

    fn unmask(&self, virq: Virq) -> Result<()> {
        self.middle.hwirq(virq)?;
        self.vectors.unmask_vector(virq);
        self.middle.unmask(virq)
    }

    fn eoi(&self, virq: Virq) -> Result<()> {
        self.middle.eoi(virq)
    }

    fn set_affinity(&self, virq: Virq, cpus: CpuMask) -> Result<()> {
        self.middle.set_affinity(virq, cpus)
    }

    fn compose_msi_msg(&self, virq: Virq) -> Result<MsiMsg> {
        self.middle.compose_msi_msg(virq)
    }
}
