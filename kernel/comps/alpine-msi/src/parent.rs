// SPDX-License-Identifier: MPL-2.0

//! The parent interrupt domain, i.e., the GIC.

use bitflags::bitflags;

use crate::{HwIrq, Virq};

/// The GIC interrupt specifier type for shared peripheral interrupts.
pub const GIC_SPI: u32 = 0;

/// The first interrupt ID of the GIC SPI range.
///
/// SPI specifiers count from here, so SPI `n` is interrupt ID `n + 32`.
pub const GIC_SPI_BASE: u32 = 32;

/// The exclusive upper bound of GIC SPI interrupt IDs.
pub const GIC_SPI_LIMIT: u32 = 1020;

bitflags! {
    /// Trigger types of an interrupt line.
    ///
    /// The values follow the Linux `IRQ_TYPE_*` encoding
    /// used in device-tree interrupt specifiers.
    pub struct IrqType: u32 {
        const EDGE_RISING = 0x1;
        const EDGE_FALLING = 0x2;
        const EDGE_BOTH = Self::EDGE_RISING.bits | Self::EDGE_FALLING.bits;
        const LEVEL_HIGH = 0x4;
        const LEVEL_LOW = 0x8;
    }
}

/// A three-cell GIC interrupt specifier, as the parent domain expects it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GicSpec {
    /// The specifier type, always [`GIC_SPI`] for MSI-X lines.
    pub kind: u32,
    /// The SPI number, i.e., the interrupt ID minus [`GIC_SPI_BASE`].
    pub number: u32,
    pub trigger: IrqType,
}

impl GicSpec {
    /// Describes the edge-triggered SPI that backs the hardware line `hwirq`.
    ///
    /// `hwirq` must not be smaller than [`GIC_SPI_BASE`]; the configuration
    /// is validated against this before any line is handed out.
    pub fn edge_spi(hwirq: HwIrq) -> Self {
        debug_assert!(hwirq >= GIC_SPI_BASE);
        Self {
            kind: GIC_SPI,
            number: hwirq - GIC_SPI_BASE,
            trigger: IrqType::EDGE_RISING,
        }
    }

    /// Returns the interrupt ID described by the specifier.
    pub fn hwirq(&self) -> HwIrq {
        self.number + GIC_SPI_BASE
    }
}

/// A set of CPUs that an interrupt may be routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CpuMask(pub u64);

impl CpuMask {
    /// Creates a mask containing only `cpu`.
    ///
    /// The mask is empty if `cpu` cannot be represented.
    pub fn single(cpu: u32) -> Self {
        Self(1u64.checked_shl(cpu).unwrap_or(0))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, cpu: u32) -> bool {
        cpu < u64::BITS && self.0 & (1 << cpu) != 0
    }
}

/// Errors reported by the parent domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentError {
    NotEnoughResources,
    InvalidArgs,
    Unsupported,
}

/// The interrupt domain that the MSI-X middle domain is stacked on.
///
/// Lines are allocated one by one as the framework binds each virtual IRQ,
/// but freed per request, mirroring how the middle domain hands them out.
pub trait ParentDomain {
    /// Allocates the hardware line described by `spec` and binds it to `virq`.
    fn alloc_hw_line(&self, virq: Virq, spec: &GicSpec) -> Result<(), ParentError>;

    /// Frees the hardware lines bound to `virq_base..virq_base + nr_irqs`.
    fn free_hw_lines(&self, virq_base: Virq, nr_irqs: u32);

    fn mask(&self, hwirq: HwIrq);

    fn unmask(&self, hwirq: HwIrq);

    /// Signals the end of interrupt handling for `hwirq`.
    fn eoi(&self, hwirq: HwIrq);

    /// Routes `hwirq` to one of the CPUs in `cpus`.
    fn set_affinity(&self, hwirq: HwIrq, cpus: CpuMask) -> Result<(), ParentError>;
}

impl<P: ParentDomain + ?Sized> ParentDomain for &P {
    fn alloc_hw_line(&self, virq: Virq, spec: &GicSpec) -> Result<(), ParentError> {
        (**self).alloc_hw_line(virq, spec)
    }

    fn free_hw_lines(&self, virq_base: Virq, nr_irqs: u32) {
        (**self).free_hw_lines(virq_base, nr_irqs)
    }

    fn mask(&self, hwirq: HwIrq) {
        (**self).mask(hwirq)
    }

    fn unmask(&self, hwirq: HwIrq) {
        (**self).unmask(hwirq)
    }

    fn eoi(&self, hwirq: HwIrq) {
        (**self).eoi(hwirq)
    }

    fn set_affinity(&self, hwirq: HwIrq, cpus: CpuMask) -> Result<(), ParentError> {
        (**self).set_affinity(hwirq, cpus)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn edge_spi_translation() {
        let spec = GicSpec::edge_spi(161);
        assert_eq!(spec.kind, GIC_SPI);
        assert_eq!(spec.number, 129);
        assert_eq!(spec.trigger, IrqType::EDGE_RISING);
        assert_eq!(spec.hwirq(), 161);
    }

    #[test]
    fn cpu_mask() {
        let mask = CpuMask::single(3);
        assert!(mask.contains(3));
        assert!(!mask.contains(2));
        assert!(!mask.contains(64));
        assert!(!mask.is_empty());
        assert!(CpuMask::single(64).is_empty());
        assert!(CpuMask::default().is_empty());
    }
}
