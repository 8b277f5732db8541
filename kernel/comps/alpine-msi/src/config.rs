// SPDX-License-Identifier: MPL-2.0

//! Configuration of the MSI-X middle domain.
//!
//! The configuration is read once, when the domain is created, from the
//! device-tree node of the MSI-X controller:
//!
//! ```text
//! msix: msix@fbe00000 {
//!     compatible = "al,alpine-msix";
//!     reg = <0x0 0xfbe00000 0x0 0x100000>;
//!     interrupt-controller;
//!     msi-controller;
//!     al,msi-base-spi = <161>;
//!     al,msi-num-spis = <158>;
//! };
//! ```

use fdt::{node::FdtNode, Fdt};
use log::info;

use crate::{
    error::{MsiError, Result},
    parent::{GIC_SPI_BASE, GIC_SPI_LIMIT},
    HwIrq,
};

/// The compatible string of the MSI-X controller node.
pub const ALPINE_MSIX_COMPATIBLE: &str = "al,alpine-msix";

/// Routes MSI-X writes to the SPIs of CPU cluster 0.
pub const MSIX_SPI_TARGET_CLUSTER0: u32 = 1 << 16;

/// The first SPI used for MSI-X if the device tree does not say otherwise.
pub const DEFAULT_SGI_FIRST: u32 = 161;

/// The number of SPIs used for MSI-X if the device tree does not say otherwise.
pub const DEFAULT_NUM_IRQS: u32 = 158;

const PROP_BASE_SPI: &str = "al,msi-base-spi";
const PROP_NUM_SPIS: &str = "al,msi-num-spis";

/// The MSI-X window and the range of hardware lines behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsixConfig {
    addr_high: u32,
    addr_low: u32,
    sgi_first: HwIrq,
    num_irqs: u32,
}

impl MsixConfig {
    /// Creates a configuration for the MSI-X window at `msg_addr`,
    /// with the default SPI range.
    pub fn new(msg_addr: u64) -> Self {
        Self {
            addr_high: (msg_addr >> 32) as u32,
            addr_low: msg_addr as u32 | MSIX_SPI_TARGET_CLUSTER0,
            sgi_first: DEFAULT_SGI_FIRST,
            num_irqs: DEFAULT_NUM_IRQS,
        }
    }

    /// Sets the first hardware line of the range.
    pub fn with_sgi_first(mut self, sgi_first: HwIrq) -> Self {
        self.sgi_first = sgi_first;
        self
    }

    /// Sets the number of hardware lines in the range.
    pub fn with_num_irqs(mut self, num_irqs: u32) -> Self {
        self.num_irqs = num_irqs;
        self
    }

    /// Reads the configuration from the first MSI-X controller node
    /// in the device tree.
    pub fn from_fdt(fdt: &Fdt) -> Result<Self> {
        let node = fdt
            .find_compatible(&[ALPINE_MSIX_COMPATIBLE])
            .ok_or(MsiError::InvalidConfig("no MSI-X controller node"))?;
        Self::from_fdt_node(node)
    }

    /// Reads the configuration from an MSI-X controller node.
    pub fn from_fdt_node(node: FdtNode) -> Result<Self> {
        let region = node
            .reg()
            .and_then(|mut reg| reg.next())
            .ok_or(MsiError::InvalidConfig("MSI-X node has no `reg` property"))?;
        let msg_addr = region.starting_address as usize as u64;

        let mut config = Self::new(msg_addr);
        match read_u32_property(node, PROP_BASE_SPI)? {
            Some(sgi_first) => config.sgi_first = sgi_first,
            None => info!(
                "MSI-X: `{}` is missing, using {}",
                PROP_BASE_SPI, DEFAULT_SGI_FIRST
            ),
        }
        match read_u32_property(node, PROP_NUM_SPIS)? {
            Some(num_irqs) => config.num_irqs = num_irqs,
            None => info!(
                "MSI-X: `{}` is missing, using {}",
                PROP_NUM_SPIS, DEFAULT_NUM_IRQS
            ),
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks that the range consists of valid GIC SPIs.
    pub fn validate(&self) -> Result<()> {
        if self.num_irqs == 0 {
            return Err(MsiError::InvalidConfig("no SPIs are assigned to MSI-X"));
        }
        if self.sgi_first < GIC_SPI_BASE {
            return Err(MsiError::InvalidConfig("the first MSI-X line is not an SPI"));
        }
        match self.sgi_first.checked_add(self.num_irqs) {
            Some(end) if end <= GIC_SPI_LIMIT => Ok(()),
            _ => Err(MsiError::InvalidConfig(
                "the MSI-X lines exceed the GIC SPI range",
            )),
        }
    }

    /// Returns the upper 32 bits of the message address.
    pub fn addr_high(&self) -> u32 {
        self.addr_high
    }

    /// Returns the lower 32 bits of the message address,
    /// including the target cluster bit.
    pub fn addr_low(&self) -> u32 {
        self.addr_low
    }

    /// Returns the first hardware line of the range.
    pub fn sgi_first(&self) -> HwIrq {
        self.sgi_first
    }

    /// Returns the number of hardware lines in the range.
    pub fn num_irqs(&self) -> u32 {
        self.num_irqs
    }
}

fn read_u32_property(node: FdtNode, name: &'static str) -> Result<Option<u32>> {
    let Some(prop) = node.property(name) else {
        return Ok(None);
    };
    prop.as_usize()
        .and_then(|value| u32::try_from(value).ok())
        .map(Some)
        .ok_or(MsiError::InvalidConfig("malformed MSI-X SPI property"))
}
