// SPDX-License-Identifier: MPL-2.0

//! The MSI-X middle interrupt domain of Annapurna Labs Alpine SoCs.
//!
//! On Alpine, a PCI device raises an MSI-X interrupt by writing to a window
//! that the SoC turns into a GIC shared peripheral interrupt (SPI).
//! A fixed range of SPIs is dedicated to this purpose.
//! This crate manages that range and stacks a middle domain
//! between the PCI/MSI layer and the GIC:
//!
//! ```text
//!   PCI/MSI framework
//!         |  IrqDomainOps::alloc / free
//!         v
//!   AlpineMsix (middle domain)  --  MsixAllocator  --  SlotPool
//!         |  ParentDomain::alloc_hw_line / free_hw_lines
//!         v
//!   parent domain (GIC)
//! ```
//!
//! A request for `nr_irqs` vectors reserves a contiguous, first-fit run of
//! SPIs from the [`MsixAllocator`], asks the parent domain for each line,
//! and then binds every virtual IRQ to its hardware line. If the parent
//! rejects any line, the whole request is rolled back and no state is left
//! behind.
//!
//! The per-IRQ chip operations are provided by [`MiddleChip`] and
//! [`PciMsixChip`], which delegate to the parent and compose the MSI
//! message a device has to write.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod allocator;
pub mod chip;
pub mod config;
pub mod domain;
mod error;
pub mod msg;
pub mod parent;

pub use allocator::MsixAllocator;
pub use chip::{IrqChip, MiddleChip, MsiVectorControl, PciMsixChip};
pub use config::MsixConfig;
pub use domain::{AlpineMsix, IrqDomainOps};
pub use error::{MsiError, Result};
pub use msg::MsiMsg;
pub use parent::{CpuMask, GicSpec, IrqType, ParentDomain, ParentError};

/// A hardware interrupt line number as seen by the parent interrupt controller.
pub type HwIrq = u32;

/// A virtual IRQ number assigned by the interrupt framework.
pub type Virq = u32;
