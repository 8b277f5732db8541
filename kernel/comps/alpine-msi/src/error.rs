// SPDX-License-Identifier: MPL-2.0

use crate::{parent::ParentError, HwIrq, Virq};

/// The error type of the MSI-X middle domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsiError {
    /// The arguments are malformed, e.g., zero vectors are requested.
    InvalidArgs,
    /// No contiguous run of free hardware lines is large enough.
    InsufficientSpace,
    /// The parent domain rejected a hardware line.
    ///
    /// All lines of the request have been released when this is returned.
    ParentAllocationFailed {
        virq: Virq,
        hwirq: HwIrq,
        cause: ParentError,
    },
    /// The range to free was never handed out, or has already been freed.
    UnknownRange,
    /// The virtual IRQ is not bound to any hardware line of this domain.
    NotMapped(Virq),
    /// The configuration does not describe a usable SPI range.
    InvalidConfig(&'static str),
    /// A chip operation failed in the parent domain.
    Parent(ParentError),
}

impl From<ParentError> for MsiError {
    fn from(err: ParentError) -> Self {
        MsiError::Parent(err)
    }
}

impl core::fmt::Display for MsiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MsiError::InvalidArgs => write!(f, "invalid arguments"),
            MsiError::InsufficientSpace => write!(f, "no contiguous MSI-X range available"),
            MsiError::ParentAllocationFailed { virq, hwirq, cause } => write!(
                f,
                "parent domain failed to allocate hwirq {hwirq} for virq {virq}: {cause:?}"
            ),
            MsiError::UnknownRange => write!(f, "range was not allocated by this domain"),
            MsiError::NotMapped(virq) => write!(f, "virq {virq} is not mapped"),
            MsiError::InvalidConfig(reason) => write!(f, "invalid configuration: {reason}"),
            MsiError::Parent(cause) => write!(f, "parent domain error: {cause:?}"),
        }
    }
}

pub type Result<T> = core::result::Result<T, MsiError>;
