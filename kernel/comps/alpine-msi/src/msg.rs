// SPDX-License-Identifier: MPL-2.0

//! MSI messages.
//!
//! An Alpine MSI-X message is a write of zero to a per-line address inside
//! the MSI-X window. Each hardware line owns an 8-byte slot of the window,
//! so the line number is encoded in the address rather than in the data.

use crate::{config::MsixConfig, HwIrq};

/// The stride between the message addresses of two adjacent hardware lines.
pub const MSIX_ADDR_STRIDE: u32 = 8;

/// The address and data a device writes to raise an MSI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsiMsg {
    pub address_hi: u32,
    pub address_lo: u32,
    pub data: u32,
}

impl MsiMsg {
    /// Composes the message that raises the hardware line `hwirq`.
    pub fn compose(config: &MsixConfig, hwirq: HwIrq) -> Self {
        Self {
            address_hi: config.addr_high(),
            address_lo: config
                .addr_low()
                .wrapping_add(hwirq.wrapping_mul(MSIX_ADDR_STRIDE)),
            data: 0,
        }
    }

    /// Returns the full 64-bit message address.
    pub fn address(&self) -> u64 {
        ((self.address_hi as u64) << 32) | self.address_lo as u64
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::MSIX_SPI_TARGET_CLUSTER0;

    #[test]
    fn compose_encodes_hwirq_in_address() {
        let config = MsixConfig::new(0x0000_00fb_f800_0000);
        let msg = MsiMsg::compose(&config, 161);
        assert_eq!(msg.address_hi, 0xfb);
        assert_eq!(
            msg.address_lo,
            (0xf800_0000 | MSIX_SPI_TARGET_CLUSTER0) + 161 * 8
        );
        assert_eq!(msg.data, 0);
        assert_eq!(
            msg.address(),
            0x0000_00fb_0000_0000 | msg.address_lo as u64
        );
    }

    #[test]
    fn adjacent_lines_are_one_stride_apart() {
        let config = MsixConfig::new(0xf800_0000);
        let first = MsiMsg::compose(&config, 200);
        let second = MsiMsg::compose(&config, 201);
        assert_eq!(second.address_lo - first.address_lo, MSIX_ADDR_STRIDE);
    }
}
