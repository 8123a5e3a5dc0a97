// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Firmware update, spoken only in maintenance mode.
//!
//! An update is a fixed sequence: erase the target bank, stream the image
//! in [`l2::FW_CHUNK`]-sized pieces at explicit offsets, then reboot into
//! the new firmware. There is no partial-resume protocol: if anything
//! fails midway the chip stays in maintenance mode and a retry starts
//! over from the erase.

use crate::cmd;
use crate::crypto::Crypto;
use crate::l1::StatusBit;
use crate::l2;
use crate::port::Port;
use crate::BootState;
use crate::Chip;
use crate::Result;

impl<P: Port, C: Crypto> Chip<'_, P, C> {
    /// Erases a firmware bank.
    ///
    /// Only valid in maintenance mode. Erasing flash is slow; this waits
    /// up to the configured `fw_erase_timeout_ms`.
    pub fn mutable_fw_erase(&mut self, bank: l2::FwBank) -> Result<()> {
        self.ensure_maintenance()?;
        self.l2_send(&l2::FwEraseRequest { bank })?;
        let erase_timeout = self.fw_erase_timeout_ms();
        self.l2_recv_into_timed(l2::Status::RequestOk, &mut [], erase_timeout)?;
        Ok(())
    }

    /// Streams `image` into an (erased) firmware bank.
    ///
    /// Only valid in maintenance mode. The image is written in
    /// [`l2::FW_CHUNK`]-byte pieces, each at an explicit offset, so a
    /// torn transfer is detectable by the chip.
    pub fn mutable_fw_write(
        &mut self,
        bank: l2::FwBank,
        image: &[u8],
    ) -> Result<()> {
        check!(!image.is_empty(), cmd::ArgError::LengthOutOfRange);
        check!(
            image.len() <= u16::MAX as usize + 1,
            cmd::ArgError::LengthOutOfRange
        );
        self.ensure_maintenance()?;

        for (i, data) in image.chunks(l2::FW_CHUNK).enumerate() {
            let offset = (i * l2::FW_CHUNK) as u16;
            self.l2_send(&l2::FwUpdateRequest { bank, offset, data })?;
            self.l2_recv_into(l2::Status::RequestOk, &mut [])?;
        }
        info!("wrote {} firmware bytes", image.len());
        Ok(())
    }

    /// Runs a complete firmware update: erase, write, reboot.
    ///
    /// Returns the boot state observed after the reboot, so callers can
    /// tell whether the new image actually came up.
    pub fn mutable_fw_update(
        &mut self,
        bank: l2::FwBank,
        image: &[u8],
    ) -> Result<BootState> {
        self.mutable_fw_erase(bank)?;
        self.mutable_fw_write(bank, image)?;

        let status = self.restart(l2::StartupId::Reboot)?;
        if status.contains(StatusBit::Start) {
            warn!("chip still in maintenance after firmware update");
            Ok(BootState::Maintenance)
        } else {
            Ok(BootState::Application)
        }
    }
}
