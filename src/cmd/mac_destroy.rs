// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The MAC-and-Destroy command.
//!
//! Each of the [`cmd::MACANDD_SLOTS`] slots holds a one-shot secret: the
//! chip MACs the caller's 32-byte nonce with it and destroys the secret
//! in the same operation, the building block for PIN-verification schemes
//! with a hardware-enforced attempt limit.

use crate::cmd;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// A [`CommandId::MacAndDestroy`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MacAndDestroyRequest {
    /// The slot whose secret is consumed, in `0..128`.
    pub slot: u16,
    /// The nonce to MAC.
    pub data: [u8; 32],
}

impl cmd::Request for MacAndDestroyRequest {
    const ID: CommandId = CommandId::MacAndDestroy;
}

impl ToWire for MacAndDestroyRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        w.write_le(0u8)?; // padding
        w.write_bytes(&self.data)?;
        Ok(())
    }
}

/// The [`CommandId::MacAndDestroy`] response.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MacAndDestroyResponse {
    /// The MAC over the request's nonce.
    pub mac: [u8; 32],
}

impl MacAndDestroyResponse {
    /// Parses a result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        cmd::general_result(result)?;
        // Three bytes of padding, then the MAC.
        check!(data.len() == 3 + 32, wire::Error::OutOfRange);
        let mut mac = [0; 32];
        mac.copy_from_slice(&data[3..]);
        Ok(Self { mac })
    }
}
