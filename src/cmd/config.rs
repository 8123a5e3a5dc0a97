// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Configuration-memory commands.
//!
//! The chip has two configuration memories holding the same register
//! layout: the reprogrammable R-config, which can be rewritten after an
//! erase, and the irreversible I-config, whose bits can only ever be
//! cleared (a fuse model; [`IConfigWriteRequest`] clears exactly one bit
//! per invocation). Registers are addressed by a 16-bit address and hold
//! 32 bits.

use crate::cmd;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// A [`CommandId::RConfigWrite`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RConfigWriteRequest {
    /// The register address.
    pub addr: u16,
    /// The value to write.
    pub value: u32,
}

impl cmd::Request for RConfigWriteRequest {
    const ID: CommandId = CommandId::RConfigWrite;
}

impl ToWire for RConfigWriteRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.addr)?;
        w.write_le(0u8)?; // padding
        w.write_le(self.value)?;
        Ok(())
    }
}

/// A [`CommandId::RConfigRead`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RConfigReadRequest {
    /// The register address.
    pub addr: u16,
}

impl cmd::Request for RConfigReadRequest {
    const ID: CommandId = CommandId::RConfigRead;
}

impl ToWire for RConfigReadRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.addr)?;
        Ok(())
    }
}

/// A [`CommandId::RConfigErase`] request, wiping the whole R-config.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RConfigEraseRequest;

impl cmd::Request for RConfigEraseRequest {
    const ID: CommandId = CommandId::RConfigErase;
}

impl ToWire for RConfigEraseRequest {
    fn to_wire<W: Write>(&self, _: W) -> Result<(), wire::Error> {
        Ok(())
    }
}

/// A [`CommandId::IConfigWrite`] request: clears bit `bit_index` of the
/// addressed register, irreversibly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IConfigWriteRequest {
    /// The register address.
    pub addr: u16,
    /// Which bit to clear, in `0..32`.
    pub bit_index: u8,
}

impl cmd::Request for IConfigWriteRequest {
    const ID: CommandId = CommandId::IConfigWrite;
}

impl ToWire for IConfigWriteRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.addr)?;
        w.write_le(self.bit_index)?;
        Ok(())
    }
}

/// A [`CommandId::IConfigRead`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct IConfigReadRequest {
    /// The register address.
    pub addr: u16,
}

impl cmd::Request for IConfigReadRequest {
    const ID: CommandId = CommandId::IConfigRead;
}

impl ToWire for IConfigReadRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.addr)?;
        Ok(())
    }
}

/// A 32-bit register value returned by either config read.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ValueResponse {
    /// The register contents.
    pub value: u32,
}

impl ValueResponse {
    /// Parses a config-read result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        cmd::general_result(result)?;
        // Three bytes of padding, then the value.
        check!(data.len() == 3 + 4, wire::Error::OutOfRange);
        let value = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
        Ok(Self { value })
    }
}
