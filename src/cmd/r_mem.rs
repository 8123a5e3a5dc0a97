// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! User-data (R-memory) commands.
//!
//! The chip offers [`cmd::R_MEM_SLOTS`] general-purpose data slots of up
//! to [`cmd::R_MEM_DATA_MAX`] bytes each. A slot must be erased before it
//! can be written again; reading a blank slot is an ordinary condition
//! and surfaces as [`ReadResponse::Empty`], and erasing any slot is
//! idempotent.
//!
//! The `0x10`/`0x11` result codes are namespaced: on a write they mean
//! "already written" and "write cycles exhausted", while on a read `0x10`
//! means the slot is blank.

use crate::cmd;
use crate::cmd::ChipError;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// Result code on write: the slot is already written.
const RES_WRITE_FAILED: u8 = 0x10;

/// Result code on write: the slot's write-cycle budget is exhausted.
const RES_SLOT_EXPIRED: u8 = 0x11;

/// Result code on read: the slot is blank.
const RES_SLOT_EMPTY: u8 = 0x10;

/// A [`CommandId::RMemWrite`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WriteRequest<'a> {
    /// The target slot, in `0..512`.
    pub slot: u16,
    /// The data to store; at most [`cmd::R_MEM_DATA_MAX`] bytes.
    pub data: &'a [u8],
}

impl cmd::Request for WriteRequest<'_> {
    const ID: CommandId = CommandId::RMemWrite;
}

impl ToWire for WriteRequest<'_> {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        w.write_le(0u8)?; // padding
        w.write_bytes(self.data)?;
        Ok(())
    }
}

/// Parses a [`CommandId::RMemWrite`] result plaintext.
pub(crate) fn parse_write(result: u8, data: &[u8]) -> Result<(), crate::Error> {
    match result {
        RES_WRITE_FAILED => return Err(trace!(ChipError::WriteFailed.into())),
        RES_SLOT_EXPIRED => return Err(trace!(ChipError::SlotExpired.into())),
        _ => cmd::general_result(result)?,
    }
    check!(data.is_empty(), wire::Error::OutOfRange);
    Ok(())
}

/// A [`CommandId::RMemRead`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ReadRequest {
    /// The slot to read, in `0..512`.
    pub slot: u16,
}

impl cmd::Request for ReadRequest {
    const ID: CommandId = CommandId::RMemRead;
}

impl ToWire for ReadRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        Ok(())
    }
}

/// The outcome of a [`CommandId::RMemRead`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReadResponse<'wire> {
    /// The slot holds this data.
    Data(&'wire [u8]),
    /// The slot is blank.
    Empty,
}

impl<'wire> ReadResponse<'wire> {
    /// Parses a result plaintext.
    pub(crate) fn parse(
        result: u8,
        data: &'wire [u8],
    ) -> Result<Self, crate::Error> {
        match result {
            RES_SLOT_EMPTY => return Ok(Self::Empty),
            _ => cmd::general_result(result)?,
        }

        // Three bytes of padding, then the slot contents.
        check!(data.len() >= 3, wire::Error::OutOfRange);
        check!(data.len() <= 3 + cmd::R_MEM_DATA_MAX, wire::Error::OutOfRange);
        Ok(Self::Data(&data[3..]))
    }
}

/// A [`CommandId::RMemErase`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EraseRequest {
    /// The slot to erase, in `0..512`.
    pub slot: u16,
}

impl cmd::Request for EraseRequest {
    const ID: CommandId = CommandId::RMemErase;
}

impl ToWire for EraseRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        Ok(())
    }
}
