// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Monotonic-counter commands.
//!
//! Each of the [`cmd::MCOUNTERS`] counters counts *down*: it is
//! initialized to a value and decremented by one per update until it
//! reaches zero. Hitting zero is the expected end of a counter's life and
//! surfaces as [`UpdateResponse::Exhausted`]; a counter that has locked
//! itself after detecting tampering is an error and must be
//! reinitialized.

use crate::cmd;
use crate::cmd::ChipError;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// Result code on update: the counter is already at zero.
const RES_UPDATE_ERR: u8 = 0x13;

/// Result code: the counter detected an attack and is locked.
const RES_COUNTER_INVALID: u8 = 0x14;

/// A [`CommandId::McounterInit`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InitRequest {
    /// The counter index, in `0..16`.
    pub index: u16,
    /// The starting value.
    pub value: u32,
}

impl cmd::Request for InitRequest {
    const ID: CommandId = CommandId::McounterInit;
}

impl ToWire for InitRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.index)?;
        w.write_le(0u8)?; // padding
        w.write_le(self.value)?;
        Ok(())
    }
}

/// A [`CommandId::McounterUpdate`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UpdateRequest {
    /// The counter index, in `0..16`.
    pub index: u16,
}

impl cmd::Request for UpdateRequest {
    const ID: CommandId = CommandId::McounterUpdate;
}

impl ToWire for UpdateRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.index)?;
        Ok(())
    }
}

/// The outcome of a [`CommandId::McounterUpdate`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UpdateResponse {
    /// The counter was decremented.
    Updated,
    /// The counter is already at zero.
    Exhausted,
}

impl UpdateResponse {
    /// Parses a result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        match result {
            RES_UPDATE_ERR => return Ok(Self::Exhausted),
            RES_COUNTER_INVALID => {
                return Err(trace!(ChipError::CounterInvalid.into()))
            }
            _ => cmd::general_result(result)?,
        }
        check!(data.is_empty(), wire::Error::OutOfRange);
        Ok(Self::Updated)
    }
}

/// A [`CommandId::McounterGet`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GetRequest {
    /// The counter index, in `0..16`.
    pub index: u16,
}

impl cmd::Request for GetRequest {
    const ID: CommandId = CommandId::McounterGet;
}

impl ToWire for GetRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.index)?;
        Ok(())
    }
}

/// The [`CommandId::McounterGet`] response.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GetResponse {
    /// The counter's current value.
    pub value: u32,
}

impl GetResponse {
    /// Parses a result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        match result {
            RES_COUNTER_INVALID => {
                return Err(trace!(ChipError::CounterInvalid.into()))
            }
            _ => cmd::general_result(result)?,
        }

        // Three bytes of padding, then the value.
        check!(data.len() == 3 + 4, wire::Error::OutOfRange);
        let value = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
        Ok(Self { value })
    }
}
