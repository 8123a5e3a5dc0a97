// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The `RandomGet` command: random bytes from the chip's TRNG.

use crate::cmd;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// A [`CommandId::RandomGet`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GetRequest {
    /// How many bytes to draw; at most [`cmd::RANDOM_MAX`].
    pub n: u8,
}

impl cmd::Request for GetRequest {
    const ID: CommandId = CommandId::RandomGet;
}

impl ToWire for GetRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.n)?;
        Ok(())
    }
}

/// The [`CommandId::RandomGet`] response.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GetResponse<'wire> {
    /// The random bytes.
    pub bytes: &'wire [u8],
}

impl<'wire> GetResponse<'wire> {
    /// Parses a result plaintext; `n` is the requested byte count.
    pub(crate) fn parse(
        result: u8,
        data: &'wire [u8],
        n: u8,
    ) -> Result<Self, crate::Error> {
        cmd::general_result(result)?;
        // Three bytes of padding, then exactly the requested bytes.
        check!(data.len() == 3 + n as usize, wire::Error::OutOfRange);
        Ok(Self { bytes: &data[3..] })
    }
}
