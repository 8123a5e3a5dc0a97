// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The `Ping` command: an encrypted echo, useful for checking that a
//! session is alive and that both counters are in step.

use crate::cmd;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// A [`CommandId::Ping`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PingRequest<'a> {
    /// The message to echo; at most [`cmd::PING_MAX`] bytes.
    pub msg: &'a [u8],
}

impl cmd::Request for PingRequest<'_> {
    const ID: CommandId = CommandId::Ping;
}

impl ToWire for PingRequest<'_> {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_bytes(self.msg)?;
        Ok(())
    }
}

/// The [`CommandId::Ping`] response.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PingResponse<'wire> {
    /// The echoed message.
    pub echo: &'wire [u8],
}

impl<'wire> PingResponse<'wire> {
    /// Parses a result plaintext.
    pub(crate) fn parse(
        result: u8,
        data: &'wire [u8],
    ) -> Result<Self, crate::Error> {
        cmd::general_result(result)?;
        Ok(Self { echo: data })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test_util::cmd_bytes;

    #[test]
    fn request_bytes() {
        assert_eq!(
            cmd_bytes(&PingRequest {
                msg: &[0x01, 0x02, 0x03]
            }),
            &[0x01, 0x01, 0x02, 0x03]
        );
    }

    #[test]
    fn empty_request_bytes() {
        assert_eq!(cmd_bytes(&PingRequest { msg: &[] }), &[0x01]);
    }

    #[test]
    fn response_parses() {
        let resp = PingResponse::parse(0xc3, b"pong").unwrap();
        assert_eq!(resp.echo, b"pong");
    }

    #[test]
    fn response_rejects_failure() {
        assert_eq!(
            PingResponse::parse(0x3c, &[]),
            Err(crate::Error::Chip(cmd::ChipError::Failed))
        );
        assert_eq!(
            PingResponse::parse(0x01, &[]),
            Err(crate::Error::Chip(cmd::ChipError::Unauthorized))
        );
    }
}
