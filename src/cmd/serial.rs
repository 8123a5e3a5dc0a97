// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The serial-code command.

use crate::cmd;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// A [`CommandId::SerialCodeGet`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SerialCodeRequest;

impl cmd::Request for SerialCodeRequest {
    const ID: CommandId = CommandId::SerialCodeGet;
}

impl ToWire for SerialCodeRequest {
    fn to_wire<W: Write>(&self, _: W) -> Result<(), wire::Error> {
        Ok(())
    }
}

/// The [`CommandId::SerialCodeGet`] response.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SerialCodeResponse {
    /// The chip's 32-byte serial code.
    pub code: [u8; 32],
}

impl SerialCodeResponse {
    /// Parses a result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        cmd::general_result(result)?;
        // Three bytes of padding, then the code.
        check!(data.len() == 3 + 32, wire::Error::OutOfRange);
        let mut code = [0; 32];
        code.copy_from_slice(&data[3..]);
        Ok(Self { code })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test_util::cmd_bytes;

    #[test]
    fn request_bytes() {
        assert_eq!(cmd_bytes(&SerialCodeRequest), &[0xa0]);
    }

    #[test]
    fn response_parses() {
        let mut data = vec![0, 0, 0];
        data.extend_from_slice(&[0x09; 32]);
        assert_eq!(
            SerialCodeResponse::parse(0xc3, &data).unwrap().code,
            [0x09; 32]
        );
    }
}
