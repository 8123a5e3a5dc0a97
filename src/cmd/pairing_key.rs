// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pairing-key slot management.
//!
//! The chip holds four X25519 public keys, one per pairing slot; each
//! handshake is authenticated by the slot the host chooses. Slots move
//! through three states: blank, written, and invalidated. Invalidation is
//! permanent, which is why reads surface the slot state as a value rather
//! than an error.

use crate::cmd;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;

/// Result code: the slot has never been written.
const RES_SLOT_BLANK: u8 = 0x15;

/// Result code: the slot has been permanently invalidated.
const RES_SLOT_INVALID: u8 = 0x16;

/// A [`CommandId::PairingKeyWrite`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WriteRequest {
    /// The target slot, in `0..4`.
    pub slot: u8,
    /// The X25519 public key to install.
    pub key: [u8; 32],
}

impl cmd::Request for WriteRequest {
    const ID: CommandId = CommandId::PairingKeyWrite;
}

impl ToWire for WriteRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot as u16)?;
        w.write_le(0u8)?; // padding
        w.write_bytes(&self.key)?;
        Ok(())
    }
}

/// A [`CommandId::PairingKeyRead`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ReadRequest {
    /// The slot to read, in `0..4`.
    pub slot: u8,
}

impl cmd::Request for ReadRequest {
    const ID: CommandId = CommandId::PairingKeyRead;
}

impl ToWire for ReadRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot as u16)?;
        Ok(())
    }
}

/// A [`CommandId::PairingKeyInvalidate`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InvalidateRequest {
    /// The slot to invalidate, in `0..4`.
    pub slot: u8,
}

impl cmd::Request for InvalidateRequest {
    const ID: CommandId = CommandId::PairingKeyInvalidate;
}

impl ToWire for InvalidateRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot as u16)?;
        Ok(())
    }
}

/// The state of a pairing-key slot, as reported by a read.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlotState {
    /// The slot holds this public key.
    Written([u8; 32]),
    /// The slot has never been written.
    Blank,
    /// The slot has been permanently invalidated.
    Invalidated,
}

impl SlotState {
    /// Parses a [`CommandId::PairingKeyRead`] result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        match result {
            RES_SLOT_BLANK => return Ok(Self::Blank),
            RES_SLOT_INVALID => return Ok(Self::Invalidated),
            _ => cmd::general_result(result)?,
        }

        // Three bytes of padding, then the key.
        check!(data.len() == 3 + 32, wire::Error::OutOfRange);
        let mut key = [0; 32];
        key.copy_from_slice(&data[3..]);
        Ok(Self::Written(key))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd::test_util::cmd_bytes;

    #[test]
    fn write_bytes() {
        let mut expected = vec![0x10, 0x01, 0x00, 0x00];
        expected.extend_from_slice(&[0xff; 32]);
        assert_eq!(
            cmd_bytes(&WriteRequest {
                slot: 1,
                key: [0xff; 32]
            }),
            expected
        );
    }

    #[test]
    fn read_bytes() {
        assert_eq!(cmd_bytes(&ReadRequest { slot: 1 }), &[0x11, 0x01, 0x00]);
    }

    #[test]
    fn invalidate_bytes() {
        assert_eq!(
            cmd_bytes(&InvalidateRequest { slot: 2 }),
            &[0x12, 0x02, 0x00]
        );
    }

    #[test]
    fn read_states() {
        let mut data = vec![0, 0, 0];
        data.extend_from_slice(&[0xab; 32]);
        assert_eq!(
            SlotState::parse(0xc3, &data).unwrap(),
            SlotState::Written([0xab; 32])
        );
        assert_eq!(SlotState::parse(0x15, &[]).unwrap(), SlotState::Blank);
        assert_eq!(
            SlotState::parse(0x16, &[]).unwrap(),
            SlotState::Invalidated
        );
    }

    #[test]
    fn read_rejects_short_payload() {
        assert!(SlotState::parse(0xc3, &[0; 10]).is_err());
    }
}
