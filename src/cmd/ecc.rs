// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! ECC key-slot commands: generate, store, read, erase, and the two
//! signing operations.
//!
//! Each of the [`cmd::ECC_SLOTS`] slots holds one private key on either
//! the P-256 or Ed25519 curve; private keys never leave the chip. ECDSA
//! signs a caller-provided 32-byte digest, EdDSA signs the message
//! itself. Reading or signing with a blank or damaged slot reports
//! "invalid key": for reads that is an ordinary condition
//! ([`KeyReadResponse::Empty`], so erase/read make idempotent loops), for
//! signing it is an error.

use crate::cmd;
use crate::cmd::ChipError;
use crate::cmd::CommandId;
use crate::io::Write;
use crate::wire;
use crate::wire::ToWire;
use crate::wire::WireEnum as _;

/// Result code: the slot holds no usable key.
const RES_INVALID_KEY: u8 = 0x12;

wire_enum! {
    /// An ECC curve supported by the key slots.
    pub enum Curve: u8 {
        /// NIST P-256, used by [`CommandId::EcdsaSign`].
        P256 = 0x01,
        /// Ed25519, used by [`CommandId::EddsaSign`].
        Ed25519 = 0x02,
    }
}

wire_enum! {
    /// How a key came to be in its slot.
    pub enum KeyOrigin: u8 {
        /// Generated on-chip by [`CommandId::EccKeyGenerate`].
        Generated = 0x01,
        /// Imported by [`CommandId::EccKeyStore`].
        Stored = 0x02,
    }
}

/// A [`CommandId::EccKeyGenerate`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeyGenerateRequest {
    /// The target slot, in `0..32`.
    pub slot: u16,
    /// The curve of the generated key.
    pub curve: Curve,
}

impl cmd::Request for KeyGenerateRequest {
    const ID: CommandId = CommandId::EccKeyGenerate;
}

impl ToWire for KeyGenerateRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        self.curve.to_wire(&mut w)?;
        Ok(())
    }
}

/// A [`CommandId::EccKeyStore`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeyStoreRequest {
    /// The target slot, in `0..32`.
    pub slot: u16,
    /// The curve the key lives on.
    pub curve: Curve,
    /// The raw private key.
    pub key: [u8; 32],
}

impl cmd::Request for KeyStoreRequest {
    const ID: CommandId = CommandId::EccKeyStore;
}

impl ToWire for KeyStoreRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        self.curve.to_wire(&mut w)?;
        w.write_bytes(&[0; 12])?; // padding
        w.write_bytes(&self.key)?;
        Ok(())
    }
}

/// A [`CommandId::EccKeyRead`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeyReadRequest {
    /// The slot to read, in `0..32`.
    pub slot: u16,
}

impl cmd::Request for KeyReadRequest {
    const ID: CommandId = CommandId::EccKeyRead;
}

impl ToWire for KeyReadRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        Ok(())
    }
}

/// A [`CommandId::EccKeyErase`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KeyEraseRequest {
    /// The slot to erase, in `0..32`.
    pub slot: u16,
}

impl cmd::Request for KeyEraseRequest {
    const ID: CommandId = CommandId::EccKeyErase;
}

impl ToWire for KeyEraseRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        Ok(())
    }
}

/// A public key read back from a slot.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PubKey {
    /// An uncompressed P-256 point, `x || y`.
    P256([u8; 64]),
    /// An Ed25519 public key.
    Ed25519([u8; 32]),
}

/// The outcome of a [`CommandId::EccKeyRead`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyReadResponse {
    /// The slot holds a key with this public half.
    Key {
        /// How the key came to be in the slot.
        origin: KeyOrigin,
        /// The public key.
        pubkey: PubKey,
    },
    /// The slot holds no usable key.
    Empty,
}

impl KeyReadResponse {
    /// Parses a result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        match result {
            RES_INVALID_KEY => return Ok(Self::Empty),
            _ => cmd::general_result(result)?,
        }

        // curve | origin | padding[13] | pubkey.
        check!(data.len() >= 15, wire::Error::OutOfRange);
        let curve = Curve::from_wire_value(data[0])
            .ok_or(wire::Error::OutOfRange)?;
        let origin = KeyOrigin::from_wire_value(data[1])
            .ok_or(wire::Error::OutOfRange)?;
        let key = &data[15..];

        let pubkey = match curve {
            Curve::P256 => {
                check!(key.len() == 64, wire::Error::OutOfRange);
                let mut out = [0; 64];
                out.copy_from_slice(key);
                PubKey::P256(out)
            }
            Curve::Ed25519 => {
                check!(key.len() == 32, wire::Error::OutOfRange);
                let mut out = [0; 32];
                out.copy_from_slice(key);
                PubKey::Ed25519(out)
            }
        };
        Ok(Self::Key { origin, pubkey })
    }
}

/// A [`CommandId::EcdsaSign`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EcdsaSignRequest {
    /// The slot holding a P-256 key, in `0..32`.
    pub slot: u16,
    /// The SHA-256 digest of the message.
    pub digest: [u8; 32],
}

impl cmd::Request for EcdsaSignRequest {
    const ID: CommandId = CommandId::EcdsaSign;
}

impl ToWire for EcdsaSignRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        w.write_bytes(&[0; 13])?; // padding
        w.write_bytes(&self.digest)?;
        Ok(())
    }
}

/// A [`CommandId::EddsaSign`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EddsaSignRequest<'a> {
    /// The slot holding an Ed25519 key, in `0..32`.
    pub slot: u16,
    /// The message to sign; between 1 and [`cmd::EDDSA_MSG_MAX`] bytes.
    pub msg: &'a [u8],
}

impl cmd::Request for EddsaSignRequest<'_> {
    const ID: CommandId = CommandId::EddsaSign;
}

impl ToWire for EddsaSignRequest<'_> {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_le(self.slot)?;
        w.write_bytes(&[0; 13])?; // padding
        w.write_bytes(self.msg)?;
        Ok(())
    }
}

/// A 64-byte signature returned by either signing command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SignResponse {
    /// The signature, `r || s` for ECDSA and `R || S` for EdDSA.
    pub sig: [u8; 64],
}

impl SignResponse {
    /// Parses a result plaintext.
    pub(crate) fn parse(result: u8, data: &[u8]) -> Result<Self, crate::Error> {
        match result {
            RES_INVALID_KEY => {
                return Err(trace!(ChipError::InvalidKey.into()))
            }
            _ => cmd::general_result(result)?,
        }

        // padding[15] | r[32] | s[32].
        check!(data.len() == 15 + 64, wire::Error::OutOfRange);
        let mut sig = [0; 64];
        sig.copy_from_slice(&data[15..]);
        Ok(Self { sig })
    }
}
