// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Typed chip commands: the payloads of the encrypted session.
//!
//! Every command is one encrypted L3 frame whose plaintext is
//! `cmd_id | payload`; every result's plaintext is `result | data`. This
//! module holds the command identifiers, the per-family request and
//! response structures, and the argument checks that run *before* any
//! I/O happens.
//!
//! Result bytes are namespaced per command: the general codes below are
//! shared, while the `0x10..=0x16` range means something different for
//! each command family and is interpreted by that family's parser. Where
//! a result encodes an ordinary, expected condition (an empty slot, an
//! exhausted counter), the parser returns it as a typed value rather than
//! an error, so that callers can build idempotent operations on top.

use crate::io::Cursor;
use crate::wire::ToWire;

pub mod config;
pub mod ecc;
pub mod mac_destroy;
pub mod mcounter;
pub mod pairing_key;
pub mod ping;
pub mod r_mem;
pub mod random;
pub mod serial;

wire_enum! {
    /// A command identifier: the first plaintext byte of an encrypted
    /// frame.
    pub enum CommandId: u8 {
        /// Echoes a message back from the chip.
        Ping = 0x01,
        /// Writes a host pairing public key into a slot.
        PairingKeyWrite = 0x10,
        /// Reads back a pairing-key slot.
        PairingKeyRead = 0x11,
        /// Permanently invalidates a pairing-key slot.
        PairingKeyInvalidate = 0x12,
        /// Writes a reprogrammable configuration register.
        RConfigWrite = 0x20,
        /// Reads a reprogrammable configuration register.
        RConfigRead = 0x21,
        /// Erases the whole reprogrammable configuration memory.
        RConfigErase = 0x22,
        /// Clears one bit of an irreversible configuration register.
        IConfigWrite = 0x30,
        /// Reads an irreversible configuration register.
        IConfigRead = 0x31,
        /// Writes a user-data slot.
        RMemWrite = 0x40,
        /// Reads a user-data slot.
        RMemRead = 0x41,
        /// Erases a user-data slot.
        RMemErase = 0x42,
        /// Draws random bytes from the chip's TRNG.
        RandomGet = 0x50,
        /// Generates a fresh ECC key in a slot.
        EccKeyGenerate = 0x60,
        /// Stores a caller-provided ECC key in a slot.
        EccKeyStore = 0x61,
        /// Reads the public half of an ECC key slot.
        EccKeyRead = 0x62,
        /// Erases an ECC key slot.
        EccKeyErase = 0x63,
        /// Signs a message digest with ECDSA (P-256).
        EcdsaSign = 0x70,
        /// Signs a message with EdDSA (Ed25519).
        EddsaSign = 0x71,
        /// Initializes a monotonic counter to a value.
        McounterInit = 0x80,
        /// Decrements a monotonic counter.
        McounterUpdate = 0x81,
        /// Reads a monotonic counter.
        McounterGet = 0x82,
        /// Computes a MAC over a nonce and destroys the slot's secret.
        MacAndDestroy = 0x90,
        /// Reads the chip's serial code.
        SerialCodeGet = 0xa0,
    }
}

/// The number of host pairing-key slots.
pub const PAIRING_SLOTS: u8 = 4;

/// The number of ECC key slots.
pub const ECC_SLOTS: u16 = 32;

/// The number of user-data (R-memory) slots.
pub const R_MEM_SLOTS: u16 = 512;

/// The maximum payload of one user-data slot, in bytes.
pub const R_MEM_DATA_MAX: usize = 444;

/// The number of monotonic counters.
pub const MCOUNTERS: u16 = 16;

/// The number of MAC-and-destroy slots.
pub const MACANDD_SLOTS: u16 = 128;

/// The maximum message length accepted by [`CommandId::Ping`].
pub const PING_MAX: usize = crate::l3::MAX_CMD_DATA;

/// The maximum message length accepted by [`CommandId::EddsaSign`].
pub const EDDSA_MSG_MAX: usize = 4096;

/// The maximum number of bytes one [`CommandId::RandomGet`] can return.
pub const RANDOM_MAX: usize = 255;

/// An argument rejected before any I/O took place.
///
/// When one of these is returned, the chip state is untouched: nothing
/// was clocked onto the bus and no counter advanced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArgError {
    /// A slot or counter index was out of its documented range.
    SlotOutOfRange,
    /// A buffer length was out of its documented range.
    LengthOutOfRange,
    /// The requested curve is not supported by this command.
    UnsupportedCurve,
}

/// A command-level failure reported by the chip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChipError {
    /// The chip reported an unspecified command failure.
    Failed,
    /// The session's pairing key is not authorized for this command.
    Unauthorized,
    /// The chip did not recognize the command.
    InvalidCommand,
    /// A user-data write failed because the slot is already written.
    WriteFailed,
    /// A user-data slot has reached its write-cycle limit.
    SlotExpired,
    /// The addressed key slot holds no usable key.
    InvalidKey,
    /// A monotonic counter detected tampering and locked itself.
    CounterInvalid,
}

/// General result codes, shared by every command.
pub(crate) mod result {
    /// The command executed successfully.
    pub const OK: u8 = 0xc3;
    /// The command failed.
    pub const FAIL: u8 = 0x3c;
    /// The session's pairing key lacks the required rights.
    pub const UNAUTHORIZED: u8 = 0x01;
    /// The command identifier or shape was invalid.
    pub const INVALID_CMD: u8 = 0x02;
}

/// Maps a result byte through the general code table.
///
/// Family parsers intercept their namespaced codes first and fall back to
/// this for everything else.
pub(crate) fn general_result(result: u8) -> Result<(), crate::Error> {
    match result {
        result::OK => Ok(()),
        result::UNAUTHORIZED => Err(trace!(ChipError::Unauthorized.into())),
        result::INVALID_CMD => Err(trace!(ChipError::InvalidCommand.into())),
        _ => Err(trace!(ChipError::Failed.into())),
    }
}

/// An L3 command request: a command identifier plus a serializable
/// payload.
pub trait Request: ToWire {
    /// The command identifier prefixed to the payload.
    const ID: CommandId;
}

/// Serializes `cmd_id | payload` into `buf`, returning the plaintext
/// length.
pub(crate) fn serialize<R: Request>(
    req: &R,
    buf: &mut [u8],
) -> Result<usize, crate::Error> {
    let mut cursor = Cursor::new(buf);
    R::ID.to_wire(&mut cursor)?;
    req.to_wire(&mut cursor)?;
    Ok(cursor.consumed_len())
}
