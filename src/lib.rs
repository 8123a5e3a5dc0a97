// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! `basilisk` is a host-side driver stack for a discrete secure-element
//! chip attached over a SPI bus.
//!
//! The stack is split into the three layers the chip's datasheet uses:
//! - [`l1`] clocks length-bounded, CRC-protected frames across the bus and
//!   polls for the chip's readiness indicator.
//! - [`l2`] is a typed request/response protocol on top of [`l1`], used for
//!   chip discovery, the session handshake, firmware update and mode
//!   transitions. Large responses arrive as multiple chunks.
//! - [`l3`] is the encrypted session layer: an X25519 handshake derives a
//!   pair of directional AES-256-GCM keys, after which commands travel as
//!   sequence-numbered, length-framed ciphertexts.
//!
//! On top of these sits [`Chip`], the per-device context. It owns the I/O
//! buffer and session state, and exposes one typed method per chip command
//! (key generation, signing, key-based memory access, firmware update, and
//! so on).
//!
//! Platform integration happens through two capability traits: [`port::Port`]
//! for bus I/O, delays and randomness, and [`crypto::Crypto`] for the
//! session primitives. Software implementations of the crypto traits are
//! provided in [`crypto::soft`] behind the `soft-crypto` feature.
//!
//! # Feature flags
//!
//! - `std` (default) pulls in the full Rust standard library. Not needed
//!   for on-target use.
//! - `soft-crypto` (default) enables [`crypto::soft`], software crypto
//!   based on `ring` and `x25519-dalek`.
//! - `log` enables logging through the `log` crate; when disabled, log
//!   statements are compiled out entirely.

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod debug;

#[macro_use]
pub mod wire;

pub mod cert;
pub mod cmd;
pub mod crc16;
pub mod crypto;
pub mod io;
pub mod l1;
pub mod l2;
pub mod l3;
pub mod port;

mod chip;
mod fw;

pub use chip::BootState;
pub use chip::Chip;
pub use chip::Options;
pub use chip::Timeouts;

/// An error produced by some layer of the stack.
///
/// Each layer keeps its own closed error enum; this type is the sum a
/// [`Chip`] method can surface. Conversions from the per-layer enums are
/// provided so that `?` works across layer boundaries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// An error raised by the platform port.
    Port(port::Error),
    /// A transport-level (L1) error.
    Transport(l1::Error),
    /// A protocol-level (L2) error.
    Protocol(l2::Error),
    /// A secure-session (L3) error.
    Session(l3::Error),
    /// A certificate-store parsing error.
    Cert(cert::Error),
    /// A wire (de)serialization error.
    Wire(wire::Error),
    /// An argument was rejected before any I/O took place.
    Arg(cmd::ArgError),
    /// The chip reported a command-level failure.
    Chip(cmd::ChipError),
    /// A crypto provider failure.
    Crypto(crypto::Error),
}

/// A convenience alias for results produced by this crate.
pub type Result<T> = core::result::Result<T, Error>;

impl From<port::Error> for Error {
    fn from(e: port::Error) -> Self {
        Self::Port(e)
    }
}

impl From<l1::Error> for Error {
    fn from(e: l1::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<l2::Error> for Error {
    fn from(e: l2::Error) -> Self {
        Self::Protocol(e)
    }
}

impl From<l3::Error> for Error {
    fn from(e: l3::Error) -> Self {
        Self::Session(e)
    }
}

impl From<cert::Error> for Error {
    fn from(e: cert::Error) -> Self {
        Self::Cert(e)
    }
}

impl From<wire::Error> for Error {
    fn from(e: wire::Error) -> Self {
        Self::Wire(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Wire(wire::Error::Io(e))
    }
}

impl From<cmd::ArgError> for Error {
    fn from(e: cmd::ArgError) -> Self {
        Self::Arg(e)
    }
}

impl From<cmd::ChipError> for Error {
    fn from(e: cmd::ChipError) -> Self {
        Self::Chip(e)
    }
}

impl From<crypto::Error> for Error {
    fn from(e: crypto::Error) -> Self {
        Self::Crypto(e)
    }
}
