// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Pluggable cryptography traits.
//!
//! The secure-session layer requires four primitives to function: streaming
//! SHA-256, HKDF-SHA256, AES-256-GCM, and X25519. This module provides
//! object-safe traits that abstract over those operations.
//!
//! Integrations are expected to provide their own implementations of these
//! traits, which may suit particular hardware or certification needs that
//! this crate cannot fulfill. A software implementation is provided under
//! the [`soft`] module, controlled by the `soft-crypto` feature flag.
//!
//! It is recommended to not import the traits in this module directly;
//! instead, use imports like `use basilisk::crypto;` and partially-qualified
//! names like `crypto::Sha256`.

use static_assertions::assert_obj_safe;

#[cfg(feature = "soft-crypto")]
pub mod soft;

/// The length of an AES-256 or X25519 key, in bytes.
pub const KEY_LEN: usize = 32;

/// The length of a SHA-256 digest, in bytes.
pub const DIGEST_LEN: usize = 32;

/// The length of an AES-GCM nonce, in bytes.
pub const NONCE_LEN: usize = 12;

/// The length of an AES-GCM authentication tag, in bytes.
pub const TAG_LEN: usize = 16;

/// An error returned by a crypto operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates that a hashing engine was idle, but a write or finish
    /// operation was requested.
    Idle,

    /// Indicates that an AEAD tag did not verify.
    BadTag,

    /// Indicates an unspecified, internal error.
    Unspecified,
}

/// A streaming SHA-256 engine, which maintains the state for one digest.
pub trait Sha256 {
    /// Begins a new hashing operation, discarding any previous state.
    fn start(&mut self) -> Result<(), Error>;

    /// Adds `data` to the hashing state.
    fn update(&mut self, data: &[u8]) -> Result<(), Error>;

    /// Completes the hashing operation, leaving the engine idle again.
    fn finish(&mut self, out: &mut [u8; DIGEST_LEN]) -> Result<(), Error>;
}
assert_obj_safe!(Sha256);

/// An HKDF-SHA256 engine.
pub trait Hkdf {
    /// Derives `okm.len()` bytes of key material from `ikm`, salted with
    /// `salt`, with an empty info string.
    ///
    /// The stack never needs more than 64 bytes of output at once, and
    /// implementations may reject longer requests.
    fn hkdf(
        &mut self,
        salt: &[u8],
        ikm: &[u8],
        okm: &mut [u8],
    ) -> Result<(), Error>;
}
assert_obj_safe!(Hkdf);

/// An AES-256-GCM engine.
///
/// Both operations work in place, with the tag kept separate from the
/// text so that callers can frame the two independently.
pub trait Aead {
    /// Encrypts `buf[..plain_len]` in place and appends the tag.
    ///
    /// On success, `buf[..plain_len]` holds the ciphertext and
    /// `buf[plain_len..plain_len + TAG_LEN]` holds the tag; `buf` must be
    /// at least `plain_len + TAG_LEN` bytes long.
    fn seal(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
        plain_len: usize,
    ) -> Result<(), Error>;

    /// Decrypts `buf`, interpreted as `ciphertext || tag`, in place.
    ///
    /// Returns the plaintext length (`buf.len() - TAG_LEN`); on success
    /// `buf[..len]` holds the plaintext. Fails with [`Error::BadTag`] if
    /// the tag does not verify, in which case the contents of `buf` are
    /// unspecified.
    fn open(
        &mut self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, Error>;
}
assert_obj_safe!(Aead);

/// An X25519 engine.
///
/// Implementations must be constant-time with respect to `secret`.
pub trait X25519 {
    /// Computes the shared secret between `secret` and `public`.
    fn x25519(
        &mut self,
        secret: &[u8; KEY_LEN],
        public: &[u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], Error>;

    /// Computes the public key corresponding to `secret`.
    fn x25519_public(
        &mut self,
        secret: &[u8; KEY_LEN],
    ) -> Result<[u8; KEY_LEN], Error>;
}
assert_obj_safe!(X25519);

/// The full capability set consumed by the secure-session layer.
///
/// This trait is blanket-implemented for any type providing all four
/// primitives; integrations implement the individual traits.
pub trait Crypto: Sha256 + Hkdf + Aead + X25519 {}

impl<C: Sha256 + Hkdf + Aead + X25519> Crypto for C {}
