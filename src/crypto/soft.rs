// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Software implementations of the crypto traits.
//!
//! SHA-256, HKDF and AES-256-GCM are provided by [`ring`]; X25519 is
//! provided by `x25519-dalek`, since `ring`'s agreement API cannot operate
//! on caller-supplied scalars, which the pairing-key model requires.
//!
//! Requires the `soft-crypto` feature flag to be enabled.

use ring::aead;
use ring::digest;
use ring::hkdf;

use crate::crypto;
use crate::crypto::Error;

/// A software implementation of [`crypto::Crypto`].
///
/// The only state it carries is an in-progress SHA-256 digest.
#[derive(Default)]
pub struct Soft {
    digest: Option<digest::Context>,
}

impl Soft {
    /// Creates a new, idle `Soft` engine.
    pub fn new() -> Self {
        Self::default()
    }
}

impl crypto::Sha256 for Soft {
    fn start(&mut self) -> Result<(), Error> {
        self.digest = Some(digest::Context::new(&digest::SHA256));
        Ok(())
    }

    fn update(&mut self, data: &[u8]) -> Result<(), Error> {
        self.digest
            .as_mut()
            .ok_or(Error::Idle)?
            .update(data);
        Ok(())
    }

    fn finish(
        &mut self,
        out: &mut [u8; crypto::DIGEST_LEN],
    ) -> Result<(), Error> {
        let ctx = self.digest.take().ok_or(Error::Idle)?;
        out.copy_from_slice(ctx.finish().as_ref());
        Ok(())
    }
}

struct OkmLen(usize);

impl hkdf::KeyType for OkmLen {
    fn len(&self) -> usize {
        self.0
    }
}

impl crypto::Hkdf for Soft {
    fn hkdf(
        &mut self,
        salt: &[u8],
        ikm: &[u8],
        okm: &mut [u8],
    ) -> Result<(), Error> {
        let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, salt);
        let prk = salt.extract(ikm);
        let out = prk
            .expand(&[], OkmLen(okm.len()))
            .map_err(|_| Error::Unspecified)?;
        out.fill(okm).map_err(|_| Error::Unspecified)
    }
}

fn gcm_key(key: &[u8; crypto::KEY_LEN]) -> Result<aead::LessSafeKey, Error> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| Error::Unspecified)?;
    Ok(aead::LessSafeKey::new(unbound))
}

impl crypto::Aead for Soft {
    fn seal(
        &mut self,
        key: &[u8; crypto::KEY_LEN],
        nonce: &[u8; crypto::NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
        plain_len: usize,
    ) -> Result<(), Error> {
        if buf.len() < plain_len + crypto::TAG_LEN {
            return Err(Error::Unspecified);
        }

        let key = gcm_key(key)?;
        let nonce = aead::Nonce::assume_unique_for_key(*nonce);
        let (text, rest) = buf.split_at_mut(plain_len);
        let tag = key
            .seal_in_place_separate_tag(nonce, aead::Aad::from(aad), text)
            .map_err(|_| Error::Unspecified)?;
        rest[..crypto::TAG_LEN].copy_from_slice(tag.as_ref());
        Ok(())
    }

    fn open(
        &mut self,
        key: &[u8; crypto::KEY_LEN],
        nonce: &[u8; crypto::NONCE_LEN],
        aad: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, Error> {
        if buf.len() < crypto::TAG_LEN {
            return Err(Error::BadTag);
        }

        let key = gcm_key(key)?;
        let nonce = aead::Nonce::assume_unique_for_key(*nonce);
        let plain = key
            .open_in_place(nonce, aead::Aad::from(aad), buf)
            .map_err(|_| Error::BadTag)?;
        Ok(plain.len())
    }
}

impl crypto::X25519 for Soft {
    fn x25519(
        &mut self,
        secret: &[u8; crypto::KEY_LEN],
        public: &[u8; crypto::KEY_LEN],
    ) -> Result<[u8; crypto::KEY_LEN], Error> {
        let secret = x25519_dalek::StaticSecret::from(*secret);
        let public = x25519_dalek::PublicKey::from(*public);
        Ok(*secret.diffie_hellman(&public).as_bytes())
    }

    fn x25519_public(
        &mut self,
        secret: &[u8; crypto::KEY_LEN],
    ) -> Result<[u8; crypto::KEY_LEN], Error> {
        let secret = x25519_dalek::StaticSecret::from(*secret);
        Ok(*x25519_dalek::PublicKey::from(&secret).as_bytes())
    }
}
