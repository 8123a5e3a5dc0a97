// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The L3 secure session.
//!
//! A session is established by an X25519 handshake authenticated by one of
//! the four host pairing keys and the chip's static key (learned from its
//! device certificate). The handshake transcript is hashed and chained
//! through HKDF, Noise-style, into two directional AES-256-GCM keys:
//! `k_cmd` protects host-to-chip commands, `k_res` protects chip-to-host
//! results.
//!
//! Every encrypted frame is `len (u16 LE) | ciphertext | tag`, where the
//! nonce is the 96-bit little-endian encoding of that direction's counter
//! and the AAD is empty. Counters start at zero and advance by one per
//! *successful* command round trip, which gives replay and reordering
//! protection; a counter reaching its ceiling ends the session.
//!
//! Any tag, counter, or decryption failure is fatal to the session: the
//! keys are zeroized and the state returns to [`Session::Idle`]. The
//! teardown paths here are deliberately the only places key material is
//! dropped, so the zeroization invariant has one home.

use zeroize::Zeroize as _;

use crate::crypto;
use crate::crypto::Crypto;
use crate::l2;

/// The size of the length field framing each encrypted payload.
pub const LEN_FIELD: usize = 2;

/// The size of the command-identifier prefix inside the plaintext.
pub const CMD_ID_LEN: usize = 1;

/// The maximum command payload, excluding the command identifier.
pub const MAX_CMD_DATA: usize = 4096;

/// The maximum plaintext of one encrypted frame.
pub const MAX_PLAINTEXT: usize = CMD_ID_LEN + MAX_CMD_DATA;

/// The maximum size of one encrypted frame on the wire.
pub const MAX_FRAME: usize = LEN_FIELD + MAX_PLAINTEXT + crypto::TAG_LEN;

/// The protocol label that seeds both the handshake transcript hash and
/// the key-derivation chain, padded to the hash width.
pub const PROTOCOL_NAME: &[u8; 32] = b"Noise_KK1_25519_AESGCM_SHA256\0\0\0";

/// A secure-session error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The handshake did not complete; no session was established.
    HandshakeFailed,
    /// An encrypted operation was attempted without an established
    /// session.
    NoSession,
    /// An authentication tag did not verify. The session is gone.
    TagMismatch,
    /// A direction counter reached its ceiling. The session is gone and a
    /// new handshake is required.
    CounterExhausted,
    /// A response failed to decrypt for a reason other than its tag.
    DecryptFailed,
}

/// Encodes a direction counter as a GCM nonce.
///
/// The wire format is normative: the 96-bit little-endian encoding of the
/// counter value.
pub fn nonce(counter: u64) -> [u8; crypto::NONCE_LEN] {
    let mut nonce = [0; crypto::NONCE_LEN];
    nonce[..8].copy_from_slice(&counter.to_le_bytes());
    nonce
}

/// The key material and counters of an established session.
///
/// No `Debug` impl on purpose: there is nothing in here that may be
/// printed.
pub(crate) struct Keys {
    pub k_cmd: [u8; crypto::KEY_LEN],
    pub k_res: [u8; crypto::KEY_LEN],
    pub n_cmd: u64,
    pub n_res: u64,
}

impl Keys {
    /// Zeroizes all key material and counters.
    pub fn zeroize(&mut self) {
        self.k_cmd.zeroize();
        self.k_res.zeroize();
        self.n_cmd = 0;
        self.n_res = 0;
    }
}

/// The session state machine.
///
/// ```text
/// Idle --start_session--> Established
///  ^                          |
///  `--abort/deinit/any-error--'
/// ```
///
/// There is no lingering "handshaking" state: the handshake happens within
/// one call, and its scratch lives on that call's stack.
pub(crate) enum Session {
    Idle,
    Established(Keys),
}

impl Session {
    /// Whether a session is currently established.
    pub fn is_established(&self) -> bool {
        matches!(self, Self::Established(_))
    }

    /// The session keys, or [`Error::NoSession`].
    pub fn keys_mut(&mut self) -> Result<&mut Keys, Error> {
        match self {
            Self::Established(keys) => Ok(keys),
            Self::Idle => Err(Error::NoSession),
        }
    }

    /// The `(n_cmd, n_res)` counters, if a session is established.
    pub fn counters(&self) -> Option<(u64, u64)> {
        match self {
            Self::Established(keys) => Some((keys.n_cmd, keys.n_res)),
            Self::Idle => None,
        }
    }

    /// Tears the session down, zeroizing key material.
    ///
    /// Idempotent; terminating an idle session is a no-op.
    pub fn terminate(&mut self) {
        if let Self::Established(keys) = self {
            keys.zeroize();
        }
        *self = Self::Idle;
    }
}

/// The public inputs to the handshake derivation.
pub(crate) struct Transcript<'a> {
    /// The chip's static public key, from its device certificate.
    pub st_pub: &'a [u8; 32],
    /// The host pairing public key for the chosen slot.
    pub sh_pub: &'a [u8; 32],
    /// The host's ephemeral public key, as sent in the request.
    pub eh_pub: &'a [u8; 32],
    /// The chip's ephemeral public key, from the response.
    pub et_pub: &'a [u8; 32],
}

/// Derives the session keys and verifies the chip's authentication tag.
///
/// The derivation chain is, in order:
/// ```text
/// h  = SHA256(name || ST || EH || SH || ET)
/// ck = name
/// (ck, _)      = HKDF(ck, X25519(eh, ST))
/// (ck, _)      = HKDF(ck, X25519(sh, ET))
/// (ck, k_auth) = HKDF(ck, X25519(eh, ET))
/// k_cmd || k_res = HKDF(ck, [])
/// ```
/// and the chip's tag must verify under `k_auth` with a zero nonce and `h`
/// as AAD. All intermediate secrets are zeroized before returning; the
/// caller owns zeroizing `eh_priv` and the private pairing key.
pub(crate) fn derive<C: Crypto + ?Sized>(
    crypto: &mut C,
    transcript: &Transcript,
    eh_priv: &[u8; 32],
    sh_priv: &[u8; 32],
    auth_tag: &[u8; crypto::TAG_LEN],
) -> Result<Keys, Error> {
    let mut h = [0; crypto::DIGEST_LEN];
    let hashed = crypto.start().and_then(|()| {
        crypto.update(PROTOCOL_NAME)?;
        crypto.update(transcript.st_pub)?;
        crypto.update(transcript.eh_pub)?;
        crypto.update(transcript.sh_pub)?;
        crypto.update(transcript.et_pub)?;
        crypto.finish(&mut h)
    });
    if hashed.is_err() {
        return Err(trace!(Error::HandshakeFailed));
    }

    let mut ck = *PROTOCOL_NAME;
    let result: Result<([u8; 32], [u8; 64]), crypto::Error> = (|| {
        let mut dh = crypto.x25519(eh_priv, transcript.st_pub)?;
        mix(crypto, &mut ck, &dh)?.zeroize();
        dh.zeroize();

        dh = crypto.x25519(sh_priv, transcript.et_pub)?;
        mix(crypto, &mut ck, &dh)?.zeroize();
        dh.zeroize();

        dh = crypto.x25519(eh_priv, transcript.et_pub)?;
        let k_auth = mix(crypto, &mut ck, &dh)?;
        dh.zeroize();

        let mut okm = [0; 64];
        crypto.hkdf(&ck, &[], &mut okm)?;
        Ok((k_auth, okm))
    })();

    ck.zeroize();
    let (mut k_auth, mut okm) = match result {
        Ok(secrets) => secrets,
        Err(_) => return Err(trace!(Error::HandshakeFailed)),
    };

    // An empty ciphertext with the chip's tag: verifying it authenticates
    // the transcript hash.
    let mut tag = *auth_tag;
    let verified = crypto.open(&k_auth, &nonce(0), &h, &mut tag);
    k_auth.zeroize();
    if verified.is_err() {
        okm.zeroize();
        return Err(trace!(Error::HandshakeFailed));
    }

    let mut keys = Keys {
        k_cmd: [0; 32],
        k_res: [0; 32],
        n_cmd: 0,
        n_res: 0,
    };
    keys.k_cmd.copy_from_slice(&okm[..32]);
    keys.k_res.copy_from_slice(&okm[32..]);
    okm.zeroize();
    Ok(keys)
}

/// One HKDF link of the derivation chain: replaces `ck` and returns the
/// link's output key.
fn mix<C: Crypto + ?Sized>(
    crypto: &mut C,
    ck: &mut [u8; 32],
    ikm: &[u8; 32],
) -> Result<[u8; 32], crypto::Error> {
    let mut okm = [0; 64];
    crypto.hkdf(&ck[..], &ikm[..], &mut okm)?;
    ck.copy_from_slice(&okm[..32]);
    let mut k = [0; 32];
    k.copy_from_slice(&okm[32..]);
    okm.zeroize();
    Ok(k)
}

/// Seals the plaintext at `buf[LEN_FIELD..LEN_FIELD + plain_len]` into a
/// complete frame, returning the frame length.
pub(crate) fn seal_frame<C: Crypto + ?Sized>(
    crypto: &mut C,
    keys: &Keys,
    buf: &mut [u8],
    plain_len: usize,
) -> Result<usize, crate::Error> {
    check!(plain_len <= MAX_PLAINTEXT, l2::Error::Malformed);
    check!(keys.n_cmd != u64::MAX, Error::CounterExhausted);

    let end = LEN_FIELD + plain_len + crypto::TAG_LEN;
    check!(end <= buf.len(), crate::io::Error::BufferExhausted);
    buf[..LEN_FIELD].copy_from_slice(&(plain_len as u16).to_le_bytes());
    crypto.seal(
        &keys.k_cmd,
        &nonce(keys.n_cmd),
        &[],
        &mut buf[LEN_FIELD..end],
        plain_len,
    )?;
    Ok(end)
}

/// Opens the frame in `buf[..frame_len]` in place, returning the plaintext
/// length. The plaintext lands at `buf[LEN_FIELD..LEN_FIELD + len]`.
pub(crate) fn open_frame<C: Crypto + ?Sized>(
    crypto: &mut C,
    keys: &Keys,
    buf: &mut [u8],
    frame_len: usize,
) -> Result<usize, crate::Error> {
    check!(frame_len >= LEN_FIELD + crypto::TAG_LEN, l2::Error::Malformed);
    check!(frame_len <= buf.len(), crate::io::Error::BufferExhausted);
    check!(keys.n_res != u64::MAX, Error::CounterExhausted);

    let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
    check!(len <= MAX_PLAINTEXT, l2::Error::Malformed);
    check!(frame_len == LEN_FIELD + len + crypto::TAG_LEN, l2::Error::Malformed);

    crypto
        .open(
            &keys.k_res,
            &nonce(keys.n_res),
            &[],
            &mut buf[LEN_FIELD..frame_len],
        )
        .map_err(|e| match e {
            crypto::Error::BadTag => trace!(Error::TagMismatch).into(),
            _ => crate::Error::from(Error::DecryptFailed),
        })?;
    Ok(len)
}
