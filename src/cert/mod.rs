// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The chip's certificate store.
//!
//! The chip carries a factory-provisioned store of up to four X.509 DER
//! certificates: the device certificate (whose subject public key is the
//! chip's static X25519 key, the anchor of every handshake) followed by
//! its issuer chain. The store travels as
//! `version | count | len[0..3] (u16 LE each) | DER certificates`, at most
//! [`MAX_STORE`] bytes in total.
//!
//! Chain *verification* is the integration's business; this module parses
//! the store into per-certificate slices and digs the X25519 subject
//! public key out of the device certificate with a small DER walker
//! ([`der`]).

use arrayvec::ArrayVec;

use crate::io::read::ReadInt as _;
use crate::io::ReadBorrow as _;

pub mod der;

/// The maximum number of certificates in a store.
pub const MAX_CERTS: usize = 4;

/// The maximum size of the encoded store, in bytes.
pub const MAX_STORE: usize = 3840;

/// The store wire version this crate understands.
const STORE_VERSION: u8 = 0x01;

/// The DER encoding of the id-X25519 OID, 1.3.101.110, without its tag and
/// length.
const OID_X25519: &[u8] = &[0x2b, 0x65, 0x6e];

/// A certificate-store parsing error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The store's wire version is not the one this crate was built for.
    BadVersion,
    /// The store header or its lengths are inconsistent with the data.
    BadStore,
    /// A DER element was not well-formed (or used BER freedoms).
    BadEncoding,
    /// The certificate's subject public key is not an X25519 key.
    WrongAlgorithm,
}

impl From<untrusted::EndOfInput> for Error {
    fn from(_: untrusted::EndOfInput) -> Self {
        Self::BadEncoding
    }
}

/// A parsed view of the certificate store.
///
/// Borrows the buffer the encoded store was read into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Store<'wire> {
    certs: ArrayVec<&'wire [u8], MAX_CERTS>,
}

impl<'wire> Store<'wire> {
    /// Parses the store header and splits `raw` into per-certificate
    /// slices.
    pub fn parse(raw: &'wire [u8]) -> Result<Self, Error> {
        check!(raw.len() <= MAX_STORE, Error::BadStore);

        let mut r = raw;
        let version = r.read_le::<u8>().map_err(|_| Error::BadStore)?;
        check!(version == STORE_VERSION, Error::BadVersion);

        let count = r.read_le::<u8>().map_err(|_| Error::BadStore)? as usize;
        check!((1..=MAX_CERTS).contains(&count), Error::BadStore);

        let mut lens = [0usize; MAX_CERTS];
        for len in lens.iter_mut() {
            *len = r.read_le::<u16>().map_err(|_| Error::BadStore)? as usize;
        }

        let mut certs = ArrayVec::new();
        for &len in &lens[..count] {
            check!(len != 0, Error::BadStore);
            let cert = r.read_borrow(len).map_err(|_| Error::BadStore)?;
            certs.push(cert);
        }
        check!(r.is_empty(), Error::BadStore);

        Ok(Self { certs })
    }

    /// Computes the total encoded size of a store from its header alone.
    ///
    /// `header` must hold at least the first [`header_len()`] bytes of the
    /// store. Used to decide how many blocks to fetch from the chip before
    /// the full store has arrived.
    pub fn total_len(header: &[u8]) -> Result<usize, Error> {
        let mut r = header;
        let version = r.read_le::<u8>().map_err(|_| Error::BadStore)?;
        check!(version == STORE_VERSION, Error::BadVersion);

        let count = r.read_le::<u8>().map_err(|_| Error::BadStore)? as usize;
        check!((1..=MAX_CERTS).contains(&count), Error::BadStore);

        let mut total = header_len();
        for i in 0..MAX_CERTS {
            let len = r.read_le::<u16>().map_err(|_| Error::BadStore)? as usize;
            if i < count {
                total += len;
            }
        }

        check!(total <= MAX_STORE, Error::BadStore);
        Ok(total)
    }

    /// The certificates, leaf (device certificate) first.
    pub fn certs(&self) -> &[&'wire [u8]] {
        &self.certs
    }

    /// The device certificate.
    pub fn device_cert(&self) -> &'wire [u8] {
        self.certs[0]
    }
}

/// The size of the fixed store header.
pub const fn header_len() -> usize {
    2 + 2 * MAX_CERTS
}

/// Extracts the X25519 subject public key from a DER certificate.
///
/// This walks `Certificate -> tbsCertificate -> subjectPublicKeyInfo`,
/// requires the algorithm OID to be id-X25519, and returns the 32-byte
/// key. Signatures are *not* checked here.
pub fn x25519_subject_pubkey(cert: &[u8]) -> Result<[u8; 32], Error> {
    untrusted::Input::from(cert).read_all(Error::BadEncoding, |r| {
        der::tagged(der::Tag::SEQUENCE, r, |cert| {
            let spki = der::tagged(der::Tag::SEQUENCE, cert, |tbs| {
                // version [0] EXPLICIT, if present.
                der::opt(der::Tag::context_specific(0), tbs)?;
                der::parse(der::Tag::INTEGER, tbs)?; // serialNumber
                der::parse(der::Tag::SEQUENCE, tbs)?; // signature
                der::parse(der::Tag::SEQUENCE, tbs)?; // issuer
                der::parse(der::Tag::SEQUENCE, tbs)?; // validity
                der::parse(der::Tag::SEQUENCE, tbs)?; // subject

                let spki = read_spki(tbs)?;

                // Optional issuerUniqueID/subjectUniqueID/extensions; we
                // don't interpret them.
                while !tbs.at_end() {
                    der::any(tbs)?;
                }
                Ok(spki)
            })?;

            // signatureAlgorithm and signatureValue trail the
            // tbsCertificate; skip them.
            der::parse(der::Tag::SEQUENCE, cert)?;
            der::parse(der::Tag::BIT_STRING, cert)?;
            Ok(spki)
        })
    })
}

/// Parses a `subjectPublicKeyInfo`, checking for id-X25519.
fn read_spki(tbs: &mut untrusted::Reader) -> Result<[u8; 32], Error> {
    der::tagged(der::Tag::SEQUENCE, tbs, |spki| {
        der::tagged(der::Tag::SEQUENCE, spki, |alg| {
            let oid = der::parse(der::Tag::OID, alg)?;
            if oid.as_slice_less_safe() != OID_X25519 {
                return Err(Error::WrongAlgorithm);
            }
            // id-X25519 has no parameters.
            Ok(())
        })?;

        let key = der::bits_total(spki)?;
        let key = key.as_slice_less_safe();
        check!(key.len() == 32, Error::BadEncoding);

        let mut out = [0; 32];
        out.copy_from_slice(key);
        Ok(out)
    })
}
