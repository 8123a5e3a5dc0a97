// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! DER parsing.
//!
//! Based on BoringSSL's DER parser. See
//! https://boringssl.googlesource.com/boringssl/+/refs/heads/master/crypto/bytestring/cbs.c
//!
//! We adapt BoringSSL's parser because it is battle-tested, and because DER
//! and X.509 are a bit fussy, so owning this dependency directly rather than
//! trusting an external dependency is useful. Only the handful of shapes
//! needed to walk a certificate down to its subject public key are
//! implemented.
//!
//! Note that we reject all non-DER BER.

use crate::cert::Error;

/// Parse `count` big-endian bytes.
fn be(buf: &mut untrusted::Reader, count: usize) -> Result<u32, Error> {
    debug_assert!(count <= 4);
    let mut val = 0;
    for _ in 0..count {
        val <<= 8;
        val |= buf.read_byte()? as u32;
    }
    Ok(val)
}

/// A DER tag.
///
/// We don't bother to parse tag numbers greater than 30, because none of
/// the tags we care about use a tag larger than that.
///
/// Tags cannot be interrogated beyond basic comparisons with existing
/// constants.
// This is encoded directly as the "first octet" of a DER tag.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tag(u8);

impl Tag {
    /// Parses a tag.
    fn parse(buf: &mut untrusted::Reader) -> Result<Self, Error> {
        let tag_byte = buf.read_byte()?;
        // We don't support extended tags.
        if tag_byte & 0x1f == 0x1f {
            return Err(Error::BadEncoding);
        }
        Ok(Self(tag_byte))
    }

    /// The `INTEGER` tag.
    pub const INTEGER: Tag = Tag(0x02);
    /// The `BIT STRING` tag.
    pub const BIT_STRING: Tag = Tag(0x03);
    /// The `OBJECT IDENTIFIER` tag.
    pub const OID: Tag = Tag(0x06);
    /// The `SEQUENCE` tag, with the constructed bit set.
    pub const SEQUENCE: Tag = Tag(0x30);

    /// Returns a context-specific, constructed tag.
    #[allow(clippy::unusual_byte_groupings)]
    pub const fn context_specific(number: u8) -> Self {
        Self((number & 0b11111) | 0b10_1_00000)
    }
}

/// Parse a single element, returning its tag and contents.
pub fn any<'cert>(
    buf: &mut untrusted::Reader<'cert>,
) -> Result<(Tag, untrusted::Input<'cert>), Error> {
    let tag = Tag::parse(buf)?;
    let len_byte = buf.read_byte()?;

    // If `len` has the high bit set, then it is a "long form" length.
    let len = if len_byte & 0x80 == 0 {
        len_byte as usize
    } else {
        let num_bytes = len_byte & 0x7f;

        if num_bytes == 0 || num_bytes > 4 {
            // We only support lengths at most 32 bits.
            //
            // This also catches indefinite-length constructed objects,
            // which we absolutely don't support.
            return Err(Error::BadEncoding);
        }

        let len = be(buf, num_bytes as usize)?;
        if len < 128 {
            // This should have been a short-form encoding.
            return Err(Error::BadEncoding);
        }
        if len >> ((num_bytes - 1) * 8) == 0 {
            // Superfluous zero bytes; the encoding was not minimal.
            return Err(Error::BadEncoding);
        }
        len as usize
    };

    let data = buf.read_bytes(len)?;
    Ok((tag, data))
}

/// Parses an optional element of a `SEQUENCE`.
pub fn opt<'cert>(
    tag: Tag,
    buf: &mut untrusted::Reader<'cert>,
) -> Result<Option<untrusted::Input<'cert>>, Error> {
    if !buf.peek(tag.0) {
        return Ok(None);
    }
    let (_, data) = any(buf)?;
    Ok(Some(data))
}

/// Parses a required element of a `SEQUENCE`.
pub fn parse<'cert>(
    tag: Tag,
    buf: &mut untrusted::Reader<'cert>,
) -> Result<untrusted::Input<'cert>, Error> {
    opt(tag, buf)?.ok_or(Error::BadEncoding)
}

/// Parses a required element, passing the contents to `dec` for further
/// decoding.
#[inline]
pub fn tagged<'cert, T>(
    tag: Tag,
    buf: &mut untrusted::Reader<'cert>,
    dec: impl FnOnce(&mut untrusted::Reader<'cert>) -> Result<T, Error>,
) -> Result<T, Error> {
    parse(tag, buf)?.read_all(Error::BadEncoding, dec)
}

/// Parses a `BIT STRING` whose length is divisible by 8, returning its
/// contents without the leading unused-bits octet.
pub fn bits_total<'cert>(
    buf: &mut untrusted::Reader<'cert>,
) -> Result<untrusted::Input<'cert>, Error> {
    let bits = parse(Tag::BIT_STRING, buf)?;
    bits.read_all(Error::BadEncoding, |buf| {
        // The first octet of a BIT STRING is the number of unused bits at
        // the end; we only deal in whole bytes.
        if buf.read_byte()? != 0 {
            return Err(Error::BadEncoding);
        }
        Ok(buf.read_bytes_to_end())
    })
}
