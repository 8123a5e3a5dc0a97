// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Provides the [`Read`] trait, analogous to [`std::io::Read`].

use static_assertions::assert_obj_safe;

use crate::io;
use crate::io::endian::LeInt;

/// Represents a place that bytes can be read from, such as a `&[u8]`.
///
/// # Relation with [`std::io::Read`]
/// [`std::io::Read`] is distinct from `Read`, since `Read` must know,
/// a-priori, the total length of the underlying buffer.
pub trait Read {
    /// Reads exactly `out.len()` bytes from `self`.
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error>;

    /// Returns the number of bytes still available to read.
    fn remaining_data(&self) -> usize;
}
assert_obj_safe!(Read);

/// Convenience functions for reading integers from a [`Read`].
pub trait ReadInt: Read {
    /// Reads a little-endian integer.
    ///
    /// # Note
    /// Do not implement this function yourself. Callers are not required to
    /// call it in order to actually perform a read, so whether or not it is
    /// called is an implementation detail.
    #[inline]
    fn read_le<I: LeInt>(&mut self) -> Result<I, io::Error> {
        I::read_from(self)
    }
}

impl<R: Read + ?Sized> ReadInt for R {}

/// A [`Read`] that can hand out subslices of its underlying buffer, for
/// zero-copy reads of variable-length fields with the buffer's lifetime
/// `'wire`.
pub trait ReadBorrow<'wire>: Read {
    /// Reads `n` bytes, borrowed directly from the underlying buffer.
    fn read_borrow(&mut self, n: usize) -> Result<&'wire [u8], io::Error>;
}

impl<R: Read + ?Sized> Read for &mut R {
    #[inline]
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        R::read_bytes(*self, out)
    }

    #[inline]
    fn remaining_data(&self) -> usize {
        R::remaining_data(*self)
    }
}

impl<'wire, R: ReadBorrow<'wire> + ?Sized> ReadBorrow<'wire> for &mut R {
    #[inline]
    fn read_borrow(&mut self, n: usize) -> Result<&'wire [u8], io::Error> {
        R::read_borrow(*self, n)
    }
}

impl Read for &[u8] {
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), io::Error> {
        let n = out.len();
        if self.len() < n {
            return Err(io::Error::BufferExhausted);
        }

        out.copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(())
    }

    fn remaining_data(&self) -> usize {
        self.len()
    }
}

impl<'wire> ReadBorrow<'wire> for &'wire [u8] {
    fn read_borrow(&mut self, n: usize) -> Result<&'wire [u8], io::Error> {
        if self.len() < n {
            return Err(io::Error::BufferExhausted);
        }

        let (out, rest) = self.split_at(n);
        *self = rest;
        Ok(out)
    }
}
