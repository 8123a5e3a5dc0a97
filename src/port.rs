// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The platform port interface.
//!
//! A [`Port`] bundles up everything the stack needs from the host platform:
//! full-duplex SPI transfers, chip-select control, millisecond delays, and a
//! cryptographically strong random source. Platforms with a dedicated
//! ready/interrupt line from the chip may additionally override
//! [`Port::wait_ready()`] to let the transport sleep instead of polling.
//!
//! The bus is mode 0 (CPOL=0, CPHA=0), byte-framed, most-significant bit
//! first. Chip select is active low; the stack only ever speaks in whole
//! chip-select cycles and never interleaves transfers.
//!
//! A `Port` is exclusively owned by one [`Chip`](crate::Chip) context. If
//! the physical bus is shared, the integration must provide mutual
//! exclusion outside of this crate.

use static_assertions::assert_obj_safe;

/// An error produced by a [`Port`] operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The bus transfer itself failed.
    Bus,
    /// The operation did not complete within the caller's deadline.
    Timeout,
    /// The platform's random source failed.
    Rng,
    /// The operation is not supported on this platform.
    Unsupported,
}

/// A platform port: the capability set consumed by the transport.
pub trait Port {
    /// Drives the chip-select line; `assert` being true pulls it low.
    fn spi_cs(&mut self, assert: bool) -> Result<(), Error>;

    /// Clocks `buf` out on the bus while clocking the chip's reply back
    /// into `buf`, in place.
    ///
    /// The transfer must either complete within `timeout_ms` or fail with
    /// [`Error::Timeout`].
    fn spi_transfer(
        &mut self,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), Error>;

    /// Blocks for at least `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);

    /// Fills `buf` with cryptographically strong random bytes.
    fn fill_random(&mut self, buf: &mut [u8]) -> Result<(), Error>;

    /// Blocks until the chip asserts its ready signal.
    ///
    /// The default implementation reports [`Error::Unsupported`], which
    /// makes the transport fall back to delay-based polling. Platforms
    /// that wire up the chip's interrupt pin should override this.
    fn wait_ready(&mut self, timeout_ms: u32) -> Result<(), Error> {
        let _ = timeout_ms;
        Err(Error::Unsupported)
    }
}

assert_obj_safe!(Port);

impl<P: Port + ?Sized> Port for &mut P {
    #[inline]
    fn spi_cs(&mut self, assert: bool) -> Result<(), Error> {
        P::spi_cs(*self, assert)
    }

    #[inline]
    fn spi_transfer(
        &mut self,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), Error> {
        P::spi_transfer(*self, buf, timeout_ms)
    }

    #[inline]
    fn delay_ms(&mut self, ms: u32) {
        P::delay_ms(*self, ms)
    }

    #[inline]
    fn fill_random(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        P::fill_random(*self, buf)
    }

    #[inline]
    fn wait_ready(&mut self, timeout_ms: u32) -> Result<(), Error> {
        P::wait_ready(*self, timeout_ms)
    }
}
