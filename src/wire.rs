// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Wire format traits.
//!
//! This module provides [`FromWire`] and [`ToWire`], a pair of traits similar
//! to the core traits in the `serde` library. Rather than representing a
//! generically serializeable type, they represent types that can be converted
//! to and from the chip's wire format, which has a unique, ad-hoc data model:
//! little-endian integers, byte-exact padding, and length-prefixed blobs.
//!
//! Both the unencrypted request layer ([`crate::l2`]) and the encrypted
//! command payloads ([`crate::cmd`]) speak this data model, so the traits
//! live here rather than under either layer.

use crate::io;
use crate::io::endian::LeInt;
use crate::io::ReadBorrow;
use crate::io::Write;

/// A type which can be deserialized from the chip's wire format.
///
/// The lifetime `'wire` indicates that the type can be deserialized from a
/// buffer of lifetime `'wire`, and may borrow from it.
pub trait FromWire<'wire>: Sized {
    /// Deserializes a `Self` out of `r`.
    fn from_wire<R: ReadBorrow<'wire>>(r: &mut R) -> Result<Self, Error>;
}

/// A type which can be serialized into the chip's wire format.
pub trait ToWire: Sized {
    /// Serializes `self` into `w`.
    fn to_wire<W: Write>(&self, w: W) -> Result<(), Error>;
}

/// A marshalling error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Indicates that something went wrong in an `io` operation.
    Io(io::Error),

    /// Indicates that some field was outside of its valid range, or that
    /// a message's length did not match its type's wire shape.
    OutOfRange,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Represents a C-like enum that can be converted to and from a wire
/// representation.
///
/// An implementation of this trait can be thought of as an unsigned
/// integer with a limited range: every enum variant can be converted
/// to the wire format and back, though not every value of the wire
/// representation can be converted into an enum variant.
pub trait WireEnum: Sized + Copy {
    /// The underlying "wire type". This is almost always some kind of
    /// unsigned integer.
    type Wire: LeInt;

    /// Converts `self` into its underlying wire representation.
    fn to_wire_value(self) -> Self::Wire;

    /// Attempts to parse a value of `Self` from the underlying wire
    /// representation.
    fn from_wire_value(wire: Self::Wire) -> Option<Self>;
}

impl<'wire, E> FromWire<'wire> for E
where
    E: WireEnum,
{
    fn from_wire<R: ReadBorrow<'wire>>(r: &mut R) -> Result<Self, Error> {
        let wire = <Self as WireEnum>::Wire::read_from(r)?;
        Self::from_wire_value(wire).ok_or(Error::OutOfRange)
    }
}

impl<E> ToWire for E
where
    E: WireEnum,
{
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), Error> {
        self.to_wire_value().write_to(&mut w)?;
        Ok(())
    }
}

/// A conveinence macro for generating `WireEnum`-implementing enums.
///
/// Syntax is as follows:
/// ```text
/// wire_enum! {
///     /// This is my enum.
///     pub enum MyEnum : u8 {
///         /// Variant `A`.
///         A = 0x00,
///         /// Variant `B`.
///         B = 0x01,
///     }
/// }
/// ```
/// This macro will generate an implementation of `WireEnum<Wire=u8>` for
/// the above enum.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident : $wire:ident {
        $($(#[$meta_variant:meta])* $variant:ident = $value:literal,)*
    }) => {
        $(#[$meta])*
        #[repr($wire)]
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        $vis enum $name {
           $(
               $(#[$meta_variant])*
               $variant = $value,
           )*
        }

        impl $crate::wire::WireEnum for $name {
            type Wire = $wire;
            fn to_wire_value(self) -> Self::Wire {
                self as $wire
            }
            fn from_wire_value(wire: Self::Wire) -> Option<Self> {
                match wire {
                    $(
                        $value => Some(Self::$variant),
                    )*
                    _ => None,
                }
            }
        }
    }
}
