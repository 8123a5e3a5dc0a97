// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The L1 transport: clocking frames across the bus.
//!
//! Every exchange with the chip is one chip-select cycle. Requests are a
//! single frame `opcode | len | payload | crc16`; responses are polled for
//! by clocking the get-response opcode and inspecting the chip-status byte
//! that comes back. Until the chip is ready, the transport releases chip
//! select, waits a little, and tries again.
//!
//! The transport deliberately does not interpret response payloads; it
//! hands back raw chunks so that [`crate::l2`] owns the continuation
//! policy for multi-chunk responses.

use enumflags2::bitflags;
use enumflags2::BitFlags;

use crate::crc16;
use crate::port;
use crate::port::Port;

/// The maximum payload a single frame can carry.
pub const MAX_PAYLOAD: usize = 252;

/// The maximum total size of an outgoing frame.
pub const MAX_FRAME: usize = MAX_PAYLOAD + 4;

/// The size of a buffer large enough for any response chunk:
/// `chip_status | l2_status | len | payload | crc16`.
pub const CHUNK_LEN: usize = MAX_PAYLOAD + 5;

/// The opcode clocked out to ask the chip for response bytes.
const GET_RESPONSE: u8 = 0xaa;

/// The "no response yet" L2 status byte, which the poll loop must treat as
/// the chip still being busy. (The full status set lives in [`crate::l2`];
/// the transport only ever looks at this one value.)
const STATUS_NO_RESP: u8 = 0xff;

/// A transport-level error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The underlying SPI transfer failed.
    Bus,
    /// The chip did not produce a response within the poll deadline.
    NoResponse,
    /// A response frame failed its CRC check.
    CrcMismatch,
    /// A frame's length field exceeded the transport maximum.
    FrameTooLong,
    /// The platform's ready signal did not fire within the deadline.
    ReadyPinTimeout,
}

impl From<port::Error> for Error {
    fn from(_: port::Error) -> Self {
        Self::Bus
    }
}

/// A bit of the chip-status byte returned on every response poll.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StatusBit {
    /// The chip has a response ready to be clocked out.
    Ready = 0b0000_0001,
    /// The chip has detected tampering and entered alarm mode.
    Alarm = 0b0000_0010,
    /// The chip is executing its startup firmware (maintenance mode).
    Start = 0b0000_0100,
}

/// The chip-status byte, as a set of [`StatusBit`]s.
pub type ChipStatus = BitFlags<StatusBit>;

/// Timing parameters for the transport.
#[derive(Copy, Clone, Debug)]
pub struct Timing {
    /// Delay between response polls, in milliseconds.
    pub poll_interval_ms: u32,
    /// Total poll deadline for one response, in milliseconds.
    pub poll_timeout_ms: u32,
}

/// Sends a single request frame in one chip-select cycle.
///
/// The CRC is computed over `opcode | len | payload` and appended
/// little-endian. Bytes clocked back during the transfer are discarded.
pub fn send_frame<P: Port>(
    port: &mut P,
    opcode: u8,
    payload: &[u8],
    timing: &Timing,
) -> Result<(), Error> {
    check!(payload.len() <= MAX_PAYLOAD, Error::FrameTooLong);

    let mut frame = [0; MAX_FRAME];
    frame[0] = opcode;
    frame[1] = payload.len() as u8;
    frame[2..2 + payload.len()].copy_from_slice(payload);

    let crc = crc16::update(crc16::crc16(&frame[..2]), payload);
    let total = 2 + payload.len();
    frame[total..total + 2].copy_from_slice(&crc.to_le_bytes());

    port.spi_cs(true)?;
    let sent = port.spi_transfer(&mut frame[..total + 2], timing.poll_timeout_ms);
    let released = port.spi_cs(false);
    sent?;
    released?;
    Ok(())
}

/// Reads the chip-status byte without expecting a response frame.
///
/// Used to inspect the chip's operating mode right after power-up or a
/// reboot request, before any request is in flight.
pub fn read_status<P: Port>(
    port: &mut P,
    timing: &Timing,
) -> Result<ChipStatus, Error> {
    let mut byte = [GET_RESPONSE];
    port.spi_cs(true)?;
    let read = port.spi_transfer(&mut byte, timing.poll_timeout_ms);
    let released = port.spi_cs(false);
    read?;
    released?;
    Ok(ChipStatus::from_bits_truncate(byte[0]))
}

/// Polls for one response chunk.
///
/// On success, `buf[..n]` holds the raw chunk
/// `chip_status | l2_status | len | payload | crc16`, with `n` the returned
/// length. The chunk has *not* been CRC-checked; [`crate::l2`] owns frame
/// validation so that its parser can also be driven directly by fuzzing.
///
/// Platforms that implement [`Port::wait_ready()`] sleep on the ready
/// signal instead of time-based polling; everyone else polls every
/// [`Timing::poll_interval_ms`] until [`Timing::poll_timeout_ms`] expires.
pub fn read_chunk<P: Port>(
    port: &mut P,
    buf: &mut [u8; CHUNK_LEN],
    timing: &Timing,
) -> Result<usize, Error> {
    match port.wait_ready(timing.poll_timeout_ms) {
        Ok(()) | Err(port::Error::Unsupported) => {}
        Err(port::Error::Timeout) => {
            return Err(trace!(Error::ReadyPinTimeout))
        }
        Err(_) => return Err(Error::Bus),
    }

    let mut waited = 0;
    loop {
        if let Some(n) = try_read(port, buf, timing)? {
            return Ok(n);
        }

        if waited >= timing.poll_timeout_ms {
            return Err(trace!(Error::NoResponse));
        }
        port.delay_ms(timing.poll_interval_ms);
        waited = waited.saturating_add(timing.poll_interval_ms.max(1));
    }
}

/// One poll attempt: a full chip-select cycle that either yields a chunk or
/// finds the chip still busy (`Ok(None)`).
fn try_read<P: Port>(
    port: &mut P,
    buf: &mut [u8; CHUNK_LEN],
    timing: &Timing,
) -> Result<Option<usize>, Error> {
    port.spi_cs(true)?;
    let result = clock_chunk(port, buf, timing);
    let released = port.spi_cs(false);
    let read = result?;
    released?;
    Ok(read)
}

fn clock_chunk<P: Port>(
    port: &mut P,
    buf: &mut [u8; CHUNK_LEN],
    timing: &Timing,
) -> Result<Option<usize>, Error> {
    buf[0] = GET_RESPONSE;
    port.spi_transfer(&mut buf[..1], timing.poll_timeout_ms)?;
    let status = ChipStatus::from_bits_truncate(buf[0]);
    if !status.contains(StatusBit::Ready) {
        return Ok(None);
    }

    buf[1] = 0;
    buf[2] = 0;
    port.spi_transfer(&mut buf[1..3], timing.poll_timeout_ms)?;
    if buf[1] == STATUS_NO_RESP {
        return Ok(None);
    }

    let len = buf[2] as usize;
    check!(len <= MAX_PAYLOAD, Error::FrameTooLong);

    let rest = &mut buf[3..3 + len + 2];
    rest.fill(0);
    port.spi_transfer(rest, timing.poll_timeout_ms)?;
    Ok(Some(len + 5))
}
