// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The L2 protocol: typed, unencrypted requests over [`crate::l1`].
//!
//! L2 gives every chip operation that does not need the secure channel a
//! typed request structure: chip information, the session handshake,
//! firmware update, power management, and the carrier frames for encrypted
//! commands. Each request is one L1 frame whose opcode is the
//! [`RequestId`]; each response chunk carries a [`Status`] byte ahead of
//! its payload.
//!
//! Responses that exceed one frame arrive as a run of chunks flagged
//! [`Status::ResultCont`] and are concatenated by a [`ChunkAssembler`]
//! owned by the caller; the final chunk is flagged [`Status::ResultOk`].

use crate::crc16;
use crate::io::read::ReadInt as _;
use crate::io::Read as _;
use crate::io::ReadBorrow;
use crate::io::Write;
use crate::l1;
use crate::l1::ChipStatus;
use crate::l3;
use crate::wire;
use crate::wire::FromWire;
use crate::wire::ToWire;
use crate::wire::WireEnum;

/// The size of one firmware-image chunk in a [`FwUpdateRequest`].
pub const FW_CHUNK: usize = 128;

/// The size of one certificate-store block returned by
/// [`InfoObject::X509Cert`].
pub const CERT_BLOCK: usize = 128;

wire_enum! {
    /// An L2 request identifier: the opcode byte of the L1 frame.
    pub enum RequestId: u8 {
        /// Reads one block of a chip-information object.
        GetInfo = 0x01,
        /// Starts the secure-session handshake.
        Handshake = 0x02,
        /// Carries (a chunk of) an encrypted L3 command.
        EncryptedCmd = 0x04,
        /// Tears down the current secure session.
        EncryptedSessionAbort = 0x08,
        /// Asks the chip to resend the last response chunk.
        Resend = 0x10,
        /// Puts the chip into a low-power state.
        Sleep = 0x20,
        /// Reads the firmware's diagnostic log.
        GetLog = 0xa2,
        /// Writes one chunk of a firmware image (maintenance mode only).
        FwUpdate = 0xb1,
        /// Erases a firmware bank (maintenance mode only).
        FwErase = 0xb2,
        /// Reboots the chip into the requested firmware.
        Startup = 0xb3,
    }
}

wire_enum! {
    /// An L2 response status, mirroring the chip's documented byte values.
    pub enum Status: u8 {
        /// A request (or request chunk run) was accepted.
        RequestOk = 0x01,
        /// A complete result is contained in this chunk.
        ResultOk = 0x02,
        /// A request chunk was accepted; more chunks are expected.
        RequestCont = 0x03,
        /// A result chunk; more chunks follow.
        ResultCont = 0x04,
        /// The chip is busy executing another request.
        ChipBusy = 0x05,
        /// The handshake failed on the chip's side.
        HandshakeErr = 0x79,
        /// An encrypted command arrived without an established session.
        NoSession = 0x7a,
        /// The authentication tag of an encrypted command did not verify.
        TagErr = 0x7b,
        /// The request frame failed its CRC check on the chip's side.
        CrcErr = 0x7c,
        /// The request opcode is not known to the chip.
        UnknownReq = 0x7e,
        /// The chip failed in an unspecified way.
        GenErr = 0x7f,
        /// No response is ready yet. Never surfaced to callers; the
        /// transport's poll loop consumes it.
        NoResp = 0xff,
    }
}

/// An L2 protocol error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The chip did not recognize the request.
    UnknownRequest,
    /// The chip reported an unspecified failure.
    GenericError,
    /// The chip is busy; the request should be retried later.
    ChipBusy,
    /// The operation is not allowed in the chip's current mode (for
    /// example, an encrypted command while in maintenance mode).
    BadChipMode,
    /// A response chunk was structurally invalid: bad length, unknown
    /// status byte, or an unexpected status for the protocol state.
    Malformed,
    /// A multi-chunk response did not fit the caller's buffer.
    BufferOverflow,
}

/// Maps a non-OK [`Status`] onto the error a caller should see.
///
/// Session-fatal statuses map into [`crate::l3`] errors; the caller is
/// responsible for tearing the session down first (see
/// [`session_fatal()`]).
pub(crate) fn status_error(status: Status) -> crate::Error {
    match status {
        Status::HandshakeErr => l3::Error::HandshakeFailed.into(),
        Status::NoSession => l3::Error::NoSession.into(),
        Status::TagErr => l3::Error::TagMismatch.into(),
        Status::CrcErr => l1::Error::CrcMismatch.into(),
        Status::UnknownReq => Error::UnknownRequest.into(),
        Status::ChipBusy => Error::ChipBusy.into(),
        Status::NoResp => l1::Error::NoResponse.into(),
        Status::GenErr => Error::GenericError.into(),
        // OK-class statuses in an unexpected position are a protocol
        // violation.
        _ => Error::Malformed.into(),
    }
}

/// Returns whether `status` implies the secure session is gone.
pub(crate) fn session_fatal(status: Status) -> bool {
    matches!(
        status,
        Status::HandshakeErr | Status::NoSession | Status::TagErr
    )
}

/// An L2 request type.
pub trait Request: ToWire {
    /// The request identifier, used as the L1 opcode.
    const ID: RequestId;
}

/// A parsed response chunk.
///
/// Parsing validates the CRC and overall shape but does not interpret the
/// payload; `data` borrows the raw chunk.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Response<'wire> {
    /// The chip-status byte latched during the poll.
    pub chip_status: ChipStatus,
    /// The response status.
    pub status: Status,
    /// The payload of this chunk.
    pub data: &'wire [u8],
}

impl<'wire> Response<'wire> {
    /// Parses a raw response chunk
    /// `chip_status | status | len | data | crc16`.
    ///
    /// This is the single entry point for untrusted response bytes: it
    /// must return a typed error or a well-formed view for *any* input.
    pub fn parse(raw: &'wire [u8]) -> Result<Self, crate::Error> {
        let mut r = raw;
        let chip_status =
            ChipStatus::from_bits_truncate(r.read_le::<u8>().map_err(no_bytes)?);
        let status_byte = r.read_le::<u8>().map_err(no_bytes)?;
        let len = r.read_le::<u8>().map_err(no_bytes)? as usize;

        check!(len <= l1::MAX_PAYLOAD, l1::Error::FrameTooLong);
        check!(r.remaining_data() == len + 2, Error::Malformed);

        let data = r.read_borrow(len).map_err(no_bytes)?;
        let crc = r.read_le::<u16>().map_err(no_bytes)?;
        let expected = crc16::update(crc16::crc16(&raw[1..3]), data);
        check!(crc == expected, l1::Error::CrcMismatch);

        let status = Status::from_wire_value(status_byte)
            .ok_or_else(|| trace!(crate::Error::from(Error::Malformed)))?;

        Ok(Self {
            chip_status,
            status,
            data,
        })
    }
}

fn no_bytes(_: crate::io::Error) -> crate::Error {
    Error::Malformed.into()
}

/// Reassembles a multi-chunk response into a caller-provided buffer.
///
/// The assembler is owned by the call, not the context; L2 responses keep
/// no hidden cursor state between operations.
pub struct ChunkAssembler<'dst> {
    dst: &'dst mut [u8],
    written: usize,
}

impl<'dst> ChunkAssembler<'dst> {
    /// Creates an assembler writing into `dst`.
    pub fn new(dst: &'dst mut [u8]) -> Self {
        Self { dst, written: 0 }
    }

    /// Continues an interrupted assembly: the first `written` bytes of
    /// `dst` already hold earlier chunks.
    ///
    /// Used when a corrupted chunk is re-fetched with a
    /// [`ResendRequest`]; the chunks before it are kept rather than
    /// re-read.
    pub fn resume(dst: &'dst mut [u8], written: usize) -> Result<Self, Error> {
        check!(written <= dst.len(), Error::BufferOverflow);
        Ok(Self { dst, written })
    }

    /// Appends one chunk's payload.
    pub fn push(&mut self, chunk: &[u8]) -> Result<(), Error> {
        let end = self
            .written
            .checked_add(chunk.len())
            .ok_or(Error::BufferOverflow)?;
        check!(end <= self.dst.len(), Error::BufferOverflow);
        self.dst[self.written..end].copy_from_slice(chunk);
        self.written = end;
        Ok(())
    }

    /// Returns how many bytes have been assembled so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

wire_enum! {
    /// A chip-information object readable via [`GetInfoRequest`].
    pub enum InfoObject: u8 {
        /// The X.509 certificate store.
        X509Cert = 0x00,
        /// The 128-byte chip identification block.
        ChipId = 0x01,
        /// The version of the main CPU's application firmware.
        RiscvFwVersion = 0x02,
        /// The version of the crypto coprocessor's firmware.
        SpectFwVersion = 0x04,
        /// Header information for the firmware banks.
        FwBank = 0xb0,
    }
}

/// A [`RequestId::GetInfo`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GetInfoRequest {
    /// Which information object to read.
    pub object: InfoObject,
    /// Which [`CERT_BLOCK`]-sized block of the object to read.
    pub block_index: u8,
}

impl Request for GetInfoRequest {
    const ID: RequestId = RequestId::GetInfo;
}

impl ToWire for GetInfoRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        self.object.to_wire(&mut w)?;
        w.write_le(self.block_index)?;
        Ok(())
    }
}

/// A [`RequestId::Handshake`] request: the host's half of the key
/// agreement.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HandshakeRequest {
    /// The host's fresh ephemeral X25519 public key.
    pub host_ephemeral: [u8; 32],
    /// Which pairing-key slot authenticates this handshake.
    pub pairing_slot: u8,
}

impl Request for HandshakeRequest {
    const ID: RequestId = RequestId::Handshake;
}

impl ToWire for HandshakeRequest {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_bytes(&self.host_ephemeral)?;
        w.write_le(self.pairing_slot)?;
        Ok(())
    }
}

/// The chip's half of the key agreement, carried in the response to a
/// [`HandshakeRequest`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HandshakeResponse {
    /// The chip's ephemeral X25519 public key.
    pub chip_ephemeral: [u8; 32],
    /// The chip's authentication tag over the handshake transcript.
    pub auth_tag: [u8; 16],
}

impl<'wire> FromWire<'wire> for HandshakeResponse {
    fn from_wire<R: ReadBorrow<'wire>>(r: &mut R) -> Result<Self, wire::Error> {
        let mut chip_ephemeral = [0; 32];
        r.read_bytes(&mut chip_ephemeral)?;
        let mut auth_tag = [0; 16];
        r.read_bytes(&mut auth_tag)?;
        if r.remaining_data() != 0 {
            return Err(wire::Error::OutOfRange);
        }
        Ok(Self {
            chip_ephemeral,
            auth_tag,
        })
    }
}

wire_enum! {
    /// The reboot target of a [`StartupRequest`].
    pub enum StartupId: u8 {
        /// Reboot into the application firmware.
        Reboot = 0x01,
        /// Reboot into the maintenance (startup) firmware.
        MaintenanceReboot = 0x03,
    }
}

/// A [`RequestId::Startup`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StartupRequest {
    /// The reboot target.
    pub id: StartupId,
}

impl Request for StartupRequest {
    const ID: RequestId = RequestId::Startup;
}

impl ToWire for StartupRequest {
    fn to_wire<W: Write>(&self, w: W) -> Result<(), wire::Error> {
        self.id.to_wire(w)
    }
}

wire_enum! {
    /// The low-power state requested by a [`SleepRequest`].
    pub enum SleepKind: u8 {
        /// Ordinary sleep; any request wakes the chip back up.
        Sleep = 0x05,
    }
}

/// A [`RequestId::Sleep`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SleepRequest {
    /// Which low-power state to enter.
    pub kind: SleepKind,
}

impl Request for SleepRequest {
    const ID: RequestId = RequestId::Sleep;
}

impl ToWire for SleepRequest {
    fn to_wire<W: Write>(&self, w: W) -> Result<(), wire::Error> {
        self.kind.to_wire(w)
    }
}

/// A [`RequestId::Resend`] request, asking for the previous response chunk
/// again.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResendRequest;

impl Request for ResendRequest {
    const ID: RequestId = RequestId::Resend;
}

impl ToWire for ResendRequest {
    fn to_wire<W: Write>(&self, _: W) -> Result<(), wire::Error> {
        Ok(())
    }
}

/// A [`RequestId::GetLog`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GetLogRequest;

impl Request for GetLogRequest {
    const ID: RequestId = RequestId::GetLog;
}

impl ToWire for GetLogRequest {
    fn to_wire<W: Write>(&self, _: W) -> Result<(), wire::Error> {
        Ok(())
    }
}

/// A [`RequestId::EncryptedSessionAbort`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SessionAbortRequest;

impl Request for SessionAbortRequest {
    const ID: RequestId = RequestId::EncryptedSessionAbort;
}

impl ToWire for SessionAbortRequest {
    fn to_wire<W: Write>(&self, _: W) -> Result<(), wire::Error> {
        Ok(())
    }
}

/// One raw chunk of an encrypted L3 frame, carried in a
/// [`RequestId::EncryptedCmd`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EncryptedCmdChunk<'a> {
    /// The chunk bytes; at most [`crate::l1::MAX_PAYLOAD`] of them.
    pub data: &'a [u8],
}

impl Request for EncryptedCmdChunk<'_> {
    const ID: RequestId = RequestId::EncryptedCmd;
}

impl ToWire for EncryptedCmdChunk<'_> {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        w.write_bytes(self.data)?;
        Ok(())
    }
}

wire_enum! {
    /// A firmware bank addressable by erase and update requests.
    pub enum FwBank: u8 {
        /// First bank of the main CPU firmware.
        Fw1 = 1,
        /// Second bank of the main CPU firmware.
        Fw2 = 2,
        /// First bank of the crypto coprocessor firmware.
        Spect1 = 17,
        /// Second bank of the crypto coprocessor firmware.
        Spect2 = 18,
    }
}

/// A [`RequestId::FwErase`] request.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FwEraseRequest {
    /// The bank to erase.
    pub bank: FwBank,
}

impl Request for FwEraseRequest {
    const ID: RequestId = RequestId::FwErase;
}

impl ToWire for FwEraseRequest {
    fn to_wire<W: Write>(&self, w: W) -> Result<(), wire::Error> {
        self.bank.to_wire(w)
    }
}

/// A [`RequestId::FwUpdate`] request: one chunk of a firmware image at an
/// explicit offset.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FwUpdateRequest<'a> {
    /// The bank being written.
    pub bank: FwBank,
    /// The byte offset of this chunk within the bank.
    pub offset: u16,
    /// The chunk contents; at most [`FW_CHUNK`] bytes.
    pub data: &'a [u8],
}

impl Request for FwUpdateRequest<'_> {
    const ID: RequestId = RequestId::FwUpdate;
}

impl ToWire for FwUpdateRequest<'_> {
    fn to_wire<W: Write>(&self, mut w: W) -> Result<(), wire::Error> {
        if self.data.len() > FW_CHUNK {
            return Err(wire::Error::OutOfRange);
        }
        self.bank.to_wire(&mut w)?;
        w.write_le(self.offset)?;
        w.write_bytes(self.data)?;
        Ok(())
    }
}

/// A firmware version, as reported by [`InfoObject::RiscvFwVersion`] and
/// [`InfoObject::SpectFwVersion`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FwVersion {
    /// The raw four version bytes, as sent by the chip.
    pub raw: [u8; 4],
}

impl FwVersion {
    /// The major version number.
    pub fn major(&self) -> u8 {
        self.raw[2]
    }

    /// The minor version number.
    pub fn minor(&self) -> u8 {
        self.raw[1]
    }

    /// The patch version number.
    pub fn patch(&self) -> u8 {
        self.raw[0]
    }
}

impl<'wire> FromWire<'wire> for FwVersion {
    fn from_wire<R: ReadBorrow<'wire>>(r: &mut R) -> Result<Self, wire::Error> {
        let mut raw = [0; 4];
        r.read_bytes(&mut raw)?;
        Ok(Self { raw })
    }
}

/// The chip's 128-byte identification block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChipId {
    /// The raw identification bytes; their internal layout is defined by
    /// the chip's datasheet and is not interpreted by this crate.
    pub raw: [u8; 128],
}

impl<'wire> FromWire<'wire> for ChipId {
    fn from_wire<R: ReadBorrow<'wire>>(r: &mut R) -> Result<Self, wire::Error> {
        let mut raw = [0; 128];
        r.read_bytes(&mut raw)?;
        Ok(Self { raw })
    }
}
