// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! The per-device context.
//!
//! A [`Chip`] owns everything there is to one secure element: the platform
//! port, the crypto provider, the single I/O buffer sized for the largest
//! encrypted frame, the last-seen chip status, and the secure-session
//! state. One typed method per chip command turns arguments into an
//! encrypted request, runs the bus exchange, and parses the typed result.
//!
//! A `Chip` is single-threaded by construction: it has no internal locks,
//! and at most one transfer is ever in flight. Two chips on two buses get
//! two `Chip`s.

use zeroize::Zeroize as _;

use crate::cert;
use crate::cmd;
use crate::crypto::Crypto;
use crate::io::Cursor;
use crate::l1;
use crate::l1::StatusBit;
use crate::l2;
use crate::l3;
use crate::port::Port;
use crate::wire;
use crate::wire::FromWire as _;
use crate::wire::ToWire as _;
use crate::wire::WireEnum as _;
use crate::Result;

/// The size of the context's I/O buffer: one maximal encrypted frame.
const BUF_LEN: usize = l3::MAX_FRAME;

/// The size of a command's result byte within a decrypted plaintext.
const RESULT_LEN: usize = 1;

/// Timeout configuration for a [`Chip`].
#[derive(Copy, Clone, Debug)]
pub struct Timeouts {
    /// Delay between response polls, in milliseconds.
    pub poll_interval_ms: u32,
    /// Poll deadline for ordinary responses, in milliseconds.
    pub poll_timeout_ms: u32,
    /// Poll deadline for the handshake round trip, in milliseconds.
    pub handshake_timeout_ms: u32,
    /// Poll deadline for a firmware-bank erase, in milliseconds.
    pub fw_erase_timeout_ms: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            poll_timeout_ms: 70,
            handshake_timeout_ms: 150,
            fw_erase_timeout_ms: 30_000,
        }
    }
}

/// Options struct for initializing a [`Chip`].
pub struct Options<'a, P, C> {
    /// The platform port the chip is wired to.
    pub port: &'a mut P,
    /// The crypto provider backing the secure session.
    pub crypto: &'a mut C,
    /// Timeout configuration.
    pub timeouts: Timeouts,
}

/// The firmware the chip booted into, as reported by [`Chip::init()`].
///
/// `Maintenance` is a warning, not an error: the application firmware
/// failed to start, but firmware update is still available, so callers
/// get a value they can act on rather than a dead end.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootState {
    /// The application firmware is running; the full command set is
    /// available.
    Application,
    /// The chip is stuck in its maintenance firmware; only firmware
    /// update requests will be honored.
    Maintenance,
}

/// A context for one secure-element chip.
///
/// See the [crate documentation](crate) for an overview and the
/// [module documentation](self) for the ownership rules.
///
/// # Transport-error recovery
///
/// A command whose *response* is mangled on the wire fails with
/// [`l1::Error::CrcMismatch`] while the session and its counters stay
/// untouched. The chip still holds the response: calling the same
/// command again re-fetches it with a resend request instead of
/// executing the command a second time, so the retry is both cheap and
/// idempotent. Calling a different command abandons the pending
/// response.
pub struct Chip<'a, P: Port, C: Crypto> {
    port: &'a mut P,
    crypto: &'a mut C,
    timeouts: Timeouts,
    session: l3::Session,
    mode: Option<l1::ChipStatus>,
    buf: [u8; BUF_LEN],
    /// A response interrupted by transport corruption: how many frame
    /// bytes were already assembled, and which command they answer. The
    /// next invocation of that same command recovers the response with a
    /// [`l2::ResendRequest`] instead of re-executing it.
    pending_resend: Option<(usize, cmd::CommandId)>,
}

impl<'a, P: Port, C: Crypto> Chip<'a, P, C> {
    /// Creates a new `Chip` with the given `Options`.
    ///
    /// No bus traffic happens yet; call [`Chip::init()`] to bring the
    /// chip into a known mode.
    pub fn new(opts: Options<'a, P, C>) -> Self {
        Self {
            port: opts.port,
            crypto: opts.crypto,
            timeouts: opts.timeouts,
            session: l3::Session::Idle,
            mode: None,
            buf: [0; BUF_LEN],
            pending_resend: None,
        }
    }

    fn timing(&self) -> l1::Timing {
        self.timing_with(self.timeouts.poll_timeout_ms)
    }

    fn timing_with(&self, poll_timeout_ms: u32) -> l1::Timing {
        l1::Timing {
            poll_interval_ms: self.timeouts.poll_interval_ms,
            poll_timeout_ms,
        }
    }

    /// Drops all session state and clears the I/O buffer.
    fn teardown(&mut self) {
        self.session.terminate();
        self.pending_resend = None;
        self.buf.zeroize();
    }

    /// Brings the chip from wherever power-up left it into a running
    /// firmware.
    ///
    /// If the chip reports its startup mode, a reboot into the
    /// application firmware is requested. A chip that *still* reports
    /// startup afterwards has no bootable application firmware; that is
    /// returned as [`BootState::Maintenance`] so the caller may proceed
    /// to a firmware update.
    pub fn init(&mut self) -> Result<BootState> {
        self.teardown();
        self.mode = None;

        let timing = self.timing();
        let mut status = l1::read_status(self.port, &timing)?;
        self.mode = Some(status);
        if status.contains(StatusBit::Start) {
            status = self.restart(l2::StartupId::Reboot)?;
        }

        if status.contains(StatusBit::Start) {
            warn!("application firmware did not come up; maintenance only");
            Ok(BootState::Maintenance)
        } else {
            info!("chip is in application mode");
            Ok(BootState::Application)
        }
    }

    /// Releases the context.
    ///
    /// Tears down any session, zeroizes key material and the I/O buffer,
    /// and forgets the cached chip mode. Calling `deinit` more than once
    /// is harmless.
    pub fn deinit(&mut self) {
        self.teardown();
        self.mode = None;
    }

    /// The most recently observed chip status, if any exchange has
    /// happened yet.
    pub fn mode(&self) -> Option<l1::ChipStatus> {
        self.mode
    }

    /// Whether a secure session is currently established.
    pub fn is_session_established(&self) -> bool {
        self.session.is_established()
    }

    /// The session's `(n_cmd, n_res)` counters, if one is established.
    pub fn session_counters(&self) -> Option<(u64, u64)> {
        self.session.counters()
    }

    /// Reboots the chip and waits for it to come back up.
    ///
    /// Any established session dies with the reboot. Returns the chip
    /// status observed once the chip reports ready again.
    pub fn restart(&mut self, id: l2::StartupId) -> Result<l1::ChipStatus> {
        self.teardown();

        self.l2_send(&l2::StartupRequest { id })?;
        self.l2_recv_into(l2::Status::RequestOk, &mut [])?;

        let timing = self.timing();
        let mut waited = 0;
        loop {
            let status = l1::read_status(self.port, &timing)?;
            self.mode = Some(status);
            if status.contains(StatusBit::Ready) {
                return Ok(status);
            }

            check!(
                waited < self.timeouts.poll_timeout_ms,
                l1::Error::NoResponse
            );
            self.port.delay_ms(self.timeouts.poll_interval_ms);
            waited = waited
                .saturating_add(self.timeouts.poll_interval_ms.max(1));
        }
    }

    /// Puts the chip to sleep. The secure session does not survive.
    pub fn sleep(&mut self) -> Result<()> {
        self.ensure_application()?;
        self.l2_send(&l2::SleepRequest {
            kind: l2::SleepKind::Sleep,
        })?;
        self.l2_recv_into(l2::Status::RequestOk, &mut [])?;
        self.teardown();
        Ok(())
    }

    // === L2 plumbing ===

    pub(crate) fn l2_send<R: l2::Request>(&mut self, req: &R) -> Result<()> {
        // Any unrelated request makes the chip forget the response it was
        // holding for a resend; drop the recovery note with it.
        if !matches!(
            R::ID,
            l2::RequestId::EncryptedCmd | l2::RequestId::Resend
        ) {
            self.pending_resend = None;
        }

        let mut payload = [0; l1::MAX_PAYLOAD];
        let mut cursor = Cursor::new(&mut payload);
        req.to_wire(&mut cursor)?;
        let timing = self.timing();
        l1::send_frame(
            self.port,
            R::ID.to_wire_value(),
            cursor.consumed_bytes(),
            &timing,
        )?;
        Ok(())
    }

    /// Receives a single-chunk response, requiring `want` as its status,
    /// and copies the payload into `out`. Returns the payload length.
    pub(crate) fn l2_recv_into(
        &mut self,
        want: l2::Status,
        out: &mut [u8],
    ) -> Result<usize> {
        self.l2_recv_into_timed(want, out, self.timeouts.poll_timeout_ms)
    }

    pub(crate) fn l2_recv_into_timed(
        &mut self,
        want: l2::Status,
        out: &mut [u8],
        poll_timeout_ms: u32,
    ) -> Result<usize> {
        let timing = self.timing_with(poll_timeout_ms);
        let mut chunk = [0; l1::CHUNK_LEN];
        let n = l1::read_chunk(self.port, &mut chunk, &timing)?;
        let resp = l2::Response::parse(&chunk[..n])?;
        self.mode = Some(resp.chip_status);
        self.expect_status(resp.status, want)?;
        check!(resp.data.len() <= out.len(), l2::Error::BufferOverflow);
        out[..resp.data.len()].copy_from_slice(resp.data);
        Ok(resp.data.len())
    }

    /// Checks a response status against the expected one, tearing down
    /// the session first when the status says it is gone.
    fn expect_status(&mut self, got: l2::Status, want: l2::Status) -> Result<()> {
        if got == want {
            return Ok(());
        }
        if l2::session_fatal(got) {
            self.teardown();
        }
        Err(trace!(l2::status_error(got), "unexpected L2 status: {:?}", got))
    }

    /// One request, one single-chunk response.
    fn l2_exchange<R: l2::Request>(
        &mut self,
        req: &R,
        want: l2::Status,
        out: &mut [u8],
    ) -> Result<usize> {
        self.l2_send(req)?;
        self.l2_recv_into(want, out)
    }

    fn cached_status(&mut self) -> Result<l1::ChipStatus> {
        match self.mode {
            Some(status) => Ok(status),
            None => {
                let timing = self.timing();
                let status = l1::read_status(self.port, &timing)?;
                self.mode = Some(status);
                Ok(status)
            }
        }
    }

    fn ensure_application(&mut self) -> Result<()> {
        let status = self.cached_status()?;
        check!(!status.contains(StatusBit::Start), l2::Error::BadChipMode);
        Ok(())
    }

    pub(crate) fn ensure_maintenance(&mut self) -> Result<()> {
        let status = self.cached_status()?;
        check!(status.contains(StatusBit::Start), l2::Error::BadChipMode);
        Ok(())
    }

    pub(crate) fn fw_erase_timeout_ms(&self) -> u32 {
        self.timeouts.fw_erase_timeout_ms
    }

    // === Chip information ===

    /// Reads the chip's 128-byte identification block.
    pub fn get_chip_id(&mut self) -> Result<l2::ChipId> {
        let mut out = [0; 128];
        let n = self.l2_exchange(
            &l2::GetInfoRequest {
                object: l2::InfoObject::ChipId,
                block_index: 0,
            },
            l2::Status::ResultOk,
            &mut out,
        )?;
        check!(n == 128, l2::Error::Malformed);
        Ok(l2::ChipId::from_wire(&mut &out[..])?)
    }

    /// Reads the version of the main CPU's application firmware.
    pub fn get_riscv_fw_version(&mut self) -> Result<l2::FwVersion> {
        self.get_fw_version(l2::InfoObject::RiscvFwVersion)
    }

    /// Reads the version of the crypto coprocessor's firmware.
    pub fn get_spect_fw_version(&mut self) -> Result<l2::FwVersion> {
        self.get_fw_version(l2::InfoObject::SpectFwVersion)
    }

    fn get_fw_version(&mut self, object: l2::InfoObject) -> Result<l2::FwVersion> {
        let mut out = [0; 4];
        let n = self.l2_exchange(
            &l2::GetInfoRequest {
                object,
                block_index: 0,
            },
            l2::Status::ResultOk,
            &mut out,
        )?;
        check!(n == 4, l2::Error::Malformed);
        Ok(l2::FwVersion::from_wire(&mut &out[..])?)
    }

    /// Reads the firmware-bank header block into `out`, returning its
    /// length.
    pub fn get_fw_bank_info(&mut self, out: &mut [u8]) -> Result<usize> {
        self.l2_exchange(
            &l2::GetInfoRequest {
                object: l2::InfoObject::FwBank,
                block_index: 0,
            },
            l2::Status::ResultOk,
            out,
        )
    }

    /// Reads the raw certificate store into `store`, returning its
    /// encoded length.
    ///
    /// Use [`cert::Store::parse()`] on the returned prefix; `store`
    /// should be [`cert::MAX_STORE`] bytes to fit any chip.
    pub fn read_cert_store(&mut self, store: &mut [u8]) -> Result<usize> {
        let mut block = [0; l2::CERT_BLOCK];
        let n = self.l2_exchange(
            &l2::GetInfoRequest {
                object: l2::InfoObject::X509Cert,
                block_index: 0,
            },
            l2::Status::ResultOk,
            &mut block,
        )?;
        check!(n >= cert::header_len(), cert::Error::BadStore);

        let total = cert::Store::total_len(&block[..n])?;
        check!(total <= store.len(), l2::Error::BufferOverflow);

        let mut written = n.min(total);
        store[..written].copy_from_slice(&block[..written]);

        let mut block_index = 1;
        while written < total {
            let n = self.l2_exchange(
                &l2::GetInfoRequest {
                    object: l2::InfoObject::X509Cert,
                    block_index,
                },
                l2::Status::ResultOk,
                &mut block,
            )?;
            check!(n != 0, l2::Error::Malformed);
            let take = n.min(total - written);
            store[written..written + take].copy_from_slice(&block[..take]);
            written += take;
            block_index += 1;
        }
        Ok(total)
    }

    /// Convenience: fetches the certificate store and extracts the
    /// chip's static X25519 public key from the device certificate.
    ///
    /// Verifying the certificate chain against a root of trust is the
    /// caller's responsibility; this only parses.
    pub fn chip_static_pubkey(&mut self) -> Result<[u8; 32]> {
        let mut store_buf = [0; cert::MAX_STORE];
        let n = self.read_cert_store(&mut store_buf)?;
        let store = cert::Store::parse(&store_buf[..n])?;
        Ok(cert::x25519_subject_pubkey(store.device_cert())?)
    }

    /// Reads the firmware's diagnostic log into `out`, returning its
    /// length. The log arrives as a run of chunks.
    pub fn get_log(&mut self, out: &mut [u8]) -> Result<usize> {
        self.l2_send(&l2::GetLogRequest)?;

        let mut asm = l2::ChunkAssembler::new(out);
        loop {
            let timing = self.timing();
            let mut chunk = [0; l1::CHUNK_LEN];
            let n = l1::read_chunk(self.port, &mut chunk, &timing)?;
            let resp = l2::Response::parse(&chunk[..n])?;
            self.mode = Some(resp.chip_status);
            match resp.status {
                l2::Status::ResultCont => asm.push(resp.data)?,
                l2::Status::ResultOk => {
                    asm.push(resp.data)?;
                    return Ok(asm.written());
                }
                other => {
                    if l2::session_fatal(other) {
                        self.teardown();
                    }
                    return Err(trace!(l2::status_error(other)));
                }
            }
        }
    }

    // === Secure session ===

    /// Establishes a secure session.
    ///
    /// `st_pub` is the chip's static public key (see
    /// [`Chip::chip_static_pubkey()`]), `pairing_slot` selects which of
    /// the four pairing keys authenticates the handshake, and `sh_priv`
    /// is the host's private half of that pairing key.
    ///
    /// Any previously established session is torn down first, even on
    /// failure.
    pub fn start_session(
        &mut self,
        st_pub: &[u8; 32],
        pairing_slot: u8,
        sh_priv: &[u8; 32],
    ) -> Result<()> {
        check!(
            pairing_slot < cmd::PAIRING_SLOTS,
            cmd::ArgError::SlotOutOfRange
        );
        self.ensure_application()?;
        self.teardown();

        let mut eh_priv = [0; 32];
        self.port.fill_random(&mut eh_priv)?;
        let result = self.handshake(st_pub, pairing_slot, sh_priv, &eh_priv);
        eh_priv.zeroize();

        match result {
            Ok(keys) => {
                info!("session established on pairing slot {}", pairing_slot);
                self.session = l3::Session::Established(keys);
                Ok(())
            }
            Err(e) => {
                self.teardown();
                Err(e)
            }
        }
    }

    fn handshake(
        &mut self,
        st_pub: &[u8; 32],
        pairing_slot: u8,
        sh_priv: &[u8; 32],
        eh_priv: &[u8; 32],
    ) -> Result<l3::Keys> {
        let eh_pub = self.crypto.x25519_public(eh_priv)?;
        let sh_pub = self.crypto.x25519_public(sh_priv)?;

        self.l2_send(&l2::HandshakeRequest {
            host_ephemeral: eh_pub,
            pairing_slot,
        })?;

        let mut out = [0; 48];
        let n = self.l2_recv_into_timed(
            l2::Status::RequestOk,
            &mut out,
            self.timeouts.handshake_timeout_ms,
        )?;
        check!(n == out.len(), l2::Error::Malformed);
        let resp = l2::HandshakeResponse::from_wire(&mut &out[..])?;

        let keys = l3::derive(
            self.crypto,
            &l3::Transcript {
                st_pub,
                sh_pub: &sh_pub,
                eh_pub: &eh_pub,
                et_pub: &resp.chip_ephemeral,
            },
            eh_priv,
            sh_priv,
            &resp.auth_tag,
        )?;
        Ok(keys)
    }

    /// Tears down the secure session, telling the chip first.
    ///
    /// The local session state is destroyed even if the chip cannot be
    /// reached; the error (if any) reports what happened on the bus.
    pub fn abort_session(&mut self) -> Result<()> {
        if !self.session.is_established() {
            return Ok(());
        }
        let result = self.abort_exchange();
        self.teardown();
        result
    }

    fn abort_exchange(&mut self) -> Result<()> {
        self.l2_send(&l2::SessionAbortRequest)?;
        self.l2_recv_into(l2::Status::RequestOk, &mut [])?;
        Ok(())
    }

    // === Encrypted command plumbing ===

    /// Runs one encrypted command round trip.
    ///
    /// Serializes `req`, seals it, ships it in [`l2::EncryptedCmdChunk`]s,
    /// reassembles and opens the response, and advances both counters.
    /// On success, returns the result byte and the plaintext length; the
    /// result data sits in the I/O buffer (see [`Chip::resp_data()`]).
    ///
    /// A response lost to transport corruption is recoverable: the
    /// failing call surfaces [`l1::Error::CrcMismatch`] with the session
    /// and counters untouched, and re-invoking the *same* command asks
    /// the chip to resend its pending response rather than execute the
    /// command again. Invoking any other command abandons the pending
    /// response instead.
    fn command<R: cmd::Request>(&mut self, req: &R) -> Result<(u8, usize)> {
        check!(
            self.session.is_established(),
            l3::Error::NoSession
        );
        self.ensure_application()?;

        match self.pending_resend.take() {
            Some((assembled, id)) if id == R::ID => {
                return self.finish_exchange(R::ID, assembled, true);
            }
            _ => {}
        }

        let plain_len = cmd::serialize(
            req,
            &mut self.buf[l3::LEN_FIELD..l3::LEN_FIELD + l3::MAX_PLAINTEXT],
        )?;

        let frame_len = {
            let keys = self.session.keys_mut()?;
            match l3::seal_frame(self.crypto, keys, &mut self.buf, plain_len) {
                Ok(len) => len,
                Err(e) => {
                    // A counter at its ceiling ends the session.
                    if matches!(e, crate::Error::Session(_)) {
                        self.teardown();
                    }
                    return Err(e);
                }
            }
        };

        self.send_encrypted(frame_len)?;
        self.finish_exchange(R::ID, 0, false)
    }

    /// Receives, opens, and accounts one encrypted response.
    ///
    /// When recovering an interrupted receive, `assembled` frame bytes
    /// are already sitting in the buffer and `resend` asks the chip to
    /// re-send its last response chunk before polling.
    fn finish_exchange(
        &mut self,
        id: cmd::CommandId,
        assembled: usize,
        resend: bool,
    ) -> Result<(u8, usize)> {
        if resend {
            self.l2_send(&l2::ResendRequest)?;
        }

        let resp_frame_len = match self.recv_encrypted(id, assembled) {
            Ok(n) => n,
            Err(e) => {
                // A session-fatal status from the chip arrives here as a
                // session error; finish the teardown locally.
                if matches!(e, crate::Error::Session(_)) {
                    self.teardown();
                }
                return Err(e);
            }
        };

        let plain_len = {
            let keys = self.session.keys_mut()?;
            match l3::open_frame(
                self.crypto,
                keys,
                &mut self.buf,
                resp_frame_len,
            ) {
                Ok(len) => len,
                Err(e) => {
                    // Tag, counter, decrypt, or framing failures mean the
                    // two sides are out of sync; the session is over.
                    self.teardown();
                    return Err(e);
                }
            }
        };

        let keys = self.session.keys_mut()?;
        keys.n_cmd += 1;
        keys.n_res += 1;

        check!(plain_len >= RESULT_LEN, l2::Error::Malformed);
        Ok((self.buf[l3::LEN_FIELD], plain_len))
    }

    /// The result-data region of the last decrypted response.
    fn resp_data(&self, plain_len: usize) -> &[u8] {
        &self.buf[l3::LEN_FIELD + RESULT_LEN..l3::LEN_FIELD + plain_len]
    }

    /// Ships `self.buf[..frame_len]` as a run of encrypted-command
    /// chunks.
    fn send_encrypted(&mut self, frame_len: usize) -> Result<()> {
        let mut offset = 0;
        while offset < frame_len {
            let end = (offset + l1::MAX_PAYLOAD).min(frame_len);
            let last = end == frame_len;

            let mut chunk = [0; l1::MAX_PAYLOAD];
            chunk[..end - offset].copy_from_slice(&self.buf[offset..end]);
            self.l2_send(&l2::EncryptedCmdChunk {
                data: &chunk[..end - offset],
            })?;

            let want = if last {
                l2::Status::RequestOk
            } else {
                l2::Status::RequestCont
            };
            self.l2_recv_into(want, &mut [])?;
            offset = end;
        }
        Ok(())
    }

    /// Reassembles an encrypted response into `self.buf`, returning the
    /// frame length. `start` bytes are already assembled when resuming
    /// after a resend.
    ///
    /// A chunk that fails its CRC check leaves a recovery note behind so
    /// that the next invocation of command `id` can re-fetch it.
    fn recv_encrypted(
        &mut self,
        id: cmd::CommandId,
        start: usize,
    ) -> Result<usize> {
        let timing = self.timing();
        let Chip {
            port,
            buf,
            mode,
            pending_resend,
            ..
        } = self;

        let mut asm = l2::ChunkAssembler::resume(&mut buf[..], start)?;
        loop {
            let mut chunk = [0; l1::CHUNK_LEN];
            let n = l1::read_chunk(&mut **port, &mut chunk, &timing)?;
            let resp = match l2::Response::parse(&chunk[..n]) {
                Ok(resp) => resp,
                Err(e) => {
                    if matches!(
                        e,
                        crate::Error::Transport(l1::Error::CrcMismatch)
                    ) {
                        *pending_resend = Some((asm.written(), id));
                    }
                    return Err(e);
                }
            };
            *mode = Some(resp.chip_status);
            match resp.status {
                l2::Status::ResultCont => asm.push(resp.data)?,
                l2::Status::ResultOk => {
                    asm.push(resp.data)?;
                    return Ok(asm.written());
                }
                other => {
                    return Err(trace!(
                        l2::status_error(other),
                        "encrypted exchange failed: {:?}",
                        other
                    ));
                }
            }
        }
    }

    // === Typed commands ===

    /// Echoes `msg` through the chip; the reply must match byte for
    /// byte. `echo` must be exactly as long as `msg`.
    pub fn ping(&mut self, msg: &[u8], echo: &mut [u8]) -> Result<()> {
        check!(msg.len() <= cmd::PING_MAX, cmd::ArgError::LengthOutOfRange);
        check!(echo.len() == msg.len(), cmd::ArgError::LengthOutOfRange);

        let (result, len) = self.command(&cmd::ping::PingRequest { msg })?;
        let resp =
            cmd::ping::PingResponse::parse(result, self.resp_data(len))?;
        check!(resp.echo.len() == echo.len(), wire::Error::OutOfRange);
        echo.copy_from_slice(resp.echo);
        Ok(())
    }

    /// Fills `out` with random bytes from the chip's TRNG; at most
    /// [`cmd::RANDOM_MAX`] at a time.
    pub fn random_bytes(&mut self, out: &mut [u8]) -> Result<()> {
        check!(
            out.len() <= cmd::RANDOM_MAX,
            cmd::ArgError::LengthOutOfRange
        );

        let n = out.len() as u8;
        let (result, len) = self.command(&cmd::random::GetRequest { n })?;
        let resp = cmd::random::GetResponse::parse(
            result,
            self.resp_data(len),
            n,
        )?;
        out.copy_from_slice(resp.bytes);
        Ok(())
    }

    /// Writes an X25519 public key into a pairing-key slot.
    pub fn pairing_key_write(
        &mut self,
        slot: u8,
        key: &[u8; 32],
    ) -> Result<()> {
        check!(slot < cmd::PAIRING_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) = self.command(&cmd::pairing_key::WriteRequest {
            slot,
            key: *key,
        })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Reads back a pairing-key slot's state.
    pub fn pairing_key_read(
        &mut self,
        slot: u8,
    ) -> Result<cmd::pairing_key::SlotState> {
        check!(slot < cmd::PAIRING_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::pairing_key::ReadRequest { slot })?;
        cmd::pairing_key::SlotState::parse(result, self.resp_data(len))
    }

    /// Permanently invalidates a pairing-key slot.
    pub fn pairing_key_invalidate(&mut self, slot: u8) -> Result<()> {
        check!(slot < cmd::PAIRING_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::pairing_key::InvalidateRequest { slot })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Writes a reprogrammable configuration register.
    pub fn r_config_write(&mut self, addr: u16, value: u32) -> Result<()> {
        let (result, len) = self
            .command(&cmd::config::RConfigWriteRequest { addr, value })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Reads a reprogrammable configuration register.
    pub fn r_config_read(&mut self, addr: u16) -> Result<u32> {
        let (result, len) =
            self.command(&cmd::config::RConfigReadRequest { addr })?;
        let resp =
            cmd::config::ValueResponse::parse(result, self.resp_data(len))?;
        Ok(resp.value)
    }

    /// Erases the whole reprogrammable configuration memory.
    pub fn r_config_erase(&mut self) -> Result<()> {
        let (result, len) =
            self.command(&cmd::config::RConfigEraseRequest)?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Irreversibly clears one bit of an I-config register.
    pub fn i_config_write(&mut self, addr: u16, bit_index: u8) -> Result<()> {
        check!(bit_index < 32, cmd::ArgError::LengthOutOfRange);

        let (result, len) = self.command(&cmd::config::IConfigWriteRequest {
            addr,
            bit_index,
        })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Reads an I-config register.
    pub fn i_config_read(&mut self, addr: u16) -> Result<u32> {
        let (result, len) =
            self.command(&cmd::config::IConfigReadRequest { addr })?;
        let resp =
            cmd::config::ValueResponse::parse(result, self.resp_data(len))?;
        Ok(resp.value)
    }

    /// Writes a user-data slot. The slot must be blank.
    pub fn r_mem_data_write(&mut self, slot: u16, data: &[u8]) -> Result<()> {
        check!(slot < cmd::R_MEM_SLOTS, cmd::ArgError::SlotOutOfRange);
        check!(
            data.len() <= cmd::R_MEM_DATA_MAX,
            cmd::ArgError::LengthOutOfRange
        );

        let (result, len) =
            self.command(&cmd::r_mem::WriteRequest { slot, data })?;
        cmd::r_mem::parse_write(result, self.resp_data(len))
    }

    /// Reads a user-data slot into `out`.
    ///
    /// Returns `Ok(None)` for a blank slot, which keeps "read, then
    /// decide" flows free of error plumbing.
    pub fn r_mem_data_read(
        &mut self,
        slot: u16,
        out: &mut [u8],
    ) -> Result<Option<usize>> {
        check!(slot < cmd::R_MEM_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::r_mem::ReadRequest { slot })?;
        match cmd::r_mem::ReadResponse::parse(result, self.resp_data(len))? {
            cmd::r_mem::ReadResponse::Empty => Ok(None),
            cmd::r_mem::ReadResponse::Data(data) => {
                check!(data.len() <= out.len(), l2::Error::BufferOverflow);
                out[..data.len()].copy_from_slice(data);
                Ok(Some(data.len()))
            }
        }
    }

    /// Erases a user-data slot. Erasing a blank slot succeeds.
    pub fn r_mem_data_erase(&mut self, slot: u16) -> Result<()> {
        check!(slot < cmd::R_MEM_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::r_mem::EraseRequest { slot })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Generates a fresh key on `curve` in an ECC slot.
    pub fn ecc_key_generate(
        &mut self,
        slot: u16,
        curve: cmd::ecc::Curve,
    ) -> Result<()> {
        check!(slot < cmd::ECC_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) = self
            .command(&cmd::ecc::KeyGenerateRequest { slot, curve })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Stores a caller-provided private key in an ECC slot.
    pub fn ecc_key_store(
        &mut self,
        slot: u16,
        curve: cmd::ecc::Curve,
        key: &[u8; 32],
    ) -> Result<()> {
        check!(slot < cmd::ECC_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) = self.command(&cmd::ecc::KeyStoreRequest {
            slot,
            curve,
            key: *key,
        })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Reads the public half of an ECC slot; `Empty` for a blank slot.
    pub fn ecc_key_read(
        &mut self,
        slot: u16,
    ) -> Result<cmd::ecc::KeyReadResponse> {
        check!(slot < cmd::ECC_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::ecc::KeyReadRequest { slot })?;
        cmd::ecc::KeyReadResponse::parse(result, self.resp_data(len))
    }

    /// Erases an ECC slot. Erasing a blank slot succeeds.
    pub fn ecc_key_erase(&mut self, slot: u16) -> Result<()> {
        check!(slot < cmd::ECC_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::ecc::KeyEraseRequest { slot })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// ECDSA-signs a 32-byte message digest with the P-256 key in
    /// `slot`, returning the raw `r || s` signature.
    pub fn ecc_ecdsa_sign(
        &mut self,
        slot: u16,
        digest: &[u8; 32],
    ) -> Result<[u8; 64]> {
        check!(slot < cmd::ECC_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) = self.command(&cmd::ecc::EcdsaSignRequest {
            slot,
            digest: *digest,
        })?;
        let resp =
            cmd::ecc::SignResponse::parse(result, self.resp_data(len))?;
        Ok(resp.sig)
    }

    /// EdDSA-signs `msg` with the Ed25519 key in `slot`, returning the
    /// raw `R || S` signature.
    pub fn ecc_eddsa_sign(
        &mut self,
        slot: u16,
        msg: &[u8],
    ) -> Result<[u8; 64]> {
        check!(slot < cmd::ECC_SLOTS, cmd::ArgError::SlotOutOfRange);
        check!(
            !msg.is_empty() && msg.len() <= cmd::EDDSA_MSG_MAX,
            cmd::ArgError::LengthOutOfRange
        );

        let (result, len) =
            self.command(&cmd::ecc::EddsaSignRequest { slot, msg })?;
        let resp =
            cmd::ecc::SignResponse::parse(result, self.resp_data(len))?;
        Ok(resp.sig)
    }

    /// Initializes a monotonic counter to `value`.
    pub fn mcounter_init(&mut self, index: u16, value: u32) -> Result<()> {
        check!(index < cmd::MCOUNTERS, cmd::ArgError::SlotOutOfRange);

        let (result, len) = self
            .command(&cmd::mcounter::InitRequest { index, value })?;
        cmd::general_result(result)?;
        check!(self.resp_data(len).is_empty(), wire::Error::OutOfRange);
        Ok(())
    }

    /// Decrements a monotonic counter; `Exhausted` once it hits zero.
    pub fn mcounter_update(
        &mut self,
        index: u16,
    ) -> Result<cmd::mcounter::UpdateResponse> {
        check!(index < cmd::MCOUNTERS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::mcounter::UpdateRequest { index })?;
        cmd::mcounter::UpdateResponse::parse(result, self.resp_data(len))
    }

    /// Reads a monotonic counter's current value.
    pub fn mcounter_get(&mut self, index: u16) -> Result<u32> {
        check!(index < cmd::MCOUNTERS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::mcounter::GetRequest { index })?;
        let resp =
            cmd::mcounter::GetResponse::parse(result, self.resp_data(len))?;
        Ok(resp.value)
    }

    /// MACs `data` with the slot's one-shot secret, destroying it.
    pub fn mac_and_destroy(
        &mut self,
        slot: u16,
        data: &[u8; 32],
    ) -> Result<[u8; 32]> {
        check!(slot < cmd::MACANDD_SLOTS, cmd::ArgError::SlotOutOfRange);

        let (result, len) =
            self.command(&cmd::mac_destroy::MacAndDestroyRequest {
                slot,
                data: *data,
            })?;
        let resp = cmd::mac_destroy::MacAndDestroyResponse::parse(
            result,
            self.resp_data(len),
        )?;
        Ok(resp.mac)
    }

    /// Reads the chip's 32-byte serial code.
    pub fn serial_code_get(&mut self) -> Result<[u8; 32]> {
        let (result, len) =
            self.command(&cmd::serial::SerialCodeRequest)?;
        let resp = cmd::serial::SerialCodeResponse::parse(
            result,
            self.resp_data(len),
        )?;
        Ok(resp.code)
    }
}
