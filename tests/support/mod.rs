// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! An in-memory model of the secure element, driven through [`Port`].
//!
//! The model implements the chip's side of all three protocol layers:
//! it parses L1 frames off the "bus", executes L2 requests, runs the
//! chip's half of the handshake with the same software crypto the host
//! uses, and executes decrypted commands against in-memory slot state.
//! Fault-injection knobs corrupt single response CRCs or GCM tags so
//! tests can drive the error paths.

#![allow(dead_code)]

use std::cell::RefCell;
use std::cell::RefMut;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::rc::Rc;

use basilisk::cmd;
use basilisk::crc16;
use basilisk::crypto::soft::Soft;
use basilisk::crypto::Aead as _;
use basilisk::crypto::Hkdf as _;
use basilisk::crypto::Sha256 as _;
use basilisk::crypto::X25519 as _;
use basilisk::l3;
use basilisk::port;
use basilisk::port::Port;

use ring::signature::KeyPair as _;

const GET_RESPONSE: u8 = 0xaa;

const STATUS_REQUEST_OK: u8 = 0x01;
const STATUS_RESULT_OK: u8 = 0x02;
const STATUS_REQUEST_CONT: u8 = 0x03;
const STATUS_RESULT_CONT: u8 = 0x04;
const STATUS_HSK_ERR: u8 = 0x79;
const STATUS_NO_SESSION: u8 = 0x7a;
const STATUS_TAG_ERR: u8 = 0x7b;
const STATUS_CRC_ERR: u8 = 0x7c;
const STATUS_UNKNOWN_REQ: u8 = 0x7e;
const STATUS_GEN_ERR: u8 = 0x7f;
const STATUS_NO_RESP: u8 = 0xff;

const RESULT_OK: u8 = 0xc3;
const RESULT_FAIL: u8 = 0x3c;
const RESULT_INVALID_CMD: u8 = 0x02;

const CHIP_READY: u8 = 0x01;
const CHIP_START: u8 = 0x04;

/// One pairing-key slot on the model chip.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PairingSlot {
    Blank,
    Written([u8; 32]),
    Invalidated,
}

enum EccSlot {
    P256 {
        keypair: ring::signature::EcdsaKeyPair,
        pubkey: [u8; 64],
        origin: u8,
    },
    Ed25519 {
        keypair: ring::signature::Ed25519KeyPair,
        pubkey: [u8; 32],
        origin: u8,
    },
}

struct ChipSession {
    k_cmd: [u8; 32],
    k_res: [u8; 32],
    n_cmd: u64,
    n_res: u64,
}

/// The model chip. Implements [`Port`], so a
/// [`basilisk::Chip`] can be pointed straight at it.
pub struct ModelChip {
    soft: Soft,
    rng_state: u64,

    // Identity.
    st_priv: [u8; 32],
    pub st_pub: [u8; 32],
    pub pairing: [PairingSlot; 4],
    pub cert_store: Vec<u8>,
    chip_id: [u8; 128],
    riscv_fw: [u8; 4],
    spect_fw: [u8; 4],
    serial: [u8; 32],
    log: Vec<u8>,

    // Mode: whether the application firmware is bootable, and whether we
    // are currently sitting in the startup (maintenance) firmware.
    pub app_fw_ok: bool,
    pub in_startup: bool,

    // Slot state.
    session: Option<ChipSession>,
    r_config: HashMap<u16, u32>,
    i_config: HashMap<u16, u32>,
    r_mem: HashMap<u16, Vec<u8>>,
    ecc: HashMap<u16, EccSlot>,
    mcounter: [Option<u32>; 16],
    macandd_used: HashMap<u16, bool>,
    fw_banks: HashMap<u8, Vec<u8>>,

    // Transport state for the current chip-select cycle.
    selected: bool,
    req_acc: Vec<u8>,
    responding: bool,
    resp_stream: Vec<u8>,
    resp_pos: usize,

    // Queued response frames, each flagged if its CRC should be mangled
    // when served. Corruption happens on the "wire", so `last_frame`
    // keeps the pristine copy a resend request re-serves.
    pending: VecDeque<(Vec<u8>, bool)>,
    last_frame: Option<Vec<u8>>,
    enc_acc: Vec<u8>,

    // Fault injection.
    pub busy_polls: u32,
    pub corrupt_next_crc: bool,
    pub corrupt_next_result_crc: bool,
    pub corrupt_next_tag: bool,
}

impl ModelChip {
    pub fn new() -> Self {
        let mut soft = Soft::new();
        let st_priv = [0x5d; 32];
        let st_pub = soft.x25519_public(&st_priv).unwrap();

        let mut chip_id = [0; 128];
        for (i, b) in chip_id.iter_mut().enumerate() {
            *b = i as u8;
        }

        let mut chip = Self {
            soft,
            rng_state: 0x243f_6a88_85a3_08d3,
            st_priv,
            st_pub,
            pairing: [PairingSlot::Blank; 4],
            cert_store: Vec::new(),
            chip_id,
            riscv_fw: [1, 0, 1, 0],
            spect_fw: [2, 0, 2, 0],
            serial: [0x0b; 32],
            log: b"boot ok\nselftest ok\n".to_vec(),
            app_fw_ok: true,
            in_startup: true,
            session: None,
            r_config: HashMap::new(),
            i_config: HashMap::new(),
            r_mem: HashMap::new(),
            ecc: HashMap::new(),
            mcounter: [None; 16],
            macandd_used: HashMap::new(),
            fw_banks: HashMap::new(),
            selected: false,
            req_acc: Vec::new(),
            responding: false,
            resp_stream: Vec::new(),
            resp_pos: 0,
            pending: VecDeque::new(),
            last_frame: None,
            enc_acc: Vec::new(),
            busy_polls: 0,
            corrupt_next_crc: false,
            corrupt_next_result_crc: false,
            corrupt_next_tag: false,
        };
        chip.cert_store = chip.build_cert_store();
        chip
    }

    /// Installs a host pairing public key in `slot`.
    pub fn install_pairing_key(&mut self, slot: usize, sh_pub: [u8; 32]) {
        self.pairing[slot] = PairingSlot::Written(sh_pub);
    }

    pub fn riscv_fw_version(&self) -> [u8; 4] {
        self.riscv_fw
    }

    fn next_rand(&mut self) -> u8 {
        // xorshift64; deterministic so failures reproduce.
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        self.rng_state as u8
    }

    fn next_rand32(&mut self) -> [u8; 32] {
        let mut out = [0; 32];
        for b in &mut out {
            *b = self.next_rand();
        }
        out
    }

    // === Certificate store ===

    fn der_elem(tag: u8, contents: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        let len = contents.len();
        if len < 0x80 {
            out.push(len as u8);
        } else {
            out.push(0x82);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        out.extend_from_slice(contents);
        out
    }

    fn der_seq(contents: &[u8]) -> Vec<u8> {
        Self::der_elem(0x30, contents)
    }

    /// Builds a minimal device certificate carrying `st_pub`, plus a
    /// placeholder issuer certificate, in the chip's store framing.
    fn build_cert_store(&mut self) -> Vec<u8> {
        let alg = Self::der_seq(&Self::der_elem(0x06, &[0x2b, 0x65, 0x6e]));
        let mut bits = vec![0x00];
        bits.extend_from_slice(&self.st_pub);
        let mut spki_inner = alg;
        spki_inner.extend_from_slice(&Self::der_elem(0x03, &bits));
        let spki = Self::der_seq(&spki_inner);

        let mut tbs_inner = Self::der_elem(0x02, &[0x01]);
        tbs_inner.extend_from_slice(&Self::der_seq(&[])); // signature
        tbs_inner.extend_from_slice(&Self::der_seq(&[])); // issuer
        tbs_inner.extend_from_slice(&Self::der_seq(&[])); // validity
        tbs_inner.extend_from_slice(&Self::der_seq(&[])); // subject
        tbs_inner.extend_from_slice(&spki);
        let tbs = Self::der_seq(&tbs_inner);

        let mut cert_inner = tbs;
        cert_inner.extend_from_slice(&Self::der_seq(&[]));
        cert_inner.extend_from_slice(&Self::der_elem(0x03, &[0x00]));
        let device_cert = Self::der_seq(&cert_inner);

        // The issuer chain is opaque to the host; any DER blob will do.
        let issuer = Self::der_seq(&Self::der_elem(0x02, &[0x02]));

        let mut store = vec![0x01, 0x02];
        for len in [device_cert.len(), issuer.len(), 0, 0] {
            store.extend_from_slice(&(len as u16).to_le_bytes());
        }
        store.extend_from_slice(&device_cert);
        store.extend_from_slice(&issuer);
        store
    }

    // === Response queueing ===

    fn chip_status(&self) -> u8 {
        let mut status = CHIP_READY;
        if self.in_startup {
            status |= CHIP_START;
        }
        status
    }

    fn queue(&mut self, status: u8, data: &[u8]) {
        assert!(data.len() <= 252);
        let mut frame = vec![status, data.len() as u8];
        frame.extend_from_slice(data);
        let crc = crc16::update(crc16::crc16(&frame[..2]), data);
        frame.extend_from_slice(&crc.to_le_bytes());

        let corrupt = self.corrupt_next_crc;
        self.corrupt_next_crc = false;
        self.pending.push_back((frame, corrupt));
    }

    /// Queues `data` as a run of result chunks.
    fn queue_result(&mut self, data: &[u8]) {
        if self.corrupt_next_result_crc {
            self.corrupt_next_result_crc = false;
            self.corrupt_next_crc = true;
        }

        let mut chunks: Vec<&[u8]> = data.chunks(252).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let status = if i == last {
                STATUS_RESULT_OK
            } else {
                STATUS_RESULT_CONT
            };
            self.queue(status, chunk);
        }
    }

    // === L1/L2 request handling ===

    fn handle_request_frame(&mut self) {
        let frame = std::mem::take(&mut self.req_acc);
        if frame.len() < 4 {
            return;
        }

        let len = frame[1] as usize;
        if frame.len() < 2 + len + 2 {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }

        let expected = crc16::crc16(&frame[..2 + len]);
        let got = u16::from_le_bytes([frame[2 + len], frame[3 + len]]);
        if expected != got {
            self.queue(STATUS_CRC_ERR, &[]);
            return;
        }

        let payload = frame[2..2 + len].to_vec();
        match frame[0] {
            0x01 => self.req_get_info(&payload),
            0x02 => self.req_handshake(&payload),
            0x04 => self.req_encrypted_cmd(&payload),
            0x08 => {
                self.session = None;
                self.enc_acc.clear();
                self.queue(STATUS_REQUEST_OK, &[]);
            }
            0x10 => {
                if let Some(frame) = self.last_frame.clone() {
                    self.pending.push_front((frame, false));
                } else {
                    self.queue(STATUS_GEN_ERR, &[]);
                }
            }
            0x20 => {
                self.session = None;
                self.queue(STATUS_REQUEST_OK, &[]);
            }
            0xa2 => {
                let log = self.log.clone();
                self.queue_result(&log);
            }
            0xb1 => self.req_fw_update(&payload),
            0xb2 => self.req_fw_erase(&payload),
            0xb3 => self.req_startup(&payload),
            _ => self.queue(STATUS_UNKNOWN_REQ, &[]),
        }
    }

    fn req_get_info(&mut self, payload: &[u8]) {
        if payload.len() != 2 {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }
        let block = payload[1] as usize;
        match payload[0] {
            0x00 => {
                let start = (block * 128).min(self.cert_store.len());
                let end = (start + 128).min(self.cert_store.len());
                let mut out = self.cert_store[start..end].to_vec();
                out.resize(128, 0);
                self.queue_result(&out);
            }
            0x01 => {
                let id = self.chip_id;
                self.queue_result(&id);
            }
            0x02 => {
                let v = self.riscv_fw;
                self.queue_result(&v);
            }
            0x04 => {
                let v = self.spect_fw;
                self.queue_result(&v);
            }
            0xb0 => {
                let mut info = vec![0x01];
                info.extend_from_slice(&self.riscv_fw);
                self.queue_result(&info);
            }
            _ => self.queue(STATUS_GEN_ERR, &[]),
        }
    }

    fn mix(soft: &mut Soft, ck: &mut [u8; 32], ikm: &[u8; 32]) -> [u8; 32] {
        let mut okm = [0; 64];
        soft.hkdf(&ck[..], &ikm[..], &mut okm).unwrap();
        ck.copy_from_slice(&okm[..32]);
        let mut k = [0; 32];
        k.copy_from_slice(&okm[32..]);
        k
    }

    fn req_handshake(&mut self, payload: &[u8]) {
        if payload.len() != 33 {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }
        if self.in_startup {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }

        let mut eh_pub = [0; 32];
        eh_pub.copy_from_slice(&payload[..32]);
        let slot = payload[32] as usize;

        let sh_pub = match self.pairing.get(slot) {
            Some(PairingSlot::Written(key)) => *key,
            _ => {
                self.queue(STATUS_HSK_ERR, &[]);
                return;
            }
        };

        let et_priv = self.next_rand32();
        let et_pub = self.soft.x25519_public(&et_priv).unwrap();

        let mut h = [0; 32];
        self.soft.start().unwrap();
        self.soft.update(l3::PROTOCOL_NAME).unwrap();
        self.soft.update(&self.st_pub).unwrap();
        self.soft.update(&eh_pub).unwrap();
        self.soft.update(&sh_pub).unwrap();
        self.soft.update(&et_pub).unwrap();
        self.soft.finish(&mut h).unwrap();

        let mut ck = *l3::PROTOCOL_NAME;
        let dh1 = self.soft.x25519(&self.st_priv, &eh_pub).unwrap();
        Self::mix(&mut self.soft, &mut ck, &dh1);
        let dh2 = self.soft.x25519(&et_priv, &sh_pub).unwrap();
        Self::mix(&mut self.soft, &mut ck, &dh2);
        let dh3 = self.soft.x25519(&et_priv, &eh_pub).unwrap();
        let k_auth = Self::mix(&mut self.soft, &mut ck, &dh3);

        let mut okm = [0; 64];
        self.soft.hkdf(&ck, &[], &mut okm).unwrap();
        let mut k_cmd = [0; 32];
        let mut k_res = [0; 32];
        k_cmd.copy_from_slice(&okm[..32]);
        k_res.copy_from_slice(&okm[32..]);

        let mut tag_buf = [0; 16];
        self.soft
            .seal(&k_auth, &l3::nonce(0), &h, &mut tag_buf, 0)
            .unwrap();

        self.session = Some(ChipSession {
            k_cmd,
            k_res,
            n_cmd: 0,
            n_res: 0,
        });
        self.enc_acc.clear();

        let mut resp = et_pub.to_vec();
        resp.extend_from_slice(&tag_buf);
        self.queue(STATUS_REQUEST_OK, &resp);
    }

    fn req_encrypted_cmd(&mut self, payload: &[u8]) {
        self.enc_acc.extend_from_slice(payload);

        let total = if self.enc_acc.len() >= 2 {
            let len =
                u16::from_le_bytes([self.enc_acc[0], self.enc_acc[1]]) as usize;
            Some(2 + len + 16)
        } else {
            None
        };

        match total {
            Some(total) if self.enc_acc.len() >= total => {
                self.queue(STATUS_REQUEST_OK, &[]);
                let frame = std::mem::take(&mut self.enc_acc);
                self.execute_encrypted(&frame[..total]);
            }
            _ => self.queue(STATUS_REQUEST_CONT, &[]),
        }
    }

    fn execute_encrypted(&mut self, frame: &[u8]) {
        let session = match self.session.as_mut() {
            Some(session) => session,
            None => {
                self.queue(STATUS_NO_SESSION, &[]);
                return;
            }
        };

        let len = u16::from_le_bytes([frame[0], frame[1]]) as usize;
        let mut buf = frame[2..].to_vec();
        let nonce = l3::nonce(session.n_cmd);
        let k_cmd = session.k_cmd;
        match self.soft.open(&k_cmd, &nonce, &[], &mut buf) {
            Ok(n) => debug_assert_eq!(n, len),
            Err(_) => {
                self.session = None;
                self.queue(STATUS_TAG_ERR, &[]);
                return;
            }
        }

        let plain = buf[..len].to_vec();
        let result = self.execute_command(&plain);

        // Encrypt the result under k_res/n_res, then advance both
        // counters together.
        let session = self.session.as_mut().expect("session vanished");
        let mut out = vec![0; 2 + result.len() + 16];
        out[..2].copy_from_slice(&(result.len() as u16).to_le_bytes());
        out[2..2 + result.len()].copy_from_slice(&result);
        let nonce = l3::nonce(session.n_res);
        let k_res = session.k_res;
        self.soft
            .seal(&k_res, &nonce, &[], &mut out[2..], result.len())
            .unwrap();

        if self.corrupt_next_tag {
            self.corrupt_next_tag = false;
            let tag_start = 2 + result.len();
            out[tag_start] ^= 0x01;
        }

        let session = self.session.as_mut().expect("session vanished");
        session.n_cmd += 1;
        session.n_res += 1;

        self.queue_result(&out);
    }

    // === Command execution ===

    fn execute_command(&mut self, plain: &[u8]) -> Vec<u8> {
        if plain.is_empty() {
            return vec![RESULT_INVALID_CMD];
        }
        let data = &plain[1..];
        match plain[0] {
            0x01 => {
                let mut out = vec![RESULT_OK];
                out.extend_from_slice(data);
                out
            }
            0x10 => self.cmd_pairing_write(data),
            0x11 => self.cmd_pairing_read(data),
            0x12 => self.cmd_pairing_invalidate(data),
            0x20 => self.cmd_r_config_write(data),
            0x21 => self.cmd_r_config_read(data),
            0x22 => {
                self.r_config.clear();
                vec![RESULT_OK]
            }
            0x30 => self.cmd_i_config_write(data),
            0x31 => self.cmd_i_config_read(data),
            0x40 => self.cmd_r_mem_write(data),
            0x41 => self.cmd_r_mem_read(data),
            0x42 => self.cmd_r_mem_erase(data),
            0x50 => self.cmd_random(data),
            0x60 => self.cmd_ecc_generate(data),
            0x61 => self.cmd_ecc_store(data),
            0x62 => self.cmd_ecc_read(data),
            0x63 => self.cmd_ecc_erase(data),
            0x70 => self.cmd_ecdsa_sign(data),
            0x71 => self.cmd_eddsa_sign(data),
            0x80 => self.cmd_mcounter_init(data),
            0x81 => self.cmd_mcounter_update(data),
            0x82 => self.cmd_mcounter_get(data),
            0x90 => self.cmd_mac_and_destroy(data),
            0xa0 => {
                let mut out = vec![RESULT_OK, 0, 0, 0];
                out.extend_from_slice(&self.serial);
                out
            }
            _ => vec![RESULT_INVALID_CMD],
        }
    }

    fn slot_of(data: &[u8]) -> u16 {
        u16::from_le_bytes([data[0], data[1]])
    }

    fn cmd_pairing_write(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 + 1 + 32 {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data) as usize;
        if slot >= 4 {
            return vec![RESULT_FAIL];
        }
        match self.pairing[slot] {
            PairingSlot::Blank => {
                let mut key = [0; 32];
                key.copy_from_slice(&data[3..]);
                self.pairing[slot] = PairingSlot::Written(key);
                vec![RESULT_OK]
            }
            _ => vec![RESULT_FAIL],
        }
    }

    fn cmd_pairing_read(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data) as usize;
        if slot >= 4 {
            return vec![RESULT_FAIL];
        }
        match self.pairing[slot] {
            PairingSlot::Written(key) => {
                let mut out = vec![RESULT_OK, 0, 0, 0];
                out.extend_from_slice(&key);
                out
            }
            PairingSlot::Blank => vec![0x15],
            PairingSlot::Invalidated => vec![0x16],
        }
    }

    fn cmd_pairing_invalidate(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data) as usize;
        if slot >= 4 {
            return vec![RESULT_FAIL];
        }
        self.pairing[slot] = PairingSlot::Invalidated;
        vec![RESULT_OK]
    }

    fn cmd_r_config_write(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 + 1 + 4 {
            return vec![RESULT_INVALID_CMD];
        }
        let addr = Self::slot_of(data);
        let value = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
        self.r_config.insert(addr, value);
        vec![RESULT_OK]
    }

    fn cmd_r_config_read(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        let addr = Self::slot_of(data);
        let value = self.r_config.get(&addr).copied().unwrap_or(u32::MAX);
        let mut out = vec![RESULT_OK, 0, 0, 0];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    fn cmd_i_config_write(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 3 {
            return vec![RESULT_INVALID_CMD];
        }
        let addr = Self::slot_of(data);
        let bit = data[2];
        if bit >= 32 {
            return vec![RESULT_FAIL];
        }
        let value = self.i_config.entry(addr).or_insert(u32::MAX);
        *value &= !(1 << bit);
        vec![RESULT_OK]
    }

    fn cmd_i_config_read(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        let addr = Self::slot_of(data);
        let value = self.i_config.get(&addr).copied().unwrap_or(u32::MAX);
        let mut out = vec![RESULT_OK, 0, 0, 0];
        out.extend_from_slice(&value.to_le_bytes());
        out
    }

    fn cmd_r_mem_write(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() < 3 || data.len() > 3 + cmd::R_MEM_DATA_MAX {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data);
        if self.r_mem.contains_key(&slot) {
            return vec![0x10];
        }
        self.r_mem.insert(slot, data[3..].to_vec());
        vec![RESULT_OK]
    }

    fn cmd_r_mem_read(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data);
        match self.r_mem.get(&slot) {
            Some(stored) => {
                let mut out = vec![RESULT_OK, 0, 0, 0];
                out.extend_from_slice(stored);
                out
            }
            None => vec![0x10],
        }
    }

    fn cmd_r_mem_erase(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        self.r_mem.remove(&Self::slot_of(data));
        vec![RESULT_OK]
    }

    fn cmd_random(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 1 {
            return vec![RESULT_INVALID_CMD];
        }
        let n = data[0] as usize;
        let mut out = vec![RESULT_OK, 0, 0, 0];
        for _ in 0..n {
            let byte = self.next_rand();
            out.push(byte);
        }
        out
    }

    fn cmd_ecc_generate(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 3 {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data);
        match data[2] {
            0x01 => self.install_p256(slot, 0x01),
            0x02 => self.install_ed25519(slot, 0x01),
            _ => vec![RESULT_INVALID_CMD],
        }
    }

    fn cmd_ecc_store(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 + 1 + 12 + 32 {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data);
        // The model does not reconstruct keypairs from raw scalars; a
        // stored key behaves like a generated one apart from its origin.
        match data[2] {
            0x01 => self.install_p256(slot, 0x02),
            0x02 => self.install_ed25519(slot, 0x02),
            _ => vec![RESULT_INVALID_CMD],
        }
    }

    fn install_p256(&mut self, slot: u16, origin: u8) -> Vec<u8> {
        let rng = ring::rand::SystemRandom::new();
        let alg = &ring::signature::ECDSA_P256_SHA256_FIXED_SIGNING;
        let pkcs8 =
            ring::signature::EcdsaKeyPair::generate_pkcs8(alg, &rng).unwrap();
        let keypair = ring::signature::EcdsaKeyPair::from_pkcs8(
            alg,
            pkcs8.as_ref(),
            &rng,
        )
        .unwrap();

        // Uncompressed point: 0x04 || x || y.
        let public = keypair.public_key().as_ref();
        let mut pubkey = [0; 64];
        pubkey.copy_from_slice(&public[1..]);

        self.ecc.insert(
            slot,
            EccSlot::P256 {
                keypair,
                pubkey,
                origin,
            },
        );
        vec![RESULT_OK]
    }

    fn install_ed25519(&mut self, slot: u16, origin: u8) -> Vec<u8> {
        let rng = ring::rand::SystemRandom::new();
        let pkcs8 =
            ring::signature::Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let keypair =
            ring::signature::Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
                .unwrap();

        let mut pubkey = [0; 32];
        pubkey.copy_from_slice(keypair.public_key().as_ref());

        self.ecc.insert(
            slot,
            EccSlot::Ed25519 {
                keypair,
                pubkey,
                origin,
            },
        );
        vec![RESULT_OK]
    }

    fn cmd_ecc_read(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        match self.ecc.get(&Self::slot_of(data)) {
            Some(EccSlot::P256 { pubkey, origin, .. }) => {
                let mut out = vec![RESULT_OK, 0x01, *origin];
                out.extend_from_slice(&[0; 13]);
                out.extend_from_slice(pubkey);
                out
            }
            Some(EccSlot::Ed25519 { pubkey, origin, .. }) => {
                let mut out = vec![RESULT_OK, 0x02, *origin];
                out.extend_from_slice(&[0; 13]);
                out.extend_from_slice(pubkey);
                out
            }
            None => vec![0x12],
        }
    }

    fn cmd_ecc_erase(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        self.ecc.remove(&Self::slot_of(data));
        vec![RESULT_OK]
    }

    fn cmd_ecdsa_sign(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 + 13 + 32 {
            return vec![RESULT_INVALID_CMD];
        }
        let digest = &data[15..];
        match self.ecc.get(&Self::slot_of(data)) {
            Some(EccSlot::P256 { keypair, .. }) => {
                let rng = ring::rand::SystemRandom::new();
                let sig = keypair.sign(&rng, digest).unwrap();
                let mut out = vec![RESULT_OK];
                out.extend_from_slice(&[0; 15]);
                out.extend_from_slice(sig.as_ref());
                out
            }
            _ => vec![0x12],
        }
    }

    fn cmd_eddsa_sign(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() < 2 + 13 + 1 {
            return vec![RESULT_INVALID_CMD];
        }
        let msg = &data[15..];
        match self.ecc.get(&Self::slot_of(data)) {
            Some(EccSlot::Ed25519 { keypair, .. }) => {
                let sig = keypair.sign(msg);
                let mut out = vec![RESULT_OK];
                out.extend_from_slice(&[0; 15]);
                out.extend_from_slice(sig.as_ref());
                out
            }
            _ => vec![0x12],
        }
    }

    fn cmd_mcounter_init(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 + 1 + 4 {
            return vec![RESULT_INVALID_CMD];
        }
        let index = Self::slot_of(data) as usize;
        if index >= 16 {
            return vec![RESULT_FAIL];
        }
        let value = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
        self.mcounter[index] = Some(value);
        vec![RESULT_OK]
    }

    fn cmd_mcounter_update(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        let index = Self::slot_of(data) as usize;
        if index >= 16 {
            return vec![RESULT_FAIL];
        }
        match self.mcounter[index] {
            None => vec![RESULT_FAIL],
            Some(0) => vec![0x13],
            Some(v) => {
                self.mcounter[index] = Some(v - 1);
                vec![RESULT_OK]
            }
        }
    }

    fn cmd_mcounter_get(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 {
            return vec![RESULT_INVALID_CMD];
        }
        let index = Self::slot_of(data) as usize;
        if index >= 16 {
            return vec![RESULT_FAIL];
        }
        match self.mcounter[index] {
            None => vec![RESULT_FAIL],
            Some(v) => {
                let mut out = vec![RESULT_OK, 0, 0, 0];
                out.extend_from_slice(&v.to_le_bytes());
                out
            }
        }
    }

    fn cmd_mac_and_destroy(&mut self, data: &[u8]) -> Vec<u8> {
        if data.len() != 2 + 1 + 32 {
            return vec![RESULT_INVALID_CMD];
        }
        let slot = Self::slot_of(data);
        if slot >= 128 {
            return vec![RESULT_FAIL];
        }
        if *self.macandd_used.get(&slot).unwrap_or(&false) {
            return vec![RESULT_FAIL];
        }
        self.macandd_used.insert(slot, true);

        let mut mac = [0; 32];
        self.soft.start().unwrap();
        self.soft.update(b"macandd").unwrap();
        self.soft.update(&slot.to_le_bytes()).unwrap();
        self.soft.update(&data[3..]).unwrap();
        self.soft.finish(&mut mac).unwrap();

        let mut out = vec![RESULT_OK, 0, 0, 0];
        out.extend_from_slice(&mac);
        out
    }

    // === Maintenance-mode requests ===

    fn req_startup(&mut self, payload: &[u8]) {
        if payload.len() != 1 {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }
        self.session = None;
        self.enc_acc.clear();
        match payload[0] {
            0x01 => {
                self.in_startup = !self.app_fw_ok;
                self.queue(STATUS_REQUEST_OK, &[]);
            }
            0x03 => {
                self.in_startup = true;
                self.queue(STATUS_REQUEST_OK, &[]);
            }
            _ => self.queue(STATUS_GEN_ERR, &[]),
        }
    }

    fn req_fw_erase(&mut self, payload: &[u8]) {
        if !self.in_startup || payload.len() != 1 {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }
        self.fw_banks.insert(payload[0], Vec::new());
        self.queue(STATUS_REQUEST_OK, &[]);
    }

    fn req_fw_update(&mut self, payload: &[u8]) {
        if !self.in_startup || payload.len() < 3 {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }
        let bank = payload[0];
        let offset = u16::from_le_bytes([payload[1], payload[2]]) as usize;
        let data = &payload[3..];

        let image = match self.fw_banks.get_mut(&bank) {
            Some(image) => image,
            None => {
                // Write before erase.
                self.queue(STATUS_GEN_ERR, &[]);
                return;
            }
        };
        if image.len() != offset {
            self.queue(STATUS_GEN_ERR, &[]);
            return;
        }
        image.extend_from_slice(data);

        // A fully written bank makes the application firmware bootable;
        // its first four bytes double as the new version.
        if image.len() >= 4 {
            self.app_fw_ok = true;
            let mut version = [0; 4];
            version.copy_from_slice(&image[..4]);
            self.riscv_fw = version;
        }
        self.queue(STATUS_REQUEST_OK, &[]);
    }
}

/// A cloneable handle to a [`ModelChip`].
///
/// The host context borrows its port exclusively, so tests that want to
/// poke the model mid-scenario (fault injection, state inspection) go
/// through a shared handle instead: one clone becomes the port, the
/// other stays with the test.
#[derive(Clone)]
pub struct SharedChip(Rc<RefCell<ModelChip>>);

impl SharedChip {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(ModelChip::new())))
    }

    /// Direct access to the model, for setup and inspection.
    pub fn model(&self) -> RefMut<'_, ModelChip> {
        self.0.borrow_mut()
    }
}

impl Port for SharedChip {
    fn spi_cs(&mut self, assert: bool) -> Result<(), port::Error> {
        self.0.borrow_mut().spi_cs(assert)
    }

    fn spi_transfer(
        &mut self,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<(), port::Error> {
        self.0.borrow_mut().spi_transfer(buf, timeout_ms)
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.borrow_mut().delay_ms(ms)
    }

    fn fill_random(&mut self, buf: &mut [u8]) -> Result<(), port::Error> {
        self.0.borrow_mut().fill_random(buf)
    }
}

impl Port for ModelChip {
    fn spi_cs(&mut self, assert: bool) -> Result<(), port::Error> {
        if assert {
            assert!(!self.selected, "nested chip select");
            self.selected = true;
            self.req_acc.clear();
            self.responding = false;
            self.resp_stream.clear();
            self.resp_pos = 0;
        } else {
            self.selected = false;
            if !self.responding && !self.req_acc.is_empty() {
                self.handle_request_frame();
            }
        }
        Ok(())
    }

    fn spi_transfer(
        &mut self,
        buf: &mut [u8],
        _timeout_ms: u32,
    ) -> Result<(), port::Error> {
        assert!(self.selected, "transfer without chip select");

        if !self.responding
            && self.req_acc.is_empty()
            && buf.first() == Some(&GET_RESPONSE)
        {
            self.responding = true;
            self.resp_pos = 0;

            let mut stream = vec![self.chip_status()];
            if self.busy_polls > 0 {
                self.busy_polls -= 1;
                stream[0] &= !CHIP_READY;
            } else if let Some((frame, corrupt)) = self.pending.pop_front() {
                self.last_frame = Some(frame.clone());
                let mut served = frame;
                if corrupt {
                    let crc_at = served.len() - 2;
                    served[crc_at] ^= 0x04;
                }
                stream.extend_from_slice(&served);
            } else {
                stream.push(STATUS_NO_RESP);
            }
            self.resp_stream = stream;
        }

        if self.responding {
            for byte in buf.iter_mut() {
                *byte = self
                    .resp_stream
                    .get(self.resp_pos)
                    .copied()
                    .unwrap_or(0);
                self.resp_pos += 1;
            }
        } else {
            self.req_acc.extend_from_slice(buf);
            buf.fill(0);
        }
        Ok(())
    }

    fn delay_ms(&mut self, _ms: u32) {}

    fn fill_random(&mut self, buf: &mut [u8]) -> Result<(), port::Error> {
        for byte in buf.iter_mut() {
            *byte = self.next_rand();
        }
        Ok(())
    }
}
