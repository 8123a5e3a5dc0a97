// Copyright lowRISC contributors.
// Licensed under the Apache License, Version 2.0, see LICENSE for details.
// SPDX-License-Identifier: Apache-2.0

//! Fuzz target for the L2 response parser.
//!
//! The parser is the single entry point for untrusted bytes coming off
//! the bus: for arbitrary input it must produce either a typed error or
//! a well-formed `Response` view, and it must never panic or read out of
//! bounds.

#![no_main]

use libfuzzer_sys::fuzz_target;

use basilisk::l2;

fuzz_target!(|data: &[u8]| {
    if let Ok(resp) = l2::Response::parse(data) {
        // A well-formed view must be internally consistent.
        assert!(resp.data.len() <= 252);
    }
});
