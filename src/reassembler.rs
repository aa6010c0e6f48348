// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Component D: turns a stream of arbitrarily-sized `recv()` chunks back
//! into a sequence of whole PDUs.
//!
//! One read may contain several PDUs, half a PDU, or (rarely) zero — TCP
//! makes no promise the framing lines up with read boundaries. This holds
//! exactly one tail fragment between reads, the same shape as the
//! original's `Buffer`/`Process` pair: prepend the stored tail to the new
//! bytes, hand the whole thing to the decoder, and re-buffer whatever the
//! decoder couldn't consume.

use crate::error::RtrError;
use crate::wire::pdu::{Pdu, decode};

#[derive(Debug, Default)]
pub struct Reassembler {
    tail: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler::default()
    }

    /// Drops any buffered fragment. Used when a connection is abandoned
    /// and a fresh one starts with no carried-over partial PDU.
    pub fn clear(&mut self) {
        self.tail.clear();
    }

    /// Feeds a freshly-read chunk in, returning every whole PDU it
    /// completed. Leftover bytes are kept for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Pdu>, RtrError> {
        if self.tail.is_empty() {
            let (consumed, pdus) = decode(chunk)?;
            self.tail.extend_from_slice(&chunk[consumed..]);
            return Ok(pdus);
        }

        self.tail.extend_from_slice(chunk);
        let (consumed, pdus) = decode(&self.tail)?;
        self.tail.drain(..consumed);
        Ok(pdus)
    }
}
