// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The 8-byte header every RTR PDU starts with (RFC 8210 §5):
//!
//! ```text
//!  0          8          16         24        31
//! +----------+----------+---------------------+
//! | version  | pdu_type |       field16        |
//! +----------+----------+---------------------+
//! |                  length                    |
//! +---------------------------------------------+
//! ```
//!
//! `field16` means different things per PDU type: a session id for most
//! cache-originated PDUs, an error code for Error Report, or is simply
//! zero/reserved for the query PDUs the client sends.

use zerocopy::{BigEndian, FromBytes, Immutable, IntoBytes, KnownLayout, U16, U32};

pub const HEADER_LEN: usize = 8;

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawHeader {
    pub version: u8,
    pub pdu_type: u8,
    pub field16: U16<BigEndian>,
    pub length: U32<BigEndian>,
}

impl RawHeader {
    pub fn new(pdu_type: u8, field16: u16, length: u32) -> Self {
        RawHeader {
            version: PROTOCOL_VERSION,
            pdu_type,
            field16: U16::new(field16),
            length: U32::new(length),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf.copy_from_slice(self.as_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        RawHeader::read_from_prefix(buf).ok().map(|(hdr, _rest)| hdr)
    }
}

/// RFC 8210 defines protocol version 1; version 0 (RFC 6810) is not
/// supported by this client.
pub const PROTOCOL_VERSION: u8 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let h = RawHeader::new(7, 0x1234, 20);
        let bytes = h.to_bytes();
        assert_eq!(bytes, [1, 7, 0x12, 0x34, 0, 0, 0, 20]);
        let back = RawHeader::from_bytes(&bytes).expect("parse");
        assert_eq!(back, h);
    }

    #[test]
    fn rejects_short_buffer() {
        assert!(RawHeader::from_bytes(&[0u8; 4]).is_none());
    }
}
