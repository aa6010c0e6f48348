// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-type PDU bodies (RFC 8210 §5) and the stream decoder loop
//! (component A / D).
//!
//! Every PDU the client needs to *send* is built with a plain byte-literal
//! encoder (`encode_reset_query`, `encode_serial_query`) the way the
//! original hand-assembles its query packets; every PDU the client needs
//! to *receive* is parsed into [`Pdu`] by [`decode`].

use std::net::{Ipv4Addr, Ipv6Addr};

use zerocopy::byteorder::big_endian::U32 as BeU32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::RtrError;
use crate::table::Cidr;
use crate::wire::header::{HEADER_LEN, PROTOCOL_VERSION, RawHeader};

pub const PDU_TYPE_SERIAL_NOTIFY: u8 = 0;
pub const PDU_TYPE_SERIAL_QUERY: u8 = 1;
pub const PDU_TYPE_RESET_QUERY: u8 = 2;
pub const PDU_TYPE_CACHE_RESPONSE: u8 = 3;
pub const PDU_TYPE_IPV4_PREFIX: u8 = 4;
pub const PDU_TYPE_IPV6_PREFIX: u8 = 6;
pub const PDU_TYPE_END_OF_DATA: u8 = 7;
pub const PDU_TYPE_CACHE_RESET: u8 = 8;
pub const PDU_TYPE_ROUTER_KEY: u8 = 9;
pub const PDU_TYPE_ERROR_REPORT: u8 = 10;

/// Safety cap on a single PDU's declared length. Router Key PDUs carry a
/// variable-length SPKI and are exempt (spec §4.A).
const MAX_PDU_LEN: u32 = 64 * 1024;

/// An already-validated PDU received from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    SerialNotify {
        session_id: u16,
        serial: u32,
    },
    /// Router-originated query PDU. The client only ever *sends* these
    /// (`encode_serial_query`), but a misbehaving or loopback-tested cache
    /// can echo one back, so the decoder still has to make sense of it
    /// (spec §3's `kind` enumeration lists it as a PDU kind, not as
    /// outbound-only).
    SerialQuery {
        session_id: u16,
        serial: u32,
    },
    ResetQuery,
    CacheResponse {
        session_id: u16,
    },
    RouteUpdate(RouteUpdatePdu),
    EndOfData {
        session_id: u16,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
    },
    CacheReset {
        session_id: u16,
    },
    RouterKey(RouterKeyPdu),
    ErrorReport {
        error_code: u16,
        text: String,
    },
    /// A PDU type this client has no business receiving, or that the
    /// original leaves uncoded (reserved types, router-originated
    /// queries echoed back by a misbehaving cache).
    Unhandled {
        pdu_type: u8,
        session_id: u16,
    },
}

/// The IPv4/IPv6 Prefix PDU body, with the fields the session state
/// machine needs to update the route table (spec §4.B/C).
#[derive(Debug, Clone, PartialEq)]
pub struct RouteUpdatePdu {
    pub withdraw: bool,
    pub prefix: Cidr,
    pub max_len: u8,
    pub asn: u32,
}

/// Router Key PDU fields, extracted but not applied to any table (spec
/// §4.A/§9: "keep the field extraction available for future use but do
/// not persist"). There is no session id on this PDU — `field16`'s high
/// byte is the announce/withdraw flag, low byte reserved.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterKeyPdu {
    pub announce: bool,
    pub ski: [u8; 20],
    pub asn: u32,
    pub spki: Vec<u8>,
}

/// Exact body lengths (header excluded) for the fixed-size PDU types —
/// spec §4.A: IPv4Prefix=20, IPv6Prefix=32, EndOfData=24 are *total* PDU
/// sizes, so body length is `total - HEADER_LEN`.
const SERIAL_NOTIFY_BODY_LEN: usize = 4;
const SERIAL_QUERY_BODY_LEN: usize = 4;
const RESET_QUERY_BODY_LEN: usize = 0;
const CACHE_RESPONSE_BODY_LEN: usize = 0;
const IPV4_PREFIX_BODY_LEN: usize = 20 - HEADER_LEN;
const IPV6_PREFIX_BODY_LEN: usize = 32 - HEADER_LEN;
const END_OF_DATA_BODY_LEN: usize = 24 - HEADER_LEN;
const CACHE_RESET_BODY_LEN: usize = 0;
/// Router Key's fixed prefix (SKI + ASN); SPKI fills whatever remains.
const ROUTER_KEY_FIXED_LEN: usize = 20 + 4;

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct Ipv4PrefixBody {
    flags: u8,
    prefix_len: u8,
    max_len: u8,
    zero: u8,
    prefix: [u8; 4],
    asn: BeU32,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct Ipv6PrefixBody {
    flags: u8,
    prefix_len: u8,
    max_len: u8,
    zero: u8,
    prefix: [u8; 16],
    asn: BeU32,
}

#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct EndOfDataBody {
    serial: BeU32,
    refresh: BeU32,
    retry: BeU32,
    expire: BeU32,
}

/// Flags byte bit 0: withdraw (0) vs announce (1) is inverted from some
/// readers' expectations — RFC 8210 §5.6/5.8 defines bit 0 clear as
/// withdraw, set as announce.
const FLAG_ANNOUNCE: u8 = 0x01;

/// Builds a ResetQuery PDU (8 bytes: header only, no body).
pub fn encode_reset_query() -> Vec<u8> {
    RawHeader::new(PDU_TYPE_RESET_QUERY, 0, HEADER_LEN as u32)
        .to_bytes()
        .to_vec()
}

/// Builds a SerialQuery PDU (12 bytes: header plus a 4-byte serial).
pub fn encode_serial_query(session_id: u16, serial: u32) -> Vec<u8> {
    let len = HEADER_LEN + 4;
    let mut out = RawHeader::new(PDU_TYPE_SERIAL_QUERY, session_id, len as u32)
        .to_bytes()
        .to_vec();
    out.extend_from_slice(&serial.to_be_bytes());
    out
}

/// Decodes as many complete PDUs as `buf` holds, in order.
///
/// Returns `(consumed, pdus)`: `consumed` is how many leading bytes of
/// `buf` were fully decoded. The caller re-buffers `buf[consumed..]` as
/// the next read's leading fragment (component D) — running out of bytes
/// mid-PDU is not an error, it just stops the loop early.
pub fn decode(buf: &[u8]) -> Result<(usize, Vec<Pdu>), RtrError> {
    let mut pdus = Vec::new();
    let mut offset = 0;

    loop {
        let remaining = &buf[offset..];
        if remaining.len() < HEADER_LEN {
            break;
        }
        let header = RawHeader::from_bytes(remaining)
            .ok_or_else(|| RtrError::MalformedPdu("short header".into()))?;
        if header.version != PROTOCOL_VERSION {
            return Err(RtrError::MalformedPdu(format!(
                "unsupported protocol version {}",
                header.version
            )));
        }
        let total_len = header.length.get();
        if (total_len as usize) < HEADER_LEN {
            return Err(RtrError::MalformedPdu(format!(
                "declared length {total_len} shorter than header"
            )));
        }
        if total_len > MAX_PDU_LEN && header.pdu_type != PDU_TYPE_ROUTER_KEY {
            return Err(RtrError::MalformedPdu(format!(
                "declared length {total_len} exceeds safety cap"
            )));
        }
        if remaining.len() < total_len as usize {
            break;
        }

        let body = &remaining[HEADER_LEN..total_len as usize];
        let field16 = header.field16.get();
        let pdu = decode_body(header.pdu_type, field16, body)?;
        pdus.push(pdu);
        offset += total_len as usize;
    }

    Ok((offset, pdus))
}

/// Checks a PDU body is *exactly* `expected` bytes, not merely "at least"
/// — spec §4.A: a cache-sent IPv4/IPv6Prefix, EndOfData, SerialNotify,
/// SerialQuery, ResetQuery, or CacheReset/CacheResponse whose declared
/// length disagrees with its canonical size is malformed.
fn expect_exact_len(pdu_name: &str, body: &[u8], expected: usize) -> Result<(), RtrError> {
    if body.len() != expected {
        return Err(RtrError::MalformedPdu(format!(
            "{pdu_name} body length {} does not match expected {expected}",
            body.len()
        )));
    }
    Ok(())
}

fn decode_body(pdu_type: u8, field16: u16, body: &[u8]) -> Result<Pdu, RtrError> {
    match pdu_type {
        PDU_TYPE_SERIAL_NOTIFY => {
            expect_exact_len("SerialNotify", body, SERIAL_NOTIFY_BODY_LEN)?;
            let serial = read_u32(body)?;
            Ok(Pdu::SerialNotify {
                session_id: field16,
                serial,
            })
        },
        PDU_TYPE_SERIAL_QUERY => {
            expect_exact_len("SerialQuery", body, SERIAL_QUERY_BODY_LEN)?;
            let serial = read_u32(body)?;
            Ok(Pdu::SerialQuery {
                session_id: field16,
                serial,
            })
        },
        PDU_TYPE_RESET_QUERY => {
            expect_exact_len("ResetQuery", body, RESET_QUERY_BODY_LEN)?;
            Ok(Pdu::ResetQuery)
        },
        PDU_TYPE_CACHE_RESPONSE => {
            expect_exact_len("CacheResponse", body, CACHE_RESPONSE_BODY_LEN)?;
            Ok(Pdu::CacheResponse { session_id: field16 })
        },
        PDU_TYPE_IPV4_PREFIX => {
            expect_exact_len("IPv4Prefix", body, IPV4_PREFIX_BODY_LEN)?;
            let (raw, _rest) = Ipv4PrefixBody::read_from_prefix(body)
                .map_err(|_| RtrError::MalformedPdu("short IPv4 prefix body".into()))?;
            if raw.prefix_len > 32 || raw.max_len > 32 || raw.prefix_len > raw.max_len {
                return Err(RtrError::MalformedPdu(format!(
                    "invalid IPv4 prefix/max length {}/{}",
                    raw.prefix_len, raw.max_len
                )));
            }
            let addr = Ipv4Addr::from(raw.prefix);
            Ok(Pdu::RouteUpdate(RouteUpdatePdu {
                withdraw: raw.flags & FLAG_ANNOUNCE == 0,
                prefix: Cidr::v4(addr, raw.prefix_len),
                max_len: raw.max_len,
                asn: raw.asn.get(),
            }))
        },
        PDU_TYPE_IPV6_PREFIX => {
            expect_exact_len("IPv6Prefix", body, IPV6_PREFIX_BODY_LEN)?;
            let (raw, _rest) = Ipv6PrefixBody::read_from_prefix(body)
                .map_err(|_| RtrError::MalformedPdu("short IPv6 prefix body".into()))?;
            if raw.prefix_len > 128 || raw.max_len > 128 || raw.prefix_len > raw.max_len {
                return Err(RtrError::MalformedPdu(format!(
                    "invalid IPv6 prefix/max length {}/{}",
                    raw.prefix_len, raw.max_len
                )));
            }
            let addr = Ipv6Addr::from(raw.prefix);
            Ok(Pdu::RouteUpdate(RouteUpdatePdu {
                withdraw: raw.flags & FLAG_ANNOUNCE == 0,
                prefix: Cidr::v6(addr, raw.prefix_len),
                max_len: raw.max_len,
                asn: raw.asn.get(),
            }))
        },
        PDU_TYPE_END_OF_DATA => {
            expect_exact_len("EndOfData", body, END_OF_DATA_BODY_LEN)?;
            let (raw, _rest) = EndOfDataBody::read_from_prefix(body)
                .map_err(|_| RtrError::MalformedPdu("short EndOfData body".into()))?;
            Ok(Pdu::EndOfData {
                session_id: field16,
                serial: raw.serial.get(),
                refresh: raw.refresh.get(),
                retry: raw.retry.get(),
                expire: raw.expire.get(),
            })
        },
        PDU_TYPE_CACHE_RESET => {
            expect_exact_len("CacheReset", body, CACHE_RESET_BODY_LEN)?;
            Ok(Pdu::CacheReset { session_id: field16 })
        },
        PDU_TYPE_ROUTER_KEY => {
            if body.len() < ROUTER_KEY_FIXED_LEN {
                return Err(RtrError::MalformedPdu("short Router Key body".into()));
            }
            let mut ski = [0u8; 20];
            ski.copy_from_slice(&body[..20]);
            let asn = read_u32(&body[20..24])?;
            let spki = body[ROUTER_KEY_FIXED_LEN..].to_vec();
            // field16's high byte is the announce/withdraw flag, low byte
            // reserved (spec §4.A) — not a session id.
            let flags = (field16 >> 8) as u8;
            Ok(Pdu::RouterKey(RouterKeyPdu {
                announce: flags & FLAG_ANNOUNCE != 0,
                ski,
                asn,
                spki,
            }))
        },
        PDU_TYPE_ERROR_REPORT => {
            let text = decode_error_report_text(body)?;
            Ok(Pdu::ErrorReport {
                error_code: field16,
                text,
            })
        },
        other => Ok(Pdu::Unhandled {
            pdu_type: other,
            session_id: field16,
        }),
    }
}

/// Error Report body: `len(encapsulated pdu) || encapsulated pdu || len(text) || text`.
/// The encapsulated PDU is diagnostic-only and not re-parsed.
fn decode_error_report_text(body: &[u8]) -> Result<String, RtrError> {
    let pdu_len = read_u32(body)? as usize;
    let after_pdu = 4 + pdu_len;
    if body.len() < after_pdu + 4 {
        return Err(RtrError::MalformedPdu("truncated error report".into()));
    }
    let text_len = read_u32(&body[after_pdu..])? as usize;
    let text_start = after_pdu + 4;
    let text_end = text_start + text_len;
    if body.len() < text_end {
        return Err(RtrError::MalformedPdu("truncated error report text".into()));
    }
    String::from_utf8(body[text_start..text_end].to_vec())
        .map_err(|_| RtrError::MalformedPdu("error report text is not valid UTF-8".into()))
}

fn read_u32(body: &[u8]) -> Result<u32, RtrError> {
    body.get(..4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| RtrError::MalformedPdu("body too short".into()))
}
