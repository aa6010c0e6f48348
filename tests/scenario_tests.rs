// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! End-to-end scenarios for the session state machine + prefix table,
//! matching the six concrete walkthroughs in the specification (§8). PDUs
//! are constructed directly rather than round-tripped through the wire
//! codec — the codec's own round-trip and fragmentation properties are
//! covered in `wire::pdu`'s unit tests, and the reassembler's in
//! `reassembler`'s.

use std::net::Ipv4Addr;
use std::time::Duration;

use rtr_client::cfg::config::jittered_poll_timeout;
use rtr_client::reassembler::Reassembler;
use rtr_client::session::{SessionEvent, SessionState};
use rtr_client::table::{Cidr, PrefixTable};
use rtr_client::wire::header::RawHeader;
use rtr_client::wire::pdu::{PDU_TYPE_CACHE_RESPONSE, Pdu, RouteUpdatePdu};

fn announce_10_0_0_0_24(asn: u32) -> Pdu {
    Pdu::RouteUpdate(RouteUpdatePdu {
        withdraw: false,
        prefix: Cidr::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
        max_len: 24,
        asn,
    })
}

fn withdraw_10_0_0_0_24(asn: u32) -> Pdu {
    Pdu::RouteUpdate(RouteUpdatePdu {
        withdraw: true,
        prefix: Cidr::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
        max_len: 24,
        asn,
    })
}

fn end_of_data(serial: u32) -> Pdu {
    Pdu::EndOfData {
        session_id: 42,
        serial,
        refresh: 3600,
        retry: 600,
        expire: 7200,
    }
}

/// Scenario 1: reset, single announce, end-of-data.
#[test]
fn reset_single_announce_end_of_data() {
    let mut session = SessionState::new();
    let mut table = PrefixTable::new();

    session.handle(Pdu::CacheResponse { session_id: 42 }, &mut table);
    session.handle(announce_10_0_0_0_24(64500), &mut table);
    let events = session.handle(end_of_data(7), &mut table);

    assert_eq!(session.session_id, Some(42));
    assert_eq!(session.serial.cache, 7);

    let matches = table.lookup(Cidr::v4(Ipv4Addr::new(10, 0, 0, 0), 24), false);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].entry.origins, vec![(64500, 24)]);

    match &events[0] {
        SessionEvent::SerialAdvanced {
            session_id,
            serial,
            deltas,
        } => {
            assert_eq!(*session_id, 42);
            assert_eq!(*serial, 7);
            assert_eq!(deltas.announce.len(), 1);
            assert!(deltas.withdraw.is_empty());
            assert_eq!(deltas.announce[0].max_len, None);
        },
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(session.time_remaining());
}

/// Scenario 2: incremental withdraw following scenario 1.
#[test]
fn incremental_withdraw() {
    let mut session = SessionState::new();
    let mut table = PrefixTable::new();

    session.handle(Pdu::CacheResponse { session_id: 42 }, &mut table);
    session.handle(announce_10_0_0_0_24(64500), &mut table);
    session.handle(end_of_data(7), &mut table);

    session.handle(Pdu::CacheResponse { session_id: 42 }, &mut table);
    session.handle(withdraw_10_0_0_0_24(64500), &mut table);
    let events = session.handle(end_of_data(8), &mut table);

    assert_eq!(session.serial.cache, 8);
    assert!(table.lookup(Cidr::v4(Ipv4Addr::new(10, 0, 0, 0), 24), false).is_empty());

    match &events[0] {
        SessionEvent::SerialAdvanced { deltas, .. } => {
            assert!(deltas.announce.is_empty());
            assert_eq!(deltas.withdraw.len(), 1);
        },
        other => panic!("unexpected event: {other:?}"),
    }
}

/// Scenario 3: a byte stream split mid-PDU reassembles to the same state
/// as feeding it whole.
#[test]
fn fragmented_read_reassembles_correctly() {
    let mut whole = RawHeader::new(PDU_TYPE_CACHE_RESPONSE, 42, 8).to_bytes().to_vec();
    whole.extend_from_slice(&RawHeader::new(4, 0, 20).to_bytes());
    whole.extend_from_slice(&[1, 24, 24, 0, 10, 0, 0, 0]);
    whole.extend_from_slice(&64500u32.to_be_bytes());

    let (first, second) = whole.split_at(11);

    let mut r = Reassembler::new();
    let first_pdus = r.feed(first).expect("feed first chunk");
    assert_eq!(first_pdus.len(), 1, "only the CacheResponse should decode");
    assert!(matches!(first_pdus[0], Pdu::CacheResponse { session_id: 42 }));

    let second_pdus = r.feed(second).expect("feed remaining bytes");
    assert_eq!(second_pdus.len(), 1);
    assert!(matches!(second_pdus[0], Pdu::RouteUpdate(_)));
}

/// Scenario 4: a CacheReset mid-session zeroes the serials but keeps the
/// session id, so the driver's next outbound PDU is a ResetQuery.
#[test]
fn cache_reset_mid_session_preserves_session_id() {
    let mut session = SessionState::from_start_point(Some(42), Some(8));
    let mut table = PrefixTable::new();

    let events = session.handle(Pdu::CacheReset { session_id: 42 }, &mut table);

    assert_eq!(session.session_id, Some(42));
    assert_eq!(session.serial.cache, 0);
    assert_eq!(session.serial.latest, 0);
    assert_eq!(events, vec![SessionEvent::CacheReset]);
}

/// Scenario 5: duplicate announce is rejected by the table, logged, and
/// does not change its contents.
#[test]
fn duplicate_announce_keeps_exactly_one_entry() {
    let mut table = PrefixTable::new();
    let cidr = Cidr::v4(Ipv4Addr::new(10, 0, 0, 0), 24);

    table.announce(cidr, 64500, 24).expect("first announce");
    assert!(table.announce(cidr, 64500, 24).is_err());

    let matches = table.lookup(cidr, false);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].entry.origins, vec![(64500, 24)]);
}

/// Scenario 6: jittered poll timeouts stay within [0.8T, 1.2T], floored
/// at one second.
#[test]
fn jittered_poll_stays_in_band_across_many_draws() {
    let base = Duration::from_secs(300);
    for _ in 0..5 {
        let d = jittered_poll_timeout(base);
        let secs = d.as_secs_f64();
        assert!((240.0..=360.0).contains(&secs), "{secs} out of band");
    }
}
