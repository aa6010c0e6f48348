// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! An end-to-end pass through [`rtr_client::driver::Driver`] against a
//! local TCP listener standing in for the cache, in the style of the
//! teacher crate's `tests/integration_tests` (a real socket, no mocking of
//! the transport itself).

use std::time::Duration;

use rtr_client::cfg::config::RuntimeConfig;
use rtr_client::driver::Driver;
use rtr_client::wire::header::RawHeader;
use rtr_client::wire::pdu::{
    PDU_TYPE_CACHE_RESPONSE, PDU_TYPE_END_OF_DATA, PDU_TYPE_IPV4_PREFIX,
};
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Builds `CacheResponse(42) ‖ IPv4Prefix(announce 10.0.0.0/24, AS64500)
/// ‖ EndOfData(serial=7)`, the same byte stream as scenario 1 in the spec.
fn fake_cache_reply() -> Vec<u8> {
    let mut out = RawHeader::new(PDU_TYPE_CACHE_RESPONSE, 42, 8).to_bytes().to_vec();

    let mut prefix = RawHeader::new(PDU_TYPE_IPV4_PREFIX, 0, 20).to_bytes().to_vec();
    prefix.extend_from_slice(&[1, 24, 24, 0, 10, 0, 0, 0]);
    prefix.extend_from_slice(&64500u32.to_be_bytes());
    out.extend_from_slice(&prefix);

    let mut eod = RawHeader::new(PDU_TYPE_END_OF_DATA, 42, 24).to_bytes().to_vec();
    eod.extend_from_slice(&7u32.to_be_bytes()); // serial
    eod.extend_from_slice(&3600u32.to_be_bytes()); // refresh
    eod.extend_from_slice(&600u32.to_be_bytes()); // retry
    eod.extend_from_slice(&7200u32.to_be_bytes()); // expire
    out.extend_from_slice(&eod);

    out
}

#[tokio::test]
async fn journals_a_route_after_one_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.expect("accept");
        // Drain the client's opening ResetQuery (8 bytes) before replying.
        let mut opening = [0u8; 8];
        let _ = sock.read_exact(&mut opening).await;
        let _ = sock.write_all(&fake_cache_reply()).await;
        // Leave the socket open; the driver will idle-poll it until the
        // test's timeout fires.
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let data_dir = tempdir().expect("tempdir");
    let cfg = RuntimeConfig {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        poll_timeout: Duration::from_secs(2),
        ..RuntimeConfig::default()
    };
    let mut driver = Driver::with_data_dir(cfg, data_dir.path().to_path_buf());

    // The driver loops forever absent an error or Ctrl-C; bound the run
    // with a timeout and inspect what it persisted in the meantime.
    let _ = tokio::time::timeout(Duration::from_secs(3), driver.run()).await;

    let snapshot_path = data_dir.path().join("routingtable.json");
    assert!(snapshot_path.exists(), "routingtable.json should have been written");

    let body = tokio::fs::read_to_string(&snapshot_path).await.expect("read snapshot");
    let json: serde_json::Value = serde_json::from_str(&body).expect("parse snapshot");
    assert_eq!(json["routes"]["ipv4"]["10.0.0.0/24"]["24"][0]["64500"], "10.0.0.0/24");
}
