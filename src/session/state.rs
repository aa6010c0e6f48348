// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-session state: the cache's session id, the two serials ("latest"
//! seen via SerialNotify/EndOfData, and "cache" — the serial the table on
//! disk actually reflects), and the next-refresh deadline.
//!
//! One PDU in, zero or more [`SessionEvent`]s out — the driver (component
//! F) decides what to do about each event (dump a delta, log a session-id
//! change, tear the connection down). This mirrors the original's
//! `_process_pdu` dispatch, generalized from a side-effecting method into
//! one that reports what happened instead of calling back into I/O
//! directly.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::cfg::config::{FALLBACK_REFRESH, REFRESH_CAP};
use crate::error::RtrError;
use crate::table::{Cidr, PrefixTable};
use crate::wire::pdu::Pdu;

/// Something the driver should act on after feeding a PDU to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The cache's session id changed (or was learned for the first time).
    SessionIdChanged { previous: Option<u16>, current: u16 },
    /// EndOfData closed out a serial: the driver should dump the
    /// accumulated route deltas and note the new serial (component G).
    SerialAdvanced {
        session_id: u16,
        serial: u32,
        deltas: DeltaBuffer,
    },
    /// The cache reported a protocol-level error (Error Report PDU) or
    /// sent data this client cannot make sense of mid-session.
    ProtocolError(String),
    /// CacheReset: the client must restart with a ResetQuery: the
    /// in-memory table no longer corresponds to any serial.
    CacheReset,
}

/// One announce/withdraw entry as it is written to a delta journal file
/// (spec §6): `maxLen` is only present when it differs from the prefix's
/// own length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDelta {
    #[serde(rename = "ip")]
    pub prefix: Cidr,
    pub asn: u32,
    #[serde(rename = "maxLen", skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u8>,
}

impl RouteDelta {
    pub fn new(prefix: Cidr, asn: u32, max_len: u8) -> Self {
        let max_len = (max_len != prefix.prefix_len()).then_some(max_len);
        RouteDelta { prefix, asn, max_len }
    }
}

/// The deltas accumulated between a CacheResponse (reset or incremental)
/// and the EndOfData that closes it out (spec §3's `deltaBuffer`).
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DeltaBuffer {
    pub announce: Vec<RouteDelta>,
    pub withdraw: Vec<RouteDelta>,
}

impl DeltaBuffer {
    pub fn is_empty(&self) -> bool {
        self.announce.is_empty() && self.withdraw.is_empty()
    }

    /// Returns the accumulated deltas and resets the buffer to empty —
    /// spec §3: "the deltaBuffer is cleared after each journal write."
    fn take(&mut self) -> DeltaBuffer {
        std::mem::take(self)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SerialPair {
    /// Serial most recently confirmed by SerialNotify/EndOfData.
    pub latest: u32,
    /// Serial the local route table is actually caught up to.
    pub cache: u32,
}

/// The live state of one RTR session (spec §4.B).
#[derive(Default)]
pub struct SessionState {
    pub session_id: Option<u16>,
    pub serial: SerialPair,
    next_refresh: Option<Instant>,
    delta_buffer: DeltaBuffer,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState::default()
    }

    pub fn from_start_point(session_id: Option<u16>, serial: Option<u32>) -> Self {
        SessionState {
            session_id,
            serial: SerialPair {
                latest: serial.unwrap_or(0),
                cache: serial.unwrap_or(0),
            },
            next_refresh: None,
            delta_buffer: DeltaBuffer::default(),
        }
    }

    /// Applies one decoded PDU, updating session/serial/table state and
    /// returning whatever the driver needs to react to.
    pub fn handle(&mut self, pdu: Pdu, table: &mut PrefixTable) -> Vec<SessionEvent> {
        match pdu {
            Pdu::SerialNotify { session_id, serial } => {
                let events = self.note_session_id(session_id).into_iter().collect();
                self.serial.latest = serial;
                events
            },
            Pdu::CacheResponse { session_id } => {
                // A CacheResponse opens a fresh accumulation window (spec
                // §3: deltaBuffer is bounded by the preceding CacheResponse
                // and the EndOfData that closes it).
                self.delta_buffer = DeltaBuffer::default();
                self.note_session_id(session_id).into_iter().collect()
            },
            Pdu::RouteUpdate(update) => {
                // Apply to the table before recording the delta, so a
                // journal entry never outruns what's actually in memory
                // (spec §5's ordering guarantee).
                let result = if update.withdraw {
                    table.withdraw(update.prefix, update.asn, update.max_len)
                } else {
                    table.announce(update.prefix, update.asn, update.max_len)
                };
                match result {
                    Ok(()) => {
                        let delta = RouteDelta::new(update.prefix, update.asn, update.max_len);
                        if update.withdraw {
                            self.delta_buffer.withdraw.push(delta);
                        } else {
                            self.delta_buffer.announce.push(delta);
                        }
                    },
                    Err(e) => {
                        // RouteInconsistency (spec §7): logged, session
                        // continues, nothing propagated to the driver.
                        let err = RtrError::RouteInconsistency(e.to_string());
                        debug!(error = %err, "route inconsistency, ignoring");
                    },
                }
                Vec::new()
            },
            Pdu::EndOfData {
                session_id,
                serial,
                refresh,
                retry,
                expire,
            } => {
                let mut events: Vec<_> = self.note_session_id(session_id).into_iter().collect();
                self.serial.latest = serial;
                self.serial.cache = serial;
                self.arm_refresh(refresh);
                debug!(serial, refresh, retry, expire, "end of data");
                events.push(SessionEvent::SerialAdvanced {
                    session_id,
                    serial,
                    deltas: self.delta_buffer.take(),
                });
                events
            },
            Pdu::CacheReset { .. } => {
                self.serial = SerialPair::default();
                self.delta_buffer = DeltaBuffer::default();
                vec![SessionEvent::CacheReset]
            },
            Pdu::RouterKey(key) => {
                debug!(asn = key.asn, announce = key.announce, "router key, not applied");
                Vec::new()
            },
            Pdu::ErrorReport { error_code, text } => {
                vec![SessionEvent::ProtocolError(format!(
                    "error report {error_code}: {text}"
                ))]
            },
            // Router-originated query PDUs: the client only ever sends
            // these itself. A cache that echoes one back is misbehaving,
            // but it isn't a reason to tear the session down.
            Pdu::ResetQuery | Pdu::SerialQuery { .. } => {
                debug!("ignoring query pdu echoed by cache");
                Vec::new()
            },
            Pdu::Unhandled { pdu_type, .. } => {
                debug!(pdu_type, "ignoring reserved/unhandled pdu type");
                Vec::new()
            },
        }
    }

    /// Adopts a new session id, logging whether this is the first one
    /// learned or a change from a previously-known one (spec §9: the
    /// lenient "adopt and log" policy, not a hard session reset).
    fn note_session_id(&mut self, session_id: u16) -> Option<SessionEvent> {
        match self.session_id {
            None => {
                debug!(session_id, "adopted first session id");
                self.session_id = Some(session_id);
                None
            },
            Some(prev) if prev != session_id => {
                warn!(previous = prev, current = session_id, "session id changed");
                self.session_id = Some(session_id);
                Some(SessionEvent::SessionIdChanged {
                    previous: Some(prev),
                    current: session_id,
                })
            },
            Some(_) => None,
        }
    }

    /// Caps the advertised refresh interval at [`REFRESH_CAP`] before
    /// arming the deadline (spec §9's documented override).
    fn arm_refresh(&mut self, refresh_secs: u32) {
        let d = Duration::from_secs(refresh_secs as u64).min(REFRESH_CAP);
        self.next_refresh = Some(Instant::now() + d);
    }

    /// True while the refresh deadline hasn't passed yet. Once it has,
    /// arms a short fallback deadline so the driver doesn't spin polling
    /// an expired timer (mirrors the original's `time_remaining`).
    pub fn time_remaining(&mut self) -> bool {
        match self.next_refresh {
            Some(deadline) if Instant::now() < deadline => true,
            _ => {
                self.next_refresh = Some(Instant::now() + FALLBACK_REFRESH);
                false
            },
        }
    }
}
