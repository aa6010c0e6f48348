// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Component F: the outer control loop — connect, issue the opening
//! query, poll with a jittered timeout, refresh, reconnect on anything
//! transient. This is the one piece of the crate that owns real I/O; the
//! codec, session state, and table are all pure and get driven from here.
//!
//! Per spec §5 there is exactly one logical thread of execution: this
//! runs as a single `tokio` task with no `tokio::spawn`, no locks, no
//! channels. Ctrl-C is merged into the same suspension points (connect,
//! read-with-timeout, backoff sleep) via `tokio::select!` rather than a
//! second task.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};

use crate::cfg::config::{RuntimeConfig, jittered_poll_timeout};
use crate::conn::Connection;
use crate::error::RtrError;
use crate::journal;
use crate::reassembler::Reassembler;
use crate::session::{SessionEvent, SessionState};
use crate::table::PrefixTable;
use crate::wire::pdu::{Pdu, encode_reset_query, encode_serial_query};

/// Why [`Driver::run`] stopped looping. `Interrupted` is the only non-error
/// way out — a fatal error (DNS resolution failure) surfaces as `Err`
/// instead (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Interrupted,
}

/// What happened to the current TCP connection; decides whether the outer
/// loop reconnects, stops, or propagates a fatal error.
enum ConnectionOutcome {
    Reconnect,
    Interrupted,
    Fatal(anyhow::Error),
}

/// Owns the long-lived session state and route table across however many
/// TCP connections it takes to keep them current (spec §4.F/§5).
pub struct Driver {
    cfg: RuntimeConfig,
    session: SessionState,
    table: PrefixTable,
    data_dir: PathBuf,
}

impl Driver {
    pub fn new(cfg: RuntimeConfig) -> Self {
        Driver::with_data_dir(cfg, PathBuf::from(journal::DEFAULT_DATA_DIR))
    }

    /// As [`Driver::new`], but journaling under an arbitrary directory —
    /// the production binary always uses [`journal::DEFAULT_DATA_DIR`];
    /// tests point this at a temp directory instead.
    pub fn with_data_dir(cfg: RuntimeConfig, data_dir: PathBuf) -> Self {
        // Only seed the session from CLI-supplied serial/session-id when
        // both are present and the serial is nonzero — a serial of 0 (or
        // a session id with no serial) isn't a resumable starting point,
        // so the driver starts fresh with a ResetQuery instead (spec
        // §4.F).
        let session = if cfg.has_known_start_point() {
            SessionState::from_start_point(cfg.session_id, cfg.serial)
        } else {
            SessionState::new()
        };
        Driver {
            cfg,
            session,
            table: PrefixTable::new(),
            data_dir,
        }
    }

    /// Runs until interrupted or a fatal error occurs. Never returns `Ok`
    /// for any other reason — a dropped connection just starts the next
    /// iteration (spec §4.F's outer loop).
    pub async fn run(&mut self) -> Result<Shutdown> {
        loop {
            match self.run_connection().await {
                ConnectionOutcome::Reconnect => continue,
                ConnectionOutcome::Interrupted => return Ok(Shutdown::Interrupted),
                ConnectionOutcome::Fatal(e) => return Err(e),
            }
        }
    }

    /// One connect-query-poll cycle. The reassembler and the "have we sent
    /// our opening query yet" bookkeeping are scoped to this connection;
    /// `self.session` and `self.table` are not — a fresh connection
    /// resumes incremental sync from wherever they left off (spec §7).
    async fn run_connection(&mut self) -> ConnectionOutcome {
        let mut conn = tokio::select! {
            res = Connection::connect(&self.cfg.host, self.cfg.port) => match res {
                Ok(conn) => conn,
                Err(e) => return ConnectionOutcome::Fatal(e.into()),
            },
            _ = tokio::signal::ctrl_c() => return ConnectionOutcome::Interrupted,
        };

        if let Err(e) = self.send_opening_query(&mut conn).await {
            return classify_network_err(e);
        }

        let mut reassembler = Reassembler::new();
        self.poll_loop(&mut conn, &mut reassembler).await
    }

    /// ResetQuery if the serial or session id isn't known yet, otherwise
    /// an incremental SerialQuery resuming from the last committed serial
    /// (spec §4.F).
    async fn send_opening_query(&mut self, conn: &mut Connection) -> Result<(), RtrError> {
        let known_start = self.session.session_id.is_some() && self.session.serial.cache != 0;
        let bytes = if known_start {
            encode_serial_query(
                self.session.session_id.expect("checked above"),
                self.session.serial.cache,
            )
        } else {
            self.session.serial = Default::default();
            encode_reset_query()
        };
        conn.send(&bytes).await
    }

    async fn poll_loop(
        &mut self,
        conn: &mut Connection,
        reassembler: &mut Reassembler,
    ) -> ConnectionOutcome {
        let mut buf = [0u8; crate::cfg::config::RECV_BUFFER_LEN];
        loop {
            let wait = jittered_poll_timeout(self.cfg.poll_timeout);
            let read = tokio::select! {
                res = conn.recv_timeout(&mut buf, wait) => res,
                _ = tokio::signal::ctrl_c() => return ConnectionOutcome::Interrupted,
            };

            match read {
                Ok(None) => {
                    // Timed out waiting for data: either the refresh
                    // deadline hasn't arrived yet (keep waiting), or it's
                    // time to poll again with a SerialQuery.
                    if self.session.time_remaining() {
                        continue;
                    }
                    let bytes = encode_serial_query(
                        self.session.session_id.unwrap_or(0),
                        self.session.serial.cache,
                    );
                    if let Err(e) = conn.send(&bytes).await {
                        return classify_network_err(e);
                    }
                },
                Ok(Some(chunk)) => {
                    let pdus = match reassembler.feed(chunk) {
                        Ok(pdus) => pdus,
                        Err(e) => {
                            warn!(error = %e, "malformed pdu, reconnecting");
                            return ConnectionOutcome::Reconnect;
                        },
                    };
                    if let Some(outcome) = self.apply_pdus(pdus).await {
                        return outcome;
                    }
                },
                Err(e) => return classify_network_err(e),
            }
        }
    }

    /// Feeds decoded PDUs to the session state one at a time, journaling
    /// every `SerialAdvanced` and bailing out to reconnect on a protocol
    /// error or cache reset. Returns `None` to keep polling the same
    /// connection.
    async fn apply_pdus(&mut self, pdus: Vec<Pdu>) -> Option<ConnectionOutcome> {
        for pdu in pdus {
            let events = self.session.handle(pdu, &mut self.table);
            for event in events {
                match event {
                    SessionEvent::SerialAdvanced {
                        session_id,
                        serial,
                        deltas,
                    } => {
                        if let Err(e) =
                            journal::record(&self.data_dir, session_id, serial, &deltas, &self.table)
                                .await
                        {
                            warn!(error = %e, "failed to write journal");
                        }
                    },
                    SessionEvent::ProtocolError(msg) => {
                        let err = RtrError::Protocol(msg);
                        warn!(error = %err, "protocol error reported by cache, reconnecting");
                        return Some(ConnectionOutcome::Reconnect);
                    },
                    SessionEvent::CacheReset => {
                        info!("cache reset received, will issue a reset query on reconnect");
                        return Some(ConnectionOutcome::Reconnect);
                    },
                    SessionEvent::SessionIdChanged { .. } => {
                        // Already logged by the session state machine
                        // (spec §9's lenient adopt-and-log policy).
                    },
                }
            }
        }
        None
    }
}

fn classify_network_err(e: RtrError) -> ConnectionOutcome {
    if matches!(e, RtrError::FatalNetwork(_)) {
        ConnectionOutcome::Fatal(e.into())
    } else {
        warn!(error = %e, "network error, reconnecting");
        ConnectionOutcome::Reconnect
    }
}
