// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The error kinds the session driver dispatches on (spec §7).
//!
//! Most call sites still return `anyhow::Result` for ad-hoc context; this
//! enum exists at the one seam where the driver needs to *match* on what
//! went wrong to decide whether to reconnect, exit, or just log and move on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtrError {
    /// Connect timeout, recv error, broken pipe: reconnect with backoff.
    #[error("transient network error: {0}")]
    TransientNetwork(#[source] std::io::Error),

    /// DNS resolution failure: the process exits.
    #[error("fatal network error: {0}")]
    FatalNetwork(#[source] std::io::Error),

    /// Bad length, impossible prefix/maxLen, truncated body: close and
    /// reconnect.
    #[error("malformed PDU: {0}")]
    MalformedPdu(String),

    /// An ErrorReport PDU was received: close and reconnect.
    #[error("protocol error reported by cache: {0}")]
    Protocol(String),

    /// Duplicate announce / unknown withdraw: logged, session continues.
    #[error("route inconsistency: {0}")]
    RouteInconsistency(String),
}
