// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Component B: the per-PDU session state machine — session id / serial
//! tracking, refresh timer bookkeeping, and route-table application.

pub mod state;

pub use state::{DeltaBuffer, RouteDelta, SessionEvent, SessionState};
