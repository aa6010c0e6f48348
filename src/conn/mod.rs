// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Component E: the TCP transport — DNS resolution, connect-with-backoff,
//! and the raw send/recv wrappers the driver reads PDUs through.

pub mod connection;

pub use connection::Connection;
