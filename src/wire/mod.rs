// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Component A: the RFC 8210 wire codec — PDU header layout, per-type body
//! layouts, and the stream decoder loop.

pub mod header;
pub mod pdu;

pub use header::RawHeader;
pub use pdu::{Pdu, decode};
