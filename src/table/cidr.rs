// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A CIDR prefix, v4 or v6, and its "Marshal" method (spec §9: replace the
//! source's closures-in-encoders with an explicit method on the type).

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum Cidr {
    V4(Ipv4Net),
    V6(Ipv6Net),
}

impl Cidr {
    pub fn v4(addr: Ipv4Addr, prefix_len: u8) -> Self {
        Cidr::V4(Ipv4Net::new(addr, prefix_len).unwrap_or_else(|_| {
            Ipv4Net::new(addr, 32).unwrap_or_else(|_| Ipv4Net::default())
        }))
    }

    pub fn v6(addr: Ipv6Addr, prefix_len: u8) -> Self {
        Cidr::V6(Ipv6Net::new(addr, prefix_len).unwrap_or_else(|_| {
            Ipv6Net::new(addr, 128).unwrap_or_else(|_| Ipv6Net::default())
        }))
    }

    pub fn prefix_len(&self) -> u8 {
        match self {
            Cidr::V4(n) => n.prefix_len(),
            Cidr::V6(n) => n.prefix_len(),
        }
    }

    /// Address width in bits: 32 for v4, 128 for v6.
    pub fn max_width(&self) -> u8 {
        match self {
            Cidr::V4(_) => 32,
            Cidr::V6(_) => 128,
        }
    }

    /// The network address's bit pattern, right-aligned in a `u128` (v4
    /// addresses occupy the low 32 bits).
    pub fn addr_bits(&self) -> u128 {
        match self {
            Cidr::V4(n) => u32::from(n.network()) as u128,
            Cidr::V6(n) => u128::from(n.network()),
        }
    }

    /// Canonical wire-string form: `a.b.c.d/len`, lowercase for v6.
    pub fn marshal(&self) -> String {
        match self {
            Cidr::V4(n) => n.to_string(),
            Cidr::V6(n) => n.to_string(),
        }
    }
}

impl From<Cidr> for String {
    fn from(c: Cidr) -> Self {
        c.marshal()
    }
}

impl std::fmt::Display for Cidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.marshal())
    }
}
