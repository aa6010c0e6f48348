// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Component C: the longest-prefix-match route table, split into an IPv4
//! and an IPv6 trie the way the original keeps two separate `pytricia`
//! instances.

pub mod cidr;
pub mod trie;

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde::Serialize;

pub use self::cidr::Cidr;
use self::trie::{RouteEntry, RouteMatch, Trie, TrieError};

/// Origins for one prefix, grouped by maxLen the way a snapshot serializes
/// them: `{"<maxLen>": [{"<asn>": "<prefix>"}, ...]}` (spec §6).
pub type MaxLenBuckets = BTreeMap<String, Vec<BTreeMap<String, String>>>;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    Duplicate(#[from] TrieError),
}

/// The IPv4/IPv6 prefix table the session driver announces/withdraws
/// routes into, and the driver's lookups are served from.
#[derive(Debug, Default)]
pub struct PrefixTable {
    v4: Trie<u32>,
    v6: Trie<u128>,
}

impl PrefixTable {
    pub fn new() -> Self {
        PrefixTable::default()
    }

    pub fn announce(&mut self, cidr: Cidr, asn: u32, maxlen: u8) -> Result<(), TableError> {
        match cidr {
            Cidr::V4(n) => {
                self.v4
                    .announce(u32::from(n.network()), n.prefix_len(), asn, maxlen)?
            },
            Cidr::V6(n) => {
                self.v6
                    .announce(u128::from(n.network()), n.prefix_len(), asn, maxlen)?
            },
        }
        Ok(())
    }

    pub fn withdraw(&mut self, cidr: Cidr, asn: u32, maxlen: u8) -> Result<(), TableError> {
        match cidr {
            Cidr::V4(n) => {
                self.v4
                    .withdraw(u32::from(n.network()), n.prefix_len(), asn, maxlen)?
            },
            Cidr::V6(n) => {
                self.v6
                    .withdraw(u128::from(n.network()), n.prefix_len(), asn, maxlen)?
            },
        }
        Ok(())
    }

    /// Exact match, or (when `long_form` is set) exact match plus every
    /// more-specific route nested inside `cidr` (spec §4.C).
    pub fn lookup(&self, cidr: Cidr, long_form: bool) -> Vec<RouteMatch> {
        match cidr {
            Cidr::V4(n) => {
                let addr = u32::from(n.network());
                if long_form {
                    self.v4.find_covering(addr, n.prefix_len())
                } else {
                    self.v4
                        .find(addr, n.prefix_len())
                        .map(|entry| {
                            vec![RouteMatch {
                                prefix_len: n.prefix_len(),
                                entry,
                            }]
                        })
                        .unwrap_or_default()
                }
            },
            Cidr::V6(n) => {
                let addr = u128::from(n.network());
                if long_form {
                    self.v6.find_covering(addr, n.prefix_len())
                } else {
                    self.v6
                        .find(addr, n.prefix_len())
                        .map(|entry| {
                            vec![RouteMatch {
                                prefix_len: n.prefix_len(),
                                entry,
                            }]
                        })
                        .unwrap_or_default()
                }
            },
        }
    }

    /// A full JSON snapshot, shaped like the original's
    /// `data/routingtable.json` (`{"routes": {"ipv4": {...}, "ipv6": {...}}}`).
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            routes: Routes {
                ipv4: self.collect_snapshot_v4(),
                ipv6: self.collect_snapshot_v6(),
            },
        }
    }

    fn collect_snapshot_v4(&self) -> BTreeMap<String, MaxLenBuckets> {
        self.v4
            .walk_all()
            .into_iter()
            .map(|(prefix_len, addr, entry)| {
                let cidr = Cidr::v4(Ipv4Addr::from(addr as u32), prefix_len);
                (cidr.marshal(), group_by_maxlen(&entry, &cidr))
            })
            .collect()
    }

    fn collect_snapshot_v6(&self) -> BTreeMap<String, MaxLenBuckets> {
        self.v6
            .walk_all()
            .into_iter()
            .map(|(prefix_len, addr, entry)| {
                let cidr = Cidr::v6(Ipv6Addr::from(addr), prefix_len);
                (cidr.marshal(), group_by_maxlen(&entry, &cidr))
            })
            .collect()
    }
}

/// Buckets a prefix's origins by maxLen, the way `routingtable.json`
/// nests them (spec §6): each origin serializes as a one-entry map from
/// its ASN (stringified, since it's a JSON object key) to the prefix
/// string it was announced for.
fn group_by_maxlen(entry: &RouteEntry, cidr: &Cidr) -> MaxLenBuckets {
    let mut buckets: MaxLenBuckets = BTreeMap::new();
    for &(asn, maxlen) in &entry.origins {
        let mut origin = BTreeMap::new();
        origin.insert(asn.to_string(), cidr.marshal());
        buckets.entry(maxlen.to_string()).or_default().push(origin);
    }
    buckets
}

#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub routes: Routes,
}

#[derive(Debug, Serialize)]
pub struct Routes {
    pub ipv4: BTreeMap<String, MaxLenBuckets>,
    pub ipv6: BTreeMap<String, MaxLenBuckets>,
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn announce_and_lookup_v4() {
        let mut t = PrefixTable::new();
        let cidr = Cidr::v4(Ipv4Addr::new(192, 0, 2, 0), 24);
        t.announce(cidr, 65000, 24).expect("announce");
        let matches = t.lookup(cidr, false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entry.origins, vec![(65000, 24)]);
    }

    #[test]
    fn long_form_collects_nested_v6() {
        let mut t = PrefixTable::new();
        let base = Cidr::v6(Ipv6Addr::from_bits(0x2001_0db8 << 96), 32);
        let inner = Cidr::v6(Ipv6Addr::from_bits(0x2001_0db8_0001 << 80), 48);
        t.announce(base, 1, 32).expect("base");
        t.announce(inner, 2, 48).expect("inner");
        let matches = t.lookup(base, true);
        assert_eq!(matches.len(), 2);
    }

    #[test]
    fn duplicate_announce_surfaces_as_table_error() {
        let mut t = PrefixTable::new();
        let cidr = Cidr::v4(Ipv4Addr::new(192, 0, 2, 0), 24);
        t.announce(cidr, 65000, 24).expect("first");
        assert!(t.announce(cidr, 65000, 24).is_err());
    }

    #[test]
    fn snapshot_nests_prefix_maxlen_then_asn_to_prefix() {
        let mut t = PrefixTable::new();
        let cidr = Cidr::v4(Ipv4Addr::new(10, 0, 0, 0), 24);
        t.announce(cidr, 64500, 24).expect("announce");
        let snap = t.snapshot();
        let buckets = snap.routes.ipv4.get("10.0.0.0/24").expect("prefix entry");
        let origins = buckets.get("24").expect("maxlen bucket");
        assert_eq!(origins.len(), 1);
        assert_eq!(origins[0].get("64500").map(String::as_str), Some("10.0.0.0/24"));

        let json = serde_json::to_value(&snap).expect("serialize");
        assert_eq!(
            json["routes"]["ipv4"]["10.0.0.0/24"]["24"][0]["64500"],
            "10.0.0.0/24"
        );
    }
}
