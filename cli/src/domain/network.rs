//! Port allocation from the kernel's socket tables.
//!
//! Pure functions only: the caller reads `/proc/net/tcp` and `/proc/net/tcp6`
//! and passes their text in.

use std::collections::BTreeSet;

/// Socket state `TCP_LISTEN` in `/proc/net/tcp*`.
const TCP_LISTEN: &str = "0A";

/// Ports in LISTEN state in a `/proc/net/tcp` or `/proc/net/tcp6` table.
#[must_use]
pub fn parse_listening_ports(table: &str) -> BTreeSet<u16> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let local = fields.nth(1)?;
            let state = fields.nth(1)?;
            if state != TCP_LISTEN {
                return None;
            }
            let (_, port_hex) = local.rsplit_once(':')?;
            u16::from_str_radix(port_hex, 16).ok()
        })
        .collect()
}

/// First port at or above `start` that is not bound.
#[must_use]
pub fn propose_free_port(bound: &BTreeSet<u16>, start: u16) -> Option<u16> {
    (start..=u16::MAX).find(|p| !bound.contains(p))
}
