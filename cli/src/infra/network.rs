//! Network infrastructure: implements `PortProbe` from the kernel's
//! `/proc/net/tcp` and `/proc/net/tcp6` tables.

use std::collections::BTreeSet;
use std::io::ErrorKind;

use anyhow::{Context, Result};

use crate::application::ports::PortProbe;
use crate::domain::network::parse_listening_ports;
use crate::infra::host::LocalHost;

impl PortProbe for LocalHost {
    fn listening_ports(&self) -> Result<BTreeSet<u16>> {
        let mut ports = BTreeSet::new();
        for table in ["tcp", "tcp6"] {
            let path = self.proc_net.join(table);
            match std::fs::read_to_string(&path) {
                Ok(text) => ports.extend(parse_listening_ports(&text)),
                // IPv6 may be disabled.
                Err(e) if e.kind() == ErrorKind::NotFound && table == "tcp6" => {}
                Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
            }
        }
        tracing::debug!(count = ports.len(), "listening ports");
        Ok(ports)
    }
}
