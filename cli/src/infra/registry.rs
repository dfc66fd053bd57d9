//! Infrastructure implementation of the `InstanceRegistry` port.
//!
//! One pretty-printed JSON file per instance under
//! `<state_dir>/instances/<slug>.json`, written atomically with mode `0600`.

use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use jmaka_common::{InstanceRecord, InstanceSlug};

use crate::application::ports::InstanceRegistry;
use crate::infra::fs::write_atomic;
use crate::infra::host::LocalHost;

impl LocalHost {
    fn record_path(&self, slug: &InstanceSlug) -> PathBuf {
        self.registry_dir.join(format!("{slug}.json"))
    }
}

impl InstanceRegistry for LocalHost {
    fn save(&self, record: &InstanceRecord) -> Result<()> {
        std::fs::create_dir_all(&self.registry_dir)
            .with_context(|| format!("creating directory {}", self.registry_dir.display()))?;
        let path = self.record_path(&record.instance.name);
        let content = serde_json::to_string_pretty(record).context("serializing instance record")?;
        write_atomic(&path, content.as_bytes(), Some(0o600))
    }

    fn load(&self, slug: &InstanceSlug) -> Result<Option<InstanceRecord>> {
        let path = self.record_path(slug);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let record = serde_json::from_str(&content)
            .with_context(|| format!("parsing instance record {}", path.display()))?;
        Ok(Some(record))
    }

    fn list(&self) -> Result<Vec<InstanceRecord>> {
        let entries = match std::fs::read_dir(&self.registry_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("listing {}", self.registry_dir.display()));
            }
        };
        let mut records = Vec::new();
        for entry in entries.filter_map(Result::ok) {
            let Some(slug) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
                .and_then(|stem| InstanceSlug::try_from(stem.to_string()).ok())
            else {
                continue;
            };
            if let Some(record) = self.load(&slug)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.instance.name.cmp(&b.instance.name));
        Ok(records)
    }

    fn remove(&self, slug: &InstanceSlug) -> Result<bool> {
        let path = self.record_path(slug);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}
