//! The persisted registry file and its store.
//!
//! The registry is a single JSON document mapping pod names to their
//! connection details, plus an optional `active_pod` pointer. It is the
//! only shared mutable state in the system, and concurrent invocations
//! must never corrupt it: every save writes to a temporary file in the
//! same directory and renames it into place, so readers always see either
//! the old or the new document, never a torn one.
//!
//! Store operations pass the document by value — load returns it, save
//! takes it — so there is no hidden cached state. A process exposing this
//! as a long-running service would need a single-writer guard around
//! mutations; short-lived CLI invocations do not.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};

/// Current schema version of the registry document.
pub const CURRENT_VERSION: &str = "1.0";

/// One configured pod.
///
/// Provider/region/GPU fields are best-effort metadata captured at setup
/// time; they may be stale. Remote state is always re-fetched, never read
/// from here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodEntry {
    /// Unique name within the registry.
    pub name: String,
    /// SSH target (`user@host [options]`), without the `ssh ` prefix.
    pub ssh_command: String,
    /// Provider name.
    pub provider: String,
    /// Region name.
    pub region: String,
    /// GPU type label.
    pub gpu_type: String,
    /// GPU count.
    pub gpu_count: u32,
    /// Hourly cost in USD.
    pub cost_per_hour: f64,
    /// When this entry was created.
    pub created_at: DateTime<Utc>,
    /// Last known status tag.
    pub status: String,
    /// External pod id, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_id: Option<String>,
}

/// The persisted registry document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryFile {
    /// Name of the implicitly-targeted pod, if any. Must be a key of
    /// `pods` whenever set.
    #[serde(default)]
    pub active_pod: Option<String>,
    /// Configured pods by name.
    #[serde(default)]
    pub pods: BTreeMap<String, PodEntry>,
    /// Schema version tag.
    pub version: String,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            active_pod: None,
            pods: BTreeMap::new(),
            version: CURRENT_VERSION.to_string(),
        }
    }
}

impl RegistryFile {
    /// Verify the active-pod invariant: `active_pod` is `None` or a key of
    /// `pods`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Corrupt`] naming the dangling pointer.
    pub fn check_invariant(&self) -> RegistryResult<()> {
        match &self.active_pod {
            Some(name) if !self.pods.contains_key(name) => Err(RegistryError::corrupt(format!(
                "active_pod '{name}' is not a configured pod"
            ))),
            _ => Ok(()),
        }
    }
}

type MigrationStep = fn(Value) -> Value;

/// The upgrade chain: each step is a pure document transform keyed by the
/// version it upgrades FROM. Steps are applied in sequence until the
/// document reaches [`CURRENT_VERSION`].
const MIGRATIONS: &[(&str, MigrationStep)] = &[("0.9", migrate_09_to_10)];

/// Legacy `0.9` layout: pods keyed the same way but with an `ssh` field
/// and no `status` tag.
fn migrate_09_to_10(mut doc: Value) -> Value {
    if let Some(pods) = doc.get_mut("pods").and_then(Value::as_object_mut) {
        for pod in pods.values_mut() {
            let Some(entry) = pod.as_object_mut() else {
                continue;
            };
            if let Some(ssh) = entry.remove("ssh") {
                entry.entry("ssh_command").or_insert(ssh);
            }
            entry
                .entry("status")
                .or_insert_with(|| Value::String("unknown".to_string()));
            entry
                .entry("created_at")
                .or_insert_with(|| Value::String("1970-01-01T00:00:00Z".to_string()));
        }
    }
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("version".to_string(), Value::String("1.0".to_string()));
    }
    doc
}

/// File-backed store for the registry document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at an explicit path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional per-user registry path (`~/.podgrid.json`).
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::var_os("HOME")
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
            .join(".podgrid.json")
    }

    /// The path this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry, or a fresh default when the file is absent.
    ///
    /// An unparseable file is quarantined to `<path>.backup` and replaced
    /// by a fresh default rather than aborting the process. A dangling
    /// `active_pod` pointer is repaired by clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] only for genuine filesystem failures
    /// (permissions, disk); corruption is recovered, not surfaced.
    pub fn load(&self) -> RegistryResult<RegistryFile> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no registry file, starting fresh");
            return Ok(RegistryFile::default());
        }

        let text = std::fs::read_to_string(&self.path)?;
        let parsed = serde_json::from_str::<Value>(&text)
            .map_err(RegistryError::from)
            .and_then(Self::migrate);

        let mut file = match parsed {
            Ok(file) => file,
            Err(err) => {
                let backup = self.quarantine()?;
                warn!(
                    error = %err,
                    backup = %backup.display(),
                    "registry unreadable, quarantined and starting fresh"
                );
                return Ok(RegistryFile::default());
            }
        };

        if file.check_invariant().is_err() {
            warn!(
                active = file.active_pod.as_deref().unwrap_or_default(),
                "clearing dangling active_pod pointer"
            );
            file.active_pod = None;
        }
        Ok(file)
    }

    /// Persist the registry atomically.
    ///
    /// The document is written to `<path>.tmp` and renamed into place, so
    /// a crash mid-save never leaves a half-written registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Corrupt`] when the document violates the
    /// active-pod invariant, or [`RegistryError::Io`] on filesystem
    /// failure.
    pub fn save(&self, file: &RegistryFile) -> RegistryResult<()> {
        file.check_invariant()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let text = serde_json::to_string_pretty(file)?;
        if let Err(err) = std::fs::write(&tmp, text).and_then(|()| std::fs::rename(&tmp, &self.path))
        {
            let _ = std::fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    /// Bring a raw document up to [`CURRENT_VERSION`].
    ///
    /// Idempotent: a document already at the current version passes
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Corrupt`] for an unknown version tag, or a
    /// decode error when the upgraded document still does not match the
    /// schema.
    pub fn migrate(mut doc: Value) -> RegistryResult<RegistryFile> {
        if !doc.is_object() {
            return Err(RegistryError::corrupt("registry document is not an object"));
        }
        loop {
            let version = doc
                .get("version")
                .and_then(Value::as_str)
                // Documents predating version tags are the oldest layout.
                .unwrap_or("0.9")
                .to_string();

            if version == CURRENT_VERSION {
                return serde_json::from_value(doc).map_err(RegistryError::from);
            }

            let Some((_, step)) = MIGRATIONS.iter().find(|(from, _)| *from == version) else {
                return Err(RegistryError::corrupt(format!(
                    "unsupported registry version '{version}'"
                )));
            };
            doc = step(doc);
        }
    }

    /// Copy the live registry to a timestamped backup path.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when there is no registry file or the
    /// copy fails.
    pub fn backup(&self) -> RegistryResult<PathBuf> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let backup = self.path.with_extension(format!("backup_{stamp}"));
        std::fs::copy(&self.path, &backup)?;
        Ok(backup)
    }

    fn quarantine(&self) -> RegistryResult<PathBuf> {
        let backup = self.path.with_extension("backup");
        std::fs::rename(&self.path, &backup)?;
        Ok(backup)
    }
}
