//! Durable storage for the orientation consent decision
//!
//! One key, two values. Anything else found under the key reads as "no
//! prior decision", so a corrupted store re-prompts instead of failing.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyeorb_core::{OrbError, OrbResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Storage key for the consent decision
pub const PERMISSION_KEY: &str = "eye-orb-gyro-permission";

/// A persisted consent decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    Granted,
    Denied,
}

impl PermissionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "granted" => Some(Self::Granted),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

/// Per-origin durable store for the consent decision
pub trait PermissionStore {
    fn load(&self) -> OrbResult<Option<PermissionDecision>>;
    fn save(&self, decision: PermissionDecision) -> OrbResult<()>;
}

impl<T: PermissionStore + ?Sized> PermissionStore for Arc<T> {
    fn load(&self) -> OrbResult<Option<PermissionDecision>> {
        (**self).load()
    }

    fn save(&self, decision: PermissionDecision) -> OrbResult<()> {
        (**self).save(decision)
    }
}

/// In-memory store. Clones share the same slot, so a store handed to
/// successive mounts behaves like durable storage within one process.
#[derive(Debug, Clone, Default)]
pub struct MemoryPermissionStore {
    slot: Arc<Mutex<Option<PermissionDecision>>>,
}

impl MemoryPermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decision(decision: PermissionDecision) -> Self {
        MemoryPermissionStore {
            slot: Arc::new(Mutex::new(Some(decision))),
        }
    }

    pub fn get(&self) -> Option<PermissionDecision> {
        *self.slot.lock()
    }
}

impl PermissionStore for MemoryPermissionStore {
    fn load(&self) -> OrbResult<Option<PermissionDecision>> {
        Ok(*self.slot.lock())
    }

    fn save(&self, decision: PermissionDecision) -> OrbResult<()> {
        *self.slot.lock() = Some(decision);
        Ok(())
    }
}

/// JSON key/value file store
///
/// The file holds a flat string map so other keys written by the host
/// survive our writes.
#[derive(Debug, Clone)]
pub struct FilePermissionStore {
    path: PathBuf,
}

impl FilePermissionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FilePermissionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> OrbResult<BTreeMap<String, serde_json::Value>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(OrbError::Persistence(err.to_string())),
        };
        serde_json::from_str(&raw).map_err(|err| OrbError::Persistence(err.to_string()))
    }
}

impl PermissionStore for FilePermissionStore {
    fn load(&self) -> OrbResult<Option<PermissionDecision>> {
        let map = self.read_map()?;
        Ok(map
            .get(PERMISSION_KEY)
            .and_then(|value| value.as_str())
            .and_then(PermissionDecision::parse))
    }

    fn save(&self, decision: PermissionDecision) -> OrbResult<()> {
        // An unreadable file is replaced rather than blocking the write
        let mut map = self.read_map().unwrap_or_default();
        map.insert(
            PERMISSION_KEY.to_string(),
            serde_json::Value::String(decision.as_str().to_string()),
        );
        let body =
            serde_json::to_string_pretty(&map).map_err(|err| OrbError::Persistence(err.to_string()))?;
        fs::write(&self.path, body).map_err(|err| OrbError::Persistence(err.to_string()))
    }
}
