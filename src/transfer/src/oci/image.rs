//! Image configuration document.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use regferry_core::error::Result;
use serde::{Deserialize, Deserializer, Serialize};

use super::digest::DiffId;

/// Root filesystem type for layered images.
pub const FS_TYPE: &str = "layers";

/// Image configuration (`application/vnd.oci.image.config.v1+json` or the
/// Docker equivalent).
///
/// Only the fields the exporter rewrites are typed; everything else is kept
/// verbatim in `extra` so re-serialization does not drop unknown keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Image creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Layer content digests, base layer first
    #[serde(default, deserialize_with = "null_as_default")]
    pub rootfs: RootFs,

    /// All other configuration fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `rootfs` section. Incoming diff IDs are kept as written, since export
/// replaces them and inspect only echoes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type", default = "default_fs_type")]
    pub fs_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub diff_ids: Vec<String>,
}

fn default_fs_type() -> String {
    FS_TYPE.to_string()
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for RootFs {
    fn default() -> Self {
        Self {
            fs_type: FS_TYPE.to_string(),
            diff_ids: Vec::new(),
        }
    }
}

impl RootFs {
    /// Replace the diff IDs with recomputed ones.
    pub fn set_diff_ids(&mut self, diff_ids: &[DiffId]) {
        self.diff_ids = diff_ids.iter().map(ToString::to_string).collect();
    }
}

impl ImageConfig {
    pub fn from_json(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Creation time as a filesystem timestamp; the Unix epoch when unset
    /// or before 1970.
    pub fn created_time(&self) -> SystemTime {
        self.created
            .and_then(|c| u64::try_from(c.timestamp_nanos_opt()?).ok())
            .map(|nanos| UNIX_EPOCH + Duration::from_nanos(nanos))
            .unwrap_or(UNIX_EPOCH)
    }

    pub fn architecture(&self) -> Option<&str> {
        self.extra.get("architecture").and_then(|v| v.as_str())
    }

    pub fn os(&self) -> Option<&str> {
        self.extra.get("os").and_then(|v| v.as_str())
    }
}
