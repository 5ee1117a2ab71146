//! Wire records returned by the remote media API.

use serde::{Deserialize, Serialize};

// ── Asset records ──

/// One stored asset as reported by the remote API.
///
/// Only `public_id` is guaranteed by the wire format; everything the
/// attribute mapper requires is kept optional here and validated there, so
/// a thin listing response and a full fetch-one response both deserialize
/// into the same record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Resource {
    pub public_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_url: Option<String>,
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceList {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// ── Folder records ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Folder {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: String,
}

/// One page of a subfolder listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FolderList {
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// ── Mutation results ──

/// Payload of a destroy call. The remote reports success in-band as
/// `result == "ok"` rather than via the HTTP status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyResponse {
    pub result: String,
}

impl DestroyResponse {
    pub fn is_ok(&self) -> bool {
        self.result == "ok"
    }
}
