//! Normalization of remote asset records into filesystem attributes.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::convert::PathConverter;
use crate::error::FsError;
use crate::resource::Resource;

/// The remote has no private/public distinction the adapter can control.
pub const VISIBILITY_PUBLIC: &str = "public";

/// Optional response fields forwarded into [`FileAttributes::extra`] when
/// present and non-empty, in this order.
pub const EXTRA_METADATA_FIELDS: [&str; 6] = [
    "version",
    "width",
    "height",
    "url",
    "secure_url",
    "next_cursor",
];

/// Normalized attribute record for one stored file.
///
/// A pure projection of one [`Resource`] plus the path recovered through
/// the converter. Immutable once built; a failed mapping never yields a
/// partially populated record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileAttributes {
    pub path: String,
    /// Size in bytes.
    pub size: u64,
    pub visibility: String,
    /// Seconds since the epoch, from the server-reported creation time.
    pub last_modified: i64,
    /// Synthesized as `{resource_type}/{format}`.
    pub mime_type: String,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FileAttributes {
    /// Map one remote record into a normalized attribute record.
    ///
    /// Fails with [`FsError::MetadataUnavailable`] naming the offending
    /// field when a required field is absent or the creation timestamp
    /// does not parse.
    pub fn from_resource(
        resource: &Resource,
        converter: &dyn PathConverter,
    ) -> Result<FileAttributes, FsError> {
        let path = converter.id_to_path(resource);
        if resource.public_id.is_empty() {
            return Err(FsError::metadata(path, "public_id", "missing from response"));
        }

        let size = resource
            .bytes
            .ok_or_else(|| FsError::metadata(path.clone(), "bytes", "missing from response"))?;

        let created_at = resource
            .created_at
            .as_deref()
            .ok_or_else(|| FsError::metadata(path.clone(), "created_at", "missing from response"))?;
        let last_modified = DateTime::parse_from_rfc3339(created_at)
            .map_err(|e| {
                FsError::metadata(path.clone(), "created_at", format!("unparseable timestamp {created_at:?}: {e}"))
            })?
            .timestamp();

        let resource_type = resource
            .resource_type
            .as_deref()
            .ok_or_else(|| FsError::metadata(path.clone(), "resource_type", "missing from response"))?;
        let format = resource
            .format
            .as_deref()
            .ok_or_else(|| FsError::metadata(path.clone(), "format", "missing from response"))?;

        Ok(FileAttributes {
            path,
            size,
            visibility: VISIBILITY_PUBLIC.to_string(),
            last_modified,
            mime_type: format!("{resource_type}/{format}"),
            extra: extract_extra_metadata(resource),
        })
    }
}

/// Copy allow-listed optional fields out of the response, skipping anything
/// absent or equal to the empty string.
fn extract_extra_metadata(resource: &Resource) -> BTreeMap<String, serde_json::Value> {
    let mut extra = BTreeMap::new();

    for field in EXTRA_METADATA_FIELDS {
        let value = match field {
            "version" => resource.version.clone(),
            "width" => resource.width.map(serde_json::Value::from),
            "height" => resource.height.map(serde_json::Value::from),
            "url" => resource.url.clone().map(serde_json::Value::String),
            "secure_url" => resource.secure_url.clone().map(serde_json::Value::String),
            // next_cursor only appears on listing envelopes, never on a
            // fetch-one record; kept in the allow-list for parity.
            _ => None,
        };

        match value {
            Some(serde_json::Value::String(s)) if s.is_empty() => {}
            Some(v) => {
                extra.insert(field.to_string(), v);
            }
            None => {}
        }
    }

    extra
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::TruncateExtensionConverter;

    fn full_resource() -> Resource {
        Resource {
            public_id: "uploads/photo".to_string(),
            format: Some("png".to_string()),
            resource_type: Some("image".to_string()),
            bytes: Some(4096),
            created_at: Some("2024-03-01T12:30:00Z".to_string()),
            version: Some(serde_json::json!(1709296200)),
            width: Some(640),
            height: Some(480),
            url: Some("http://res.example.com/uploads/photo.png".to_string()),
            secure_url: Some("https://res.example.com/uploads/photo.png".to_string()),
        }
    }

    #[test]
    fn test_maps_full_record() {
        let attrs =
            FileAttributes::from_resource(&full_resource(), &TruncateExtensionConverter).unwrap();
        assert_eq!(attrs.path, "uploads/photo.png");
        assert_eq!(attrs.size, 4096);
        assert_eq!(attrs.visibility, VISIBILITY_PUBLIC);
        assert_eq!(attrs.last_modified, 1709296200);
        assert_eq!(attrs.mime_type, "image/png");
        assert_eq!(attrs.extra.len(), 5);
        assert_eq!(attrs.extra["width"], serde_json::json!(640));
    }

    #[test]
    fn test_missing_created_at_is_an_error() {
        let mut r = full_resource();
        r.created_at = None;
        let err = FileAttributes::from_resource(&r, &TruncateExtensionConverter).unwrap_err();
        match err {
            FsError::MetadataUnavailable { attribute, .. } => assert_eq!(attribute, "created_at"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unparseable_created_at_is_an_error() {
        let mut r = full_resource();
        r.created_at = Some("yesterday-ish".to_string());
        let err = FileAttributes::from_resource(&r, &TruncateExtensionConverter).unwrap_err();
        match err {
            FsError::MetadataUnavailable { attribute, reason, .. } => {
                assert_eq!(attribute, "created_at");
                assert!(reason.contains("yesterday-ish"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_bytes_is_an_error() {
        let mut r = full_resource();
        r.bytes = None;
        let err = FileAttributes::from_resource(&r, &TruncateExtensionConverter).unwrap_err();
        match err {
            FsError::MetadataUnavailable { attribute, .. } => assert_eq!(attribute, "bytes"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_string_extras_are_excluded() {
        let mut r = full_resource();
        r.url = Some(String::new());
        let attrs = FileAttributes::from_resource(&r, &TruncateExtensionConverter).unwrap();
        assert!(!attrs.extra.contains_key("url"));
        assert!(attrs.extra.contains_key("secure_url"));
    }

    #[test]
    fn test_absent_extras_are_excluded() {
        let mut r = full_resource();
        r.version = None;
        r.width = None;
        r.height = None;
        r.url = None;
        r.secure_url = None;
        let attrs = FileAttributes::from_resource(&r, &TruncateExtensionConverter).unwrap();
        assert!(attrs.extra.is_empty());
    }
}
