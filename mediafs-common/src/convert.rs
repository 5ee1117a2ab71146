//! Path-to-public-id conversion policies.
//!
//! The remote API stores objects under a flat public id and appends the
//! file format back onto the name at delivery time. Storing a path with
//! its extension intact therefore produces doubled names (`image.jpg.jpg`).
//! A converter decides how a logical path maps onto a public id and back.

use crate::resource::Resource;

/// Bidirectional mapping between a logical path and a remote public id.
///
/// Implementations must be pure and total: no I/O, no failure. Malformed
/// input degrades to identity behavior rather than erroring. A converter
/// is chosen once at adapter construction and shared by every operation.
pub trait PathConverter: Send + Sync {
    /// Convert a logical path to the public id used for upload/lookup/delete.
    fn path_to_id(&self, path: &str) -> String;

    /// Recover the logical path from a fetched resource record.
    fn id_to_path(&self, resource: &Resource) -> String;
}

/// Identity conversion: the public id is the path, verbatim.
///
/// Known defect carried over from the default behavior this replaces: the
/// remote appends the format at delivery time, so ids produced this way
/// yield doubled extensions (`image.jpg.jpg`). Kept for callers that
/// already have assets stored under full paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsIsConverter;

impl PathConverter for AsIsConverter {
    fn path_to_id(&self, path: &str) -> String {
        path.to_string()
    }

    fn id_to_path(&self, resource: &Resource) -> String {
        resource.public_id.clone()
    }
}

/// Strips the trailing `.<ext>` of the final path segment before upload and
/// rebuilds the path from `public_id` + `.` + the remote-reported format.
///
/// The round trip `id_to_path(path_to_id(p))` reconstructs `p` only when the
/// remote reports the format spelled exactly as the original extension; the
/// remote may normalize format names, so this is best effort.
#[derive(Debug, Default, Clone, Copy)]
pub struct TruncateExtensionConverter;

impl PathConverter for TruncateExtensionConverter {
    fn path_to_id(&self, path: &str) -> String {
        let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
        let name = &path[name_start..];

        match name.rfind('.') {
            // Truncate only a real extension on the final segment. A leading
            // dot is a hidden-file name, not an extension; a trailing dot is
            // an empty extension. Both pass through unchanged.
            Some(dot) if dot > 0 && dot < name.len() - 1 => {
                path[..name_start + dot].to_string()
            }
            _ => path.to_string(),
        }
    }

    fn id_to_path(&self, resource: &Resource) -> String {
        match resource.format.as_deref() {
            Some(format) if !format.is_empty() => {
                format!("{}.{}", resource.public_id, format)
            }
            // No reported format (e.g. raw assets): the id is the path.
            _ => resource.public_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(public_id: &str, format: Option<&str>) -> Resource {
        Resource {
            public_id: public_id.to_string(),
            format: format.map(|s| s.to_string()),
            ..Resource::default()
        }
    }

    #[test]
    fn test_as_is_round_trip() {
        let c = AsIsConverter;
        assert_eq!(c.path_to_id("uploads/image.jpg"), "uploads/image.jpg");
        assert_eq!(
            c.id_to_path(&resource("uploads/image.jpg", Some("jpg"))),
            "uploads/image.jpg"
        );
    }

    #[test]
    fn test_truncate_strips_last_extension_only() {
        let c = TruncateExtensionConverter;
        assert_eq!(c.path_to_id("uploads/image.jpg"), "uploads/image");
        assert_eq!(c.path_to_id("archive.tar.gz"), "archive.tar");
        assert_eq!(c.path_to_id("no_extension"), "no_extension");
    }

    #[test]
    fn test_truncate_ignores_dots_in_directory_segments() {
        let c = TruncateExtensionConverter;
        assert_eq!(c.path_to_id("releases/v1.2/build"), "releases/v1.2/build");
        assert_eq!(c.path_to_id("releases/v1.2/build.zip"), "releases/v1.2/build");
    }

    #[test]
    fn test_truncate_preserves_hidden_file_names() {
        let c = TruncateExtensionConverter;
        assert_eq!(c.path_to_id(".gitignore"), ".gitignore");
        assert_eq!(c.path_to_id("config/.env"), "config/.env");
        // A hidden file with a real extension still loses the extension.
        assert_eq!(c.path_to_id(".config.bak"), ".config");
    }

    #[test]
    fn test_truncate_trailing_dot_unchanged() {
        let c = TruncateExtensionConverter;
        assert_eq!(c.path_to_id("odd."), "odd.");
        assert_eq!(c.path_to_id("dir/odd."), "dir/odd.");
    }

    #[test]
    fn test_truncate_never_doubles_extension() {
        let c = TruncateExtensionConverter;
        let id = c.path_to_id("uploads/photo.png");
        assert!(!id.ends_with(".png"));
        // A second pass is a no-op on the already-stripped id.
        assert_eq!(c.path_to_id(&id), id);
    }

    #[test]
    fn test_truncate_round_trip_with_matching_format() {
        let c = TruncateExtensionConverter;
        let id = c.path_to_id("uploads/photo.png");
        assert_eq!(c.id_to_path(&resource(&id, Some("png"))), "uploads/photo.png");
    }

    #[test]
    fn test_truncate_id_to_path_without_format() {
        let c = TruncateExtensionConverter;
        assert_eq!(c.id_to_path(&resource("docs/readme", None)), "docs/readme");
        assert_eq!(c.id_to_path(&resource("docs/readme", Some(""))), "docs/readme");
    }
}
