use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use mediafs_common::convert::{AsIsConverter, PathConverter, TruncateExtensionConverter};

fn default_api_base() -> String {
    "https://api.cloudinary.com".to_string()
}

fn default_admin_resource_type() -> String {
    // The admin API addresses assets per resource type; uploads made with
    // resource_type "auto" mostly land under "image".
    "image".to_string()
}

/// Which path-to-public-id conversion the adapter uses. Chosen once at
/// construction, never per call.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    /// Public id is the path verbatim (doubled-extension caveat).
    #[default]
    AsIs,
    /// Strip the trailing extension before upload, rebuild from the
    /// remote-reported format on the way back.
    TruncateExtension,
}

impl ConverterKind {
    pub fn build(self) -> Arc<dyn PathConverter> {
        match self {
            ConverterKind::AsIs => Arc::new(AsIsConverter),
            ConverterKind::TruncateExtension => Arc::new(TruncateExtensionConverter),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Resource type used for admin lookups and listings.
    #[serde(default = "default_admin_resource_type")]
    pub resource_type: String,
    #[serde(default)]
    pub converter: ConverterKind,
}

impl CloudinaryConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: CloudinaryConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cloud_name.is_empty() {
            anyhow::bail!("cloud_name must not be empty");
        }
        if self.api_key.is_empty() {
            anyhow::bail!("api_key must not be empty");
        }
        if self.api_secret.is_empty() {
            anyhow::bail!("api_secret must not be empty");
        }
        if self.resource_type == "auto" {
            anyhow::bail!("resource_type 'auto' is only valid for uploads, not admin lookups");
        }
        Ok(())
    }
}

/// Per-operation options recognized by write and write_stream.
#[derive(Debug, Clone, Default)]
pub struct WriteConfig {
    /// Override the public id computed from the path.
    pub public_id: Option<String>,
    /// Upload resource type; defaults to "auto".
    pub resource_type: Option<String>,
    /// Pass-through parameters merged into the upload call. May not contain
    /// the reserved keys; see [`WriteConfig::reserved_key_collision`].
    pub upload_options: BTreeMap<String, String>,
}

impl WriteConfig {
    const RESERVED_KEYS: [&'static str; 2] = ["public_id", "resource_type"];

    /// First pass-through key colliding with a reserved upload parameter.
    pub fn reserved_key_collision(&self) -> Option<&str> {
        Self::RESERVED_KEYS
            .iter()
            .copied()
            .find(|key| self.upload_options.contains_key(*key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_config() {
        let toml_str = r#"
cloud_name = "demo"
api_key = "123456789"
api_secret = "shhh"
converter = "truncate_extension"
"#;
        let config: CloudinaryConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.api_base, "https://api.cloudinary.com");
        assert_eq!(config.resource_type, "image");
        assert_eq!(config.converter, ConverterKind::TruncateExtension);
    }

    #[test]
    fn test_converter_defaults_to_as_is() {
        let toml_str = r#"
cloud_name = "demo"
api_key = "123456789"
api_secret = "shhh"
"#;
        let config: CloudinaryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.converter, ConverterKind::AsIs);
    }

    #[test]
    fn test_missing_cloud_name_rejected() {
        let config: CloudinaryConfig = toml::from_str(
            r#"
cloud_name = ""
api_key = "123456789"
api_secret = "shhh"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_auto_admin_resource_type_rejected() {
        let config: CloudinaryConfig = toml::from_str(
            r#"
cloud_name = "demo"
api_key = "123456789"
api_secret = "shhh"
resource_type = "auto"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reserved_key_collision() {
        let mut config = WriteConfig::default();
        assert!(config.reserved_key_collision().is_none());
        config
            .upload_options
            .insert("public_id".to_string(), "sneaky".to_string());
        assert_eq!(config.reserved_key_collision(), Some("public_id"));
    }
}
