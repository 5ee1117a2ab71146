//! Reqwest-backed client for the Cloudinary REST surface.
//!
//! Admin API calls (fetch, listing, folders) use HTTP basic auth. Upload
//! API calls (upload, rename, destroy) are form posts authenticated with a
//! SHA-256 signature over the sorted parameter string plus the API secret;
//! the server detects the digest algorithm from the signature length.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use mediafs_common::api::{ByteStream, MediaApi, UploadOptions, UploadSource};
use mediafs_common::error::ApiError;
use mediafs_common::resource::{DestroyResponse, FolderList, Resource, ResourceList};

use crate::config::CloudinaryConfig;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct CloudinaryClient {
    client: Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .expect("Failed to build HTTP client"),
            config,
        }
    }

    fn api_url(&self, suffix: &str) -> String {
        format!(
            "{}/v1_1/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            suffix
        )
    }

    /// Percent-encode a public id or folder path, keeping its `/` separators.
    fn encode_path(id: &str) -> String {
        id.split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// SHA-256 signature over `k=v&...` of the sorted non-empty parameters,
    /// concatenated with the API secret.
    fn sign(&self, params: &BTreeMap<String, String>) -> String {
        let to_sign = params
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha256::digest(format!("{to_sign}{}", self.config.api_secret).as_bytes()))
    }

    /// Signed parameters plus the authentication fields the upload API wants.
    fn signed_params(&self, mut params: BTreeMap<String, String>) -> BTreeMap<String, String> {
        params.insert("timestamp".to_string(), Utc::now().timestamp().to_string());
        let signature = self.sign(&params);
        params.insert("api_key".to_string(), self.config.api_key.clone());
        params.insert("signature".to_string(), signature);
        params
    }

    async fn check<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T, ApiError> {
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(Self::api_error(resp, what).await)
        }
    }

    async fn api_error(resp: Response, what: &str) -> ApiError {
        let status = resp.status().as_u16();
        if status == 404 {
            return ApiError::NotFound(what.to_string());
        }
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .map(|e| e.message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        ApiError::Api { status, message }
    }
}

#[async_trait::async_trait]
impl MediaApi for CloudinaryClient {
    async fn upload(
        &self,
        source: UploadSource,
        options: &UploadOptions,
    ) -> Result<Resource, ApiError> {
        let url = self.api_url(&format!("{}/upload", options.resource_type));

        let mut params = options.extra.clone();
        params.insert("public_id".to_string(), options.public_id.clone());
        let params = self.signed_params(params);

        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(key, value);
        }
        form = match source {
            UploadSource::Bytes(bytes) => {
                form.part("file", Part::bytes(bytes.to_vec()).file_name("file"))
            }
            UploadSource::RemoteUrl(remote_url) => form.text("file", remote_url),
        };

        let resp = self.client.post(&url).multipart(form).send().await?;
        let resource: Resource = Self::check(resp, &options.public_id).await?;
        debug!(public_id = %resource.public_id, "Upload complete");
        Ok(resource)
    }

    async fn rename(&self, from_id: &str, to_id: &str) -> Result<Resource, ApiError> {
        let url = self.api_url(&format!("{}/rename", self.config.resource_type));

        let mut params = BTreeMap::new();
        params.insert("from_public_id".to_string(), from_id.to_string());
        params.insert("to_public_id".to_string(), to_id.to_string());
        let params = self.signed_params(params);

        let resp = self.client.post(&url).form(&params).send().await?;
        let resource: Resource = Self::check(resp, from_id).await?;
        debug!(from = %from_id, to = %to_id, "Rename complete");
        Ok(resource)
    }

    async fn destroy(&self, public_id: &str, invalidate: bool) -> Result<DestroyResponse, ApiError> {
        let url = self.api_url(&format!("{}/destroy", self.config.resource_type));

        let mut params = BTreeMap::new();
        params.insert("public_id".to_string(), public_id.to_string());
        params.insert("invalidate".to_string(), invalidate.to_string());
        let params = self.signed_params(params);

        let resp = self.client.post(&url).form(&params).send().await?;
        let result: DestroyResponse = Self::check(resp, public_id).await?;
        debug!(public_id = %public_id, result = %result.result, "Destroy complete");
        Ok(result)
    }

    async fn resource(&self, public_id: &str) -> Result<Resource, ApiError> {
        let url = self.api_url(&format!(
            "resources/{}/upload/{}",
            self.config.resource_type,
            Self::encode_path(public_id)
        ));
        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;
        Self::check(resp, public_id).await
    }

    async fn resources(
        &self,
        prefix: &str,
        max_results: u32,
        cursor: Option<&str>,
    ) -> Result<ResourceList, ApiError> {
        let url = self.api_url(&format!("resources/{}/upload", self.config.resource_type));
        let mut query: Vec<(&str, String)> = vec![
            ("prefix", prefix.to_string()),
            ("max_results", max_results.to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("next_cursor", cursor.to_string()));
        }
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;
        Self::check(resp, prefix).await
    }

    async fn create_folder(&self, path: &str) -> Result<(), ApiError> {
        let url = self.api_url(&format!("folders/{}", Self::encode_path(path)));
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;
        if resp.status().is_success() {
            debug!(path = %path, "Folder created");
            Ok(())
        } else {
            Err(Self::api_error(resp, path).await)
        }
    }

    async fn delete_folder(&self, path: &str) -> Result<(), ApiError> {
        let url = self.api_url(&format!("folders/{}", Self::encode_path(path)));
        let resp = self
            .client
            .delete(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;
        if resp.status().is_success() {
            debug!(path = %path, "Folder deleted");
            Ok(())
        } else {
            Err(Self::api_error(resp, path).await)
        }
    }

    async fn subfolders(
        &self,
        path: &str,
        max_results: u32,
        cursor: Option<&str>,
    ) -> Result<FolderList, ApiError> {
        // Root listing is `folders`, one level down is `folders/{path}`.
        let suffix = if path.is_empty() {
            "folders".to_string()
        } else {
            format!("folders/{}", Self::encode_path(path))
        };
        let url = self.api_url(&suffix);
        let mut query: Vec<(&str, String)> = vec![("max_results", max_results.to_string())];
        if let Some(cursor) = cursor {
            query.push(("next_cursor", cursor.to_string()));
        }
        let resp = self
            .client
            .get(&url)
            .query(&query)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await?;
        Self::check(resp, path).await
    }

    async fn download(&self, url: &str) -> Result<Bytes, ApiError> {
        let resp = self.client.get(url).send().await?;
        if resp.status().is_success() {
            Ok(resp.bytes().await?)
        } else {
            Err(Self::api_error(resp, url).await)
        }
    }

    async fn download_stream(&self, url: &str) -> Result<ByteStream, ApiError> {
        let resp = self.client.get(url).send().await?;
        if resp.status().is_success() {
            Ok(ByteStream::from_response(resp))
        } else {
            Err(Self::api_error(resp, url).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConverterKind;

    fn client() -> CloudinaryClient {
        CloudinaryClient::new(CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "123456789".to_string(),
            api_secret: "shhh".to_string(),
            api_base: "https://api.cloudinary.com".to_string(),
            resource_type: "image".to_string(),
            converter: ConverterKind::TruncateExtension,
        })
    }

    #[test]
    fn test_api_url() {
        assert_eq!(
            client().api_url("image/upload"),
            "https://api.cloudinary.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(
            CloudinaryClient::encode_path("uploads/summer 2024/photo"),
            "uploads/summer%202024/photo"
        );
    }

    #[test]
    fn test_sign_is_deterministic_and_order_independent() {
        let c = client();
        let mut a = BTreeMap::new();
        a.insert("public_id".to_string(), "uploads/photo".to_string());
        a.insert("timestamp".to_string(), "1700000000".to_string());
        let mut b = BTreeMap::new();
        b.insert("timestamp".to_string(), "1700000000".to_string());
        b.insert("public_id".to_string(), "uploads/photo".to_string());

        let sig = c.sign(&a);
        assert_eq!(sig, c.sign(&b));
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sign_skips_empty_params() {
        let c = client();
        let mut with_empty = BTreeMap::new();
        with_empty.insert("public_id".to_string(), "x".to_string());
        with_empty.insert("folder".to_string(), String::new());
        let mut without = BTreeMap::new();
        without.insert("public_id".to_string(), "x".to_string());
        assert_eq!(c.sign(&with_empty), c.sign(&without));
    }

    #[test]
    fn test_signed_params_include_auth_fields() {
        let params = client().signed_params(BTreeMap::new());
        assert_eq!(params["api_key"], "123456789");
        assert!(params.contains_key("timestamp"));
        assert!(params.contains_key("signature"));
    }

    #[test]
    fn test_error_body_parses() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error": {"message": "Invalid signature"}}"#).unwrap();
        assert_eq!(body.error.unwrap().message, "Invalid signature");
    }
}
