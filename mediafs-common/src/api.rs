//! Trait boundary to the remote media API.
//!
//! The adapter talks to the remote exclusively through [`MediaApi`], so the
//! HTTP client can be swapped for an in-memory double in tests. The trait
//! covers exactly the calls the filesystem operations need: the upload API
//! (upload/rename/destroy) and the admin API (fetch, prefix listing,
//! folder management), plus direct content download by delivery URL.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::ApiError;
use crate::resource::{DestroyResponse, FolderList, Resource, ResourceList};

/// Default resource type for uploads: let the remote detect the format.
pub const RESOURCE_TYPE_AUTO: &str = "auto";

/// What to upload: raw content, or a URL the remote fetches server-side.
/// Copy is implemented as an upload from the source asset's delivery URL.
#[derive(Debug, Clone)]
pub enum UploadSource {
    Bytes(Bytes),
    RemoteUrl(String),
}

/// Options for one upload call.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Public id to store the asset under.
    pub public_id: String,
    pub resource_type: String,
    /// Caller-supplied pass-through parameters. Must not contain the
    /// reserved keys `public_id` or `resource_type`; the adapter rejects
    /// collisions before the call is made.
    pub extra: BTreeMap<String, String>,
}

impl UploadOptions {
    pub fn new(public_id: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            resource_type: RESOURCE_TYPE_AUTO.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

/// Remote media API consumed by the adapter.
#[async_trait::async_trait]
pub trait MediaApi: Send + Sync {
    /// Store content under `options.public_id`, overwriting any previous
    /// asset with that id.
    async fn upload(&self, source: UploadSource, options: &UploadOptions)
        -> Result<Resource, ApiError>;

    /// Rename an asset. The remote rename is a single atomic call; returns
    /// [`ApiError::NotFound`] when `from_id` does not exist.
    async fn rename(&self, from_id: &str, to_id: &str) -> Result<Resource, ApiError>;

    /// Delete an asset. Success is reported in-band via the payload; the
    /// caller must inspect [`DestroyResponse::is_ok`].
    async fn destroy(&self, public_id: &str, invalidate: bool)
        -> Result<DestroyResponse, ApiError>;

    /// Fetch the full record for one asset.
    async fn resource(&self, public_id: &str) -> Result<Resource, ApiError>;

    /// One page of assets whose public id starts with `prefix`.
    async fn resources(
        &self,
        prefix: &str,
        max_results: u32,
        cursor: Option<&str>,
    ) -> Result<ResourceList, ApiError>;

    async fn create_folder(&self, path: &str) -> Result<(), ApiError>;

    async fn delete_folder(&self, path: &str) -> Result<(), ApiError>;

    /// One page of the immediate subfolders of `path`.
    async fn subfolders(
        &self,
        path: &str,
        max_results: u32,
        cursor: Option<&str>,
    ) -> Result<FolderList, ApiError>;

    /// Fetch asset content from its delivery URL.
    async fn download(&self, url: &str) -> Result<Bytes, ApiError>;

    /// Fetch asset content from its delivery URL as an incremental stream.
    async fn download_stream(&self, url: &str) -> Result<ByteStream, ApiError>;
}

/// Incrementally consumable asset content.
///
/// Wraps either a live HTTP response (each [`ByteStream::chunk`] call may
/// block on the network) or an already-buffered payload (test doubles).
pub struct ByteStream {
    inner: ByteStreamInner,
}

enum ByteStreamInner {
    Http(reqwest::Response),
    Buffered(Option<Bytes>),
}

impl ByteStream {
    pub fn from_response(response: reqwest::Response) -> Self {
        Self { inner: ByteStreamInner::Http(response) }
    }

    pub fn from_bytes(bytes: Bytes) -> Self {
        Self { inner: ByteStreamInner::Buffered(Some(bytes)) }
    }

    /// Next chunk of content, or `None` once the stream is exhausted.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>, ApiError> {
        match &mut self.inner {
            ByteStreamInner::Http(response) => Ok(response.chunk().await?),
            ByteStreamInner::Buffered(bytes) => Ok(bytes.take()),
        }
    }

    /// Drain the remaining chunks into one buffer.
    pub async fn collect(mut self) -> Result<Bytes, ApiError> {
        let mut buf = bytes::BytesMut::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffered_stream_yields_once() {
        let mut stream = ByteStream::from_bytes(Bytes::from_static(b"hello"));
        assert_eq!(stream.chunk().await.unwrap().unwrap(), Bytes::from_static(b"hello"));
        assert!(stream.chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_buffered_stream_collect() {
        let stream = ByteStream::from_bytes(Bytes::from_static(b"hello"));
        assert_eq!(stream.collect().await.unwrap(), Bytes::from_static(b"hello"));
    }
}
