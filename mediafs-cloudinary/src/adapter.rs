//! Filesystem operations over the remote media API.
//!
//! The remote namespace is flat: directories exist only as shared public-id
//! prefixes plus a server-side folder-tagging feature. Listing is emulated
//! by prefix filtering, directory existence by scanning one level of the
//! folder hierarchy. All operations are synchronous calls to the remote,
//! sequenced by the caller; the adapter holds no mutable state.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use mediafs_common::api::{ByteStream, MediaApi, RESOURCE_TYPE_AUTO, UploadOptions, UploadSource};
use mediafs_common::attributes::FileAttributes;
use mediafs_common::convert::PathConverter;
use mediafs_common::error::{ApiError, FsError};
use mediafs_common::resource::Resource;

use crate::client::CloudinaryClient;
use crate::config::{CloudinaryConfig, WriteConfig};

const LIST_PAGE_SIZE: u32 = 500;
const SUBFOLDER_PAGE_SIZE: u32 = 4;

pub struct CloudinaryAdapter {
    api: Arc<dyn MediaApi>,
    converter: Arc<dyn PathConverter>,
}

impl CloudinaryAdapter {
    pub fn new(api: Arc<dyn MediaApi>, converter: Arc<dyn PathConverter>) -> Self {
        Self { api, converter }
    }

    pub fn from_config(config: CloudinaryConfig) -> Self {
        let converter = config.converter.build();
        Self::new(Arc::new(CloudinaryClient::new(config)), converter)
    }

    // ── Writes ──

    /// Upload content to `path`, overwriting any existing asset.
    pub async fn write(
        &self,
        path: &str,
        contents: Bytes,
        config: &WriteConfig,
    ) -> Result<(), FsError> {
        let options = self.upload_options(path, config)?;
        self.api
            .upload(UploadSource::Bytes(contents), &options)
            .await
            .map_err(|e| FsError::operation(path, "write", e))?;
        debug!(path = %path, public_id = %options.public_id, "Write complete");
        Ok(())
    }

    /// Upload content from a reader. The upload API wants the full payload
    /// up front, so the reader is drained before the call is made.
    pub async fn write_stream<R>(
        &self,
        path: &str,
        mut reader: R,
        config: &WriteConfig,
    ) -> Result<(), FsError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.map_err(|e| FsError::OperationFailed {
            path: path.to_string(),
            operation: "write",
            reason: format!("failed to read source stream: {e}"),
            source: None,
        })?;
        self.write(path, Bytes::from(contents), config).await
    }

    // ── Reads ──

    pub async fn read(&self, path: &str) -> Result<Bytes, FsError> {
        let resource = self.fetch_resource(path, "read").await?;
        let url = delivery_url(&resource)
            .ok_or_else(|| FsError::metadata(path, "secure_url", "missing from response"))?;
        self.api
            .download(&url)
            .await
            .map_err(|e| classify(path, "read", e))
    }

    pub async fn read_stream(&self, path: &str) -> Result<ByteStream, FsError> {
        let resource = self.fetch_resource(path, "read").await?;
        let url = delivery_url(&resource)
            .ok_or_else(|| FsError::metadata(path, "secure_url", "missing from response"))?;
        self.api
            .download_stream(&url)
            .await
            .map_err(|e| classify(path, "read", e))
    }

    /// Delivery URL of the asset at `path`.
    pub async fn url(&self, path: &str) -> Result<String, FsError> {
        let resource = self.fetch_resource(path, "url").await?;
        delivery_url(&resource)
            .ok_or_else(|| FsError::metadata(path, "secure_url", "missing from response"))
    }

    // ── Copy / move / delete ──

    /// Copy by re-uploading from the source asset's delivery URL. The new
    /// asset is independent of the source afterwards.
    pub async fn copy(&self, source: &str, destination: &str) -> Result<(), FsError> {
        let resource = self.fetch_resource(source, "copy").await?;
        let url = delivery_url(&resource)
            .ok_or_else(|| FsError::metadata(source, "secure_url", "missing from response"))?;
        let options = UploadOptions::new(self.converter.path_to_id(destination));
        self.api
            .upload(UploadSource::RemoteUrl(url), &options)
            .await
            .map_err(|e| FsError::OperationFailed {
                path: source.to_string(),
                operation: "copy",
                reason: format!("upload to {destination} failed: {e}"),
                source: Some(e),
            })?;
        debug!(from = %source, to = %destination, "Copy complete");
        Ok(())
    }

    /// Move a file. The remote offers an atomic rename primitive, so this
    /// is a single call with no copy-then-delete window.
    pub async fn rename(&self, source: &str, destination: &str) -> Result<(), FsError> {
        let from_id = self.converter.path_to_id(source);
        let to_id = self.converter.path_to_id(destination);
        self.api
            .rename(&from_id, &to_id)
            .await
            .map_err(|e| classify(source, "move", e))?;
        debug!(from = %source, to = %destination, "Move complete");
        Ok(())
    }

    /// Delete a file. The remote reports a miss in-band (`result != "ok"`);
    /// that is a failure here, not a silent no-op.
    pub async fn delete(&self, path: &str) -> Result<(), FsError> {
        let id = self.converter.path_to_id(path);
        let result = self
            .api
            .destroy(&id, true)
            .await
            .map_err(|e| FsError::operation(path, "delete", e))?;
        if !result.is_ok() {
            return Err(FsError::OperationFailed {
                path: path.to_string(),
                operation: "delete",
                reason: format!("destroy returned {:?}", result.result),
                source: None,
            });
        }
        debug!(path = %path, "Delete complete");
        Ok(())
    }

    // ── Existence ──

    /// Whether an asset exists at `path`. Only the remote's not-found
    /// answer maps to `false`; transport or auth failures propagate.
    pub async fn file_exists(&self, path: &str) -> Result<bool, FsError> {
        let id = self.converter.path_to_id(path);
        match self.api.resource(&id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(FsError::operation(path, "file_exists", e)),
        }
    }

    /// Whether `path` exists as a folder: scan the subfolders of its parent
    /// for an exact path match, page by page.
    pub async fn directory_exists(&self, path: &str) -> Result<bool, FsError> {
        let parent = path.rfind('/').map(|i| &path[..i]).unwrap_or("");
        let mut cursor: Option<String> = None;
        loop {
            let page = match self
                .api
                .subfolders(parent, SUBFOLDER_PAGE_SIZE, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) if e.is_not_found() => return Ok(false),
                Err(e) => return Err(FsError::operation(path, "directory_exists", e)),
            };
            if page.folders.iter().any(|f| f.path == path) {
                return Ok(true);
            }
            cursor = page.next_cursor;
            if cursor.is_none() {
                return Ok(false);
            }
        }
    }

    // ── Directories ──

    /// Tag a folder into existence server-side. Assets do not need this;
    /// their public-id prefix is their directory.
    pub async fn create_directory(&self, path: &str) -> Result<(), FsError> {
        self.api
            .create_folder(path)
            .await
            .map_err(|e| FsError::operation(path, "create_directory", e))
    }

    pub async fn delete_directory(&self, path: &str) -> Result<(), FsError> {
        self.api
            .delete_folder(path)
            .await
            .map_err(|e| classify(path, "delete_directory", e))
    }

    // ── Listing ──

    /// Lazily list assets under `path`, one remote page per fetch.
    ///
    /// The flat namespace has no shallow listing; a prefix match is always
    /// deep, so `_deep` is accepted for interface parity and ignored.
    pub fn list_contents(&self, path: &str, _deep: bool) -> ContentsLister<'_> {
        ContentsLister {
            api: self.api.as_ref(),
            converter: self.converter.as_ref(),
            prefix: self.converter.path_to_id(path),
            page: Vec::new().into_iter(),
            cursor: None,
            done: false,
        }
    }

    // ── Metadata ──

    pub async fn file_size(&self, path: &str) -> Result<FileAttributes, FsError> {
        self.fetch_file_metadata(path, "file_size").await
    }

    pub async fn last_modified(&self, path: &str) -> Result<FileAttributes, FsError> {
        self.fetch_file_metadata(path, "last_modified").await
    }

    pub async fn mime_type(&self, path: &str) -> Result<FileAttributes, FsError> {
        self.fetch_file_metadata(path, "mime_type").await
    }

    pub async fn visibility(&self, path: &str) -> Result<FileAttributes, FsError> {
        self.fetch_file_metadata(path, "visibility").await
    }

    /// Always fails: the remote has no visibility controls.
    pub async fn set_visibility(&self, path: &str, _visibility: &str) -> Result<(), FsError> {
        Err(FsError::Unsupported {
            path: path.to_string(),
            operation: "set_visibility",
            reason: "the remote has no visibility controls; all assets are public",
        })
    }

    // ── Internals ──

    fn upload_options(&self, path: &str, config: &WriteConfig) -> Result<UploadOptions, FsError> {
        if let Some(key) = config.reserved_key_collision() {
            return Err(FsError::OperationFailed {
                path: path.to_string(),
                operation: "write",
                reason: format!("upload option {key:?} collides with a reserved key"),
                source: None,
            });
        }
        Ok(UploadOptions {
            public_id: config
                .public_id
                .clone()
                .unwrap_or_else(|| self.converter.path_to_id(path)),
            resource_type: config
                .resource_type
                .clone()
                .unwrap_or_else(|| RESOURCE_TYPE_AUTO.to_string()),
            extra: config.upload_options.clone(),
        })
    }

    async fn fetch_resource(&self, path: &str, operation: &'static str) -> Result<Resource, FsError> {
        let id = self.converter.path_to_id(path);
        self.api
            .resource(&id)
            .await
            .map_err(|e| classify(path, operation, e))
    }

    async fn fetch_file_metadata(
        &self,
        path: &str,
        attribute: &str,
    ) -> Result<FileAttributes, FsError> {
        let id = self.converter.path_to_id(path);
        let resource = self.api.resource(&id).await.map_err(|e| FsError::MetadataUnavailable {
            path: path.to_string(),
            attribute: attribute.to_string(),
            reason: e.to_string(),
            source: Some(e),
        })?;
        FileAttributes::from_resource(&resource, self.converter.as_ref())
    }
}

fn classify(path: &str, operation: &'static str, error: ApiError) -> FsError {
    if error.is_not_found() {
        FsError::not_found(path, operation, error)
    } else {
        FsError::operation(path, operation, error)
    }
}

/// Prefer the TLS delivery URL, fall back to the plain one.
fn delivery_url(resource: &Resource) -> Option<String> {
    resource
        .secure_url
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| resource.url.clone().filter(|u| !u.is_empty()))
}

/// Lazy, page-at-a-time listing of assets under a prefix.
///
/// Each exhausted page triggers one blocking remote fetch; pagination stops
/// when the remote returns no continuation cursor. Items are yielded in the
/// order pages were returned.
pub struct ContentsLister<'a> {
    api: &'a dyn MediaApi,
    converter: &'a dyn PathConverter,
    prefix: String,
    page: std::vec::IntoIter<Resource>,
    cursor: Option<String>,
    done: bool,
}

impl ContentsLister<'_> {
    /// Next entry, fetching the next remote page when the buffered one is
    /// exhausted. `None` once the cursor runs out.
    pub async fn try_next(&mut self) -> Result<Option<FileAttributes>, FsError> {
        loop {
            if let Some(resource) = self.page.next() {
                return FileAttributes::from_resource(&resource, self.converter).map(Some);
            }
            if self.done {
                return Ok(None);
            }
            let page = self
                .api
                .resources(&self.prefix, LIST_PAGE_SIZE, self.cursor.as_deref())
                .await
                .map_err(|e| FsError::operation(self.prefix.clone(), "list_contents", e))?;
            self.cursor = page.next_cursor;
            self.done = self.cursor.is_none();
            self.page = page.resources.into_iter();
        }
    }

    /// Eagerly materialize the remaining entries.
    pub async fn collect(mut self) -> Result<Vec<FileAttributes>, FsError> {
        let mut entries = Vec::new();
        while let Some(attrs) = self.try_next().await? {
            entries.push(attrs);
        }
        Ok(entries)
    }
}
