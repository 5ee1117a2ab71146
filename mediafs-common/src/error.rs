//! Error taxonomy for the remote client and the adapter surface.

use thiserror::Error;

/// Failure of one remote API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
}

impl ApiError {
    /// True only for the remote's "no such object/folder" answer. Existence
    /// predicates rely on this to avoid conflating transport or auth
    /// failures with absence.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Typed failures surfaced by the filesystem adapter.
///
/// Every remote-call failure is caught at the call site and re-raised as
/// one of these, carrying the original cause. Nothing is swallowed except
/// inside the existence predicates, which translate [`ApiError::NotFound`]
/// into `false`.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("{operation}: no such file or directory: {path}")]
    NotFound {
        path: String,
        operation: &'static str,
        #[source]
        source: Option<ApiError>,
    },

    #[error("unable to retrieve {attribute} for {path}: {reason}")]
    MetadataUnavailable {
        path: String,
        attribute: String,
        reason: String,
        #[source]
        source: Option<ApiError>,
    },

    #[error("{operation} failed for {path}: {reason}")]
    OperationFailed {
        path: String,
        operation: &'static str,
        reason: String,
        #[source]
        source: Option<ApiError>,
    },

    #[error("{operation} is not supported for {path}: {reason}")]
    Unsupported {
        path: String,
        operation: &'static str,
        reason: &'static str,
    },
}

impl FsError {
    pub fn not_found(path: impl Into<String>, operation: &'static str, source: ApiError) -> Self {
        FsError::NotFound { path: path.into(), operation, source: Some(source) }
    }

    pub fn metadata(
        path: impl Into<String>,
        attribute: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        FsError::MetadataUnavailable {
            path: path.into(),
            attribute: attribute.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn operation(
        path: impl Into<String>,
        operation: &'static str,
        source: ApiError,
    ) -> Self {
        let reason = source.to_string();
        FsError::OperationFailed { path: path.into(), operation, reason, source: Some(source) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(ApiError::NotFound("x".into()).is_not_found());
        assert!(!ApiError::Api { status: 500, message: "boom".into() }.is_not_found());
    }

    #[test]
    fn test_operation_failure_carries_cause() {
        let err = FsError::operation("a.png", "delete", ApiError::Api {
            status: 200,
            message: "result: not found".into(),
        });
        let msg = err.to_string();
        assert!(msg.contains("delete"));
        assert!(msg.contains("a.png"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
