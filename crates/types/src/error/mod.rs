// Path: crates/types/src/error/mod.rs
//! Core error types for the Attestor issuer service.

use crate::config::StatusPurpose;
use crate::status::ListId;
use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors from the persistence substrate.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A generic error originating from the underlying key-value store
    /// backend (e.g., redb).
    #[error("backend error: {0}")]
    Backend(String),
    /// An error occurred while serializing a record for storage.
    #[error("encode error: {0}")]
    Encode(String),
    /// An error occurred while deserializing a record from storage.
    #[error("decode error: {0}")]
    Decode(String),
    /// The requested record was not found.
    #[error("not found")]
    NotFound,
    /// An optimistic write observed a different sequence than expected.
    #[error("sequence conflict: expected {expected}, found {found}")]
    Conflict {
        /// The sequence the writer expected.
        expected: u64,
        /// The sequence actually present.
        found: u64,
    },
    /// A unique-key insert collided with an existing record.
    #[error("duplicate key: {0}")]
    Duplicate(String),
}

impl ErrorCode for StorageError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORAGE_BACKEND_ERROR",
            Self::Encode(_) => "STORAGE_ENCODE_ERROR",
            Self::Decode(_) => "STORAGE_DECODE_ERROR",
            Self::NotFound => "STORAGE_NOT_FOUND",
            Self::Conflict { .. } => "STORAGE_SEQUENCE_CONFLICT",
            Self::Duplicate(_) => "STORAGE_DUPLICATE_KEY",
        }
    }
}

/// Errors from status-list index allocation.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Every position in the addressed block is assigned.
    #[error("block {block_id} of list {list_id} is full")]
    BlockFull {
        /// The list holding the block.
        list_id: ListId,
        /// The exhausted block.
        block_id: u32,
    },
    /// The set has reached its list cap; no further positions exist.
    #[error("status list quota exceeded for purpose '{purpose}': cap of {list_count} lists reached")]
    QuotaExceeded {
        /// The purpose whose set is exhausted.
        purpose: StatusPurpose,
        /// The configured list cap.
        list_count: u32,
    },
    /// CAS contention was not resolved within the retry budget.
    #[error("allocation contention unresolved after {attempts} attempts")]
    Contention {
        /// How many attempts were made.
        attempts: u32,
    },
    /// An error from the persistence substrate.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for AllocationError {
    fn code(&self) -> &'static str {
        match self {
            Self::BlockFull { .. } => "ALLOC_BLOCK_FULL",
            Self::QuotaExceeded { .. } => "ALLOC_QUOTA_EXCEEDED",
            Self::Contention { .. } => "ALLOC_CONTENTION",
            Self::Storage(_) => "ALLOC_STORAGE_ERROR",
        }
    }
}

/// Errors from a signer capability.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The requested suite is not supported by this signer.
    #[error("unsupported cryptosuite: {0}")]
    UnsupportedSuite(String),
    /// The configured key material is unusable.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
    /// The signing operation itself failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl ErrorCode for SignerError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedSuite(_) => "SIGNER_UNSUPPORTED_SUITE",
            Self::InvalidKey(_) => "SIGNER_INVALID_KEY",
            Self::Signing(_) => "SIGNER_FAILED",
        }
    }
}

/// Errors from the status publication client.
#[derive(Debug, Error)]
pub enum StatusClientError {
    /// The status service rejected or failed the publish call.
    #[error("status list publication failed: {0}")]
    Publish(String),
    /// The referenced status list does not exist.
    #[error("status list not found")]
    NotFound,
    /// An error from the persistence substrate.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for StatusClientError {
    fn code(&self) -> &'static str {
        match self {
            Self::Publish(_) => "STATUS_CLIENT_PUBLISH_FAILED",
            Self::NotFound => "STATUS_CLIENT_NOT_FOUND",
            Self::Storage(_) => "STATUS_CLIENT_STORAGE_ERROR",
        }
    }
}

/// The service-level error taxonomy surfaced through the HTTP API.
///
/// [`ErrorCode::code`] returns the wire name carried in the response's
/// `data.type` field.
#[derive(Debug, Error)]
pub enum IssuerError {
    /// The input failed structural checks.
    #[error("invalid input: {message}")]
    Validation {
        /// A human-readable summary.
        message: String,
        /// Field paths that failed, when known.
        details: Vec<String>,
    },
    /// The input was structurally valid but semantically rejected (unknown
    /// term, malformed context, invalid pointer).
    #[error("credential data rejected: {0}")]
    Data(String),
    /// The credential id or alias collides with an existing record.
    #[error("duplicate credential: {0}")]
    Duplicate(String),
    /// The operation is not allowed for this tenant.
    #[error("not allowed: {0}")]
    NotAllowed(String),
    /// The referenced credential, instance, or status list does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A configuration write lost a sequence race.
    #[error("conflicting update: {0}")]
    InvalidState(String),
    /// The status-list family has no capacity left.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    /// An unclassified internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IssuerError {
    /// Convenience constructor for a validation failure with field paths.
    pub fn validation(message: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }
}

impl ErrorCode for IssuerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::Data(_) => "DataError",
            Self::Duplicate(_) => "DuplicateError",
            Self::NotAllowed(_) => "NotAllowedError",
            Self::NotFound(_) => "NotFoundError",
            Self::InvalidState(_) => "InvalidStateError",
            Self::QuotaExceeded(_) => "QuotaExceededError",
            Self::Internal(_) => "InternalServerError",
        }
    }
}

impl From<StorageError> for IssuerError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => IssuerError::NotFound("record not found".into()),
            StorageError::Duplicate(key) => IssuerError::Duplicate(key),
            other => IssuerError::Internal(other.to_string()),
        }
    }
}

impl From<AllocationError> for IssuerError {
    fn from(e: AllocationError) -> Self {
        match e {
            AllocationError::QuotaExceeded { .. } => IssuerError::QuotaExceeded(e.to_string()),
            AllocationError::Storage(inner) => IssuerError::from(inner),
            other => IssuerError::Internal(other.to_string()),
        }
    }
}

impl From<SignerError> for IssuerError {
    fn from(e: SignerError) -> Self {
        IssuerError::Internal(format!("signer failure: {}", e))
    }
}

impl From<StatusClientError> for IssuerError {
    fn from(e: StatusClientError) -> Self {
        match e {
            StatusClientError::NotFound => IssuerError::NotFound("status list not found".into()),
            StatusClientError::Storage(inner) => IssuerError::from(inner),
            other => IssuerError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for IssuerError {
    fn from(e: serde_json::Error) -> Self {
        IssuerError::Internal(format!("serialization failure: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusPurpose;

    #[test]
    fn wire_codes_match_api_taxonomy() {
        assert_eq!(
            IssuerError::Duplicate("urn:id1".into()).code(),
            "DuplicateError"
        );
        assert_eq!(
            IssuerError::validation("empty credential", vec![]).code(),
            "ValidationError"
        );
        assert_eq!(IssuerError::Data("unknown term".into()).code(), "DataError");
    }

    #[test]
    fn quota_error_converts_from_allocation() {
        let err = AllocationError::QuotaExceeded {
            purpose: StatusPurpose::Revocation,
            list_count: 2,
        };
        let svc: IssuerError = err.into();
        assert_eq!(svc.code(), "QuotaExceededError");
    }

    #[test]
    fn storage_not_found_maps_to_not_found() {
        let svc: IssuerError = StorageError::NotFound.into();
        assert_eq!(svc.code(), "NotFoundError");
        let svc: IssuerError = StorageError::Backend("io".into()).into();
        assert_eq!(svc.code(), "InternalServerError");
    }
}
