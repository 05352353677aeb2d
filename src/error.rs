//! Error types for the PDF unlock library

use std::io;
use thiserror::Error;

/// Main error type for PDF unlock operations
#[derive(Error, Debug)]
pub enum PDFUnlockError {
    /// Authentication failed (wrong password)
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Unsupported encryption filter
    #[error("Unsupported encryption filter: {0}")]
    UnsupportedFilter(String),

    /// Unsupported encryption revision
    #[error("Unsupported revision: {0}")]
    UnsupportedRevision(u8),

    /// Invalid key length
    #[error("Invalid key length: {0}")]
    InvalidKeyLength(usize),

    /// Invalid data length
    #[error("Invalid data length for {operation}")]
    InvalidDataLength {
        operation: String,
    },

    /// Malformed PDF structure
    #[error("Malformed PDF structure: {0}")]
    MalformedPDF(String),

    /// Cryptographic operation failed
    #[error("Cryptographic operation failed: {0}")]
    CryptoError(String),

    /// Object not found
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Missing required dictionary entry
    #[error("Missing required dictionary entry: {0}")]
    MissingDictionaryEntry(String),

    /// Invalid dictionary value
    #[error("Invalid dictionary value for key {key}: {message}")]
    InvalidDictionaryValue {
        key: String,
        message: String,
    },

    /// Stream error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// Cross reference table error
    #[error("Cross reference table error: {0}")]
    XRefError(String),

    /// Batch exceeds the document limit
    #[error("Too many documents: {count} exceeds limit of {limit}")]
    TooManyDocuments {
        count: usize,
        limit: usize,
    },

    /// Archive packaging error
    #[error("Archive error: {0}")]
    ArchiveError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

/// Result type for PDF unlock operations
pub type PDFUnlockResult<T> = Result<T, PDFUnlockError>;

impl PDFUnlockError {
    /// Create a new malformed PDF error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedPDF(msg.into())
    }

    /// Create a new crypto error
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::CryptoError(msg.into())
    }

    /// Create a new stream error
    pub fn stream(msg: impl Into<String>) -> Self {
        Self::StreamError(msg.into())
    }

    /// Create a new cross reference error
    pub fn xref(msg: impl Into<String>) -> Self {
        Self::XRefError(msg.into())
    }

    /// Create a new invalid data length error
    pub fn invalid_length(operation: impl Into<String>) -> Self {
        Self::InvalidDataLength {
            operation: operation.into(),
        }
    }

    /// Create a new invalid dictionary value error
    pub fn invalid_dict_value(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidDictionaryValue {
            key: key.into(),
            message: msg.into(),
        }
    }

    /// Check if error is authentication related
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }

    /// Check if error is related to PDF structure
    pub fn is_structure_error(&self) -> bool {
        matches!(self,
            Self::MalformedPDF(_) |
            Self::XRefError(_) |
            Self::StreamError(_) |
            Self::ObjectNotFound(_, _) |
            Self::MissingDictionaryEntry(_) |
            Self::InvalidDictionaryValue { .. }
        )
    }
}
