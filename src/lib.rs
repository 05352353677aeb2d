//! Batch removal of password protection from PDF documents.
//!
//! Supports the standard security handler, revisions 2 through 6: RC4 and
//! AES-CBC object encryption, legacy and SHA-2 based key derivation, and
//! both the user and owner password slots. Decrypted documents are fully
//! rewritten (object streams exploded, cross-reference table rebuilt) so
//! any conforming reader can open them without a password.
//!
//! # Example
//!
//! ```no_run
//! use pdf_unlock::PDFUnlock;
//!
//! # fn main() -> Result<(), pdf_unlock::PDFUnlockError> {
//! let pdf = std::fs::read("locked.pdf")?;
//! let unlocked = PDFUnlock::new().decrypt_with_password(&pdf, "secret")?;
//! std::fs::write("unlocked.pdf", unlocked)?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod batch;
pub mod crypto;
pub mod error;
pub mod pdf;
pub mod rewrite;
pub mod security;

pub use archive::{package_archive, ARCHIVE_FILE_NAME};
pub use batch::{
    run_batch, BatchInput, BatchJob, BatchResult, DocumentOutcome, MAX_BATCH_DOCUMENTS,
};
pub use error::{PDFUnlockError, PDFUnlockResult};
pub use rewrite::{decrypt_document, DecryptionStatus};
pub use security::{CryptMethod, StandardSecurityHandler};

use log::debug;

use crate::pdf::object::Object;
use crate::pdf::parser::parse_document;

/// What the /Encrypt dictionary declares, without authenticating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionInfo {
    pub revision: u8,
    /// Key length in bytes
    pub key_length: usize,
    pub encrypt_metadata: bool,
    pub string_method: CryptMethod,
    pub stream_method: CryptMethod,
}

/// Entry point for decryption and batch processing
#[derive(Debug, Default)]
pub struct PDFUnlock;

impl PDFUnlock {
    pub fn new() -> Self {
        Self
    }

    /// Remove encryption from one document. An unencrypted input is
    /// returned byte-identical.
    pub fn decrypt_with_password(
        &self,
        data: &[u8],
        password: &str,
    ) -> PDFUnlockResult<Vec<u8>> {
        match decrypt_document(data, password)? {
            DecryptionStatus::Decrypted(out) => Ok(out),
            DecryptionStatus::NotEncrypted => {
                debug!("input not encrypted, returning unchanged");
                Ok(data.to_vec())
            }
        }
    }

    /// True when the document's trailer carries an /Encrypt entry
    pub fn is_encrypted(&self, data: &[u8]) -> PDFUnlockResult<bool> {
        Ok(parse_document(data)?.is_encrypted())
    }

    /// Inspect the encryption dictionary without trying a password.
    /// Returns `None` for an unencrypted document.
    pub fn encryption_info(&self, data: &[u8]) -> PDFUnlockResult<Option<EncryptionInfo>> {
        let doc = parse_document(data)?;
        let encrypt = match doc.resolve_entry(&doc.trailer, "Encrypt")? {
            None => return Ok(None),
            Some(Object::Dictionary(d)) => d,
            Some(_) => return Err(PDFUnlockError::malformed("/Encrypt is not a dictionary")),
        };
        let doc_id = doc
            .trailer
            .get_array("ID")
            .and_then(|arr| arr.first())
            .and_then(Object::as_string)
            .unwrap_or_default();
        let handler = StandardSecurityHandler::from_dict(encrypt, doc_id)?;
        Ok(Some(EncryptionInfo {
            revision: handler.revision(),
            key_length: handler.key_length(),
            encrypt_metadata: handler.encrypt_metadata(),
            string_method: handler.string_method(),
            stream_method: handler.stream_method(),
        }))
    }

    /// Process a batch of documents sharing one password
    pub fn process_batch(&self, job: &BatchJob) -> PDFUnlockResult<BatchResult> {
        run_batch(job)
    }
}
