//! Batch orchestration.
//!
//! A job is an ordered set of named documents sharing one password. Each
//! document runs through the rewriter independently; failures are carried
//! as per-document outcomes, never as a job error. Only an oversized job is
//! rejected outright.

use log::{debug, warn};

use crate::archive::package_archive;
use crate::error::{PDFUnlockError, PDFUnlockResult};
use crate::rewrite::{decrypt_document, DecryptionStatus};

/// Documents accepted per job
pub const MAX_BATCH_DOCUMENTS: usize = 12;

/// One named input document
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub name: String,
    pub data: Vec<u8>,
}

impl BatchInput {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self { name: name.into(), data }
    }
}

/// A batch of documents and the password to try against each
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub documents: Vec<BatchInput>,
    pub password: String,
}

impl BatchJob {
    pub fn new(documents: Vec<BatchInput>, password: impl Into<String>) -> Self {
        Self { documents, password: password.into() }
    }
}

/// Outcome for one document, in input order
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    /// Password accepted; carries the output file name and plain bytes
    Decrypted { name: String, data: Vec<u8> },
    /// The document had no encryption to remove
    NotEncrypted { name: String },
    /// The password matched neither the user nor the owner slot
    WrongPassword { name: String },
    /// The document could not be processed at all
    Malformed { name: String, reason: String },
}

impl DocumentOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Decrypted { name, .. }
            | Self::NotEncrypted { name }
            | Self::WrongPassword { name }
            | Self::Malformed { name, .. } => name,
        }
    }

    pub fn is_decrypted(&self) -> bool {
        matches!(self, Self::Decrypted { .. })
    }
}

/// Ordered outcomes plus the packaged archive
#[derive(Debug)]
pub struct BatchResult {
    pub outcomes: Vec<DocumentOutcome>,
    /// ZIP of every decrypted output; `None` when nothing was decrypted
    pub archive: Option<Vec<u8>>,
    pub decrypted_count: usize,
}

/// Run a whole job. Returns an error only when the job itself is invalid;
/// per-document problems are reported through the outcomes.
pub fn run_batch(job: &BatchJob) -> PDFUnlockResult<BatchResult> {
    if job.documents.len() > MAX_BATCH_DOCUMENTS {
        return Err(PDFUnlockError::TooManyDocuments {
            count: job.documents.len(),
            limit: MAX_BATCH_DOCUMENTS,
        });
    }

    let mut outcomes = Vec::with_capacity(job.documents.len());
    for input in &job.documents {
        outcomes.push(process_one(input, &job.password));
    }

    let entries: Vec<(String, Vec<u8>)> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            DocumentOutcome::Decrypted { name, data } => Some((name.clone(), data.clone())),
            _ => None,
        })
        .collect();
    let decrypted_count = entries.len();
    let archive = package_archive(&entries)?;

    debug!(
        "batch finished: {} of {} documents decrypted",
        decrypted_count,
        job.documents.len()
    );
    Ok(BatchResult { outcomes, archive, decrypted_count })
}

fn process_one(input: &BatchInput, password: &str) -> DocumentOutcome {
    match decrypt_document(&input.data, password) {
        Ok(DecryptionStatus::Decrypted(data)) => DocumentOutcome::Decrypted {
            name: output_name(&input.name),
            data,
        },
        Ok(DecryptionStatus::NotEncrypted) => {
            warn!("{}: not encrypted, passing through", input.name);
            DocumentOutcome::NotEncrypted { name: input.name.clone() }
        }
        Err(err) if err.is_auth_error() => {
            warn!("{}: incorrect password", input.name);
            DocumentOutcome::WrongPassword { name: input.name.clone() }
        }
        Err(err) => {
            warn!("{}: {err}", input.name);
            DocumentOutcome::Malformed {
                name: input.name.clone(),
                reason: err.to_string(),
            }
        }
    }
}

/// `report.pdf` becomes `report_decrypted.pdf`; a missing extension keeps
/// the bare stem.
fn output_name(input_name: &str) -> String {
    match input_name.rfind('.') {
        Some(dot) if dot > 0 => {
            format!("{}_decrypted{}", &input_name[..dot], &input_name[dot..])
        }
        _ => format!("{input_name}_decrypted"),
    }
}
