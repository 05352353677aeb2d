//! ZIP packaging of decrypted outputs.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PDFUnlockError, PDFUnlockResult};

/// Suggested file name for the packaged archive
pub const ARCHIVE_FILE_NAME: &str = "decrypted_pdfs.zip";

/// Package the given (name, bytes) entries into a ZIP archive. Returns
/// `None` for an empty input so callers can tell "nothing to package" apart
/// from a packaging failure. Duplicate names get a numeric suffix before
/// the extension so no entry silently overwrites another.
pub fn package_archive(entries: &[(String, Vec<u8>)]) -> PDFUnlockResult<Option<Vec<u8>>> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut buffer = Vec::new();
    let mut writer = ZipWriter::new(Cursor::new(&mut buffer));
    let options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut used: HashSet<String> = HashSet::new();
    for (name, data) in entries {
        let entry_name = dedupe_name(name, &used);
        used.insert(entry_name.clone());
        writer
            .start_file(entry_name.as_str(), options)
            .map_err(|e| PDFUnlockError::ArchiveError(e.to_string()))?;
        writer.write_all(data)?;
    }
    writer
        .finish()
        .map_err(|e| PDFUnlockError::ArchiveError(e.to_string()))?;

    debug!("packaged {} entries into {} bytes", entries.len(), buffer.len());
    Ok(Some(buffer))
}

fn dedupe_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };
    for n in 1.. {
        let candidate = format!("{stem}_{n}{ext}");
        if !used.contains(&candidate) {
            return candidate;
        }
    }
    unreachable!()
}
