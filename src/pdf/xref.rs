//! Cross-reference tables
//!
//! Both classic `xref` sections and cross-reference streams feed into the
//! same table. The startxref chain is walked newest-first, so the first
//! entry seen for an object number wins.

use std::collections::BTreeMap;

use log::trace;

use crate::error::{PDFUnlockError, PDFUnlockResult};
use crate::pdf::object::Dictionary;

/// Location of one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Free-list entry
    Free,
    /// Object stored at a byte offset in the file
    InUse { offset: usize, generation: u16 },
    /// Object stored inside an object stream
    InStream { container: u32, index: u32 },
}

/// Merged cross-reference table
#[derive(Debug, Default)]
pub struct XrefTable {
    entries: BTreeMap<u32, XrefEntry>,
}

impl XrefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry unless a newer section already defined this object
    pub fn insert_if_absent(&mut self, number: u32, entry: XrefEntry) {
        self.entries.entry(number).or_insert(entry);
    }

    pub fn get(&self, number: u32) -> Option<&XrefEntry> {
        self.entries.get(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u32, &XrefEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode a cross-reference stream's payload into table entries.
///
/// `data` must already be defiltered. Field widths come from /W; the
/// subsection layout comes from /Index, defaulting to `[0 Size]`.
pub fn parse_xref_stream_data(
    dict: &Dictionary,
    data: &[u8],
    table: &mut XrefTable,
) -> PDFUnlockResult<()> {
    let w = dict
        .get_array("W")
        .ok_or_else(|| PDFUnlockError::xref("cross-reference stream missing /W"))?;
    if w.len() < 3 {
        return Err(PDFUnlockError::xref("/W must have three elements"));
    }
    let widths: Vec<usize> = w
        .iter()
        .map(|o| {
            o.as_integer()
                .filter(|&n| (0..=8).contains(&n))
                .map(|n| n as usize)
                .ok_or_else(|| PDFUnlockError::xref("invalid /W field width"))
        })
        .collect::<PDFUnlockResult<_>>()?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(PDFUnlockError::xref("/W describes empty rows"));
    }

    let size = dict
        .get_integer("Size")
        .ok_or_else(|| PDFUnlockError::xref("cross-reference stream missing /Size"))?;

    // Subsections: pairs of (first object number, count)
    let index: Vec<(u32, u32)> = match dict.get_array("Index") {
        Some(arr) => {
            if arr.len() % 2 != 0 {
                return Err(PDFUnlockError::xref("/Index must hold pairs"));
            }
            arr.chunks(2)
                .map(|pair| {
                    let start = pair[0].as_integer();
                    let count = pair[1].as_integer();
                    match (start, count) {
                        (Some(s), Some(c)) if s >= 0 && c >= 0 => Ok((s as u32, c as u32)),
                        _ => Err(PDFUnlockError::xref("invalid /Index pair")),
                    }
                })
                .collect::<PDFUnlockResult<_>>()?
        }
        None => vec![(0, size as u32)],
    };

    let mut pos = 0usize;
    for (start, count) in index {
        for number in start..start.saturating_add(count) {
            if pos + row_len > data.len() {
                return Err(PDFUnlockError::xref("cross-reference stream truncated"));
            }
            let row = &data[pos..pos + row_len];
            pos += row_len;

            let mut offset = 0usize;
            let f0 = read_field(&row[..widths[0]]);
            offset += widths[0];
            let f1 = read_field(&row[offset..offset + widths[1]]);
            offset += widths[1];
            let f2 = read_field(&row[offset..offset + widths[2]]);

            // A zero-width first field means type 1
            let entry_type = if widths[0] == 0 { 1 } else { f0 };
            let entry = match entry_type {
                0 => XrefEntry::Free,
                1 => XrefEntry::InUse {
                    offset: f1 as usize,
                    generation: f2 as u16,
                },
                2 => XrefEntry::InStream {
                    container: f1 as u32,
                    index: f2 as u32,
                },
                other => {
                    trace!("ignoring unknown xref entry type {other} for object {number}");
                    continue;
                }
            };
            table.insert_if_absent(number, entry);
        }
    }

    Ok(())
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}
