//! Stream filters
//!
//! Only FlateDecode is needed here: cross-reference streams and object
//! streams are always Flate-compressed in practice, and content streams are
//! rewritten without touching their filters.

use std::io::Read;

use flate2::read::ZlibDecoder;
use log::warn;

use crate::error::{PDFUnlockError, PDFUnlockResult};
use crate::pdf::object::Dictionary;

/// Decode a stream payload according to its dictionary's /Filter entry.
/// Unfiltered data is returned as-is.
pub fn decode_stream(dict: &Dictionary, data: &[u8]) -> PDFUnlockResult<Vec<u8>> {
    let filter = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(obj) => obj,
    };

    let names: Vec<&str> = match filter {
        crate::pdf::object::Object::Name(n) => vec![n.as_str()],
        crate::pdf::object::Object::Array(arr) => {
            arr.iter().filter_map(|o| o.as_name()).collect()
        }
        _ => {
            return Err(PDFUnlockError::stream("invalid /Filter entry"));
        }
    };

    let mut current = data.to_vec();
    for name in names {
        current = match name {
            "FlateDecode" | "Fl" => flate_decode(&current)?,
            other => {
                return Err(PDFUnlockError::stream(format!(
                    "unsupported filter {other}"
                )));
            }
        };
    }

    let params = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(crate::pdf::object::Object::Dictionary(d)) => Some(d),
        _ => None,
    };
    if let Some(parms) = params {
        current = apply_predictor(parms, current)?;
    }

    Ok(current)
}

/// Inflate a zlib-wrapped payload
pub fn flate_decode(data: &[u8]) -> PDFUnlockResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| PDFUnlockError::stream(format!("flate decode failed: {e}")))?;
    Ok(out)
}

/// Undo a PNG predictor declared in /DecodeParms. Predictor 1 (none) and
/// the PNG family (10..15) are the only ones producers emit for xref and
/// object streams; TIFF predictor 2 is not supported.
fn apply_predictor(parms: &Dictionary, data: Vec<u8>) -> PDFUnlockResult<Vec<u8>> {
    let predictor = parms.get_integer("Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }
    if !(10..=15).contains(&predictor) {
        return Err(PDFUnlockError::stream(format!(
            "unsupported predictor {predictor}"
        )));
    }

    let colors = parms.get_integer("Colors").unwrap_or(1) as usize;
    let bpc = parms.get_integer("BitsPerComponent").unwrap_or(8) as usize;
    let columns = parms.get_integer("Columns").unwrap_or(1) as usize;
    let bytes_per_pixel = (colors * bpc).div_ceil(8).max(1);
    let row_len = (columns * colors * bpc).div_ceil(8);

    if row_len == 0 || data.len() % (row_len + 1) != 0 {
        warn!(
            "predictor row length {} does not divide payload of {} bytes",
            row_len + 1,
            data.len()
        );
        return Err(PDFUnlockError::stream("predictor row misalignment"));
    }

    let mut out = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];

    for chunk in data.chunks_exact(row_len + 1) {
        let tag = chunk[0];
        let mut row = chunk[1..].to_vec();
        match tag {
            0 => {}
            1 => {
                // Sub
                for i in bytes_per_pixel..row_len {
                    row[i] = row[i].wrapping_add(row[i - bytes_per_pixel]);
                }
            }
            2 => {
                // Up
                for i in 0..row_len {
                    row[i] = row[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                // Average
                for i in 0..row_len {
                    let left = if i >= bytes_per_pixel {
                        row[i - bytes_per_pixel] as u16
                    } else {
                        0
                    };
                    let up = prev_row[i] as u16;
                    row[i] = row[i].wrapping_add(((left + up) / 2) as u8);
                }
            }
            4 => {
                // Paeth
                for i in 0..row_len {
                    let left = if i >= bytes_per_pixel {
                        row[i - bytes_per_pixel] as i16
                    } else {
                        0
                    };
                    let up = prev_row[i] as i16;
                    let up_left = if i >= bytes_per_pixel {
                        prev_row[i - bytes_per_pixel] as i16
                    } else {
                        0
                    };
                    let p = left + up - up_left;
                    let (pa, pb, pc) = ((p - left).abs(), (p - up).abs(), (p - up_left).abs());
                    let pred = if pa <= pb && pa <= pc {
                        left
                    } else if pb <= pc {
                        up
                    } else {
                        up_left
                    };
                    row[i] = row[i].wrapping_add(pred as u8);
                }
            }
            other => {
                return Err(PDFUnlockError::stream(format!(
                    "unknown PNG filter tag {other}"
                )));
            }
        }
        out.extend_from_slice(&row);
        prev_row.copy_from_slice(&row);
    }

    Ok(out)
}
