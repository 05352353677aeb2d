//! RFC 4013 SASLprep password normalization.
//!
//! Revision 6 of the standard security handler requires passwords to be
//! normalized with the SASLprep stringprep profile before hashing. Covers
//! the RFC 4013 mapping and normalization steps plus the prohibited-output
//! and bidirectional checks; unassigned code points are accepted (the query
//! profile), which matches how PDF readers treat passwords in practice.

use unicode_normalization::UnicodeNormalization;

use crate::error::{PDFUnlockError, PDFUnlockResult};

/// RFC 3454 Table B.1: characters commonly mapped to nothing.
fn mapped_to_nothing(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{034F}'
            | '\u{1806}'
            | '\u{180B}'..='\u{180D}'
            | '\u{200B}'..='\u{200D}'
            | '\u{2060}'
            | '\u{FE00}'..='\u{FE0F}'
            | '\u{FEFF}'
    )
}

/// RFC 3454 Table C.1.2: non-ASCII space characters.
fn non_ascii_space(c: char) -> bool {
    matches!(
        c,
        '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}

/// RFC 3454 Tables C.2.1 through C.9 collapsed into one predicate.
fn prohibited(c: char) -> bool {
    let cp = c as u32;
    matches!(
        c,
        // C.2.1, C.2.2: control characters
        '\u{0000}'..='\u{001F}'
            | '\u{007F}'
            | '\u{0080}'..='\u{009F}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{180E}'
            | '\u{200C}'
            | '\u{200D}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{2060}'..='\u{2063}'
            | '\u{206A}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFC}'
            | '\u{1D173}'..='\u{1D17A}'
            // C.3: private use
            | '\u{E000}'..='\u{F8FF}'
            | '\u{F0000}'..='\u{FFFFD}'
            | '\u{100000}'..='\u{10FFFD}'
            // C.6: inappropriate for plain text
            | '\u{FFFD}'
            // C.7: ideographic description characters
            | '\u{2FF0}'..='\u{2FFB}'
            // C.8: change display properties or deprecated
            | '\u{0340}'
            | '\u{0341}'
            | '\u{200E}'
            | '\u{200F}'
            | '\u{202A}'..='\u{202E}'
            // C.9: tagging characters
            | '\u{E0001}'
            | '\u{E0020}'..='\u{E007F}'
    )
        // C.4: non-character code points
        || (0xFDD0..=0xFDEF).contains(&cp)
        || (cp & 0xFFFE) == 0xFFFE
}

/// RFC 3454 Table D.1 (simplified): RandALCat — main RTL ranges.
fn bidi_r_or_al(c: char) -> bool {
    matches!(
        c,
        '\u{05BE}'
            | '\u{05C0}'
            | '\u{05C3}'
            | '\u{05D0}'..='\u{05EA}'
            | '\u{05F0}'..='\u{05F4}'
            | '\u{061B}'
            | '\u{061F}'
            | '\u{0621}'..='\u{063A}'
            | '\u{0640}'..='\u{064A}'
            | '\u{066D}'..='\u{066F}'
            | '\u{0671}'..='\u{06D5}'
            | '\u{06DD}'
            | '\u{06E5}'
            | '\u{06E6}'
            | '\u{06FA}'..='\u{06FE}'
            | '\u{0700}'..='\u{070D}'
            | '\u{0710}'
            | '\u{0712}'..='\u{072C}'
            | '\u{0780}'..='\u{07A5}'
            | '\u{07B1}'
            | '\u{200F}'
            | '\u{FB1D}'
            | '\u{FB1F}'..='\u{FB28}'
            | '\u{FB2A}'..='\u{FB36}'
            | '\u{FB38}'..='\u{FB3C}'
            | '\u{FB3E}'
            | '\u{FB40}'
            | '\u{FB41}'
            | '\u{FB43}'
            | '\u{FB44}'
            | '\u{FB46}'..='\u{FBB1}'
            | '\u{FBD3}'..='\u{FD3D}'
            | '\u{FD50}'..='\u{FD8F}'
            | '\u{FD92}'..='\u{FDC7}'
            | '\u{FDF0}'..='\u{FDFC}'
            | '\u{FE70}'..='\u{FE74}'
            | '\u{FE76}'..='\u{FEFC}'
    )
}

/// RFC 3454 Table D.2 (simplified): LCat — common LTR letter ranges.
fn bidi_l(c: char) -> bool {
    matches!(
        c,
        'A'..='Z'
            | 'a'..='z'
            | '\u{00C0}'..='\u{00D6}'
            | '\u{00D8}'..='\u{00F6}'
            | '\u{00F8}'..='\u{0220}'
            | '\u{0250}'..='\u{02AD}'
            | '\u{0386}'..='\u{03CE}'
            | '\u{0400}'..='\u{0482}'
            | '\u{048A}'..='\u{04CE}'
            | '\u{0531}'..='\u{0556}'
            | '\u{0561}'..='\u{0587}'
            | '\u{0905}'..='\u{0939}'
    )
}

/// Normalize a password with the SASLprep profile.
pub fn saslprep(password: &str) -> PDFUnlockResult<String> {
    if password.is_empty() {
        return Ok(String::new());
    }

    let mapped: String = password
        .chars()
        .filter(|&c| !mapped_to_nothing(c))
        .map(|c| if non_ascii_space(c) { ' ' } else { c })
        .collect();

    let normalized: String = mapped.nfkc().collect();
    if normalized.is_empty() {
        return Ok(String::new());
    }

    for c in normalized.chars() {
        if prohibited(c) {
            return Err(PDFUnlockError::crypto(
                "password contains a prohibited character",
            ));
        }
    }

    // RFC 3454 section 6: RandALCat and LCat must not mix, and a RandALCat
    // string must start and end with RandALCat characters.
    let has_rtl = normalized.chars().any(bidi_r_or_al);
    if has_rtl {
        if normalized.chars().any(bidi_l) {
            return Err(PDFUnlockError::crypto("password fails bidirectional check"));
        }
        let first = normalized.chars().next();
        let last = normalized.chars().last();
        if !(first.is_some_and(bidi_r_or_al) && last.is_some_and(bidi_r_or_al)) {
            return Err(PDFUnlockError::crypto("password fails bidirectional check"));
        }
    }

    Ok(normalized)
}
