//! PDF serialization
//!
//! Emits a decrypted document as a fresh file: header, every object in
//! ascending id order, a single classic cross-reference section, trailer,
//! startxref. Stream /Length entries are rewritten to match the payload
//! actually emitted.

use std::fmt::Write as _;

use crate::pdf::object::{Dictionary, Object, Stream};
use crate::pdf::parser::Document;

/// Serialize a plain document to bytes
pub fn write_document(doc: &Document) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("%PDF-{}\n", doc.version).as_bytes());
    // Binary marker comment so transports treat the file as binary
    out.extend_from_slice(b"%\xB5\xB5\xB5\xB5\n");

    let mut max_number = 0u32;
    let mut offsets: Vec<(u32, u16, usize)> = Vec::with_capacity(doc.objects.len());
    for (&(number, generation), object) in &doc.objects {
        offsets.push((number, generation, out.len()));
        max_number = max_number.max(number);
        let _ = write!(out_as_string(&mut out), "{number} {generation} obj\n");
        write_object(&mut out, object);
        out.extend_from_slice(b"\nendobj\n");
    }

    // One contiguous section covering 0..=max; gaps become free entries
    let size = max_number as usize + 1;
    let mut entries = vec![None; size];
    for (number, generation, offset) in offsets {
        entries[number as usize] = Some((offset, generation));
    }

    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for entry in entries.iter().skip(1) {
        match entry {
            Some((offset, generation)) => {
                out.extend_from_slice(format!("{offset:010} {generation:05} n \n").as_bytes());
            }
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }

    let mut trailer = doc.trailer.clone();
    trailer.set("Size", Object::Integer(size as i64));
    out.extend_from_slice(b"trailer\n");
    write_dictionary(&mut out, &trailer);
    out.extend_from_slice(format!("\nstartxref\n{xref_pos}\n%%EOF\n").as_bytes());
    out
}

// Vec<u8> has no fmt::Write; route formatted writes through a shim
fn out_as_string(out: &mut Vec<u8>) -> ByteSink<'_> {
    ByteSink(out)
}

struct ByteSink<'a>(&'a mut Vec<u8>);

impl std::fmt::Write for ByteSink<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.0.extend_from_slice(s.as_bytes());
        Ok(())
    }
}

fn write_object(out: &mut Vec<u8>, object: &Object) {
    match object {
        Object::Null => out.extend_from_slice(b"null"),
        Object::Boolean(true) => out.extend_from_slice(b"true"),
        Object::Boolean(false) => out.extend_from_slice(b"false"),
        Object::Integer(n) => {
            let _ = write!(out_as_string(out), "{n}");
        }
        Object::Real(r) => {
            let _ = write!(out_as_string(out), "{r}");
        }
        Object::String(bytes) => write_literal_string(out, bytes),
        Object::Name(name) => write_name(out, name),
        Object::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_object(out, item);
            }
            out.push(b']');
        }
        Object::Dictionary(dict) => write_dictionary(out, dict),
        Object::Stream(stream) => write_stream(out, stream),
        Object::Reference(num, gen) => {
            let _ = write!(out_as_string(out), "{num} {gen} R");
        }
    }
}

fn write_dictionary(out: &mut Vec<u8>, dict: &Dictionary) {
    out.extend_from_slice(b"<< ");
    for (key, value) in dict.iter() {
        write_name(out, key);
        out.push(b' ');
        write_object(out, value);
        out.push(b' ');
    }
    out.extend_from_slice(b">>");
}

fn write_stream(out: &mut Vec<u8>, stream: &Stream) {
    let mut dict = stream.dict.clone();
    dict.set("Length", Object::Integer(stream.data.len() as i64));
    write_dictionary(out, &dict);
    out.extend_from_slice(b"\nstream\n");
    out.extend_from_slice(&stream.data);
    out.extend_from_slice(b"\nendstream");
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                out.push(b'\\');
                out.push(b);
            }
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            other => out.push(other),
        }
    }
    out.push(b')');
}

// Names are byte strings; the parser widens each raw byte to the code point
// of the same value, so serialization walks chars and narrows them back to
// single bytes instead of re-encoding as UTF-8.
fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for c in name.chars() {
        let code = c as u32;
        if code > 0xFF {
            // Not producible by the parser; fall back to the UTF-8 bytes
            let mut buf = [0u8; 4];
            for &b in c.encode_utf8(&mut buf).as_bytes() {
                write_name_byte(out, b);
            }
        } else {
            write_name_byte(out, code as u8);
        }
    }
}

fn write_name_byte(out: &mut Vec<u8>, b: u8) {
    let delimiter = matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    );
    if b <= b' ' || b == b'#' || b > b'~' || delimiter {
        let _ = write!(out_as_string(out), "#{b:02X}");
    } else {
        out.push(b);
    }
}
