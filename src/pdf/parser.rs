//! PDF parsing
//!
//! A byte-level recursive-descent parser plus the document loader that walks
//! the startxref chain (classic tables, cross-reference streams, hybrid
//! /XRefStm) and materializes every in-use object into an arena keyed by
//! object id.

use std::collections::{HashMap, HashSet};

use log::{debug, trace, warn};

use crate::error::{PDFUnlockError, PDFUnlockResult};
use crate::pdf::filter::decode_stream;
use crate::pdf::object::{Dictionary, Object, Stream};
use crate::pdf::xref::{parse_xref_stream_data, XrefEntry, XrefTable};

/// A parsed document: the object arena plus the merged trailer.
#[derive(Debug)]
pub struct Document {
    /// Header version, e.g. "1.7"
    pub version: String,
    /// All file-level objects keyed by (number, generation)
    pub objects: std::collections::BTreeMap<(u32, u16), Object>,
    /// Merged trailer across the whole update chain
    pub trailer: Dictionary,
    /// Objects that live inside object streams: number -> (container, index)
    pub in_object_stream: HashMap<u32, (u32, u32)>,
}

impl Document {
    /// Fetch an object by id
    pub fn get(&self, number: u32, generation: u16) -> Option<&Object> {
        self.objects.get(&(number, generation))
    }

    /// Follow references until a direct object is reached
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> PDFUnlockResult<&'a Object> {
        let mut current = obj;
        for _ in 0..32 {
            match current {
                Object::Reference(num, gen) => {
                    current = self
                        .get(*num, *gen)
                        .ok_or(PDFUnlockError::ObjectNotFound(*num, *gen))?;
                }
                other => return Ok(other),
            }
        }
        Err(PDFUnlockError::malformed("reference chain too deep"))
    }

    /// Resolve a dictionary entry through at most one level of indirection
    pub fn resolve_entry<'a>(
        &'a self,
        dict: &'a Dictionary,
        key: &str,
    ) -> PDFUnlockResult<Option<&'a Object>> {
        match dict.get(key) {
            None => Ok(None),
            Some(obj) => self.resolve(obj).map(Some),
        }
    }

    /// True when the trailer carries an /Encrypt entry
    pub fn is_encrypted(&self) -> bool {
        self.trailer.contains_key("Encrypt")
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// Recursive-descent parser over raw file bytes
pub struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                // Comment runs to end of line
                while let Some(b) = self.peek() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Read a run of regular characters
    fn read_token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_regular(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.data[start..self.pos]
    }

    fn expect_keyword(&mut self, keyword: &str) -> PDFUnlockResult<()> {
        self.skip_whitespace();
        let token = self.read_token();
        if token == keyword.as_bytes() {
            Ok(())
        } else {
            Err(PDFUnlockError::malformed(format!(
                "expected '{keyword}' at offset {}",
                self.pos
            )))
        }
    }

    /// Parse one direct object at the current position
    pub fn parse_object(&mut self) -> PDFUnlockResult<Object> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(PDFUnlockError::malformed("unexpected end of data")),
            Some(b'/') => self.parse_name().map(Object::Name),
            Some(b'(') => self.parse_literal_string().map(Object::String),
            Some(b'[') => self.parse_array(),
            Some(b'<') => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.parse_dictionary_or_stream()
                } else {
                    self.parse_hex_string().map(Object::String)
                }
            }
            Some(b) if b.is_ascii_digit() || b == b'+' || b == b'-' || b == b'.' => {
                self.parse_number_or_reference()
            }
            _ => {
                let token = self.read_token();
                match token {
                    b"true" => Ok(Object::Boolean(true)),
                    b"false" => Ok(Object::Boolean(false)),
                    b"null" => Ok(Object::Null),
                    other => Err(PDFUnlockError::malformed(format!(
                        "unexpected token '{}'",
                        String::from_utf8_lossy(other)
                    ))),
                }
            }
        }
    }

    fn parse_name(&mut self) -> PDFUnlockResult<String> {
        self.bump(); // '/'
        let mut name = String::new();
        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' {
                let hi = self.bump();
                let lo = self.bump();
                match (hi, lo) {
                    (Some(h), Some(l)) => {
                        let hex = [h, l];
                        let s = std::str::from_utf8(&hex)
                            .ok()
                            .and_then(|s| u8::from_str_radix(s, 16).ok())
                            .ok_or_else(|| PDFUnlockError::malformed("bad name escape"))?;
                        name.push(s as char);
                    }
                    _ => return Err(PDFUnlockError::malformed("truncated name escape")),
                }
            } else {
                name.push(b as char);
            }
        }
        Ok(name)
    }

    fn parse_literal_string(&mut self) -> PDFUnlockResult<Vec<u8>> {
        self.bump(); // '('
        let mut out = Vec::new();
        let mut depth = 1usize;
        loop {
            let b = self
                .bump()
                .ok_or_else(|| PDFUnlockError::malformed("unterminated string"))?;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => {
                    let esc = self
                        .bump()
                        .ok_or_else(|| PDFUnlockError::malformed("unterminated escape"))?;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'(' | b')' | b'\\' => out.push(esc),
                        b'\r' => {
                            // Line continuation; swallow a following LF
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = (esc - b'0') as u16;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + (d - b'0') as u16;
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(value as u8);
                        }
                        other => out.push(other),
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn parse_hex_string(&mut self) -> PDFUnlockResult<Vec<u8>> {
        self.bump(); // '<'
        let mut digits = Vec::new();
        loop {
            let b = self
                .bump()
                .ok_or_else(|| PDFUnlockError::malformed("unterminated hex string"))?;
            match b {
                b'>' => break,
                b if b.is_ascii_hexdigit() => digits.push(b),
                b if is_whitespace(b) => {}
                _ => return Err(PDFUnlockError::malformed("invalid hex string digit")),
            }
        }
        if digits.len() % 2 != 0 {
            digits.push(b'0');
        }
        let mut out = Vec::with_capacity(digits.len() / 2);
        for pair in digits.chunks_exact(2) {
            let s = std::str::from_utf8(pair)
                .map_err(|_| PDFUnlockError::malformed("invalid hex string"))?;
            out.push(
                u8::from_str_radix(s, 16)
                    .map_err(|_| PDFUnlockError::malformed("invalid hex string"))?,
            );
        }
        Ok(out)
    }

    fn parse_array(&mut self) -> PDFUnlockResult<Object> {
        self.bump(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Object::Array(items));
                }
                None => return Err(PDFUnlockError::malformed("unterminated array")),
                _ => items.push(self.parse_object()?),
            }
        }
    }

    fn parse_dictionary_body(&mut self) -> PDFUnlockResult<Dictionary> {
        self.pos += 2; // '<<'
        let mut dict = Dictionary::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b'>') => {
                    if self.data.get(self.pos + 1) == Some(&b'>') {
                        self.pos += 2;
                        return Ok(dict);
                    }
                    return Err(PDFUnlockError::malformed("stray '>' in dictionary"));
                }
                Some(b'/') => {
                    let key = self.parse_name()?;
                    let value = self.parse_object()?;
                    dict.set(key, value);
                }
                None => return Err(PDFUnlockError::malformed("unterminated dictionary")),
                Some(other) => {
                    return Err(PDFUnlockError::malformed(format!(
                        "expected name key in dictionary, found byte 0x{other:02X}"
                    )))
                }
            }
        }
    }

    /// Parse a dictionary; if the `stream` keyword follows, capture its raw
    /// payload too. The stream length is taken from /Length when it is a
    /// direct integer, otherwise the payload runs to the `endstream` marker.
    fn parse_dictionary_or_stream(&mut self) -> PDFUnlockResult<Object> {
        let dict = self.parse_dictionary_body()?;
        let after_dict = self.pos;
        self.skip_whitespace();
        if self.data[self.pos..].starts_with(b"stream") {
            self.pos += b"stream".len();
            // EOL after the keyword: CRLF or lone LF
            if self.peek() == Some(b'\r') {
                self.pos += 1;
            }
            if self.peek() == Some(b'\n') {
                self.pos += 1;
            }
            let start = self.pos;
            let data = match dict.get_integer("Length") {
                Some(len) if len >= 0 && start + len as usize <= self.data.len() => {
                    let end = start + len as usize;
                    // Trust /Length only if endstream actually follows
                    let mut probe = Parser::at(self.data, end);
                    probe.skip_whitespace();
                    if probe.data[probe.pos..].starts_with(b"endstream") {
                        self.pos = end;
                        self.data[start..end].to_vec()
                    } else {
                        self.scan_to_endstream(start)?
                    }
                }
                _ => self.scan_to_endstream(start)?,
            };
            self.expect_keyword("endstream")?;
            Ok(Object::Stream(Stream::new(dict, data)))
        } else {
            self.pos = after_dict;
            Ok(Object::Dictionary(dict))
        }
    }

    fn scan_to_endstream(&mut self, start: usize) -> PDFUnlockResult<Vec<u8>> {
        let hay = &self.data[start..];
        let marker = b"endstream";
        let found = hay
            .windows(marker.len())
            .position(|w| w == marker)
            .ok_or_else(|| PDFUnlockError::malformed("missing endstream"))?;
        let mut end = start + found;
        // Strip the EOL that belongs to the marker, not the payload
        if end > start && self.data[end - 1] == b'\n' {
            end -= 1;
        }
        if end > start && self.data[end - 1] == b'\r' {
            end -= 1;
        }
        self.pos = start + found;
        Ok(self.data[start..end].to_vec())
    }

    fn parse_number_or_reference(&mut self) -> PDFUnlockResult<Object> {
        let first = self.parse_number()?;
        if let Object::Integer(num) = first {
            if num >= 0 {
                // Lookahead for "<gen> R"
                let save = self.pos;
                self.skip_whitespace();
                let gen_token = self.read_token();
                if !gen_token.is_empty() && gen_token.iter().all(u8::is_ascii_digit) {
                    self.skip_whitespace();
                    let r_token = self.read_token();
                    if r_token == b"R" {
                        let gen: u16 = std::str::from_utf8(gen_token)
                            .ok()
                            .and_then(|s| s.parse().ok())
                            .ok_or_else(|| {
                                PDFUnlockError::malformed("generation number out of range")
                            })?;
                        return Ok(Object::Reference(num as u32, gen));
                    }
                }
                self.pos = save;
            }
        }
        Ok(first)
    }

    fn parse_number(&mut self) -> PDFUnlockResult<Object> {
        let token = self.read_token();
        let text = std::str::from_utf8(token)
            .map_err(|_| PDFUnlockError::malformed("invalid number"))?;
        if text.contains('.') {
            text.parse::<f64>()
                .map(Object::Real)
                .map_err(|_| PDFUnlockError::malformed(format!("invalid real '{text}'")))
        } else {
            text.parse::<i64>()
                .map(Object::Integer)
                .map_err(|_| PDFUnlockError::malformed(format!("invalid integer '{text}'")))
        }
    }

    /// Parse an indirect object: `num gen obj ... endobj`
    fn parse_indirect_object(&mut self) -> PDFUnlockResult<(u32, u16, Object)> {
        self.skip_whitespace();
        let num = match self.parse_number()? {
            Object::Integer(n) if n >= 0 => n as u32,
            _ => return Err(PDFUnlockError::malformed("invalid object number")),
        };
        self.skip_whitespace();
        let gen = match self.parse_number()? {
            Object::Integer(n) if (0..=u16::MAX as i64).contains(&n) => n as u16,
            _ => return Err(PDFUnlockError::malformed("invalid generation number")),
        };
        self.expect_keyword("obj")?;
        let object = self.parse_object()?;
        self.skip_whitespace();
        if self.data[self.pos..].starts_with(b"endobj") {
            self.pos += b"endobj".len();
        } else {
            trace!("object {num} {gen} missing endobj");
        }
        Ok((num, gen, object))
    }
}

/// Parse the objects embedded in a decoded object stream.
///
/// The stream begins with `n` pairs of `object-number offset` integers; the
/// objects themselves start at byte `first`.
pub fn parse_object_stream_payload(
    data: &[u8],
    n: usize,
    first: usize,
) -> PDFUnlockResult<Vec<(u32, Object)>> {
    if first > data.len() {
        return Err(PDFUnlockError::stream("object stream /First out of range"));
    }
    let mut header = Parser::new(&data[..first]);
    let mut pairs = Vec::with_capacity(n);
    for _ in 0..n {
        header.skip_whitespace();
        let num = match header.parse_number()? {
            Object::Integer(v) if v >= 0 => v as u32,
            _ => return Err(PDFUnlockError::stream("invalid object stream header")),
        };
        header.skip_whitespace();
        let offset = match header.parse_number()? {
            Object::Integer(v) if v >= 0 => v as usize,
            _ => return Err(PDFUnlockError::stream("invalid object stream header")),
        };
        pairs.push((num, offset));
    }

    let body = &data[first..];
    let mut objects = Vec::with_capacity(n);
    for (num, offset) in pairs {
        if offset > body.len() {
            return Err(PDFUnlockError::stream("object stream offset out of range"));
        }
        let mut parser = Parser::at(body, offset);
        objects.push((num, parser.parse_object()?));
    }
    Ok(objects)
}

/// Find the last `startxref` offset near the end of the file
fn find_startxref(data: &[u8]) -> PDFUnlockResult<usize> {
    let window_start = data.len().saturating_sub(2048);
    let tail = &data[window_start..];
    let marker = b"startxref";
    let found = tail
        .windows(marker.len())
        .rposition(|w| w == marker)
        .ok_or_else(|| PDFUnlockError::xref("startxref not found"))?;
    let mut parser = Parser::at(data, window_start + found + marker.len());
    parser.skip_whitespace();
    match parser.parse_number()? {
        Object::Integer(n) if n >= 0 && (n as usize) < data.len() => Ok(n as usize),
        _ => Err(PDFUnlockError::xref("invalid startxref offset")),
    }
}

fn parse_header_version(data: &[u8]) -> PDFUnlockResult<String> {
    if !data.starts_with(b"%PDF-") {
        return Err(PDFUnlockError::malformed("missing %PDF header"));
    }
    let rest = &data[5..];
    let end = rest
        .iter()
        .position(|&b| is_whitespace(b))
        .unwrap_or(rest.len().min(8));
    let version = std::str::from_utf8(&rest[..end])
        .map_err(|_| PDFUnlockError::malformed("invalid header version"))?;
    Ok(version.to_string())
}

/// Parse a classic `xref` section at the current position, filling `table`,
/// and return the section's trailer dictionary.
fn parse_classic_section(
    parser: &mut Parser<'_>,
    table: &mut XrefTable,
) -> PDFUnlockResult<Dictionary> {
    parser.expect_keyword("xref")?;
    loop {
        parser.skip_whitespace();
        if parser.data[parser.pos..].starts_with(b"trailer") {
            parser.pos += b"trailer".len();
            break;
        }
        let start = match parser.parse_number()? {
            Object::Integer(n) if n >= 0 => n as u32,
            _ => return Err(PDFUnlockError::xref("invalid subsection start")),
        };
        parser.skip_whitespace();
        let count = match parser.parse_number()? {
            Object::Integer(n) if n >= 0 => n as u32,
            _ => return Err(PDFUnlockError::xref("invalid subsection count")),
        };
        for i in 0..count {
            parser.skip_whitespace();
            let offset_tok = parser.read_token();
            parser.skip_whitespace();
            let gen_tok = parser.read_token();
            parser.skip_whitespace();
            let kind_tok = parser.read_token();

            let offset: usize = std::str::from_utf8(offset_tok)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| PDFUnlockError::xref("invalid entry offset"))?;
            let generation: u16 = std::str::from_utf8(gen_tok)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| PDFUnlockError::xref("invalid entry generation"))?;

            let number = start + i;
            match kind_tok {
                b"n" => table.insert_if_absent(number, XrefEntry::InUse { offset, generation }),
                b"f" => table.insert_if_absent(number, XrefEntry::Free),
                other => {
                    return Err(PDFUnlockError::xref(format!(
                        "invalid entry type '{}'",
                        String::from_utf8_lossy(other)
                    )))
                }
            }
        }
    }
    parser.skip_whitespace();
    parser.parse_dictionary_body()
}

fn merge_trailer(merged: &mut Dictionary, section: &Dictionary) {
    for (key, value) in section.iter() {
        if !merged.contains_key(key) && key != "Prev" && key != "XRefStm" {
            merged.set(key.clone(), value.clone());
        }
    }
}

/// Load a complete document: header, xref chain, every in-use object.
pub fn parse_document(data: &[u8]) -> PDFUnlockResult<Document> {
    let version = parse_header_version(data)?;
    let mut table = XrefTable::new();
    let mut trailer = Dictionary::new();

    let mut pending = vec![find_startxref(data)?];
    let mut visited = HashSet::new();
    while let Some(offset) = pending.pop() {
        if !visited.insert(offset) {
            warn!("cross-reference chain loops at offset {offset}");
            continue;
        }
        if offset >= data.len() {
            return Err(PDFUnlockError::xref("cross-reference offset out of range"));
        }

        let mut parser = Parser::at(data, offset);
        parser.skip_whitespace();
        let section = if data[parser.pos..].starts_with(b"xref") {
            parse_classic_section(&mut parser, &mut table)?
        } else {
            // Cross-reference stream object
            let (_, _, obj) = parser.parse_indirect_object()?;
            let stream = obj
                .as_stream()
                .filter(|s| s.is_type("XRef"))
                .ok_or_else(|| PDFUnlockError::xref("expected cross-reference stream"))?;
            let decoded = decode_stream(&stream.dict, &stream.data)?;
            parse_xref_stream_data(&stream.dict, &decoded, &mut table)?;
            stream.dict.clone()
        };

        merge_trailer(&mut trailer, &section);
        // Hybrid files: the classic section points at a parallel xref stream
        // whose entries take precedence over anything reached through /Prev,
        // so it must come off the stack first.
        if let Some(prev) = section.get_integer("Prev") {
            if prev >= 0 {
                pending.push(prev as usize);
            }
        }
        if let Some(xrefstm) = section.get_integer("XRefStm") {
            if xrefstm >= 0 {
                pending.push(xrefstm as usize);
            }
        }
    }

    debug!("cross-reference chain resolved: {} entries", table.len());

    let mut objects = std::collections::BTreeMap::new();
    let mut in_object_stream = HashMap::new();
    for (&number, entry) in table.iter() {
        match *entry {
            XrefEntry::Free => {}
            XrefEntry::InUse { offset, .. } => {
                if offset >= data.len() {
                    return Err(PDFUnlockError::xref(format!(
                        "object {number} offset out of range"
                    )));
                }
                let mut parser = Parser::at(data, offset);
                let (num, gen, obj) = parser.parse_indirect_object()?;
                if num != number {
                    return Err(PDFUnlockError::xref(format!(
                        "object at offset {offset} is {num}, expected {number}"
                    )));
                }
                objects.insert((num, gen), obj);
            }
            XrefEntry::InStream { container, index } => {
                in_object_stream.insert(number, (container, index));
            }
        }
    }

    debug!(
        "loaded {} file-level objects, {} in object streams",
        objects.len(),
        in_object_stream.len()
    );

    Ok(Document {
        version,
        objects,
        trailer,
        in_object_stream,
    })
}
