//! Document rewriting: take an encrypted file, produce a plain one.
//!
//! The pipeline parses the whole object graph, authenticates against the
//! encryption dictionary, decrypts every string and stream at the file
//! level, explodes object streams into ordinary top-level objects, strips
//! the encryption machinery, and re-serializes with a fresh classic
//! cross-reference table.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::error::{PDFUnlockError, PDFUnlockResult};
use crate::pdf::filter::decode_stream;
use crate::pdf::object::{Dictionary, Object};
use crate::pdf::parser::{parse_document, parse_object_stream_payload, Document};
use crate::pdf::writer::write_document;
use crate::security::{ObjectDecryptor, StandardSecurityHandler};

/// Result of running the rewriter over one input
#[derive(Debug, Clone, PartialEq)]
pub enum DecryptionStatus {
    /// The input was encrypted; here is the rewritten plain file
    Decrypted(Vec<u8>),
    /// The input carried no /Encrypt entry and was left untouched
    NotEncrypted,
}

/// Decrypt a single document with the given password.
pub fn decrypt_document(data: &[u8], password: &str) -> PDFUnlockResult<DecryptionStatus> {
    let mut doc = parse_document(data)?;

    let encrypt_ref = match doc.trailer.get("Encrypt") {
        None => {
            debug!("document is not encrypted");
            return Ok(DecryptionStatus::NotEncrypted);
        }
        Some(obj) => obj.as_reference(),
    };
    let encrypt_dict = match doc.resolve_entry(&doc.trailer, "Encrypt")? {
        Some(Object::Dictionary(d)) => d.clone(),
        _ => return Err(PDFUnlockError::malformed("/Encrypt is not a dictionary")),
    };

    let doc_id = first_document_id(&doc);
    let handler = StandardSecurityHandler::from_dict(&encrypt_dict, &doc_id)?;
    let key = handler.authenticate(password)?;
    debug!("authenticated with revision {} handler", handler.revision());

    let decryptor = ObjectDecryptor::new(&handler, &key);
    decrypt_file_level_objects(&mut doc, &decryptor, encrypt_ref)?;
    explode_object_streams(&mut doc)?;
    strip_encryption(&mut doc, encrypt_ref);
    validate_references(&doc)?;

    Ok(DecryptionStatus::Decrypted(write_document(&doc)))
}

fn first_document_id(doc: &Document) -> Vec<u8> {
    doc.trailer
        .get_array("ID")
        .and_then(|arr| arr.first())
        .and_then(Object::as_string)
        .map(<[u8]>::to_vec)
        .unwrap_or_default()
}

/// Decrypt strings and stream payloads in every file-level object. The
/// encryption dictionary itself and cross-reference streams are never
/// encrypted, so both are skipped.
fn decrypt_file_level_objects(
    doc: &mut Document,
    decryptor: &ObjectDecryptor<'_>,
    encrypt_ref: Option<(u32, u16)>,
) -> PDFUnlockResult<()> {
    for (&(number, generation), object) in doc.objects.iter_mut() {
        if Some((number, generation)) == encrypt_ref {
            continue;
        }
        if matches!(object, Object::Stream(s) if s.is_type("XRef")) {
            continue;
        }
        decrypt_object(decryptor, number, generation, object)?;
    }
    Ok(())
}

fn decrypt_object(
    decryptor: &ObjectDecryptor<'_>,
    number: u32,
    generation: u16,
    object: &mut Object,
) -> PDFUnlockResult<()> {
    match object {
        Object::String(bytes) => {
            *bytes = decryptor.decrypt_string(number, generation, bytes)?;
        }
        Object::Array(items) => {
            for item in items {
                decrypt_object(decryptor, number, generation, item)?;
            }
        }
        Object::Dictionary(dict) => {
            decrypt_dictionary(decryptor, number, generation, dict)?;
        }
        Object::Stream(stream) => {
            stream.data = decryptor.decrypt_stream(number, generation, &stream.dict, &stream.data)?;
            decrypt_dictionary(decryptor, number, generation, &mut stream.dict)?;
        }
        _ => {}
    }
    Ok(())
}

fn decrypt_dictionary(
    decryptor: &ObjectDecryptor<'_>,
    number: u32,
    generation: u16,
    dict: &mut Dictionary,
) -> PDFUnlockResult<()> {
    let keys: Vec<String> = dict.iter().map(|(k, _)| k.clone()).collect();
    for key in keys {
        if let Some(mut value) = dict.remove(&key) {
            decrypt_object(decryptor, number, generation, &mut value)?;
            dict.set(key, value);
        }
    }
    Ok(())
}

/// Parse the contents of every object stream into ordinary top-level
/// objects, then drop the carriers. Objects inside a stream are stored in
/// plaintext once the container is decrypted.
fn explode_object_streams(doc: &mut Document) -> PDFUnlockResult<()> {
    let mut containers: HashMap<u32, Vec<(u32, Object)>> = HashMap::new();

    for (&(number, _), object) in doc.objects.iter() {
        let stream = match object.as_stream() {
            Some(s) if s.is_type("ObjStm") => s,
            _ => continue,
        };
        let n = stream
            .dict
            .get_integer("N")
            .ok_or_else(|| PDFUnlockError::stream("object stream missing /N"))?;
        let first = stream
            .dict
            .get_integer("First")
            .ok_or_else(|| PDFUnlockError::stream("object stream missing /First"))?;
        if n < 0 || first < 0 {
            return Err(PDFUnlockError::stream("invalid object stream header"));
        }
        let payload = decode_stream(&stream.dict, &stream.data)?;
        let members = parse_object_stream_payload(&payload, n as usize, first as usize)?;
        trace!("object stream {number} holds {} objects", members.len());
        containers.insert(number, members);
    }

    // Promote only the members the cross-reference table assigned to each
    // container; stale copies in other streams are ignored.
    let assignments: Vec<(u32, u32)> = doc
        .in_object_stream
        .iter()
        .map(|(&num, &(container, _))| (num, container))
        .collect();
    for (number, container) in assignments {
        let members = containers.get(&container).ok_or_else(|| {
            PDFUnlockError::stream(format!("object stream {container} not found"))
        })?;
        let object = members
            .iter()
            .find(|(num, _)| *num == number)
            .map(|(_, obj)| obj.clone())
            .ok_or_else(|| {
                PDFUnlockError::stream(format!(
                    "object {number} missing from object stream {container}"
                ))
            })?;
        doc.objects.insert((number, 0), object);
    }
    doc.in_object_stream.clear();

    // Drop the carriers and any cross-reference streams
    doc.objects.retain(|_, object| {
        !matches!(object.as_stream(), Some(s) if s.is_type("ObjStm") || s.is_type("XRef"))
    });
    Ok(())
}

fn strip_encryption(doc: &mut Document, encrypt_ref: Option<(u32, u16)>) {
    if let Some(id) = encrypt_ref {
        doc.objects.remove(&id);
    }
    // Keys that belong to the encryption layer or to the cross-reference
    // stream the trailer was merged from; the writer recreates what it needs
    for key in [
        "Encrypt", "Size", "Prev", "XRefStm", "Type", "W", "Index", "Filter", "DecodeParms",
        "Length",
    ] {
        doc.trailer.remove(key);
    }
}

/// Walk every reference reachable from the trailer and require it to
/// resolve. A dangling reference would otherwise surface as a silently
/// broken document.
fn validate_references(doc: &Document) -> PDFUnlockResult<()> {
    let mut visited: HashSet<(u32, u16)> = HashSet::new();
    let mut queue: Vec<&Object> = doc.trailer.iter().map(|(_, v)| v).collect();

    while let Some(object) = queue.pop() {
        match object {
            Object::Reference(number, generation) => {
                if visited.insert((*number, *generation)) {
                    let target = doc
                        .get(*number, *generation)
                        .ok_or(PDFUnlockError::ObjectNotFound(*number, *generation))?;
                    queue.push(target);
                }
            }
            Object::Array(items) => queue.extend(items.iter()),
            Object::Dictionary(dict) => queue.extend(dict.iter().map(|(_, v)| v)),
            Object::Stream(stream) => queue.extend(stream.dict.iter().map(|(_, v)| v)),
            _ => {}
        }
    }
    trace!("validated {} reachable objects", visited.len());
    Ok(())
}
