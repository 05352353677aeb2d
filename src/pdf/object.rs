//! PDF object model
//!
//! The object graph is a tagged sum type mirroring the eight basic PDF
//! object kinds plus indirect references. Dictionaries keep insertion order
//! so rewritten files serialize deterministically.

use indexmap::IndexMap;

/// A PDF object
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    /// String payloads stay as raw bytes; PDF strings are not text
    String(Vec<u8>),
    Name(String),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    /// Indirect reference: object number, generation number
    Reference(u32, u16),
}

impl Object {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<(u32, u16)> {
        match self {
            Object::Reference(num, gen) => Some((*num, *gen)),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }
}

/// PDF dictionary with insertion-ordered entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dictionary {
    entries: IndexMap<String, Object>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get value by key
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.get(key)
    }

    /// Get integer value
    pub fn get_integer(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Object::as_integer)
    }

    /// Get name value
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Object::as_name)
    }

    /// Get string value as raw bytes
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Object::as_string)
    }

    /// Get boolean value, falling back to `default` when absent
    pub fn get_bool_default(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Object::Boolean(b)) => *b,
            _ => default,
        }
    }

    /// Get reference value
    pub fn get_reference(&self, key: &str) -> Option<(u32, u16)> {
        self.get(key).and_then(Object::as_reference)
    }

    /// Get array value
    pub fn get_array(&self, key: &str) -> Option<&[Object]> {
        self.get(key).and_then(Object::as_array)
    }

    /// Get nested dictionary value
    pub fn get_dict(&self, key: &str) -> Option<&Dictionary> {
        match self.get(key) {
            Some(Object::Dictionary(d)) => Some(d),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Set value
    pub fn set(&mut self, key: impl Into<String>, value: Object) {
        self.entries.insert(key.into(), value);
    }

    /// Remove value, returning it if present
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Stream object: dictionary plus raw payload bytes.
///
/// The payload is kept exactly as it appears in the file; content filters
/// such as FlateDecode are only undone when the stream must be inspected
/// (cross-reference and object streams).
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

impl Stream {
    pub fn new(dict: Dictionary, data: Vec<u8>) -> Self {
        Self { dict, data }
    }

    /// True when the stream declares the given /Type
    pub fn is_type(&self, type_name: &str) -> bool {
        self.dict.get_name("Type") == Some(type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_accessors() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name("Catalog".to_string()));
        dict.set("Count", Object::Integer(12));
        dict.set("Root", Object::Reference(3, 0));
        dict.set("ID", Object::String(vec![0xDE, 0xAD]));

        assert_eq!(dict.get_name("Type"), Some("Catalog"));
        assert_eq!(dict.get_integer("Count"), Some(12));
        assert_eq!(dict.get_reference("Root"), Some((3, 0)));
        assert_eq!(dict.get_bytes("ID"), Some(&[0xDE, 0xAD][..]));
        assert_eq!(dict.get_name("Missing"), None);
    }

    #[test]
    fn test_dictionary_preserves_insertion_order() {
        let mut dict = Dictionary::new();
        for key in ["Zebra", "Apple", "Mango"] {
            dict.set(key, Object::Null);
        }
        let keys: Vec<_> = dict.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["Zebra", "Apple", "Mango"]);
    }

    #[test]
    fn test_bool_default() {
        let mut dict = Dictionary::new();
        assert!(dict.get_bool_default("EncryptMetadata", true));
        dict.set("EncryptMetadata", Object::Boolean(false));
        assert!(!dict.get_bool_default("EncryptMetadata", true));
    }

    #[test]
    fn test_stream_type() {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name("ObjStm".to_string()));
        let stream = Stream::new(dict, vec![]);
        assert!(stream.is_type("ObjStm"));
        assert!(!stream.is_type("XRef"));
    }

    #[test]
    fn test_object_as_dict_covers_streams() {
        let stream = Stream::new(Dictionary::new(), vec![1, 2, 3]);
        let obj = Object::Stream(stream);
        assert!(obj.as_dict().is_some());
        assert!(obj.as_stream().is_some());
    }
}
