//! PDF structure: object model, parsing, cross-references, serialization

pub mod filter;
pub mod object;
pub mod parser;
pub mod writer;
pub mod xref;

pub use object::{Dictionary, Object, Stream};
pub use parser::{parse_document, Document};
pub use writer::write_document;
