//! Standard security handler: password verification, key derivation, and
//! per-object decryption.

pub mod key_derivation;
pub mod object_decryptor;
pub mod saslprep;

pub use key_derivation::{FileKey, StandardSecurityHandler};
pub use object_decryptor::ObjectDecryptor;

/// Crypt filter method resolved from the encryption dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    /// No transformation
    Identity,
    /// RC4 (the V2 crypt filter method)
    Rc4,
    /// AES-128-CBC
    AesV2,
    /// AES-256-CBC
    AesV3,
}
