//! Cipher primitives used by the standard security handler

mod aes;
mod rc4;

pub use aes::{aes_cbc_decrypt, aes_cbc_encrypt_128, remove_pkcs7_padding};
pub use rc4::{rc4_apply, Rc4};
