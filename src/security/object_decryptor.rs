//! Per-object decryption.
//!
//! Legacy handlers (revisions 2 through 4) mix the file key with the object
//! id through MD5 before decrypting; AESV3 uses the file key directly.
//! Strings and streams can be bound to different crypt filters, so each has
//! its own entry point.

use crate::crypto::{aes_cbc_decrypt, rc4_apply, remove_pkcs7_padding};
use crate::error::{PDFUnlockError, PDFUnlockResult};
use crate::pdf::object::Dictionary;
use crate::security::key_derivation::{FileKey, StandardSecurityHandler};
use crate::security::CryptMethod;

/// Decrypts strings and stream payloads with a derived file key.
/// Stateless per call; the borrowed key is zeroed when the caller drops it.
pub struct ObjectDecryptor<'a> {
    handler: &'a StandardSecurityHandler,
    key: &'a FileKey,
}

impl<'a> ObjectDecryptor<'a> {
    pub fn new(handler: &'a StandardSecurityHandler, key: &'a FileKey) -> Self {
        Self { handler, key }
    }

    /// Decrypt a string object's bytes
    pub fn decrypt_string(&self, number: u32, generation: u16, data: &[u8]) -> PDFUnlockResult<Vec<u8>> {
        self.decrypt_with_method(self.handler.string_method(), number, generation, data)
    }

    /// Decrypt a stream payload. Metadata streams pass through untouched
    /// when the document leaves its metadata in the clear.
    pub fn decrypt_stream(
        &self,
        number: u32,
        generation: u16,
        dict: &Dictionary,
        data: &[u8],
    ) -> PDFUnlockResult<Vec<u8>> {
        if !self.handler.encrypt_metadata() && dict.get_name("Type") == Some("Metadata") {
            return Ok(data.to_vec());
        }
        self.decrypt_with_method(self.handler.stream_method(), number, generation, data)
    }

    fn decrypt_with_method(
        &self,
        method: CryptMethod,
        number: u32,
        generation: u16,
        data: &[u8],
    ) -> PDFUnlockResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        match method {
            CryptMethod::Identity => Ok(data.to_vec()),
            CryptMethod::Rc4 => {
                let key = self.object_key(number, generation, false);
                Ok(rc4_apply(&key, data))
            }
            CryptMethod::AesV2 => {
                let key = self.object_key(number, generation, true);
                self.decrypt_aes(&key, data)
            }
            CryptMethod::AesV3 => self.decrypt_aes(self.key, data),
        }
    }

    /// Algorithm 1: MD5 over file key, low object-id bytes, and the AES
    /// salt, truncated to min(n + 5, 16) bytes.
    fn object_key(&self, number: u32, generation: u16, aes: bool) -> Vec<u8> {
        let mut input = self.key.to_vec();
        input.extend_from_slice(&number.to_le_bytes()[..3]);
        input.extend_from_slice(&(generation as u32).to_le_bytes()[..2]);
        if aes {
            input.extend_from_slice(b"sAlT");
        }
        let hash = md5::compute(&input);
        let len = (self.key.len() + 5).min(16);
        hash.0[..len].to_vec()
    }

    fn decrypt_aes(&self, key: &[u8], data: &[u8]) -> PDFUnlockResult<Vec<u8>> {
        if data.len() < 16 {
            return Err(PDFUnlockError::invalid_length("AES payload shorter than its IV"));
        }
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&data[..16]);
        let plaintext = aes_cbc_decrypt(key, &iv, &data[16..])?;
        Ok(remove_pkcs7_padding(plaintext))
    }
}
