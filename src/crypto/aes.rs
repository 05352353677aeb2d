//! AES-CBC for PDF encryption
//!
//! The standard security handler uses AES-128-CBC (AESV2) and AES-256-CBC
//! (AESV3) with the IV carried as the first 16 bytes of the ciphertext.
//! The revision 6 password hash additionally needs the encryption direction
//! with a 128-bit key, so both directions are provided here. Padding is the
//! caller's concern.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};

use crate::error::{PDFUnlockError, PDFUnlockResult};

const BLOCK_SIZE: usize = 16;

/// Decrypt CBC data with a 16- or 32-byte key. `data` must be a whole
/// number of blocks; no padding is removed.
pub fn aes_cbc_decrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> PDFUnlockResult<Vec<u8>> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(PDFUnlockError::invalid_length("AES-CBC decryption"));
    }

    match key.len() {
        16 => {
            let cipher = Aes128::new(GenericArray::from_slice(key));
            Ok(cbc_decrypt_blocks(data, iv, |block| cipher.decrypt_block(block)))
        }
        32 => {
            let cipher = Aes256::new(GenericArray::from_slice(key));
            Ok(cbc_decrypt_blocks(data, iv, |block| cipher.decrypt_block(block)))
        }
        n => Err(PDFUnlockError::InvalidKeyLength(n)),
    }
}

/// Encrypt CBC data with a 16-byte key. `data` must be a whole number of
/// blocks; no padding is added.
pub fn aes_cbc_encrypt_128(key: &[u8; 16], iv: &[u8; 16], data: &[u8]) -> PDFUnlockResult<Vec<u8>> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(PDFUnlockError::invalid_length("AES-CBC encryption"));
    }

    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut out = Vec::with_capacity(data.len());
    let mut prev = *iv;
    for chunk in data.chunks_exact(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        for (b, (&c, &p)) in block.iter_mut().zip(chunk.iter().zip(prev.iter())) {
            *b = c ^ p;
        }
        let mut ga = GenericArray::clone_from_slice(&block);
        cipher.encrypt_block(&mut ga);
        prev.copy_from_slice(&ga);
        out.extend_from_slice(&ga);
    }
    Ok(out)
}

fn cbc_decrypt_blocks<F>(data: &[u8], iv: &[u8; 16], mut decrypt: F) -> Vec<u8>
where
    F: FnMut(&mut GenericArray<u8, aes::cipher::consts::U16>),
{
    let mut out = Vec::with_capacity(data.len());
    let mut prev = *iv;
    for chunk in data.chunks_exact(BLOCK_SIZE) {
        let mut block = GenericArray::clone_from_slice(chunk);
        decrypt(&mut block);
        for (b, &p) in block.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        out.extend_from_slice(&block);
        prev.copy_from_slice(chunk);
    }
    out
}

/// Strip PKCS#7 padding. Real-world producers sometimes emit broken
/// padding, so an invalid tail leaves the data unchanged rather than
/// failing the whole object.
pub fn remove_pkcs7_padding(mut data: Vec<u8>) -> Vec<u8> {
    match data.last() {
        Some(&pad) if pad >= 1 && pad as usize <= BLOCK_SIZE && pad as usize <= data.len() => {
            let start = data.len() - pad as usize;
            if data[start..].iter().all(|&b| b == pad) {
                data.truncate(start);
            }
            data
        }
        _ => data,
    }
}
