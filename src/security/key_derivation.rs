//! File-key derivation for the standard security handler.
//!
//! Covers revisions 2 through 6: the MD5/RC4 scheme of the legacy handlers
//! (algorithms 2 and 4 through 7 of the PDF specification) and the SHA-2
//! based scheme of revisions 5 and 6, including the revision 6 hardened
//! hash. Both the user and owner password paths are tried before a password
//! is rejected.

use log::debug;
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::crypto::{aes_cbc_decrypt, aes_cbc_encrypt_128, rc4_apply};
use crate::error::{PDFUnlockError, PDFUnlockResult};
use crate::pdf::object::Dictionary;
use crate::security::saslprep::saslprep;
use crate::security::CryptMethod;

/// Padding string from the PDF specification, used whenever a legacy
/// password is shorter than 32 bytes.
pub(crate) const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// The derived file encryption key. Zeroed on drop.
pub type FileKey = Zeroizing<Vec<u8>>;

/// Parsed /Encrypt state for the standard security handler. The O/U/OE/UE
/// values are password digests lifted from the document, not secrets.
#[derive(Debug)]
pub struct StandardSecurityHandler {
    revision: u8,
    /// Key length in bytes (5 to 16 for the legacy scheme, 32 for AESV3)
    key_length: usize,
    o: Vec<u8>,
    u: Vec<u8>,
    oe: Vec<u8>,
    ue: Vec<u8>,
    permissions: u32,
    encrypt_metadata: bool,
    doc_id: Vec<u8>,
    string_method: CryptMethod,
    stream_method: CryptMethod,
}

impl StandardSecurityHandler {
    /// Build a handler from the /Encrypt dictionary and the first element
    /// of the trailer /ID array.
    pub fn from_dict(encrypt: &Dictionary, doc_id: &[u8]) -> PDFUnlockResult<Self> {
        let filter = encrypt
            .get_name("Filter")
            .ok_or_else(|| PDFUnlockError::MissingDictionaryEntry("Filter".to_string()))?;
        if filter != "Standard" {
            return Err(PDFUnlockError::UnsupportedFilter(filter.to_string()));
        }

        let version = encrypt.get_integer("V").unwrap_or(0);
        let revision = encrypt
            .get_integer("R")
            .ok_or_else(|| PDFUnlockError::MissingDictionaryEntry("R".to_string()))?;
        if !(2..=6).contains(&revision) {
            return Err(PDFUnlockError::UnsupportedRevision(revision as u8));
        }
        let revision = revision as u8;

        let length_bits = if version == 5 {
            256
        } else {
            encrypt.get_integer("Length").unwrap_or(40)
        };
        if length_bits % 8 != 0 {
            return Err(PDFUnlockError::InvalidKeyLength(length_bits as usize));
        }
        let key_length = (length_bits / 8) as usize;
        if !(5..=32).contains(&key_length) {
            return Err(PDFUnlockError::InvalidKeyLength(key_length));
        }

        let o_raw = encrypt
            .get_bytes("O")
            .ok_or_else(|| PDFUnlockError::MissingDictionaryEntry("O".to_string()))?;
        let u_raw = encrypt
            .get_bytes("U")
            .ok_or_else(|| PDFUnlockError::MissingDictionaryEntry("U".to_string()))?;
        let want = if revision >= 5 { 48 } else { 32 };
        if o_raw.len() < want || u_raw.len() < want {
            return Err(PDFUnlockError::invalid_dict_value(
                "O",
                format!("owner/user entries must be at least {want} bytes"),
            ));
        }
        let o = o_raw[..want].to_vec();
        let u = u_raw[..want].to_vec();

        let (oe, ue) = if revision >= 5 {
            let oe = encrypt
                .get_bytes("OE")
                .ok_or_else(|| PDFUnlockError::MissingDictionaryEntry("OE".to_string()))?;
            let ue = encrypt
                .get_bytes("UE")
                .ok_or_else(|| PDFUnlockError::MissingDictionaryEntry("UE".to_string()))?;
            if oe.len() < 32 || ue.len() < 32 {
                return Err(PDFUnlockError::invalid_dict_value(
                    "OE",
                    "key material must be at least 32 bytes",
                ));
            }
            (oe[..32].to_vec(), ue[..32].to_vec())
        } else {
            (Vec::new(), Vec::new())
        };

        let permissions = encrypt
            .get_integer("P")
            .ok_or_else(|| PDFUnlockError::MissingDictionaryEntry("P".to_string()))?
            as i32 as u32;
        let encrypt_metadata = encrypt.get_bool_default("EncryptMetadata", true);

        let (string_method, stream_method) = match version {
            1 | 2 => (CryptMethod::Rc4, CryptMethod::Rc4),
            4 | 5 => {
                let cf = encrypt.get_dict("CF");
                let strf = encrypt.get_name("StrF").unwrap_or("Identity");
                let stmf = encrypt.get_name("StmF").unwrap_or("Identity");
                (
                    resolve_crypt_method(cf, strf)?,
                    resolve_crypt_method(cf, stmf)?,
                )
            }
            other => {
                return Err(PDFUnlockError::UnsupportedFilter(format!(
                    "encryption version {other}"
                )))
            }
        };

        debug!(
            "standard security handler: R={revision} V={version} key={key_length} bytes \
             strings={string_method:?} streams={stream_method:?}"
        );

        Ok(Self {
            revision,
            key_length,
            o,
            u,
            oe,
            ue,
            permissions,
            encrypt_metadata,
            doc_id: doc_id.to_vec(),
            string_method,
            stream_method,
        })
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    pub fn string_method(&self) -> CryptMethod {
        self.string_method
    }

    pub fn stream_method(&self) -> CryptMethod {
        self.stream_method
    }

    /// Verify the password and derive the file encryption key. The user
    /// password is tried first, then the owner password.
    pub fn authenticate(&self, password: &str) -> PDFUnlockResult<FileKey> {
        if self.revision >= 5 {
            self.authenticate_modern(password)
        } else {
            self.authenticate_legacy(password.as_bytes())
        }
    }

    fn authenticate_legacy(&self, password: &[u8]) -> PDFUnlockResult<FileKey> {
        let key = self.compute_legacy_key(password);
        if self.verify_legacy_key(&key) {
            return Ok(Zeroizing::new(key));
        }

        // Algorithm 7: decode the user password out of /O with the owner
        // key, then retry the user path.
        let padded = pad_password(password);
        let mut hash = md5::compute(padded).0.to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash).0.to_vec();
            }
        }
        let n = self.legacy_key_len();
        let owner_key = &hash[..n];

        let user_password = if self.revision == 2 {
            rc4_apply(owner_key, &self.o)
        } else {
            let mut result = self.o.clone();
            for i in (0..20u8).rev() {
                let xor_key: Vec<u8> = owner_key.iter().map(|b| b ^ i).collect();
                result = rc4_apply(&xor_key, &result);
            }
            result
        };

        let key = self.compute_legacy_key(&user_password);
        if self.verify_legacy_key(&key) {
            Ok(Zeroizing::new(key))
        } else {
            Err(PDFUnlockError::AuthenticationFailed)
        }
    }

    fn legacy_key_len(&self) -> usize {
        if self.revision == 2 {
            5
        } else {
            self.key_length
        }
    }

    /// Algorithm 2: derive the file key from a (possibly padded) password
    fn compute_legacy_key(&self, password: &[u8]) -> Vec<u8> {
        let padded = pad_password(password);

        let mut context = md5::Context::new();
        context.consume(padded);
        context.consume(&self.o);
        context.consume(self.permissions.to_le_bytes());
        context.consume(&self.doc_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            context.consume([0xFF, 0xFF, 0xFF, 0xFF]);
        }
        let mut result = context.finalize().0.to_vec();

        let n = self.legacy_key_len();
        if self.revision >= 3 {
            for _ in 0..50 {
                result = md5::compute(&result[..n]).0.to_vec();
            }
        }
        result.truncate(n);
        result
    }

    /// Algorithms 4 and 5: recompute /U from the key and compare
    fn verify_legacy_key(&self, key: &[u8]) -> bool {
        if self.revision == 2 {
            let computed = rc4_apply(key, &PASSWORD_PADDING);
            computed == self.u
        } else {
            let mut context = md5::Context::new();
            context.consume(PASSWORD_PADDING);
            context.consume(&self.doc_id);
            let hash = context.finalize();

            let mut result = rc4_apply(key, &hash.0);
            for i in 1..20u8 {
                let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                result = rc4_apply(&xor_key, &result);
            }
            // Only the first 16 bytes of /U are meaningful for R3+
            result.len() >= 16 && self.u.len() >= 16 && result[..16] == self.u[..16]
        }
    }

    fn authenticate_modern(&self, password: &str) -> PDFUnlockResult<FileKey> {
        let password = self.normalize_modern_password(password)?;

        let u_hash = &self.u[..32];
        let u_validation_salt = &self.u[32..40];
        let u_key_salt = &self.u[40..48];
        let o_hash = &self.o[..32];
        let o_validation_salt = &self.o[32..40];
        let o_key_salt = &self.o[40..48];

        // User path: hash over password and validation salt only
        let hash = self.modern_hash(&password, u_validation_salt, &[])?;
        if hash == u_hash {
            let intermediate = self.modern_hash(&password, u_key_salt, &[])?;
            let key = aes_cbc_decrypt(&intermediate, &[0u8; 16], &self.ue)?;
            return Ok(Zeroizing::new(key));
        }

        // Owner path: the full 48-byte /U participates in the hash
        let hash = self.modern_hash(&password, o_validation_salt, &self.u)?;
        if hash == o_hash {
            let intermediate = self.modern_hash(&password, o_key_salt, &self.u)?;
            let key = aes_cbc_decrypt(&intermediate, &[0u8; 16], &self.oe)?;
            return Ok(Zeroizing::new(key));
        }

        Err(PDFUnlockError::AuthenticationFailed)
    }

    fn normalize_modern_password(&self, password: &str) -> PDFUnlockResult<Vec<u8>> {
        let prepared = if self.revision == 6 {
            saslprep(password)?
        } else {
            password.to_string()
        };
        let bytes = prepared.as_bytes();
        Ok(bytes[..bytes.len().min(127)].to_vec())
    }

    fn modern_hash(&self, password: &[u8], salt: &[u8], udata: &[u8]) -> PDFUnlockResult<Vec<u8>> {
        let mut hasher = Sha256::new();
        hasher.update(password);
        hasher.update(salt);
        hasher.update(udata);
        let initial = hasher.finalize().to_vec();

        if self.revision == 5 {
            return Ok(initial);
        }
        hardened_hash_r6(password, initial, udata)
    }
}

/// Pad or truncate a legacy password to exactly 32 bytes
pub(crate) fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

/// The revision 6 hardened hash (Algorithm 2.B): at least 64 rounds of
/// AES-128-CBC over repeated input, with the digest function for each round
/// chosen by the ciphertext itself.
fn hardened_hash_r6(
    password: &[u8],
    initial: Vec<u8>,
    udata: &[u8],
) -> PDFUnlockResult<Vec<u8>> {
    let mut k = initial;
    let mut round: u32 = 0;
    let mut last_byte: u8 = 0;

    while round < 64 || last_byte > (round as u8).wrapping_sub(32) {
        let base: Vec<u8> = password
            .iter()
            .chain(k.iter())
            .chain(udata.iter())
            .copied()
            .collect();
        let mut k1 = Vec::with_capacity(base.len() * 64);
        for _ in 0..64 {
            k1.extend_from_slice(&base);
        }

        let mut aes_key = [0u8; 16];
        aes_key.copy_from_slice(&k[..16]);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&k[16..32]);
        let e = aes_cbc_encrypt_128(&aes_key, &iv, &k1)?;

        let selector: u32 = e[..16].iter().map(|&b| (b % 3) as u32).sum::<u32>() % 3;
        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        last_byte = e[e.len() - 1];
        round += 1;
    }

    k.truncate(32);
    Ok(k)
}

fn resolve_crypt_method(
    cf: Option<&Dictionary>,
    name: &str,
) -> PDFUnlockResult<CryptMethod> {
    if name == "Identity" {
        return Ok(CryptMethod::Identity);
    }
    let filter = cf
        .and_then(|cf| cf.get_dict(name))
        .ok_or_else(|| {
            PDFUnlockError::UnsupportedFilter(format!("crypt filter '{name}' not found in /CF"))
        })?;
    match filter.get_name("CFM").unwrap_or("None") {
        "V2" => Ok(CryptMethod::Rc4),
        "AESV2" => Ok(CryptMethod::AesV2),
        "AESV3" => Ok(CryptMethod::AesV3),
        "None" => Ok(CryptMethod::Identity),
        other => Err(PDFUnlockError::UnsupportedFilter(other.to_string())),
    }
}
