//! Fixture builders: assemble real encrypted PDFs byte-by-byte by running
//! the standard security handler algorithms in the forward (encrypting)
//! direction.
#![allow(dead_code)]

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::io::Write;

pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

pub const DOC_ID: [u8; 16] = [
    0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    0x0C,
];

pub const PERMISSIONS: i32 = -44;

pub const CONTENT: &[u8] = b"BT /F1 24 Tf 72 720 Td (Hello) Tj ET";
pub const TITLE: &[u8] = b"Fixture Title";

const FIXED_IV: [u8; 16] = [
    0xA5, 0x01, 0xA5, 0x02, 0xA5, 0x03, 0xA5, 0x04, 0xA5, 0x05, 0xA5, 0x06, 0xA5, 0x07, 0xA5,
    0x08,
];

pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    pdf_unlock::crypto::rc4_apply(key, data)
}

/// CBC-encrypt with PKCS#7 padding; key may be 16 or 32 bytes
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8; 16], plain: &[u8]) -> Vec<u8> {
    let pad = 16 - plain.len() % 16;
    let mut padded = plain.to_vec();
    padded.extend(std::iter::repeat(pad as u8).take(pad));

    let mut out = Vec::with_capacity(padded.len());
    let mut prev = *iv;
    let encrypt_block = |block: &mut GenericArray<u8, aes::cipher::consts::U16>| match key.len() {
        16 => aes::Aes128::new(GenericArray::from_slice(key)).encrypt_block(block),
        32 => aes::Aes256::new(GenericArray::from_slice(key)).encrypt_block(block),
        other => panic!("unsupported key length {other}"),
    };
    for chunk in padded.chunks_exact(16) {
        let mut block = [0u8; 16];
        for (b, (&c, &p)) in block.iter_mut().zip(chunk.iter().zip(prev.iter())) {
            *b = c ^ p;
        }
        let mut ga = GenericArray::clone_from_slice(&block);
        encrypt_block(&mut ga);
        prev.copy_from_slice(&ga);
        out.extend_from_slice(&ga);
    }
    out
}

/// Raw CBC without padding (revision 5/6 key wrapping)
pub fn aes_cbc_encrypt_nopad(key: &[u8], iv: &[u8; 16], plain: &[u8]) -> Vec<u8> {
    assert_eq!(plain.len() % 16, 0);
    let mut out = Vec::with_capacity(plain.len());
    let mut prev = *iv;
    for chunk in plain.chunks_exact(16) {
        let mut block = [0u8; 16];
        for (b, (&c, &p)) in block.iter_mut().zip(chunk.iter().zip(prev.iter())) {
            *b = c ^ p;
        }
        let mut ga = GenericArray::clone_from_slice(&block);
        match key.len() {
            16 => aes::Aes128::new(GenericArray::from_slice(key)).encrypt_block(&mut ga),
            32 => aes::Aes256::new(GenericArray::from_slice(key)).encrypt_block(&mut ga),
            other => panic!("unsupported key length {other}"),
        }
        prev.copy_from_slice(&ga);
        out.extend_from_slice(&ga);
    }
    out
}

/// IV-prefixed AES payload as it appears in an encrypted PDF
pub fn aes_payload(key: &[u8], plain: &[u8]) -> Vec<u8> {
    let mut out = FIXED_IV.to_vec();
    out.extend_from_slice(&aes_cbc_encrypt(key, &FIXED_IV, plain));
    out
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

// ---- legacy (revision 2..4) forward algorithms ----

pub fn make_o(user_pw: &[u8], owner_pw: &[u8], r: u8, n: usize) -> Vec<u8> {
    let mut hash = md5::compute(pad_password(owner_pw)).0.to_vec();
    if r >= 3 {
        for _ in 0..50 {
            hash = md5::compute(&hash).0.to_vec();
        }
    }
    let key = &hash[..n];
    let padded_user = pad_password(user_pw);
    if r == 2 {
        rc4(key, &padded_user)
    } else {
        let mut result = padded_user.to_vec();
        for i in 0..20u8 {
            let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = rc4(&xor_key, &result);
        }
        result
    }
}

pub fn legacy_file_key(
    user_pw: &[u8],
    o: &[u8],
    r: u8,
    n: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut ctx = md5::Context::new();
    ctx.consume(pad_password(user_pw));
    ctx.consume(o);
    ctx.consume((PERMISSIONS as u32).to_le_bytes());
    ctx.consume(DOC_ID);
    if r >= 4 && !encrypt_metadata {
        ctx.consume([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut result = ctx.finalize().0.to_vec();
    if r >= 3 {
        for _ in 0..50 {
            result = md5::compute(&result[..n]).0.to_vec();
        }
    }
    result.truncate(n);
    result
}

pub fn make_u(key: &[u8], r: u8) -> Vec<u8> {
    if r == 2 {
        rc4(key, &PADDING)
    } else {
        let mut ctx = md5::Context::new();
        ctx.consume(PADDING);
        ctx.consume(DOC_ID);
        let mut result = rc4(key, &ctx.finalize().0);
        for i in 1..20u8 {
            let xor_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = rc4(&xor_key, &result);
        }
        let mut padded = result.clone();
        padded.extend_from_slice(&result);
        padded.truncate(32);
        padded
    }
}

pub fn object_key(file_key: &[u8], num: u32, gen: u16, aes: bool) -> Vec<u8> {
    let mut input = file_key.to_vec();
    input.extend_from_slice(&num.to_le_bytes()[..3]);
    input.extend_from_slice(&(gen as u32).to_le_bytes()[..2]);
    if aes {
        input.extend_from_slice(b"sAlT");
    }
    let hash = md5::compute(&input);
    hash.0[..(file_key.len() + 5).min(16)].to_vec()
}

// ---- file assembly ----

pub struct PdfBuilder {
    data: Vec<u8>,
    offsets: Vec<(u32, usize)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(b"%PDF-1.6\n%\xB5\xB5\xB5\xB5\n");
        Self { data, offsets: Vec::new() }
    }

    pub fn object(&mut self, num: u32, body: &str) {
        self.offsets.push((num, self.data.len()));
        self.data
            .extend_from_slice(format!("{num} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    pub fn stream_object(&mut self, num: u32, dict_inner: &str, payload: &[u8]) {
        self.offsets.push((num, self.data.len()));
        self.data.extend_from_slice(
            format!(
                "{num} 0 obj\n<< {dict_inner} /Length {} >>\nstream\n",
                payload.len()
            )
            .as_bytes(),
        );
        self.data.extend_from_slice(payload);
        self.data.extend_from_slice(b"\nendstream\nendobj\n");
    }

    pub fn offset_of(&self, num: u32) -> usize {
        self.offsets.iter().find(|(n, _)| *n == num).unwrap().1
    }

    /// Classic xref + trailer. `trailer_inner` supplies everything except
    /// /Size, which is derived.
    pub fn finish(mut self, trailer_inner: &str) -> Vec<u8> {
        let max = self.offsets.iter().map(|(n, _)| *n).max().unwrap_or(0);
        let xref_pos = self.data.len();
        self.data
            .extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
        self.data.extend_from_slice(b"0000000000 65535 f \n");
        for num in 1..=max {
            match self.offsets.iter().find(|(n, _)| *n == num) {
                Some((_, off)) => self
                    .data
                    .extend_from_slice(format!("{off:010} 00000 n \n").as_bytes()),
                None => self.data.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        self.data.extend_from_slice(
            format!("trailer\n<< /Size {} {trailer_inner} >>\n", max + 1).as_bytes(),
        );
        self.data
            .extend_from_slice(format!("startxref\n{xref_pos}\n%%EOF\n").as_bytes());
        self.data
    }
}

fn id_hex() -> String {
    hex::encode(DOC_ID)
}

fn body_objects(
    builder: &mut PdfBuilder,
    content_payload: &[u8],
    title_hex: &str,
) {
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    builder.object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    builder.object(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>");
    builder.stream_object(4, "", content_payload);
    builder.object(5, &format!("<< /Title <{title_hex}> >>"));
}

/// Build a legacy RC4 fixture (revision 2 with a 40-bit key, or revision 3
/// with the given key length).
pub fn build_rc4_fixture(r: u8, length_bits: usize, user_pw: &str, owner_pw: &str) -> Vec<u8> {
    let n = if r == 2 { 5 } else { length_bits / 8 };
    let o = make_o(user_pw.as_bytes(), owner_pw.as_bytes(), r, n);
    let key = legacy_file_key(user_pw.as_bytes(), &o, r, n, true);
    let u = make_u(&key, r);

    let content_ct = rc4(&object_key(&key, 4, 0, false), CONTENT);
    let title_ct = rc4(&object_key(&key, 5, 0, false), TITLE);

    let mut b = PdfBuilder::new();
    body_objects(&mut b, &content_ct, &hex::encode(title_ct));
    let v = if r == 2 { 1 } else { 2 };
    b.object(
        6,
        &format!(
            "<< /Filter /Standard /V {v} /R {r} /Length {length_bits} /P {PERMISSIONS} \
             /O <{}> /U <{}> >>",
            hex::encode(&o),
            hex::encode(&u)
        ),
    );
    b.finish(&format!(
        "/Root 1 0 R /Info 5 0 R /Encrypt 6 0 R /ID [<{id}> <{id}>]",
        id = id_hex()
    ))
}

/// Build a revision 4 fixture using the AESV2 crypt filter (AES-128)
pub fn build_aesv2_fixture(user_pw: &str, owner_pw: &str) -> Vec<u8> {
    let n = 16;
    let o = make_o(user_pw.as_bytes(), owner_pw.as_bytes(), 4, n);
    let key = legacy_file_key(user_pw.as_bytes(), &o, 4, n, true);
    let u = make_u(&key, 4);

    let content_ct = aes_payload(&object_key(&key, 4, 0, true), CONTENT);
    let title_ct = aes_payload(&object_key(&key, 5, 0, true), TITLE);

    let mut b = PdfBuilder::new();
    body_objects(&mut b, &content_ct, &hex::encode(title_ct));
    b.object(
        6,
        &format!(
            "<< /Filter /Standard /V 4 /R 4 /Length 128 /P {PERMISSIONS} \
             /CF << /StdCF << /CFM /AESV2 /Length 16 >> >> /StrF /StdCF /StmF /StdCF \
             /O <{}> /U <{}> >>",
            hex::encode(&o),
            hex::encode(&u)
        ),
    );
    b.finish(&format!(
        "/Root 1 0 R /Info 5 0 R /Encrypt 6 0 R /ID [<{id}> <{id}>]",
        id = id_hex()
    ))
}

/// Revision 6 iterated hash: at least 64 rounds of a 64x-repeated
/// AES-128-CBC block whose first 16 bytes select the next digest by mod 3.
pub fn hash_r6(password: &[u8], salt: &[u8], udata: &[u8]) -> Vec<u8> {
    let mut k = Sha256::new()
        .chain_update(password)
        .chain_update(salt)
        .chain_update(udata)
        .finalize()
        .to_vec();

    let mut round = 0u32;
    let mut last_byte = 0u8;
    while round < 64 || last_byte > (round as u8).wrapping_sub(32) {
        let mut chunk = password.to_vec();
        chunk.extend_from_slice(&k);
        chunk.extend_from_slice(udata);
        let mut k1 = Vec::with_capacity(chunk.len() * 64);
        for _ in 0..64 {
            k1.extend_from_slice(&chunk);
        }

        let mut iv = [0u8; 16];
        iv.copy_from_slice(&k[16..32]);
        let e = aes_cbc_encrypt_nopad(&k[..16], &iv, &k1);

        let selector: u32 = e[..16].iter().map(|&b| (b % 3) as u32).sum();
        k = match selector % 3 {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };
        last_byte = e[e.len() - 1];
        round += 1;
    }
    k.truncate(32);
    k
}

fn modern_hash(r: u8, password: &[u8], salt: &[u8], udata: &[u8]) -> Vec<u8> {
    if r == 6 {
        hash_r6(password, salt, udata)
    } else {
        Sha256::new()
            .chain_update(password)
            .chain_update(salt)
            .chain_update(udata)
            .finalize()
            .to_vec()
    }
}

/// Build a revision 5 fixture (AES-256, AESV3 crypt filter)
pub fn build_aesv3_fixture(user_pw: &str, owner_pw: &str) -> Vec<u8> {
    build_aesv3(5, user_pw, owner_pw)
}

/// Build a revision 6 fixture (AES-256 with the iterated hash)
pub fn build_aesv3_r6_fixture(user_pw: &str, owner_pw: &str) -> Vec<u8> {
    build_aesv3(6, user_pw, owner_pw)
}

fn build_aesv3(r: u8, user_pw: &str, owner_pw: &str) -> Vec<u8> {
    let file_key: [u8; 32] = [0x42; 32];
    let u_vsalt = [0x11u8; 8];
    let u_ksalt = [0x22u8; 8];
    let o_vsalt = [0x33u8; 8];
    let o_ksalt = [0x44u8; 8];

    let mut u = modern_hash(r, user_pw.as_bytes(), &u_vsalt, &[]);
    u.extend_from_slice(&u_vsalt);
    u.extend_from_slice(&u_ksalt);

    let u_int = modern_hash(r, user_pw.as_bytes(), &u_ksalt, &[]);
    let ue = aes_cbc_encrypt_nopad(&u_int, &[0u8; 16], &file_key);

    let mut o = modern_hash(r, owner_pw.as_bytes(), &o_vsalt, &u);
    o.extend_from_slice(&o_vsalt);
    o.extend_from_slice(&o_ksalt);

    let o_int = modern_hash(r, owner_pw.as_bytes(), &o_ksalt, &u);
    let oe = aes_cbc_encrypt_nopad(&o_int, &[0u8; 16], &file_key);

    let content_ct = aes_payload(&file_key, CONTENT);
    let title_ct = aes_payload(&file_key, TITLE);

    let mut b = PdfBuilder::new();
    body_objects(&mut b, &content_ct, &hex::encode(title_ct));
    b.object(
        6,
        &format!(
            "<< /Filter /Standard /V 5 /R {r} /Length 256 /P {PERMISSIONS} \
             /CF << /StdCF << /CFM /AESV3 /Length 32 >> >> /StrF /StdCF /StmF /StdCF \
             /O <{}> /U <{}> /OE <{}> /UE <{}> >>",
            hex::encode(&o),
            hex::encode(&u),
            hex::encode(&oe),
            hex::encode(&ue)
        ),
    );
    b.finish(&format!(
        "/Root 1 0 R /Info 5 0 R /Encrypt 6 0 R /ID [<{id}> <{id}>]",
        id = id_hex()
    ))
}

/// Build a revision 3 fixture whose /Info dictionary lives inside an
/// encrypted object stream and whose cross-reference is a stream.
pub fn build_objstm_fixture(user_pw: &str, owner_pw: &str) -> Vec<u8> {
    let n = 16;
    let o = make_o(user_pw.as_bytes(), owner_pw.as_bytes(), 3, n);
    let key = legacy_file_key(user_pw.as_bytes(), &o, 3, n, true);
    let u = make_u(&key, 3);

    let content_ct = rc4(&object_key(&key, 4, 0, false), CONTENT);

    let mut data = Vec::new();
    data.extend_from_slice(b"%PDF-1.6\n%\xB5\xB5\xB5\xB5\n");
    let mut offsets: Vec<(u32, usize)> = Vec::new();
    let mut push = |data: &mut Vec<u8>, offsets: &mut Vec<(u32, usize)>, num: u32, body: Vec<u8>| {
        offsets.push((num, data.len()));
        data.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        data.extend_from_slice(&body);
        data.extend_from_slice(b"\nendobj\n");
    };

    push(&mut data, &mut offsets, 1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    push(&mut data, &mut offsets, 2, b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec());
    push(
        &mut data,
        &mut offsets,
        3,
        b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>".to_vec(),
    );
    {
        let mut body = format!("<< /Length {} >>\nstream\n", content_ct.len()).into_bytes();
        body.extend_from_slice(&content_ct);
        body.extend_from_slice(b"\nendstream");
        push(&mut data, &mut offsets, 4, body);
    }
    // Encrypt dictionary (object 8), plain
    push(
        &mut data,
        &mut offsets,
        8,
        format!(
            "<< /Filter /Standard /V 2 /R 3 /Length 128 /P {PERMISSIONS} /O <{}> /U <{}> >>",
            hex::encode(&o),
            hex::encode(&u)
        )
        .into_bytes(),
    );
    // Object stream 6 holding object 5 (the /Info dictionary); the Flate
    // payload is then encrypted like any other stream
    let objstm_plain = format!("5 0 << /Title ({}) >>", String::from_utf8_lossy(TITLE));
    let first = 4; // length of the "5 0 " pair header
    let flated = deflate(objstm_plain.as_bytes());
    let objstm_ct = rc4(&object_key(&key, 6, 0, false), &flated);
    {
        let mut body = format!(
            "<< /Type /ObjStm /N 1 /First {first} /Filter /FlateDecode /Length {} >>\nstream\n",
            objstm_ct.len()
        )
        .into_bytes();
        body.extend_from_slice(&objstm_ct);
        body.extend_from_slice(b"\nendstream");
        push(&mut data, &mut offsets, 6, body);
    }

    // Cross-reference stream (object 7, never encrypted)
    let xref_pos = data.len();
    offsets.push((7, xref_pos));
    let mut rows: Vec<u8> = Vec::new();
    let mut row = |t: u8, f1: u32, f2: u8, rows: &mut Vec<u8>| {
        rows.push(t);
        rows.extend_from_slice(&f1.to_be_bytes());
        rows.push(f2);
    };
    row(0, 0, 0, &mut rows); // object 0: free
    for num in 1..=4u32 {
        let off = offsets.iter().find(|(n, _)| *n == num).unwrap().1;
        row(1, off as u32, 0, &mut rows);
    }
    row(2, 6, 0, &mut rows); // object 5 lives in stream 6, index 0
    let off6 = offsets.iter().find(|(n, _)| *n == 6).unwrap().1;
    row(1, off6 as u32, 0, &mut rows);
    row(1, xref_pos as u32, 0, &mut rows); // object 7: this stream
    let off8 = offsets.iter().find(|(n, _)| *n == 8).unwrap().1;
    row(1, off8 as u32, 0, &mut rows);

    let xref_payload = deflate(&rows);
    data.extend_from_slice(
        format!(
            "7 0 obj\n<< /Type /XRef /Size 9 /W [1 4 1] /Filter /FlateDecode \
             /Root 1 0 R /Info 5 0 R /Encrypt 8 0 R /ID [<{id}> <{id}>] /Length {} >>\nstream\n",
            xref_payload.len(),
            id = id_hex()
        )
        .as_bytes(),
    );
    data.extend_from_slice(&xref_payload);
    data.extend_from_slice(b"\nendstream\nendobj\n");
    data.extend_from_slice(format!("startxref\n{xref_pos}\n%%EOF\n").as_bytes());
    data
}

/// A well-formed unencrypted single-page document
pub fn build_plain_pdf() -> Vec<u8> {
    let mut b = PdfBuilder::new();
    b.stream_object(4, "", CONTENT);
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
    b.object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>");
    b.object(3, "<< /Type /Page /Parent 2 0 R /Contents 4 0 R >>");
    b.finish("/Root 1 0 R")
}
