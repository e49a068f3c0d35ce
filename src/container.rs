//! Legacy encrypted container codec.
//!
//! Wire layout, outermost first:
//!
//! | bytes | content                                  |
//! |-------|------------------------------------------|
//! | 4     | magic `NMSB`                             |
//! | 2     | format version, big endian (3 or 4)      |
//! | 2     | reserved, zero                           |
//! | 16    | CBC initialisation vector                |
//! | rest  | AES-128-CBC ciphertext, PKCS#7 padded    |
//!
//! The plaintext begins with the sentinel `TRUE` followed by a big-endian
//! `u32` of caller-defined metadata, then the UTF-8 JSON document. The key is
//! fixed by the on-disk format; the sentinel is what tells a successful
//! decryption apart from garbage produced by a corrupted frame.

use aes::Aes128;
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use serde_json::Value;

use crate::error::{CollectError, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

pub const MAGIC: [u8; 4] = *b"NMSB";
pub const HEADER_LEN: usize = 8;
pub const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

/// Versions this codec reads; writes always use the newest.
const READ_VERSIONS: [u16; 2] = [3, 4];
const WRITE_VERSION: u16 = 4;

/// Format-defined key, shared by every container of this lineage.
const KEY: [u8; 16] = [
    50, 157, 178, 201, 92, 88, 222, 74, 199, 17, 57, 148, 162, 127, 97, 177,
];

const SENTINEL: [u8; 4] = *b"TRUE";

/// Decoded contents of a container frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// Opaque caller metadata carried next to the document.
    pub user_data: u32,
    /// The embedded JSON document, key order preserved.
    pub document: Value,
}

/// Cheap probe used by format sniffing; does not validate beyond the magic.
#[must_use]
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && bytes[..MAGIC.len()] == MAGIC
}

/// Decodes and decrypts a container frame.
pub fn decode(bytes: &[u8]) -> Result<Container> {
    if bytes.len() < HEADER_LEN + IV_LEN {
        return Err(CollectError::TruncatedInput {
            context: "container header",
        });
    }
    if bytes[..4] != MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(&bytes[..4]);
        return Err(CollectError::UnsupportedContainer { found });
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if !READ_VERSIONS.contains(&version) {
        return Err(CollectError::UnsupportedVersion { version });
    }

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&bytes[HEADER_LEN..HEADER_LEN + IV_LEN]);

    let ciphertext = &bytes[HEADER_LEN + IV_LEN..];
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CollectError::TruncatedInput {
            context: "container ciphertext",
        });
    }

    let plaintext = Aes128CbcDec::new(&KEY.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CollectError::DecryptionFailed)?;

    if plaintext.len() < SENTINEL.len() + 4 || plaintext[..SENTINEL.len()] != SENTINEL {
        return Err(CollectError::DecryptionFailed);
    }
    let user_data = u32::from_be_bytes([plaintext[4], plaintext[5], plaintext[6], plaintext[7]]);
    let document = serde_json::from_slice(&plaintext[SENTINEL.len() + 4..])?;

    Ok(Container {
        user_data,
        document,
    })
}

/// Encrypts and frames a document. The IV is freshly random per call, so two
/// encodings of the same document differ byte-wise but decode identically.
pub fn encode(document: &Value, user_data: u32) -> Result<Vec<u8>> {
    let json = serde_json::to_string(document)?;

    let mut plaintext = Vec::with_capacity(SENTINEL.len() + 4 + json.len());
    plaintext.extend_from_slice(&SENTINEL);
    plaintext.extend_from_slice(&user_data.to_be_bytes());
    plaintext.extend_from_slice(json.as_bytes());

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let ciphertext =
        Aes128CbcEnc::new(&KEY.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

    let mut out = Vec::with_capacity(HEADER_LEN + IV_LEN + ciphertext.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&WRITE_VERSION.to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_a_document() {
        let document = json!({"3?K": {"LID": "", "UID": "OWNER"}, "NKm": 7});
        let bytes = encode(&document, 4155).unwrap();
        assert_eq!(&bytes[..4], b"NMSB");
        assert_eq!(&bytes[4..8], &[0, 4, 0, 0]);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.user_data, 4155);
        assert_eq!(decoded.document, document);
    }

    #[test]
    fn fresh_ivs_still_decode_identically() {
        let document = json!({"k": [1, 2, 3]});
        let a = encode(&document, 1).unwrap();
        let b = encode(&document, 1).unwrap();
        assert_ne!(a, b);
        assert_eq!(decode(&a).unwrap(), decode(&b).unwrap());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = encode(&json!({}), 0).unwrap();
        bytes[0] = b'X';
        assert!(matches!(
            decode(&bytes),
            Err(CollectError::UnsupportedContainer { found }) if &found[1..] == b"MSB"
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = encode(&json!({}), 0).unwrap();
        bytes[5] = 9;
        assert!(matches!(
            decode(&bytes),
            Err(CollectError::UnsupportedVersion { version: 9 })
        ));
    }

    #[test]
    fn rejects_truncated_frames() {
        let bytes = encode(&json!({"a": 1}), 0).unwrap();
        assert!(matches!(
            decode(&bytes[..10]),
            Err(CollectError::TruncatedInput { .. })
        ));
        // Chopping mid-block leaves a non-multiple ciphertext length.
        assert!(matches!(
            decode(&bytes[..bytes.len() - 5]),
            Err(CollectError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn flipped_ciphertext_fails_closed() {
        let mut bytes = encode(&json!({"a": 1}), 0).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CollectError::DecryptionFailed | CollectError::MalformedPayload { .. }
        ));
    }

    #[test]
    fn reads_version_three_frames() {
        let mut bytes = encode(&json!({"v": 3}), 0).unwrap();
        bytes[5] = 3;
        assert_eq!(decode(&bytes).unwrap().document, json!({"v": 3}));
    }
}
