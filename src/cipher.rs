// AES-128-CBC with PKCS#7 padding
use crate::{DhError, Result, SymmetricKey};

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

pub const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub fn encrypt_aes_128_cbc(
    plaintext: &[u8],
    key: &SymmetricKey,
    iv: &[u8; BLOCK_SIZE],
) -> Vec<u8> {
    Aes128CbcEnc::new(&(*key).into(), &(*iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

pub fn decrypt_aes_128_cbc(
    ciphertext: &[u8],
    key: &SymmetricKey,
    iv: &[u8; BLOCK_SIZE],
) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(DhError::Decrypt(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }
    Aes128CbcDec::new(&(*key).into(), &(*iv).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| DhError::Decrypt("invalid pkcs7 padding".to_string()))
}
