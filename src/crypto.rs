use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha1::{Digest, Sha1};

use crate::error::{NusError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const ZERO_IV: [u8; 16] = [0; 16];

/// AES-128-CBC decrypt `buf` in place. `buf` must be a whole number of blocks.
pub fn decrypt_cbc(key: &[u8; 16], iv: &[u8; 16], buf: &mut [u8]) -> Result<()> {
    Aes128CbcDec::new(&(*key).into(), &(*iv).into())
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| NusError::CouldNotDecrypt)?;
    Ok(())
}

/// AES-128-CBC encrypt `buf` in place. `buf` must be a whole number of blocks.
pub fn encrypt_cbc(key: &[u8; 16], iv: &[u8; 16], buf: &mut [u8]) -> Result<()> {
    let len = buf.len();
    Aes128CbcEnc::new(&(*key).into(), &(*iv).into())
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| NusError::CouldNotDecrypt)?;
    Ok(())
}

pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}
