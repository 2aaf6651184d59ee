use crate::crypto::{decrypt_cbc, encrypt_cbc};
use crate::error::{NusError, Result};

fn title_key_iv(title_id: u64) -> [u8; 16] {
    let mut iv = [0; 16];
    iv[..8].copy_from_slice(&title_id.to_be_bytes());
    iv
}

fn key_16(key: &[u8], what: &'static str) -> Result<[u8; 16]> {
    key.try_into()
        .map_err(|_| NusError::UnexpectedSize(what, 16, key.len()))
}

/// Unwrap a ticket's title key with the common key.
///
/// The IV is the big-endian title id followed by eight zero bytes.
pub fn decrypt_title_key(
    common_key: &[u8],
    encrypted_key: &[u8],
    title_id: u64,
) -> Result<[u8; 16]> {
    let common_key = key_16(common_key, "common key")?;
    let mut title_key = key_16(encrypted_key, "encrypted title key")?;
    decrypt_cbc(&common_key, &title_key_iv(title_id), &mut title_key)?;
    Ok(title_key)
}

/// Inverse of [`decrypt_title_key`].
pub fn encrypt_title_key(common_key: &[u8], title_key: &[u8], title_id: u64) -> Result<[u8; 16]> {
    let common_key = key_16(common_key, "common key")?;
    let mut encrypted = key_16(title_key, "title key")?;
    encrypt_cbc(&common_key, &title_key_iv(title_id), &mut encrypted)?;
    Ok(encrypted)
}
