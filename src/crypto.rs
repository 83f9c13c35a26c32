use aes_gcm::aead::{rand_core::RngCore, Aead, OsRng};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 200_000;
const AUTH_FILE: &str = "auth.json";

/// At-rest format for the encrypted data file.
#[derive(Serialize, Deserialize)]
pub struct CryptoEnvelope {
    pub v: u8,
    pub salt: String,
    pub iv: String,
    pub tag: String,
    pub data: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthRecord {
    pub salt: String,
    pub hash: String,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_iterations() -> u32 {
    DEFAULT_PBKDF2_ITERATIONS
}

pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

pub fn decode_b64(value: &str) -> Result<Vec<u8>, String> {
    B64.decode(value).map_err(|err| err.to_string())
}

pub fn encode_b64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

/// Cache discriminator so a decrypted store is never served to a different password.
pub fn password_fingerprint(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    encode_b64(digest.as_slice())
}

pub fn encrypt_with_key(
    text: &str,
    salt: &[u8],
    key: [u8; 32],
) -> Result<CryptoEnvelope, String> {
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|err| err.to_string())?;
    let mut iv = [0u8; 12];
    OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);
    let sealed = cipher
        .encrypt(nonce, text.as_bytes())
        .map_err(|err| err.to_string())?;
    // aes-gcm appends the 16-byte tag; the envelope stores it separately.
    let split = sealed.len().saturating_sub(16);
    let (body, tag) = sealed.split_at(split);
    Ok(CryptoEnvelope {
        v: 1,
        salt: encode_b64(salt),
        iv: encode_b64(&iv),
        tag: encode_b64(tag),
        data: encode_b64(body),
    })
}

pub fn encrypt_text(text: &str, password: &str) -> Result<CryptoEnvelope, String> {
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(password, &salt, DEFAULT_PBKDF2_ITERATIONS);
    encrypt_with_key(text, &salt, key)
}

pub fn decrypt_envelope_with_key(
    envelope: &CryptoEnvelope,
    key: [u8; 32],
) -> Result<Option<String>, String> {
    let iv = match decode_b64(envelope.iv.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let tag = match decode_b64(envelope.tag.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let body = match decode_b64(envelope.data.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    if iv.len() != 12 {
        return Ok(None);
    }
    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|err| err.to_string())?;
    let mut sealed = body;
    sealed.extend_from_slice(tag.as_slice());
    match cipher.decrypt(Nonce::from_slice(iv.as_slice()), sealed.as_slice()) {
        Ok(plain) => Ok(Some(
            String::from_utf8(plain).map_err(|err| err.to_string())?,
        )),
        Err(_) => Ok(None),
    }
}

/// Returns `Ok(None)` when the password does not open the envelope.
pub fn decrypt_envelope(
    envelope: &CryptoEnvelope,
    password: &str,
) -> Result<Option<String>, String> {
    let salt = match decode_b64(envelope.salt.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };
    let key = derive_key(password, salt.as_slice(), DEFAULT_PBKDF2_ITERATIONS);
    decrypt_envelope_with_key(envelope, key)
}

fn auth_path(root: &Path) -> std::path::PathBuf {
    root.join(AUTH_FILE)
}

pub fn read_auth_record(root: &Path) -> Result<Option<AuthRecord>, String> {
    let path = auth_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|err| err.to_string())?;
    match serde_json::from_str::<AuthRecord>(raw.as_str()) {
        Ok(record) => Ok(Some(record)),
        Err(_) => Ok(None),
    }
}

pub fn write_auth_record(root: &Path, record: &AuthRecord) -> Result<(), String> {
    let content = serde_json::to_string_pretty(record).map_err(|err| err.to_string())?;
    if let Some(parent) = auth_path(root).parent() {
        fs::create_dir_all(parent).map_err(|err| err.to_string())?;
    }
    fs::write(auth_path(root), content).map_err(|err| err.to_string())?;
    Ok(())
}

pub fn setup_auth(root: &Path, password: &str, iterations: Option<u32>) -> Result<AuthRecord, String> {
    if password.is_empty() {
        return Err("Password is required.".to_string());
    }
    let iterations = iterations.unwrap_or(DEFAULT_PBKDF2_ITERATIONS).max(1);
    let mut salt = [0u8; 16];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(password, &salt, iterations);
    let record = AuthRecord {
        salt: encode_b64(&salt),
        hash: encode_b64(key.as_slice()),
        iterations,
    };
    write_auth_record(root, &record)?;
    Ok(record)
}

pub fn verify_auth(root: &Path, password: &str) -> Result<bool, String> {
    let Some(record) = read_auth_record(root)? else {
        return Ok(false);
    };
    if password.is_empty() {
        return Ok(false);
    }
    let salt = match decode_b64(record.salt.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(false),
    };
    let key = derive_key(password, salt.as_slice(), record.iterations.max(1));
    Ok(encode_b64(key.as_slice()) == record.hash)
}

pub fn change_auth(
    root: &Path,
    current: &str,
    next: &str,
    iterations: Option<u32>,
) -> Result<bool, String> {
    let Some(record) = read_auth_record(root)? else {
        return Ok(false);
    };
    if current.is_empty() || next.is_empty() {
        return Ok(false);
    }
    let salt = match decode_b64(record.salt.as_str()) {
        Ok(value) => value,
        Err(_) => return Ok(false),
    };
    let current_key = derive_key(current, salt.as_slice(), record.iterations.max(1));
    if encode_b64(current_key.as_slice()) != record.hash {
        return Ok(false);
    }

    let iterations = iterations.unwrap_or(record.iterations).max(1);
    let mut new_salt = [0u8; 16];
    OsRng.fill_bytes(&mut new_salt);
    let new_key = derive_key(next, &new_salt, iterations);
    let next_record = AuthRecord {
        salt: encode_b64(&new_salt),
        hash: encode_b64(new_key.as_slice()),
        iterations,
    };
    write_auth_record(root, &next_record)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_with_matching_password() {
        let envelope = encrypt_text("{\"audits\":[]}", "hunter2").unwrap();
        let plain = decrypt_envelope(&envelope, "hunter2").unwrap();
        assert_eq!(plain.as_deref(), Some("{\"audits\":[]}"));
    }

    #[test]
    fn wrong_password_yields_none_not_error() {
        let envelope = encrypt_text("payload", "correct").unwrap();
        let plain = decrypt_envelope(&envelope, "incorrect").unwrap();
        assert!(plain.is_none());
    }

    #[test]
    fn auth_setup_verify_and_change() {
        let dir = tempfile::tempdir().unwrap();
        setup_auth(dir.path(), "first", None).unwrap();
        assert!(verify_auth(dir.path(), "first").unwrap());
        assert!(!verify_auth(dir.path(), "second").unwrap());

        assert!(change_auth(dir.path(), "first", "second", None).unwrap());
        assert!(verify_auth(dir.path(), "second").unwrap());
        assert!(!verify_auth(dir.path(), "first").unwrap());

        // Wrong current password never rotates the record.
        assert!(!change_auth(dir.path(), "first", "third", None).unwrap());
        assert!(verify_auth(dir.path(), "second").unwrap());
    }
}
