//! Chiffrement des mots de passe stockés dans la configuration
//!
//! La clé AES-256 est dérivée de l'identifiant de la machine : le fichier
//! `config.yaml` n'est donc pas portable, mais les mots de passe n'y
//! apparaissent jamais en clair. Format stocké : `encrypted:BASE64(nonce || ciphertext)`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use base64::Engine;
use sha2::{Digest, Sha256};

/// Préfixe pour identifier les mots de passe chiffrés
const ENCRYPTED_PREFIX: &str = "encrypted:";

const KEY_SALT: &[u8] = b"pmocrunchyroll-config-encryption-v1";
const NONCE_SALT: &[u8] = b"pmocrunchyroll-nonce-v1";
const NONCE_LEN: usize = 12;

/// Récupère l'identifiant matériel de la machine
///
/// - Linux : `/etc/machine-id` puis `/var/lib/dbus/machine-id`
/// - macOS : `IOPlatformUUID` via `ioreg`
/// - Windows : `wmic csproduct get UUID`
fn machine_id() -> Result<String> {
    #[cfg(target_os = "linux")]
    {
        ["/etc/machine-id", "/var/lib/dbus/machine-id"]
            .iter()
            .find_map(|p| std::fs::read_to_string(p).ok())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow!("Failed to read machine-id"))
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ioreg")
            .args(["-d2", "-c", "IOPlatformExpertDevice"])
            .output()?;

        // Format: "IOPlatformUUID" = "XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX"
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find(|line| line.contains("IOPlatformUUID"))
            .and_then(|line| line.split('"').nth(3))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Failed to extract IOPlatformUUID from ioreg"))
    }

    #[cfg(target_os = "windows")]
    {
        let output = std::process::Command::new("wmic")
            .args(["csproduct", "get", "UUID"])
            .output()?;

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .nth(1)
            .map(|uuid| uuid.trim().to_string())
            .ok_or_else(|| anyhow!("Failed to extract UUID from wmic"))
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        Err(anyhow!("Unsupported platform for machine id extraction"))
    }
}

/// Dérive la clé AES-256 de la machine courante
fn machine_key() -> Result<[u8; 32]> {
    Ok(derive_key(&machine_id()?))
}

fn derive_key(seed: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(KEY_SALT);
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

// Nonce dérivé du mot de passe : même mot de passe = même valeur chiffrée,
// le fichier de config n'est pas réécrit inutilement.
fn derive_nonce(password: &str) -> [u8; NONCE_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(NONCE_SALT);
    let hash = hasher.finalize();
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&hash[..NONCE_LEN]);
    nonce
}

fn encrypt_with_key(key: &[u8; 32], password: &str) -> Result<String> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let nonce_bytes = derive_nonce(password);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), password.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!(
        "{}{}",
        ENCRYPTED_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(&combined)
    ))
}

fn decrypt_with_key(key: &[u8; 32], encrypted: &str) -> Result<String> {
    let base64_data = encrypted
        .strip_prefix(ENCRYPTED_PREFIX)
        .ok_or_else(|| anyhow!("Invalid encrypted password format (missing prefix)"))?;

    let combined = base64::engine::general_purpose::STANDARD
        .decode(base64_data)
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;

    if combined.len() < NONCE_LEN {
        return Err(anyhow!("Invalid ciphertext (too short)"));
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("Decryption failed (wrong machine or corrupted data): {}", e))?;

    String::from_utf8(plaintext).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
}

/// Chiffre un mot de passe avec la clé de la machine
///
/// Retourne une valeur au format `encrypted:BASE64`.
pub fn encrypt_password(password: &str) -> Result<String> {
    encrypt_with_key(&machine_key()?, password)
}

/// Déchiffre une valeur produite par [`encrypt_password`] sur la même machine
pub fn decrypt_password(encrypted: &str) -> Result<String> {
    decrypt_with_key(&machine_key()?, encrypted)
}

/// Vérifie si une valeur est un mot de passe chiffré
pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Obtient le mot de passe en clair, qu'il soit chiffré ou non
///
/// ```rust,ignore
/// assert_eq!(get_password("my_password")?, "my_password");
/// let clear = get_password("encrypted:SGVsbG8...")?;
/// ```
pub fn get_password(value: &str) -> Result<String> {
    if is_encrypted(value) {
        decrypt_password(value)
    } else {
        Ok(value.to_string())
    }
}
