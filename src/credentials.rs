//! Gemini API key storage
//!
//! The key is looked up in the configuration first, then the OS keychain,
//! then the plaintext file older versions wrote. When none has it the user
//! is asked once and the answer is saved (keychain, or a 0600 file when no
//! keychain is available).

use keyring::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cancel::CancelFlag;
use crate::config::{config_dir, AppConfig};
use crate::console::{self, Input};
use crate::drive::auth::write_private;
use crate::error::AppError;

const SERVICE_NAME: &str = "driver-organizer";
const GEMINI_ACCOUNT: &str = "gemini_api_key";

/// Where a key was found or stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Config,
    Keychain,
    File(PathBuf),
    Prompt,
}

/// Legacy plaintext key file
pub fn key_file_path() -> PathBuf {
    config_dir().join(GEMINI_ACCOUNT)
}

/// Credential manager using the OS keychain with a file fallback
pub struct CredentialManager;

impl CredentialManager {
    /// Get the API key from the keychain, then from the key file
    pub fn load_api_key() -> Option<(String, KeySource)> {
        if let Ok(entry) = Entry::new(SERVICE_NAME, GEMINI_ACCOUNT) {
            match entry.get_password() {
                Ok(key) if !key.trim().is_empty() => {
                    tracing::debug!("Gemini API key loaded from keychain");
                    return Some((key.trim().to_string(), KeySource::Keychain));
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "No Gemini API key in keychain"),
            }
        }

        let path = key_file_path();
        match load_key_file(&path) {
            Ok(Some(key)) => {
                tracing::debug!(path = %path.display(), "Gemini API key loaded from file");
                Some((key, KeySource::File(path)))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read API key file");
                None
            }
        }
    }

    /// Store the API key in the keychain, falling back to the key file
    pub fn store_api_key(key: &str) -> Result<KeySource, AppError> {
        match Entry::new(SERVICE_NAME, GEMINI_ACCOUNT) {
            Ok(entry) => match entry.set_password(key) {
                Ok(()) if Self::keychain_persists(key) => {
                    tracing::info!("Gemini API key stored in keychain");
                    return Ok(KeySource::Keychain);
                }
                Ok(()) => tracing::warn!("Keychain does not persist on this platform, using key file"),
                Err(e) => tracing::warn!(error = %e, "Keychain write failed, using key file"),
            },
            Err(e) => tracing::warn!(error = %e, "Keychain unavailable, using key file"),
        }

        let path = key_file_path();
        save_key_file(&path, key)?;
        Ok(KeySource::File(path))
    }

    /// Read back through a fresh entry; the in-memory fallback store only
    /// answers the entry that wrote the secret
    fn keychain_persists(key: &str) -> bool {
        Entry::new(SERVICE_NAME, GEMINI_ACCOUNT)
            .and_then(|entry| entry.get_password())
            .map(|stored| stored == key)
            .unwrap_or(false)
    }
}

/// Trimmed key from `path`; `None` when the file is missing or blank
pub fn load_key_file(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let key = text.trim();
            Ok((!key.is_empty()).then(|| key.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn save_key_file(path: &Path, key: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    write_private(path, key.trim().as_bytes())
}

/// Resolve the Gemini API key, asking the user as a last resort
pub async fn ensure_gemini_api_key(config: &AppConfig, cancel: &CancelFlag) -> Result<(String, KeySource), AppError> {
    let configured = config.gemini_api_key.trim();
    if !configured.is_empty() {
        return Ok((configured.to_string(), KeySource::Config));
    }

    if let Some(found) = CredentialManager::load_api_key() {
        println!("🔑 Gemini API key loaded.");
        return Ok(found);
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🔑 Gemini API key setup\n");
    println!("  You need an API key from Google AI Studio.");
    println!("  Get one for free at: https://aistudio.google.com/apikey\n");

    let key = match console::read_line("  Paste your API key here: ", cancel).await? {
        Input::Line(line) => line.trim().to_string(),
        Input::Eof | Input::Cancelled => String::new(),
    };
    if key.is_empty() {
        return Err(AppError::Setup("Gemini API key cannot be empty".to_string()));
    }

    match CredentialManager::store_api_key(&key) {
        Ok(KeySource::File(path)) => println!("  ✅ API key saved to: {}", path.display()),
        Ok(_) => println!("  ✅ API key saved to the system keychain"),
        Err(e) => tracing::warn!(error = %e, "Could not save the API key"),
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    Ok((key, KeySource::Prompt))
}
