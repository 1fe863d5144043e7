//! Unlocking possibly passphrase protected key files.
//!
//! A passphrase given up front is tried exactly once. Without one, the key
//! is first parsed as unencrypted and only if it turns out to be encrypted
//! is the person at the terminal asked, a bounded number of times.
use std::path::Path;

use crate::{
    auth::{
        keyfile::KeyFileSigner,
        method::AuthMethod,
        prompt::{PassphrasePrompt, TerminalPrompt},
    },
    constants::PASSPHRASE_ATTEMPTS,
    error::AuthError,
    util::file,
};

/// Reads and unlocks the key at `path`, prompting on the terminal if needed.
pub fn unlock_key_file(path: &Path, passphrase: Option<&str>) -> Result<KeyFileSigner, AuthError> {
    unlock_key_file_with(path, passphrase, &mut TerminalPrompt)
}

/// Like [`unlock_key_file`] but returns an auth method.
pub fn unlock_key_file_auth_method(path: &Path, passphrase: Option<&str>) -> Result<AuthMethod, AuthError> {
    unlock_key_file(path, passphrase).map(AuthMethod::public_key)
}

/// Reads and unlocks the key at `path` using the given prompt.
pub fn unlock_key_file_with(
    path: &Path,
    passphrase: Option<&str>,
    prompt: &mut impl PassphrasePrompt,
) -> Result<KeyFileSigner, AuthError> {
    let path = file::abs_path(path)?;
    let data = file::read(&path)?;
    let label = format!("{}'s passphrase:", path.display());
    unlock_key(&data, &label, passphrase, prompt)
}

/// Turns key data into a signer, asking `prompt` for the passphrase at most
/// [`PASSPHRASE_ATTEMPTS`] times if the key is encrypted and no passphrase
/// was given.
pub fn unlock_key(
    data: &[u8],
    label: &str,
    passphrase: Option<&str>,
    prompt: &mut impl PassphrasePrompt,
) -> Result<KeyFileSigner, AuthError> {
    if let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) {
        return KeyFileSigner::from_data(data, Some(passphrase));
    }

    match KeyFileSigner::from_data(data, None) {
        Err(AuthError::PassphraseRequired) => debug!("Key is encrypted, asking for passphrase"),
        res => return res,
    }

    let mut last = AuthError::PassphraseRequired;
    for attempt in 1..=PASSPHRASE_ATTEMPTS {
        let res = match prompt.read_passphrase(label) {
            Ok(entered) => {
                let entered = entered.strip_suffix('\n').unwrap_or(&entered);
                KeyFileSigner::from_data(data, Some(entered))
            }
            Err(e) => Err(AuthError::Prompt(e)),
        };

        match res {
            Ok(signer) => {
                debug!("Key unlocked on attempt {}", attempt);
                return Ok(signer);
            }
            Err(err @ AuthError::UnsupportedKey(_)) => return Err(err),
            Err(err) => {
                prompt.report_failure(&err);
                last = err;
            }
        }
    }

    Err(AuthError::PassphraseExhausted {
        attempts: PASSPHRASE_ATTEMPTS,
        last: Box::new(last),
    })
}

//------------ Tests ---------------------------------------------------------
