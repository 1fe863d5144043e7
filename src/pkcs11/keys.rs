//! Logging in to a token and listing its private keys.
use std::path::Path;

use secrecy::SecretString;

use crate::{
    constants::MAX_TOKEN_KEY_OBJECTS,
    error::AuthError,
    pkcs11::api::{KeyId, Pkcs11Api, SessionConfig, Token, TokenSession},
};

/// Opens an authenticated session on `token`.
pub fn open_token_session<A: Pkcs11Api>(
    api: &A,
    provider: &Path,
    token: &Token,
    pin: &SecretString,
) -> Result<A::Session, AuthError> {
    let config = SessionConfig::new(provider, token.clone(), pin.clone());
    let session = api.open_session(&config)?;
    debug!("Logged in to token {}", token);
    Ok(session)
}

/// Lists the identifiers of the RSA private keys visible in `session`, in
/// the order the token reports them.
///
/// Objects without an identifier are skipped.
pub fn discover_key_ids<S: TokenSession>(session: &S) -> Result<Vec<KeyId>, AuthError> {
    let objects = session.find_private_keys(MAX_TOKEN_KEY_OBJECTS)?;

    let mut ids = Vec::with_capacity(objects.len());
    for object in objects {
        match session.key_id(object)? {
            Some(id) => ids.push(id),
            None => warn!("Ignoring private key object {:?} without CKA_ID", object),
        }
    }
    Ok(ids)
}

//------------ Tests ---------------------------------------------------------
