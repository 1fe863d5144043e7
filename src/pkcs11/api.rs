//! The operations we need from a PKCS#11 library.
//!
//! Discovery, key enumeration and aggregation are written against these
//! traits. The `hsm` feature provides the implementation that talks to a
//! real module through `cryptoki`; tests use a scripted mock.
use std::{
    fmt,
    path::{Path, PathBuf},
};

use secrecy::SecretString;

use crate::{auth::method::Signer, error::AuthError};

/// The numeric identifier of a PKCS#11 slot.
pub type SlotId = u64;

//------------ Token ---------------------------------------------------------

/// A token found in a slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub label: String,
    pub slot: SlotId,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}' (slot {})", self.label, self.slot)
    }
}

//------------ KeyId ---------------------------------------------------------

/// The CKA_ID value of a key object.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeyId(Vec<u8>);

impl KeyId {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for KeyId {
    fn from(id: Vec<u8>) -> Self {
        KeyId(id)
    }
}

impl From<&[u8]> for KeyId {
    fn from(id: &[u8]) -> Self {
        KeyId(id.to_vec())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

//------------ SessionConfig -------------------------------------------------

/// What is needed to log in to one token.
///
/// The PIN is fixed at construction.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    provider: PathBuf,
    token: Token,
    pin: SecretString,
}

impl SessionConfig {
    pub fn new(provider: &Path, token: Token, pin: SecretString) -> Self {
        SessionConfig {
            provider: provider.to_path_buf(),
            token,
            pin,
        }
    }

    pub fn provider(&self) -> &Path {
        &self.provider
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn pin(&self) -> &SecretString {
        &self.pin
    }
}

//------------ Pkcs11Api -----------------------------------------------------

/// Entry point into a PKCS#11 provider.
pub trait Pkcs11Api {
    type Discovery: DiscoveryContext;
    type Session: TokenSession;

    /// Opens an unauthenticated context for enumerating slots.
    ///
    /// The context is released when the returned value is dropped.
    fn open_discovery(&self, provider: &Path) -> Result<Self::Discovery, AuthError>;

    /// Opens a serial session on the configured token and logs in.
    fn open_session(&self, config: &SessionConfig) -> Result<Self::Session, AuthError>;
}

/// An unauthenticated view of the slots of a provider.
pub trait DiscoveryContext {
    fn slots(&self) -> Result<Vec<SlotId>, AuthError>;

    /// Reads the label of the token in `slot`.
    ///
    /// Fails if the slot holds no readable token.
    fn token_label(&self, slot: SlotId) -> Result<String, AuthError>;
}

/// An authenticated session on one token.
pub trait TokenSession {
    type Object: Copy + fmt::Debug;
    type KeySigner: Signer + 'static;

    /// Finds at most `limit` RSA private key objects, closing the search
    /// before returning.
    fn find_private_keys(&self, limit: usize) -> Result<Vec<Self::Object>, AuthError>;

    /// Reads the CKA_ID of an object, `None` if it has none.
    fn key_id(&self, object: Self::Object) -> Result<Option<KeyId>, AuthError>;

    /// Turns a key identifier into a signer that signs on the token.
    fn resolve_key(&self, id: &KeyId) -> Result<Self::KeySigner, AuthError>;
}

//------------ Tests ---------------------------------------------------------
