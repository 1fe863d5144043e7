//! Signers backed by keys on PKCS#11 tokens.
//!
//! A provider is first enumerated without logging in. Each token found is
//! then logged in to separately and every RSA private key on it becomes a
//! signer. Tokens and keys that cannot be used are skipped.
pub mod aggregate;
pub mod api;
pub mod discovery;
pub mod keys;

#[cfg(feature = "hsm")]
mod context;
#[cfg(feature = "hsm")]
pub mod driver;
#[cfg(feature = "hsm")]
pub mod session;
#[cfg(feature = "hsm")]
pub mod signer;

#[cfg(test)]
pub(crate) mod mock;

pub use self::aggregate::{Harvest, Skipped, collect_auth_methods, collect_signers};
pub use self::api::{KeyId, Pkcs11Api, SessionConfig, SlotId, Token};
pub use self::discovery::{discover_single_token, discover_tokens};

#[cfg(feature = "hsm")]
pub use self::driver::CryptokiDriver;

#[cfg(feature = "hsm")]
mod hsm {
    use std::path::Path;

    use secrecy::SecretString;

    use crate::{auth::method::AuthMethod, error::AuthError, util::file};

    use super::{CryptokiDriver, Harvest, Token, aggregate, discovery};

    /// Lists the tokens of the PKCS#11 module at `provider`.
    pub fn tokens(provider: &Path) -> Result<Vec<Token>, AuthError> {
        discovery::discover_tokens(&CryptokiDriver, &file::abs_path(provider)?)
    }

    /// Returns the only token of the module at `provider`.
    pub fn single_token(provider: &Path) -> Result<Token, AuthError> {
        discovery::discover_single_token(&CryptokiDriver, &file::abs_path(provider)?)
    }

    /// Collects a signer for every RSA key on every token of `provider`.
    pub fn signers(provider: &Path, pin: &SecretString) -> Result<Harvest, AuthError> {
        aggregate::collect_signers(&CryptokiDriver, &file::abs_path(provider)?, pin)
    }

    pub fn auth_methods(provider: &Path, pin: &SecretString) -> Result<Vec<AuthMethod>, AuthError> {
        signers(provider, pin).map(Harvest::into_auth_methods)
    }
}

#[cfg(feature = "hsm")]
pub use self::hsm::{auth_methods, signers, single_token, tokens};
