//! The signer and authentication method shapes handed to the SSH transport.

use std::fmt;

use secrecy::SecretString;
use ssh_key::{Certificate, PublicKey, Signature};

use crate::error::AuthError;

//------------ Signer --------------------------------------------------------

/// Produces SSH signatures with a private key it never exposes.
pub trait Signer: fmt::Debug + Send + Sync {
    /// The public half of the signing key.
    fn public_key(&self) -> &PublicKey;

    /// Signs `data`, returning the signature in its SSH wire algorithm.
    fn sign(&self, data: &[u8]) -> Result<Signature, AuthError>;

    /// The certificate to present instead of the bare public key, if any.
    fn certificate(&self) -> Option<&Certificate> {
        None
    }

    /// The certificate in the wire form it was issued in.
    fn certificate_blob(&self) -> Option<&[u8]> {
        None
    }
}

impl<S: Signer + ?Sized> Signer for Box<S> {
    fn public_key(&self) -> &PublicKey {
        (**self).public_key()
    }

    fn sign(&self, data: &[u8]) -> Result<Signature, AuthError> {
        (**self).sign(data)
    }

    fn certificate(&self) -> Option<&Certificate> {
        (**self).certificate()
    }

    fn certificate_blob(&self) -> Option<&[u8]> {
        (**self).certificate_blob()
    }
}

//------------ AuthMethod ----------------------------------------------------

/// One way of authenticating, as consumed by the transport.
#[derive(Debug)]
pub enum AuthMethod {
    Password(SecretString),
    PublicKey(Box<dyn Signer>),
}

impl AuthMethod {
    pub fn password(password: &str) -> Self {
        AuthMethod::Password(SecretString::new(password.to_string()))
    }

    pub fn public_key<S: Signer + 'static>(signer: S) -> Self {
        AuthMethod::PublicKey(Box::new(signer))
    }

    /// Returns the signer for public key methods.
    pub fn signer(&self) -> Option<&dyn Signer> {
        match self {
            AuthMethod::Password(_) => None,
            AuthMethod::PublicKey(signer) => Some(signer.as_ref()),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthMethod::Password(_) => write!(f, "password"),
            AuthMethod::PublicKey(signer) => match signer.certificate() {
                Some(cert) => write!(
                    f,
                    "publickey {} (certificate '{}')",
                    cert.algorithm().to_certificate_type(),
                    cert.key_id()
                ),
                None => write!(f, "publickey {}", signer.public_key().algorithm()),
            },
        }
    }
}

//------------ Tests ---------------------------------------------------------
