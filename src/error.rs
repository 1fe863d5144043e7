//! Defines all errors produced while building credentials.

use std::{fmt, io, path::PathBuf};

use openssl::error::ErrorStack;

//------------ IoError -------------------------------------------------------

/// An I/O error together with what we were trying to do at the time.
#[derive(Debug)]
pub struct IoError {
    context: String,
    cause: io::Error,
}

impl IoError {
    pub fn new(context: String, cause: io::Error) -> Self {
        IoError { context, cause }
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.cause.kind()
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

//------------ AuthError -----------------------------------------------------

#[derive(Debug)]
pub enum AuthError {
    /// A key, certificate or provider file could not be read.
    FileUnreadable(IoError),

    /// Key data is malformed or could not be decrypted with the given
    /// passphrase.
    KeyParse(String),

    /// The key decoded fine but is of a type we cannot sign with.
    UnsupportedKey(String),

    /// The key is passphrase protected and no passphrase was given.
    PassphraseRequired,

    /// Every interactive passphrase attempt failed.
    PassphraseExhausted { attempts: usize, last: Box<AuthError> },

    /// The passphrase prompt could not be shown or read.
    Prompt(io::Error),

    /// The file holds a plain public key where a certificate was expected.
    CertificateTypeMismatch(PathBuf),

    /// The certificate does not certify the key of the given signer.
    CertificateKeyMismatch,

    /// The single token lookup found zero or more than one token.
    TokenCount(usize),

    /// A call into the PKCS#11 library failed.
    Driver(String),

    /// A key found on a token could not be turned into a signer.
    KeyResolution(String),

    /// A signer could not produce a signature.
    Signing(String),

    /// The agent could not list its signers.
    Agent(String),
}

impl AuthError {
    pub fn driver(msg: impl fmt::Display) -> Self {
        AuthError::Driver(msg.to_string())
    }

    pub fn key_parse(msg: impl fmt::Display) -> Self {
        AuthError::KeyParse(msg.to_string())
    }

    /// Reports any failure while turning a token key into a signer as
    /// [`AuthError::KeyResolution`], prefixed with `key`.
    pub fn into_key_resolution(self, key: impl fmt::Display) -> Self {
        match self {
            AuthError::KeyResolution(_) => self,
            other => AuthError::KeyResolution(format!("{}: {}", key, other)),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::FileUnreadable(e) => e.fmt(f),
            AuthError::KeyParse(e) => write!(f, "Could not parse key: {}", e),
            AuthError::UnsupportedKey(e) => write!(f, "Unsupported key type: {}", e),
            AuthError::PassphraseRequired => write!(f, "Key is passphrase protected"),
            AuthError::PassphraseExhausted { attempts, last } => {
                write!(f, "Could not unlock key after {} attempts: {}", attempts, last)
            }
            AuthError::Prompt(e) => write!(f, "Could not read passphrase: {}", e),
            AuthError::CertificateTypeMismatch(path) => {
                write!(f, "File '{}' does not contain a certificate", path.display())
            }
            AuthError::CertificateKeyMismatch => write!(f, "Signer and certificate have different public keys"),
            AuthError::TokenCount(0) => write!(f, "No token found"),
            AuthError::TokenCount(n) => write!(f, "Single token only, found {} tokens", n),
            AuthError::Driver(e) => write!(f, "PKCS#11 error: {}", e),
            AuthError::KeyResolution(e) => write!(f, "Could not use token key: {}", e),
            AuthError::Signing(e) => write!(f, "Signing failed: {}", e),
            AuthError::Agent(e) => write!(f, "Agent error: {}", e),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuthError::FileUnreadable(e) => Some(e),
            AuthError::Prompt(e) => Some(e),
            AuthError::PassphraseExhausted { last, .. } => Some(last.as_ref()),
            _ => None,
        }
    }
}

impl From<IoError> for AuthError {
    fn from(e: IoError) -> Self {
        AuthError::FileUnreadable(e)
    }
}

impl From<ErrorStack> for AuthError {
    fn from(e: ErrorStack) -> Self {
        AuthError::KeyParse(e.to_string())
    }
}

impl From<ssh_key::Error> for AuthError {
    fn from(e: ssh_key::Error) -> Self {
        match e {
            ssh_key::Error::Encrypted => AuthError::PassphraseRequired,
            ssh_key::Error::Crypto => AuthError::KeyParse("incorrect passphrase or corrupt key".to_string()),
            other => AuthError::KeyParse(other.to_string()),
        }
    }
}

#[cfg(feature = "hsm")]
impl From<cryptoki::error::Error> for AuthError {
    fn from(e: cryptoki::error::Error) -> Self {
        AuthError::Driver(e.to_string())
    }
}

//------------ Tests ---------------------------------------------------------
