//! Signing credentials for SSH clients.
//!
//! Credentials come from passwords, private key files (unlocked on the
//! terminal if needed), OpenSSH certificates, SSH agents and keys held on
//! PKCS#11 tokens. Each ends up as a [`Signer`] or an [`AuthMethod`] for the
//! SSH transport to use.
//!
//! [`Signer`]: auth::Signer
//! [`AuthMethod`]: auth::AuthMethod

#[macro_use]
extern crate log;

pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod pkcs11;
pub mod util;

pub use self::auth::{
    AgentHandle, AuthMethod, Signer,
    agent::Agent,
    cert::{CertificateSigner, auth_method_from_certificate},
    keyfile::{KeyFileSigner, auth_method_from_key_file},
    unlock::{unlock_key_file, unlock_key_file_auth_method},
};
pub use self::error::AuthError;
