//! Signers that present an OpenSSH certificate.
use std::{
    fmt,
    path::{Path, PathBuf},
};

use base64::engine::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use ssh_key::{Certificate, PublicKey, Signature};

use crate::{
    auth::method::{AuthMethod, Signer},
    error::AuthError,
    util::file,
};

const CERT_ALGORITHM_SUFFIX: &str = "-cert-v01@openssh.com";

//------------ CertificateSigner ---------------------------------------------

/// A private key signer bound to a certificate for its public key.
///
/// The certificate is presented exactly as it was issued, so `encoded` keeps
/// the wire form the CA signed.
pub struct CertificateSigner {
    certificate: Certificate,
    encoded: Vec<u8>,
    signer: Box<dyn Signer>,
}

impl CertificateSigner {
    /// Binds `certificate` to `signer`.
    ///
    /// Fails if the certificate was issued for a different key.
    pub fn new(certificate: Certificate, signer: Box<dyn Signer>) -> Result<Self, AuthError> {
        let encoded = certificate.to_bytes()?;
        Self::bind(certificate, encoded, signer)
    }

    /// Reads the certificate at `path` and binds it to `signer`.
    pub fn from_file(path: &Path, signer: Box<dyn Signer>) -> Result<Self, AuthError> {
        let (certificate, encoded) = read_certificate_file(path)?;
        Self::bind(certificate, encoded, signer)
    }

    fn bind(certificate: Certificate, encoded: Vec<u8>, signer: Box<dyn Signer>) -> Result<Self, AuthError> {
        if certificate.public_key() != signer.public_key().key_data() {
            return Err(AuthError::CertificateKeyMismatch);
        }
        Ok(CertificateSigner {
            certificate,
            encoded,
            signer,
        })
    }
}

impl Signer for CertificateSigner {
    fn public_key(&self) -> &PublicKey {
        self.signer.public_key()
    }

    fn sign(&self, data: &[u8]) -> Result<Signature, AuthError> {
        self.signer.sign(data)
    }

    fn certificate(&self) -> Option<&Certificate> {
        Some(&self.certificate)
    }

    fn certificate_blob(&self) -> Option<&[u8]> {
        Some(&self.encoded)
    }
}

impl fmt::Debug for CertificateSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateSigner")
            .field("key_id", &self.certificate.key_id())
            .field("signer", &self.signer)
            .finish()
    }
}

/// Builds a public key auth method that presents the certificate at `path`.
pub fn auth_method_from_certificate(path: &Path, signer: Box<dyn Signer>) -> Result<AuthMethod, AuthError> {
    CertificateSigner::from_file(path, signer).map(AuthMethod::public_key)
}

//------------ Parsing -------------------------------------------------------

/// Reads an OpenSSH certificate in authorized_keys line format.
///
/// A file holding a plain public key is rejected with
/// [`AuthError::CertificateTypeMismatch`].
///
/// Validity times past the year 292277026596, which includes the
/// "forever" of certificates issued without an end date, are capped at
/// `i64::MAX` seconds.
pub fn read_certificate(path: &Path) -> Result<Certificate, AuthError> {
    read_certificate_file(path).map(|(certificate, _)| certificate)
}

fn read_certificate_file(path: &Path) -> Result<(Certificate, Vec<u8>), AuthError> {
    let path = file::abs_path(path)?;
    let data = file::read(&path)?;
    let text = String::from_utf8(data).map_err(|_| AuthError::key_parse("certificate file is not text"))?;
    parse_certificate(&text, &path)
}

/// Returns the decoded certificate together with its wire encoding.
fn parse_certificate(text: &str, path: &Path) -> Result<(Certificate, Vec<u8>), AuthError> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .ok_or_else(|| AuthError::key_parse("no public key or certificate found"))?;

    let mut fields = line.split_whitespace();
    let algorithm = fields.next().unwrap_or_default();
    if !algorithm.ends_with(CERT_ALGORITHM_SUFFIX) {
        return match PublicKey::from_openssh(line) {
            Ok(_) => Err(AuthError::CertificateTypeMismatch(PathBuf::from(path))),
            Err(e) => Err(e.into()),
        };
    }

    let encoded = BASE64_ENGINE
        .decode(fields.next().unwrap_or_default())
        .map_err(|e| AuthError::key_parse(format!("certificate is not base64: {}", e)))?;

    let mut clamped = encoded.clone();
    clamp_validity(&mut clamped)?;
    let certificate = Certificate::from_bytes(&clamped)?;
    let decoded_type = certificate.algorithm().to_certificate_type();
    if decoded_type != algorithm {
        return Err(AuthError::key_parse(format!(
            "certificate type {} does not match {}",
            decoded_type, algorithm
        )));
    }
    Ok((certificate, encoded))
}

//------------ Validity clamping ---------------------------------------------

/// Caps `valid_after` and `valid_before` of an encoded certificate at
/// `i64::MAX`, the largest time the decoder accepts.
///
/// Certificate types we do not know are left alone.
fn clamp_validity(blob: &mut [u8]) -> Result<(), AuthError> {
    let mut reader = WireReader { data: &*blob, pos: 0 };
    let cert_type = reader.string()?;
    let key_fields = match cert_type {
        b"ssh-ed25519-cert-v01@openssh.com" => 1,
        b"ssh-rsa-cert-v01@openssh.com"
        | b"ecdsa-sha2-nistp256-cert-v01@openssh.com"
        | b"ecdsa-sha2-nistp384-cert-v01@openssh.com"
        | b"ecdsa-sha2-nistp521-cert-v01@openssh.com"
        | b"sk-ssh-ed25519-cert-v01@openssh.com" => 2,
        b"sk-ecdsa-sha2-nistp256-cert-v01@openssh.com" => 3,
        b"ssh-dss-cert-v01@openssh.com" => 4,
        _ => return Ok(()),
    };

    // nonce, public key, serial, type, key id, principals
    reader.string()?;
    for _ in 0..key_fields {
        reader.string()?;
    }
    reader.take(8 + 4)?;
    reader.string()?;
    reader.string()?;

    let validity = reader.pos;
    reader.take(16)?;
    for field in blob[validity..validity + 16].chunks_exact_mut(8) {
        let mut value = [0u8; 8];
        value.copy_from_slice(field);
        let value = u64::from_be_bytes(value).min(i64::MAX as u64);
        field.copy_from_slice(&value.to_be_bytes());
    }
    Ok(())
}

struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], AuthError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| AuthError::key_parse("certificate is truncated"))?;
        let res = &self.data[self.pos..end];
        self.pos = end;
        Ok(res)
    }

    fn string(&mut self) -> Result<&'a [u8], AuthError> {
        let mut len = [0u8; 4];
        len.copy_from_slice(self.take(4)?);
        self.take(u32::from_be_bytes(len) as usize)
    }
}

//------------ Tests ---------------------------------------------------------
