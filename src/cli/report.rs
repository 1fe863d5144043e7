//! Turning results into text for the terminal.
use std::fmt::Write;

use crate::{
    auth::method::Signer,
    error::AuthError,
    pkcs11::{Harvest, Token},
};

pub fn tokens(tokens: &[Token]) -> String {
    let mut res = String::new();
    if tokens.is_empty() {
        res.push_str("No tokens found\n");
    }
    for token in tokens {
        let _ = writeln!(res, "{:>4}  {}", token.slot, token.label);
    }
    res
}

/// One OpenSSH public key line per signer, followed by what was skipped.
pub fn harvest(harvest: &Harvest) -> Result<String, AuthError> {
    let mut res = String::new();
    for signer in &harvest.signers {
        res.push_str(&public_key_line(signer.as_ref())?);
        res.push('\n');
    }

    let _ = writeln!(
        res,
        "# {} signer(s) from {} of {} token(s)",
        harvest.signers.len(),
        harvest.tokens_succeeded,
        harvest.tokens_attempted
    );
    for skipped in &harvest.skipped {
        let _ = writeln!(res, "# skipped {}", skipped);
    }
    Ok(res)
}

/// The public key of a signer and, if it has one, its certificate.
pub fn signer(signer: &dyn Signer) -> Result<String, AuthError> {
    let mut res = public_key_line(signer)?;
    res.push('\n');

    if let Some(cert) = signer.certificate() {
        let _ = writeln!(
            res,
            "# certificate '{}' serial {} for {}",
            cert.key_id(),
            cert.serial(),
            cert.valid_principals().join(",")
        );
    }
    Ok(res)
}

fn public_key_line(signer: &dyn Signer) -> Result<String, AuthError> {
    signer
        .public_key()
        .to_openssh()
        .map_err(|e| AuthError::KeyParse(format!("cannot encode public key: {}", e)))
}

//------------ Tests ---------------------------------------------------------
