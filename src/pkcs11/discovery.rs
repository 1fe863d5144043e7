//! Finding the tokens of a provider without logging in.
use std::path::Path;

use crate::{
    error::AuthError,
    pkcs11::api::{DiscoveryContext, Pkcs11Api, Token},
};

/// Lists the tokens present in the slots of `provider`.
///
/// Slots whose token information cannot be read are left out. The discovery
/// context is gone by the time this returns.
pub fn discover_tokens<A: Pkcs11Api>(api: &A, provider: &Path) -> Result<Vec<Token>, AuthError> {
    let context = api.open_discovery(provider)?;
    let slots = context.slots()?;

    let mut tokens = Vec::new();
    for slot in slots {
        match context.token_label(slot) {
            Ok(label) => {
                trace!("Found token '{}' in slot {}", label, slot);
                tokens.push(Token { label, slot });
            }
            Err(err) => debug!("Ignoring slot {}: {}", slot, err),
        }
    }

    drop(context);
    debug!("Found {} token(s) using '{}'", tokens.len(), provider.display());
    Ok(tokens)
}

/// Returns the only token of `provider`.
///
/// Unlike aggregation, this refuses setups with no token or several.
pub fn discover_single_token<A: Pkcs11Api>(api: &A, provider: &Path) -> Result<Token, AuthError> {
    let mut tokens = discover_tokens(api, provider)?;
    match tokens.len() {
        1 => Ok(tokens.remove(0)),
        n => Err(AuthError::TokenCount(n)),
    }
}

//------------ Tests ---------------------------------------------------------
