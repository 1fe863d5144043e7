//! Collecting every signer a provider can give us.
//!
//! Tokens and keys that fail are skipped and recorded, they never fail the
//! whole collection. Only a provider that cannot be enumerated at all is an
//! error, so an empty [`Harvest`] is a valid outcome and callers needing at
//! least one signer must check for it.
use std::{fmt, path::Path};

use secrecy::SecretString;

use crate::{
    auth::method::{AuthMethod, Signer},
    error::AuthError,
    pkcs11::{
        api::{KeyId, Pkcs11Api, Token, TokenSession},
        discovery::discover_tokens,
        keys::{discover_key_ids, open_token_session},
    },
};

//------------ Skipped -------------------------------------------------------

/// A token, or a key on a token, that did not produce a signer.
#[derive(Debug)]
pub struct Skipped {
    pub token: Token,
    pub key: Option<KeyId>,
    pub reason: AuthError,
}

impl fmt::Display for Skipped {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "key {} on token {}: {}", key, self.token, self.reason),
            None => write!(f, "token {}: {}", self.token, self.reason),
        }
    }
}

//------------ Harvest -------------------------------------------------------

/// The result of one collection pass over a provider.
#[derive(Debug, Default)]
pub struct Harvest {
    /// Signers in token order, then key order within a token.
    pub signers: Vec<Box<dyn Signer>>,
    pub skipped: Vec<Skipped>,
    pub tokens_attempted: usize,
    pub tokens_succeeded: usize,
}

impl Harvest {
    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Whether tokens were found but none could be used.
    pub fn all_tokens_failed(&self) -> bool {
        self.tokens_attempted > 0 && self.tokens_succeeded == 0
    }

    pub fn into_auth_methods(self) -> Vec<AuthMethod> {
        self.signers.into_iter().map(AuthMethod::PublicKey).collect()
    }

    fn skip(&mut self, token: &Token, key: Option<&KeyId>, reason: AuthError) {
        let skipped = Skipped {
            token: token.clone(),
            key: key.cloned(),
            reason,
        };
        warn!("Skipping {}", skipped);
        self.skipped.push(skipped);
    }
}

//------------ Collection ----------------------------------------------------

/// Collects a signer for every usable key on every token of `provider`.
pub fn collect_signers<A: Pkcs11Api>(api: &A, provider: &Path, pin: &SecretString) -> Result<Harvest, AuthError> {
    let tokens = discover_tokens(api, provider)?;

    let mut harvest = Harvest::default();
    for token in tokens {
        harvest.tokens_attempted += 1;

        let session = match open_token_session(api, provider, &token, pin) {
            Ok(session) => session,
            Err(err) => {
                harvest.skip(&token, None, err);
                continue;
            }
        };

        let ids = match discover_key_ids(&session) {
            Ok(ids) => ids,
            Err(err) => {
                harvest.skip(&token, None, err);
                continue;
            }
        };

        harvest.tokens_succeeded += 1;
        for id in ids {
            match session.resolve_key(&id) {
                Ok(signer) => harvest.signers.push(Box::new(signer)),
                Err(err) => harvest.skip(&token, Some(&id), err.into_key_resolution(format!("Key {}", id))),
            }
        }
    }

    info!(
        "Collected {} signer(s) from {} of {} token(s) using '{}'",
        harvest.signers.len(),
        harvest.tokens_succeeded,
        harvest.tokens_attempted,
        provider.display()
    );
    Ok(harvest)
}

/// Like [`collect_signers`] but returns auth methods.
pub fn collect_auth_methods<A: Pkcs11Api>(
    api: &A,
    provider: &Path,
    pin: &SecretString,
) -> Result<Vec<AuthMethod>, AuthError> {
    collect_signers(api, provider, pin).map(Harvest::into_auth_methods)
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::pkcs11::mock::{Event, MockKey, MockProvider, MockToken};

    use super::*;

    const PROVIDER: &str = "/lib/softhsm.so";

    fn pin(pin: &str) -> SecretString {
        SecretString::new(pin.to_string())
    }

    fn comments(harvest: &Harvest) -> Vec<String> {
        harvest
            .signers
            .iter()
            .map(|s| s.public_key().comment().to_string())
            .collect()
    }

    #[test]
    fn demo_token_with_two_keys_gives_two_auth_methods_in_order() {
        let api = MockProvider::new(vec![
            MockToken::new("demo", "1234")
                .with_key(MockKey::with_id(&[0x0b]))
                .with_key(MockKey::with_id(&[0x0a])),
        ]);

        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert_eq!(comments(&harvest), vec!["demo/0b", "demo/0a"]);

        let methods = harvest.into_auth_methods();
        assert_eq!(methods.len(), 2);
        assert!(methods.iter().all(|m| m.signer().is_some()));
    }

    #[test]
    fn tokens_failing_login_are_skipped() {
        let api = MockProvider::new(vec![
            MockToken::new("one", "1234").with_key(MockKey::with_id(&[1])),
            MockToken::new("two", "9999").with_key(MockKey::with_id(&[2])),
            MockToken::new("three", "1234")
                .with_key(MockKey::with_id(&[3]))
                .with_key(MockKey::with_id(&[4])),
            MockToken::new("four", "0000").with_key(MockKey::with_id(&[5])),
        ]);

        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert_eq!(comments(&harvest), vec!["one/01", "three/03", "three/04"]);
        assert_eq!(harvest.tokens_attempted, 4);
        assert_eq!(harvest.tokens_succeeded, 2);

        let skipped: Vec<_> = harvest.skipped.iter().map(|s| s.token.label.as_str()).collect();
        assert_eq!(skipped, vec!["two", "four"]);
        assert!(harvest.skipped.iter().all(|s| s.key.is_none()));
    }

    #[test]
    fn all_tokens_failing_is_an_empty_success() {
        let api = MockProvider::new(vec![
            MockToken::new("one", "1111").with_key(MockKey::with_id(&[1])),
            MockToken::new("two", "2222").with_key(MockKey::with_id(&[2])),
        ]);

        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert!(harvest.is_empty());
        assert!(harvest.all_tokens_failed());
        assert_eq!(harvest.skipped.len(), 2);
    }

    #[test]
    fn no_tokens_is_an_empty_success() {
        let api = MockProvider::new(vec![MockToken::empty_slot()]);
        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert!(harvest.is_empty());
        assert!(!harvest.all_tokens_failed());
        assert_eq!(harvest.tokens_attempted, 0);
    }

    #[test]
    fn token_without_keys_contributes_nothing() {
        let api = MockProvider::new(vec![
            MockToken::new("empty", "1234"),
            MockToken::new("demo", "1234").with_key(MockKey::with_id(&[7])),
        ]);
        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert_eq!(comments(&harvest), vec!["demo/07"]);
        assert_eq!(harvest.tokens_succeeded, 2);
        assert!(harvest.skipped.is_empty());
    }

    #[test]
    fn unresolvable_keys_do_not_stop_the_rest() {
        let api = MockProvider::new(vec![
            MockToken::new("demo", "1234")
                .with_key(MockKey::with_id(&[1]))
                .with_key(MockKey::with_id(&[2]).unresolvable())
                .with_key(MockKey::with_id(&[3])),
            MockToken::new("next", "1234").with_key(MockKey::with_id(&[4])),
        ]);

        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert_eq!(comments(&harvest), vec!["demo/01", "demo/03", "next/04"]);
        assert_eq!(harvest.skipped.len(), 1);
        assert_eq!(harvest.skipped[0].key, Some(KeyId::from(vec![2])));
        assert!(matches!(harvest.skipped[0].reason, AuthError::KeyResolution(_)));
    }

    #[test]
    fn library_failures_while_resolving_are_key_resolution_errors() {
        let api = MockProvider::new(vec![
            MockToken::new("demo", "1234")
                .with_key(MockKey::with_id(&[1]).failing_device())
                .with_key(MockKey::with_id(&[2])),
        ]);

        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert_eq!(comments(&harvest), vec!["demo/02"]);
        assert_eq!(harvest.skipped.len(), 1);
        match &harvest.skipped[0].reason {
            AuthError::KeyResolution(msg) => assert!(msg.contains("CKR_DEVICE_ERROR"), "{}", msg),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn failed_key_search_skips_only_that_token() {
        let api = MockProvider::new(vec![
            MockToken::new("broken", "1234")
                .with_key(MockKey::with_id(&[1]))
                .fail_search(),
            MockToken::new("demo", "1234").with_key(MockKey::with_id(&[2])),
        ]);
        let harvest = collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();
        assert_eq!(comments(&harvest), vec!["demo/02"]);
        assert_eq!(harvest.tokens_succeeded, 1);
    }

    #[test]
    fn discovery_is_closed_before_first_session() {
        let api = MockProvider::new(vec![
            MockToken::new("one", "1234").with_key(MockKey::with_id(&[1])),
            MockToken::new("two", "1234").with_key(MockKey::with_id(&[2])),
        ]);
        collect_signers(&api, Path::new(PROVIDER), &pin("1234")).unwrap();

        assert_eq!(
            api.events(),
            vec![
                Event::OpenDiscovery,
                Event::CloseDiscovery,
                Event::OpenSession("one".to_string()),
                Event::OpenSession("two".to_string()),
            ]
        );
    }

    #[test]
    fn unusable_provider_is_an_error() {
        let api = MockProvider::unloadable();
        assert!(collect_auth_methods(&api, Path::new(PROVIDER), &pin("1234")).is_err());
    }
}
