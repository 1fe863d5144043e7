//! A scripted PKCS#11 provider for tests.
use std::{
    fmt,
    path::Path,
    sync::{Arc, RwLock},
};

use ssh_key::{Algorithm, PublicKey, Signature, public::Ed25519PublicKey};

use crate::{
    auth::method::Signer,
    error::AuthError,
    pkcs11::api::{DiscoveryContext, KeyId, Pkcs11Api, SessionConfig, SlotId, TokenSession},
};

/// Calls made against the mock, in order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    OpenDiscovery,
    CloseDiscovery,
    OpenSession(String),
}

type EventLog = Arc<RwLock<Vec<Event>>>;

fn record(log: &EventLog, event: Event) {
    log.write().unwrap().push(event);
}

//------------ MockKey -------------------------------------------------------

#[derive(Clone, Debug)]
pub struct MockKey {
    id: Option<Vec<u8>>,
    resolvable: bool,
    device_error: bool,
}

impl MockKey {
    pub fn with_id(id: &[u8]) -> Self {
        MockKey {
            id: Some(id.to_vec()),
            resolvable: true,
            device_error: false,
        }
    }

    pub fn without_id() -> Self {
        MockKey {
            id: None,
            ..Self::with_id(&[])
        }
    }

    /// The key has no public key object.
    pub fn unresolvable(mut self) -> Self {
        self.resolvable = false;
        self
    }

    /// Reading the key fails inside the library.
    pub fn failing_device(mut self) -> Self {
        self.device_error = true;
        self
    }
}

//------------ MockToken -----------------------------------------------------

/// A slot, with or without a token in it.
#[derive(Clone, Debug)]
pub struct MockToken {
    label: Option<String>,
    pin: String,
    keys: Vec<MockKey>,
    fail_search: bool,
}

impl MockToken {
    pub fn new(label: &str, pin: &str) -> Self {
        MockToken {
            label: Some(label.to_string()),
            pin: pin.to_string(),
            keys: Vec::new(),
            fail_search: false,
        }
    }

    pub fn empty_slot() -> Self {
        MockToken {
            label: None,
            pin: String::new(),
            keys: Vec::new(),
            fail_search: false,
        }
    }

    pub fn with_key(mut self, key: MockKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn fail_search(mut self) -> Self {
        self.fail_search = true;
        self
    }
}

//------------ MockProvider --------------------------------------------------

#[derive(Debug)]
pub struct MockProvider {
    slots: Vec<MockToken>,
    loadable: bool,
    fail_slot_listing: bool,
    events: EventLog,
}

impl MockProvider {
    pub fn new(slots: Vec<MockToken>) -> Self {
        MockProvider {
            slots,
            loadable: true,
            fail_slot_listing: false,
            events: EventLog::default(),
        }
    }

    pub fn unloadable() -> Self {
        MockProvider {
            loadable: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn fail_slot_listing(mut self) -> Self {
        self.fail_slot_listing = true;
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.read().unwrap().clone()
    }
}

impl Pkcs11Api for MockProvider {
    type Discovery = MockDiscovery;
    type Session = MockSession;

    fn open_discovery(&self, provider: &Path) -> Result<MockDiscovery, AuthError> {
        if !self.loadable {
            return Err(AuthError::Driver(format!("cannot load '{}'", provider.display())));
        }
        record(&self.events, Event::OpenDiscovery);
        Ok(MockDiscovery {
            slots: self.slots.clone(),
            fail_slot_listing: self.fail_slot_listing,
            events: self.events.clone(),
        })
    }

    fn open_session(&self, config: &SessionConfig) -> Result<MockSession, AuthError> {
        use secrecy::ExposeSecret;

        let wanted = config.token();
        record(&self.events, Event::OpenSession(wanted.label.clone()));

        let token = usize::try_from(wanted.slot)
            .ok()
            .and_then(|slot| self.slots.get(slot))
            .ok_or_else(|| AuthError::driver("CKR_SLOT_ID_INVALID"))?;

        if token.label.as_deref() != Some(wanted.label.as_str()) {
            return Err(AuthError::driver("CKR_TOKEN_NOT_PRESENT"));
        }
        if token.pin != *config.pin().expose_secret() {
            return Err(AuthError::driver("CKR_PIN_INCORRECT"));
        }

        Ok(MockSession {
            label: wanted.label.clone(),
            keys: token.keys.clone(),
            fail_search: token.fail_search,
        })
    }
}

//------------ MockDiscovery -------------------------------------------------

#[derive(Debug)]
pub struct MockDiscovery {
    slots: Vec<MockToken>,
    fail_slot_listing: bool,
    events: EventLog,
}

impl DiscoveryContext for MockDiscovery {
    fn slots(&self) -> Result<Vec<SlotId>, AuthError> {
        if self.fail_slot_listing {
            return Err(AuthError::driver("CKR_GENERAL_ERROR"));
        }
        Ok((0..self.slots.len() as SlotId).collect())
    }

    fn token_label(&self, slot: SlotId) -> Result<String, AuthError> {
        self.slots
            .get(slot as usize)
            .and_then(|token| token.label.clone())
            .ok_or_else(|| AuthError::driver("CKR_TOKEN_NOT_PRESENT"))
    }
}

impl Drop for MockDiscovery {
    fn drop(&mut self) {
        record(&self.events, Event::CloseDiscovery);
    }
}

//------------ MockSession ---------------------------------------------------

#[derive(Debug)]
pub struct MockSession {
    label: String,
    keys: Vec<MockKey>,
    fail_search: bool,
}

impl TokenSession for MockSession {
    type Object = usize;
    type KeySigner = MockKeySigner;

    fn find_private_keys(&self, limit: usize) -> Result<Vec<usize>, AuthError> {
        if self.fail_search {
            return Err(AuthError::driver("CKR_OPERATION_ACTIVE"));
        }
        Ok((0..self.keys.len()).take(limit).collect())
    }

    fn key_id(&self, object: usize) -> Result<Option<KeyId>, AuthError> {
        let key = self
            .keys
            .get(object)
            .ok_or_else(|| AuthError::driver("CKR_OBJECT_HANDLE_INVALID"))?;
        Ok(key.id.clone().map(KeyId::from))
    }

    fn resolve_key(&self, id: &KeyId) -> Result<MockKeySigner, AuthError> {
        let key = self
            .keys
            .iter()
            .find(|key| key.id.as_deref() == Some(id.as_slice()))
            .ok_or_else(|| AuthError::KeyResolution(format!("no private key with id {}", id)))?;

        if key.device_error {
            return Err(AuthError::driver("CKR_DEVICE_ERROR"));
        }
        if !key.resolvable {
            return Err(AuthError::KeyResolution(format!("no public key for id {}", id)));
        }

        let mut raw = [0u8; 32];
        for (dst, src) in raw.iter_mut().zip(id.as_slice()) {
            *dst = *src;
        }
        let public_key = PublicKey::new(Ed25519PublicKey(raw).into(), format!("{}/{}", self.label, id));
        Ok(MockKeySigner { public_key })
    }
}

//------------ MockKeySigner -------------------------------------------------

pub struct MockKeySigner {
    public_key: PublicKey,
}

impl Signer for MockKeySigner {
    fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    fn sign(&self, _data: &[u8]) -> Result<Signature, AuthError> {
        Signature::new(Algorithm::Ed25519, vec![0u8; 64]).map_err(|e| AuthError::Signing(e.to_string()))
    }
}

impl fmt::Debug for MockKeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockKeySigner").field("key", &self.public_key.comment()).finish()
    }
}
