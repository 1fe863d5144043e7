use std::{
    fmt,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
};

use cryptoki::{
    error::{Error, RvError},
    mechanism::Mechanism,
    object::{Attribute, AttributeType, KeyType, ObjectClass, ObjectHandle},
    session::{Session, UserType},
    types::AuthPin,
};
use secrecy::ExposeSecret;

use crate::{
    error::AuthError,
    pkcs11::{
        api::{KeyId, SessionConfig, Token, TokenSession},
        context::Pkcs11Context,
        signer::Pkcs11KeySigner,
    },
};

/// A logged in, read-only session on one token.
///
/// Cloning shares the session. It is closed, and the library released if
/// nothing else uses it, when the last clone is dropped. Signers keep a
/// clone so that their keys stay usable after the collection pass is over.
#[derive(Clone)]
pub struct Pkcs11Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    // Declared before the context so that the session closes first.
    session: Mutex<Session>,
    context: Arc<Pkcs11Context>,
    token: Token,
}

impl Pkcs11Session {
    pub fn open(config: &SessionConfig) -> Result<Self, AuthError> {
        let token = config.token();
        let context = Pkcs11Context::get_or_load(config.provider())?;

        let slot = context.slot(token.slot)?;
        let label = context.token_label(slot)?;
        if label != token.label {
            return Err(AuthError::Driver(format!(
                "Expected token '{}' in slot {} but found '{}'",
                token.label, token.slot, label
            )));
        }

        // C_OpenSession always gets CKF_SERIAL_SESSION from cryptoki.
        let session = context.open_ro_session(slot).map_err(|err| {
            AuthError::Driver(format!(
                "Unable to open session on token {} using library '{}': {}",
                token,
                context.lib_file_name(),
                err
            ))
        })?;

        let pin = config.pin().expose_secret();
        let pin = (!pin.is_empty()).then(|| AuthPin::new(pin.to_owned().into()));

        // Login state is shared by all sessions of the application with the
        // token, so another live session may already have logged in.
        match session.login(UserType::User, pin.as_ref()) {
            Ok(()) => trace!("Logged in to token {}", token),
            Err(Error::Pkcs11(RvError::UserAlreadyLoggedIn, ..)) => {
                trace!("Already logged in to token {}", token)
            }
            Err(err) => {
                return Err(AuthError::Driver(format!(
                    "Unable to login to token {} using library '{}': {}",
                    token,
                    context.lib_file_name(),
                    err
                )));
            }
        }

        Ok(Pkcs11Session {
            inner: Arc::new(SessionInner {
                session: Mutex::new(session),
                context,
                token: token.clone(),
            }),
        })
    }

    pub fn token(&self) -> &Token {
        &self.inner.token
    }

    fn session(&self) -> Result<MutexGuard<'_, Session>, AuthError> {
        self.inner
            .session
            .lock()
            .map_err(|_| AuthError::driver("PKCS#11 session lock is poisoned"))
    }

    pub fn find_objects(&self, template: &[Attribute]) -> Result<Vec<ObjectHandle>, AuthError> {
        Ok(self.session()?.find_objects(template)?)
    }

    pub fn get_attributes(&self, object: ObjectHandle, types: &[AttributeType]) -> Result<Vec<Attribute>, AuthError> {
        Ok(self.session()?.get_attributes(object, types)?)
    }

    // Keys with CKA_ALWAYS_AUTHENTICATE need a C_Login right before signing,
    // which we do not do.
    pub fn sign(&self, mechanism: &Mechanism, key: ObjectHandle, data: &[u8]) -> Result<Vec<u8>, AuthError> {
        Ok(self.session()?.sign(mechanism, key, data)?)
    }
}

impl TokenSession for Pkcs11Session {
    type Object = ObjectHandle;
    type KeySigner = Pkcs11KeySigner;

    fn find_private_keys(&self, limit: usize) -> Result<Vec<ObjectHandle>, AuthError> {
        let template = [
            Attribute::Class(ObjectClass::PRIVATE_KEY),
            Attribute::Private(true),
            Attribute::KeyType(KeyType::RSA),
        ];

        // One extra handle tells us whether the token holds more keys than
        // we use. The search is finalised when the iterator is dropped.
        let mut objects = {
            let session = self.session()?;
            let found = session
                .iter_objects_with_cache_size(&template, NonZeroUsize::MIN.saturating_add(limit))?
                .take(limit.saturating_add(1))
                .collect::<Result<Vec<_>, _>>()?;
            found
        };
        if objects.len() > limit {
            warn!(
                "Token {} has more than {} RSA private keys, only using the first {}",
                self.token(),
                limit,
                limit
            );
            objects.truncate(limit);
        }
        Ok(objects)
    }

    fn key_id(&self, object: ObjectHandle) -> Result<Option<KeyId>, AuthError> {
        let attributes = self.get_attributes(object, &[AttributeType::Id])?;
        Ok(attributes.into_iter().find_map(|attr| match attr {
            Attribute::Id(id) if !id.is_empty() => Some(KeyId::from(id)),
            _ => None,
        }))
    }

    fn resolve_key(&self, id: &KeyId) -> Result<Pkcs11KeySigner, AuthError> {
        Pkcs11KeySigner::resolve(self.clone(), id)
    }
}

impl fmt::Debug for Pkcs11Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs11Session")
            .field("library", &self.inner.context.lib_file_name())
            .field("token", &self.inner.token)
            .finish()
    }
}
