use std::fmt;

use cryptoki::{
    mechanism::Mechanism,
    object::{Attribute, AttributeType, ObjectClass, ObjectHandle},
};
use ssh_key::{Algorithm, HashAlg, Mpint, PublicKey, Signature, public::RsaPublicKey};

use crate::{
    auth::method::Signer,
    error::AuthError,
    pkcs11::{api::KeyId, session::Pkcs11Session},
};

/// Signs with an RSA private key that never leaves the token.
pub struct Pkcs11KeySigner {
    session: Pkcs11Session,
    private_key: ObjectHandle,
    public_key: PublicKey,
    id: KeyId,
}

impl Pkcs11KeySigner {
    /// Finds the private key with the given CKA_ID and reads its public key.
    ///
    /// The public key is taken from the public key object with the same
    /// CKA_ID if there is one, and from the private key object otherwise.
    ///
    /// Every failure, including those of the library, is reported as
    /// [`AuthError::KeyResolution`].
    pub fn resolve(session: Pkcs11Session, id: &KeyId) -> Result<Self, AuthError> {
        let context = format!("Key {} on token {}", id, session.token());

        let private_key = find_key(&session, id, ObjectClass::PRIVATE_KEY)
            .map_err(|err| err.into_key_resolution(&context))?
            .ok_or_else(|| {
                AuthError::KeyResolution(format!("No private key with id {} on token {}", id, session.token()))
            })?;

        let public_object = match find_key(&session, id, ObjectClass::PUBLIC_KEY) {
            Ok(Some(handle)) => handle,
            Ok(None) => private_key,
            Err(err) => {
                debug!("Could not look up public key {}, using private key object: {}", id, err);
                private_key
            }
        };

        let rsa =
            read_rsa_public_key(&session, public_object, id).map_err(|err| err.into_key_resolution(&context))?;
        let public_key = PublicKey::new(rsa.into(), format!("{}/{}", session.token().label, id));
        trace!("Resolved key {} on token {}", id, session.token());

        Ok(Pkcs11KeySigner {
            session,
            private_key,
            public_key,
            id: id.clone(),
        })
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }
}

impl Signer for Pkcs11KeySigner {
    fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    fn sign(&self, data: &[u8]) -> Result<Signature, AuthError> {
        let signature = self
            .session
            .sign(&Mechanism::Sha512RsaPkcs, self.private_key, data)
            .map_err(|err| AuthError::Signing(format!("key {} on token {}: {}", self.id, self.session.token(), err)))?;

        Signature::new(
            Algorithm::Rsa {
                hash: Some(HashAlg::Sha512),
            },
            signature,
        )
        .map_err(|err| AuthError::Signing(err.to_string()))
    }
}

impl fmt::Debug for Pkcs11KeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs11KeySigner")
            .field("token", self.session.token())
            .field("id", &self.id.to_string())
            .finish()
    }
}

/// Finds the single object of `class` with CKA_ID `id`.
fn find_key(session: &Pkcs11Session, id: &KeyId, class: ObjectClass) -> Result<Option<ObjectHandle>, AuthError> {
    let template = [Attribute::Class(class), Attribute::Id(id.as_slice().to_vec())];
    let objects = session.find_objects(&template)?;

    match objects.as_slice() {
        [] => Ok(None),
        [handle] => Ok(Some(*handle)),
        _ => {
            let human_key_class = if class == ObjectClass::PRIVATE_KEY {
                "private key"
            } else {
                "public key"
            };
            Err(AuthError::KeyResolution(format!(
                "More than one {} found with id {}",
                human_key_class, id
            )))
        }
    }
}

fn read_rsa_public_key(session: &Pkcs11Session, object: ObjectHandle, id: &KeyId) -> Result<RsaPublicKey, AuthError> {
    let attributes = session.get_attributes(object, &[AttributeType::Modulus, AttributeType::PublicExponent])?;

    let mut modulus = None;
    let mut exponent = None;
    for attribute in attributes {
        match attribute {
            Attribute::Modulus(n) => modulus = Some(n),
            Attribute::PublicExponent(e) => exponent = Some(e),
            _ => {}
        }
    }

    let (n, e) = match (modulus, exponent) {
        (Some(n), Some(e)) => (n, e),
        _ => {
            return Err(AuthError::KeyResolution(format!(
                "Key {} does not expose its RSA modulus and public exponent",
                id
            )));
        }
    };

    let mpint = |bytes: &[u8]| {
        Mpint::from_positive_bytes(bytes).map_err(|err| AuthError::KeyResolution(format!("Key {}: {}", id, err)))
    };

    Ok(RsaPublicKey {
        e: mpint(&e)?,
        n: mpint(&n)?,
    })
}
