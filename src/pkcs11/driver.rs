use std::{path::Path, sync::Arc};

use crate::{
    error::AuthError,
    pkcs11::{
        api::{DiscoveryContext, Pkcs11Api, SessionConfig, SlotId},
        context::Pkcs11Context,
        session::Pkcs11Session,
    },
};

//------------ CryptokiDriver ------------------------------------------------

/// Talks to a real PKCS#11 module.
#[derive(Clone, Copy, Debug, Default)]
pub struct CryptokiDriver;

impl Pkcs11Api for CryptokiDriver {
    type Discovery = DiscoveryScope;
    type Session = Pkcs11Session;

    fn open_discovery(&self, provider: &Path) -> Result<DiscoveryScope, AuthError> {
        let context = Pkcs11Context::get_or_load(provider)?;
        trace!("Opened discovery scope for '{}'", context.lib_file_name());
        Ok(DiscoveryScope { context })
    }

    fn open_session(&self, config: &SessionConfig) -> Result<Pkcs11Session, AuthError> {
        Pkcs11Session::open(config)
    }
}

//------------ DiscoveryScope ------------------------------------------------

/// Unauthenticated use of a library for the duration of token discovery.
///
/// Dropping the scope gives up its hold on the library, which finalizes it
/// unless a session from an earlier pass is still alive.
pub struct DiscoveryScope {
    context: Arc<Pkcs11Context>,
}

impl DiscoveryContext for DiscoveryScope {
    fn slots(&self) -> Result<Vec<SlotId>, AuthError> {
        let slots = self.context.get_all_slots()?;
        Ok(slots.into_iter().map(|slot| slot.id()).collect())
    }

    fn token_label(&self, slot: SlotId) -> Result<String, AuthError> {
        let slot = self.context.slot(slot)?;
        self.context.token_label(slot)
    }
}

impl Drop for DiscoveryScope {
    fn drop(&mut self) {
        trace!("Closed discovery scope for '{}'", self.context.lib_file_name());
    }
}
