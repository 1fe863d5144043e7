use std::{
    collections::HashMap,
    ops::Deref,
    path::Path,
    sync::{Arc, LazyLock, Mutex, Weak},
};

use cryptoki::{
    context::{CInitializeArgs, Pkcs11},
    error::{Error, RvError},
    slot::Slot,
};

use crate::{error::AuthError, pkcs11::api::SlotId};

/// The loaded and initialized PKCS#11 libraries, by library file name.
///
/// A library may only be initialized once per process, and two copies of
/// the same library loaded from different locations would each expect to be
/// the only one. We therefore key on the file name rather than the full path
/// and hand out the live context if there is one.
///
/// Entries are weak so that a library is finalized and unloaded as soon as
/// the last discovery scope, session or signer using it is gone.
static CONTEXTS: LazyLock<Mutex<HashMap<String, Weak<Pkcs11Context>>>> = LazyLock::new(Default::default);

#[derive(Debug)]
pub(super) struct Pkcs11Context {
    lib_file_name: String,

    ctx: Pkcs11,
}

impl Pkcs11Context {
    pub fn get_or_load(lib_path: &Path) -> Result<Arc<Self>, AuthError> {
        let lib_file_name = lib_path
            .file_name()
            .ok_or_else(|| {
                AuthError::Driver(format!(
                    "PKCS#11 library path '{}' does not point to a file",
                    lib_path.display()
                ))
            })?
            .to_string_lossy()
            .to_string();

        let mut contexts = CONTEXTS
            .lock()
            .map_err(|_| AuthError::driver("PKCS#11 library registry is poisoned"))?;

        if let Some(context) = contexts.get(&lib_file_name).and_then(Weak::upgrade) {
            trace!("Re-using loaded PKCS#11 library '{}'", lib_file_name);
            return Ok(context);
        }

        let ctx = Pkcs11::new(lib_path).map_err(|err| {
            error!("Failed to load PKCS#11 library '{}': {}", lib_path.display(), err);
            AuthError::Driver(format!("Failed to load PKCS#11 library '{}': {}", lib_path.display(), err))
        })?;

        let context = Arc::new(Pkcs11Context { lib_file_name, ctx });
        context.initialize_if_not_already()?;

        contexts.insert(context.lib_file_name.clone(), Arc::downgrade(&context));
        debug!("Loaded PKCS#11 library '{}'", context.lib_file_name);
        Ok(context)
    }

    pub fn lib_file_name(&self) -> &str {
        &self.lib_file_name
    }

    fn initialize_if_not_already(&self) -> Result<(), AuthError> {
        match self.ctx.initialize(CInitializeArgs::OsThreads) {
            Ok(()) => Ok(()),
            Err(Error::Pkcs11(RvError::CryptokiAlreadyInitialized, ..)) => {
                debug!("PKCS#11 library '{}' was already initialized", self.lib_file_name);
                Ok(())
            }
            Err(err) => {
                error!("Failed to initialize PKCS#11 library '{}': {}", self.lib_file_name, err);
                Err(AuthError::Driver(format!(
                    "Failed to initialize PKCS#11 library '{}': {}",
                    self.lib_file_name, err
                )))
            }
        }
    }

    /// Looks up a slot by its numeric identifier.
    pub fn slot(&self, slot_id: SlotId) -> Result<Slot, AuthError> {
        self.ctx
            .get_all_slots()?
            .into_iter()
            .find(|slot| slot.id() == slot_id)
            .ok_or_else(|| AuthError::Driver(format!("Slot {} not found", slot_id)))
    }

    /// Reads the label of the token in `slot`, without the padding.
    pub fn token_label(&self, slot: Slot) -> Result<String, AuthError> {
        let info = self.ctx.get_token_info(slot)?;
        Ok(info.label().trim_end().to_string())
    }
}

impl Deref for Pkcs11Context {
    type Target = Pkcs11;

    fn deref(&self) -> &Self::Target {
        &self.ctx
    }
}

impl Drop for Pkcs11Context {
    fn drop(&mut self) {
        // Pkcs11 finalizes the library when it is dropped.
        debug!("Releasing PKCS#11 library '{}'", self.lib_file_name);
    }
}
