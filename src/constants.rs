//! Various crate-wide constants.

//------------ Binary Names -------------------------------------------------

/// The friendly name of the `sshauth` binary.
pub const SSHAUTH_APP: &str = "SSH Auth Helper";

//------------ Config Files Paths -------------------------------------------

/// The default path to the config file, relative to the home directory.
pub const SSHAUTH_DEFAULT_CONFIG_FILE: &str = "~/.config/sshauth.conf";

//------------ Environment Variables ----------------------------------------

/// The environment variable with the log level.
///
/// The variable should contain the name of a [`log::LevelFilter`]. It will
/// be overwritten by the config file. The default is “info.”
pub const SSHAUTH_ENV_LOG_LEVEL: &str = "SSHAUTH_LOG_LEVEL";

/// The environment variable with the user PIN for PKCS#11 tokens.
pub const SSHAUTH_ENV_PKCS11_PIN: &str = "SSHAUTH_PKCS11_PIN";

//------------ Passphrase Prompt --------------------------------------------

/// How many times the user is asked for the passphrase of an encrypted key.
pub const PASSPHRASE_ATTEMPTS: usize = 3;

//------------ PKCS#11 ------------------------------------------------------

/// The maximum number of private key objects considered per token.
pub const MAX_TOKEN_KEY_OBJECTS: usize = 1000;
