//! The `sshauth` command line tool.
//!
//! It shows what credentials the library would hand to an SSH transport:
//! the tokens a PKCS#11 module exposes, the signers collected from them and
//! the public key of an unlocked key file.
pub mod report;

use std::{fmt, path::PathBuf};

use log::LevelFilter;

use crate::{
    auth::{cert::CertificateSigner, method::Signer, unlock},
    config::{Config, ConfigError},
    error::AuthError,
};

//------------ Options -------------------------------------------------------

#[derive(clap::Parser)]
#[command(version, about = "Shows the SSH credentials available from key files and PKCS#11 tokens.")]
pub struct Options {
    #[command(flatten)]
    pub general: GeneralOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Options {
    /// Creates the options from the process arguments.
    ///
    /// Exits the process if the arguments are not usable.
    pub fn from_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

//------------ GeneralOptions ------------------------------------------------

#[derive(clap::Args)]
pub struct GeneralOptions {
    /// Path to the config file (default: ~/.config/sshauth.conf)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level, overrides the config file
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LevelFilter>,
}

//------------ Command -------------------------------------------------------

#[derive(clap::Subcommand)]
pub enum Command {
    /// List the tokens of a PKCS#11 module
    #[cfg(feature = "hsm")]
    Tokens(Tokens),

    /// Collect signers from every token of a PKCS#11 module
    #[cfg(feature = "hsm")]
    Keys(Keys),

    /// Unlock a key file and show its public key
    Key(Key),
}

impl Command {
    pub fn run(self, config: &Config) -> Result<String, CliError> {
        match self {
            #[cfg(feature = "hsm")]
            Command::Tokens(cmd) => cmd.run(config),
            #[cfg(feature = "hsm")]
            Command::Keys(cmd) => cmd.run(config),
            Command::Key(cmd) => cmd.run(config),
        }
    }
}

//------------ Tokens --------------------------------------------------------

#[cfg(feature = "hsm")]
#[derive(clap::Args)]
pub struct Tokens {
    /// Path to the PKCS#11 module (default: pkcs11.lib_path from the config)
    #[arg(long, value_name = "PATH")]
    pub provider: Option<PathBuf>,
}

#[cfg(feature = "hsm")]
impl Tokens {
    pub fn run(self, config: &Config) -> Result<String, CliError> {
        let provider = provider(self.provider, config)?;
        let tokens = crate::pkcs11::tokens(&provider)?;
        Ok(report::tokens(&tokens))
    }
}

//------------ Keys ----------------------------------------------------------

#[cfg(feature = "hsm")]
#[derive(clap::Args)]
pub struct Keys {
    /// Path to the PKCS#11 module (default: pkcs11.lib_path from the config)
    #[arg(long, value_name = "PATH")]
    pub provider: Option<PathBuf>,

    /// The user PIN, asked for if not given here or in the config
    #[arg(long, env = crate::constants::SSHAUTH_ENV_PKCS11_PIN, hide_env_values = true)]
    pub pin: Option<String>,
}

#[cfg(feature = "hsm")]
impl Keys {
    pub fn run(self, config: &Config) -> Result<String, CliError> {
        use secrecy::SecretString;

        let provider = provider(self.provider, config)?;
        let config_pin = config.pkcs11.as_ref().and_then(|pkcs11| pkcs11.user_pin.clone());
        let pin = match (self.pin, config_pin) {
            (Some(pin), _) => SecretString::new(pin),
            (None, Some(pin)) => pin,
            (None, None) => {
                let label = format!("PIN for tokens of {}: ", provider.display());
                SecretString::new(rpassword::prompt_password(label).map_err(AuthError::Prompt)?)
            }
        };

        let harvest = crate::pkcs11::signers(&provider, &pin)?;
        if harvest.all_tokens_failed() {
            warn!("None of the {} token(s) could be used", harvest.tokens_attempted);
        }
        Ok(report::harvest(&harvest)?)
    }
}

#[cfg(feature = "hsm")]
fn provider(explicit: Option<PathBuf>, config: &Config) -> Result<PathBuf, CliError> {
    explicit
        .or_else(|| config.pkcs11.as_ref().map(|pkcs11| pkcs11.lib_path.clone()))
        .ok_or_else(|| CliError::Other("No PKCS#11 module given, use --provider or set pkcs11.lib_path".into()))
}

//------------ Key -----------------------------------------------------------

#[derive(clap::Args)]
pub struct Key {
    /// The private key file (default: the first of identity_files from the config)
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// A certificate to bind to the key (default: certificate_file from the config)
    #[arg(long, value_name = "FILE")]
    pub cert: Option<PathBuf>,
}

impl Key {
    pub fn run(self, config: &Config) -> Result<String, CliError> {
        let file = self
            .file
            .or_else(|| config.identity_files.first().cloned())
            .ok_or_else(|| CliError::Other("No key file given, use --file or set identity_files".into()))?;

        let signer: Box<dyn Signer> = Box::new(unlock::unlock_key_file(&file, None)?);
        let signer: Box<dyn Signer> = match self.cert.or_else(|| config.certificate_file.clone()) {
            Some(cert) => Box::new(CertificateSigner::from_file(&cert, signer)?),
            None => signer,
        };

        Ok(report::signer(signer.as_ref())?)
    }
}

//------------ Running -------------------------------------------------------

/// Loads the config, sets up logging and runs the command.
pub fn run(options: Options) -> Result<String, CliError> {
    let mut config = Config::load(options.general.config.as_deref())?;
    if let Some(level) = options.general.log_level {
        config.log_level = level;
    }
    config.init_logging()?;

    options.command.run(&config)
}

//------------ CliError ------------------------------------------------------

#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Auth(AuthError),
    Other(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CliError::Config(e) => e.fmt(f),
            CliError::Auth(e) => e.fmt(f),
            CliError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<AuthError> for CliError {
    fn from(e: AuthError) -> Self {
        CliError::Auth(e)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parses_key_command() {
        let options = Options::try_parse_from([
            "sshauth",
            "--log-level",
            "debug",
            "key",
            "--file",
            "test-resources/keys/ed25519_plain",
        ])
        .unwrap();
        assert_eq!(options.general.log_level, Some(LevelFilter::Debug));
        match options.command {
            Command::Key(key) => {
                assert_eq!(key.file, Some(PathBuf::from("test-resources/keys/ed25519_plain")));
                assert!(key.cert.is_none());
            }
            #[allow(unreachable_patterns)]
            _ => panic!("expected key command"),
        }
    }

    #[test]
    fn key_command_reports_public_key() {
        let key = Key {
            file: Some(PathBuf::from("test-resources/keys/ed25519_plain")),
            cert: None,
        };
        let report = key.run(&Config::defaults()).unwrap();
        let expected = std::fs::read_to_string("test-resources/keys/ed25519_plain.pub").unwrap();
        assert_eq!(report.trim_end(), expected.trim_end());
    }

    #[test]
    fn key_command_uses_config_identity() {
        let mut config = Config::defaults();
        config.identity_files = vec![PathBuf::from("test-resources/keys/ed25519_plain")];
        config.certificate_file = Some(PathBuf::from("test-resources/keys/ed25519_plain-cert.pub"));

        let key = Key { file: None, cert: None };
        let report = key.run(&config).unwrap();
        assert!(report.contains("# certificate 'plain-cert'"));
    }

    #[test]
    fn key_command_needs_a_file() {
        let key = Key { file: None, cert: None };
        assert!(matches!(key.run(&Config::defaults()), Err(CliError::Other(_))));
    }

    #[cfg(feature = "hsm")]
    #[test]
    fn keys_command_needs_a_provider() {
        let keys = Keys {
            provider: None,
            pin: Some("1234".into()),
        };
        assert!(matches!(keys.run(&Config::defaults()), Err(CliError::Other(_))));
    }
}
