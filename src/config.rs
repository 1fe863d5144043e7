//! Configuration file and logging set up for the `sshauth` tool.
use std::{
    env, fmt, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::LevelFilter;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, de};

use crate::{
    constants::{SSHAUTH_APP, SSHAUTH_DEFAULT_CONFIG_FILE, SSHAUTH_ENV_LOG_LEVEL},
    error::IoError,
    util::file,
};

//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn log_level() -> LevelFilter {
        match env::var(SSHAUTH_ENV_LOG_LEVEL) {
            Ok(level) => match LevelFilter::from_str(&level) {
                Ok(level) => level,
                Err(_) => {
                    eprintln!(
                        "Unrecognized value for log level in env var {}, using 'info'",
                        SSHAUTH_ENV_LOG_LEVEL
                    );
                    LevelFilter::Info
                }
            },
            _ => LevelFilter::Info,
        }
    }

    fn log_type() -> LogType {
        LogType::Stderr
    }

    fn log_file() -> PathBuf {
        PathBuf::from("./sshauth.log")
    }
}

//------------ Config --------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "ConfigDefaults::log_level", deserialize_with = "de_level_filter")]
    pub log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    pub log_type: LogType,

    #[serde(default = "ConfigDefaults::log_file")]
    pub log_file: PathBuf,

    #[serde(default)]
    pub pkcs11: Option<Pkcs11Config>,

    /// Key files to offer, in order.
    #[serde(default)]
    pub identity_files: Vec<PathBuf>,

    #[serde(default)]
    pub certificate_file: Option<PathBuf>,
}

/// The `[pkcs11]` table.
#[derive(Debug, Deserialize)]
pub struct Pkcs11Config {
    pub lib_path: PathBuf,

    #[serde(default)]
    pub user_pin: Option<SecretString>,
}

impl Config {
    /// A configuration with every setting at its default.
    pub fn defaults() -> Self {
        Config {
            log_level: ConfigDefaults::log_level(),
            log_type: ConfigDefaults::log_type(),
            log_file: ConfigDefaults::log_file(),
            pkcs11: None,
            identity_files: Vec::new(),
            certificate_file: None,
        }
    }

    /// Loads the configuration.
    ///
    /// An explicitly given file must exist. The default file is optional,
    /// without it all settings take their defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::read_config(path),
            None => {
                let path = file::abs_path(Path::new(SSHAUTH_DEFAULT_CONFIG_FILE))?;
                if path.exists() {
                    Self::read_config(&path)
                } else {
                    Ok(Self::defaults())
                }
            }
        }
    }

    pub fn read_config(path: &Path) -> Result<Self, ConfigError> {
        let path = file::abs_path(path)?;
        let bytes = file::read(&path)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ConfigError::Other(format!("Config file '{}' is not UTF-8", path.display())))?;

        let mut config: Config = toml::from_str(&text)?;
        config.resolve_paths()?;
        Ok(config)
    }

    fn resolve_paths(&mut self) -> Result<(), ConfigError> {
        self.log_file = file::abs_path(&self.log_file)?;
        if let Some(pkcs11) = self.pkcs11.as_mut() {
            pkcs11.lib_path = file::abs_path(&pkcs11.lib_path)?;
        }
        for identity in self.identity_files.iter_mut() {
            *identity = file::abs_path(identity)?;
        }
        if let Some(cert) = self.certificate_file.as_mut() {
            *cert = file::abs_path(cert)?;
        }
        Ok(())
    }

    pub fn init_logging(&self) -> Result<(), ConfigError> {
        match self.log_type {
            LogType::File => self.file_logger(&self.log_file),
            LogType::Stderr => self.stderr_logger(),
        }
    }

    fn stderr_logger(&self) -> Result<(), ConfigError> {
        self.fern_logger()
            .chain(io::stderr())
            .apply()
            .map_err(|e| ConfigError::Other(format!("Failed to init stderr logging: {}", e)))
    }

    fn file_logger(&self, path: &Path) -> Result<(), ConfigError> {
        let file = fern::log_file(path)
            .map_err(|e| ConfigError::Other(format!("Failed to open log file '{}': {}", path.display(), e)))?;
        self.fern_logger()
            .chain(file)
            .apply()
            .map_err(|e| ConfigError::Other(format!("Failed to init file logging: {}", e)))?;
        info!("{} logs to file: {}", SSHAUTH_APP, path.display());
        Ok(())
    }

    fn fern_logger(&self) -> fern::Dispatch {
        // file reads are logged at trace, which is too noisy below debug
        let util_level = self.log_level.min(LevelFilter::Debug);

        let show_target = self.log_level == LevelFilter::Trace || self.log_level == LevelFilter::Debug;
        fern::Dispatch::new()
            .format(move |out, message, record| {
                if show_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                }
            })
            .level(self.log_level)
            .level_for("sshauth::util::file", util_level)
    }
}

//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    IoError(IoError),
    TomlError(toml::de::Error),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => e.fmt(f),
            ConfigError::TomlError(e) => write!(f, "Invalid config file: {}", e),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<IoError> for ConfigError {
    fn from(e: IoError) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}

//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            _ => Err(de::Error::custom(format!(
                "expected \"stderr\" or \"file\", found : \"{}\"",
                string
            ))),
        }
    }
}

fn de_level_filter<'de, D>(d: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let string = String::deserialize(d)?;
    LevelFilter::from_str(&string).map_err(de::Error::custom)
}

//------------ Tests ---------------------------------------------------------
