//! Credentials from passwords, key files, certificates and agents.
pub mod agent;
pub mod cert;
pub mod keyfile;
pub mod method;
pub mod prompt;
pub mod unlock;

pub use self::agent::{Agent, AgentHandle, ExtendedAgent};
pub use self::cert::CertificateSigner;
pub use self::keyfile::KeyFileSigner;
pub use self::method::{AuthMethod, Signer};
pub use self::prompt::{PassphrasePrompt, TerminalPrompt};
