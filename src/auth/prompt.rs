//! Interactive passphrase entry.
use std::io;

use crate::error::AuthError;

//------------ PassphrasePrompt ----------------------------------------------

/// Something that can ask a person for a passphrase.
pub trait PassphrasePrompt {
    /// Shows `label` and reads one line without echoing it.
    fn read_passphrase(&mut self, label: &str) -> io::Result<String>;

    /// Tells the person why the last passphrase did not work.
    fn report_failure(&mut self, err: &AuthError);
}

//------------ TerminalPrompt ------------------------------------------------

/// Reads from the controlling terminal with echo disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalPrompt;

impl PassphrasePrompt for TerminalPrompt {
    fn read_passphrase(&mut self, label: &str) -> io::Result<String> {
        rpassword::prompt_password(label)
    }

    fn report_failure(&mut self, err: &AuthError) {
        eprintln!("{}", err);
    }
}
