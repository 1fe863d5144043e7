//! Getting signers from a running SSH agent.
use crate::{
    auth::method::{AuthMethod, Signer},
    error::AuthError,
};

//------------ Agent ---------------------------------------------------------

/// The basic agent capability: listing the keys it will sign with.
pub trait Agent {
    fn signers(&self) -> Result<Vec<Box<dyn Signer>>, AuthError>;
}

/// An agent that also supports protocol extensions.
pub trait ExtendedAgent: Agent {
    /// Sends an extension request and returns the agent's response.
    fn extension(&self, kind: &str, contents: &[u8]) -> Result<Vec<u8>, AuthError>;
}

//------------ AgentHandle ---------------------------------------------------

/// The agent shapes we accept.
#[derive(Clone, Copy)]
pub enum AgentHandle<'a> {
    Basic(&'a dyn Agent),
    Extended(&'a dyn ExtendedAgent),
}

impl AgentHandle<'_> {
    /// Returns every signer the agent offers, as is.
    pub fn signers(self) -> Result<Vec<Box<dyn Signer>>, AuthError> {
        match self {
            AgentHandle::Basic(agent) => agent.signers(),
            AgentHandle::Extended(agent) => agent.signers(),
        }
    }

    pub fn auth_methods(self) -> Result<Vec<AuthMethod>, AuthError> {
        Ok(self.signers()?.into_iter().map(AuthMethod::PublicKey).collect())
    }
}

impl<'a> From<&'a dyn Agent> for AgentHandle<'a> {
    fn from(agent: &'a dyn Agent) -> Self {
        AgentHandle::Basic(agent)
    }
}

impl<'a> From<&'a dyn ExtendedAgent> for AgentHandle<'a> {
    fn from(agent: &'a dyn ExtendedAgent) -> Self {
        AgentHandle::Extended(agent)
    }
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use crate::auth::keyfile::KeyFileSigner;

    use super::*;

    const PLAIN: &[u8] = include_bytes!("../../test-resources/keys/ed25519_plain");
    const LOCKED: &[u8] = include_bytes!("../../test-resources/keys/ed25519_locked");

    struct TwoKeyAgent {
        calls: Cell<usize>,
    }

    impl Agent for TwoKeyAgent {
        fn signers(&self) -> Result<Vec<Box<dyn Signer>>, AuthError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![
                Box::new(KeyFileSigner::from_data(PLAIN, None)?),
                Box::new(KeyFileSigner::from_data(LOCKED, Some("correct horse"))?),
            ])
        }
    }

    impl ExtendedAgent for TwoKeyAgent {
        fn extension(&self, kind: &str, _contents: &[u8]) -> Result<Vec<u8>, AuthError> {
            Err(AuthError::Agent(format!("extension '{}' not supported", kind)))
        }
    }

    struct LockedAgent;

    impl Agent for LockedAgent {
        fn signers(&self) -> Result<Vec<Box<dyn Signer>>, AuthError> {
            Err(AuthError::Agent("agent refused operation".to_string()))
        }
    }

    #[test]
    fn basic_and_extended_agents_both_list_signers() {
        let agent = TwoKeyAgent { calls: Cell::new(0) };

        let basic: &dyn Agent = &agent;
        assert_eq!(AgentHandle::from(basic).signers().unwrap().len(), 2);

        let extended: &dyn ExtendedAgent = &agent;
        let methods = AgentHandle::from(extended).auth_methods().unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(agent.calls.get(), 2);
    }

    #[test]
    fn agent_errors_are_passed_through_without_retry() {
        let err = AgentHandle::Basic(&LockedAgent).signers().unwrap_err();
        assert_eq!(err.to_string(), "Agent error: agent refused operation");
    }
}
