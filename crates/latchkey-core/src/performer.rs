//! Performer capability.
//!
//! Machines never execute side effects themselves. Each output of a
//! transition is turned into an [`Action`] and handed to a [`Performer`],
//! which routes it to the crypto, I/O or storage subsystem and returns an
//! opaque outcome. The outcomes of one dispatch are collected in order.

use std::{convert::Infallible, error::Error, fmt, sync::Arc};

use latchkey_proto::AlertDescription;

/// Negotiated cipher parameters, identified by name.
///
/// The core never interprets a cipher spec; it only carries it from the
/// input that selected it to the outputs that announce and persist it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CipherSpec(Arc<str>);

impl CipherSpec {
    /// Cipher spec with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Name of the cipher spec.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CipherSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CipherSpec {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Side effect requested by a machine output.
///
/// The `Display` form is the stable descriptor used in logs and by the
/// identity performer in tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Send ServerHello
    SendServerHello,
    /// Send the certificate chain
    SendCertificate,
    /// Send ServerKeyExchange
    SendServerKeyExchange,
    /// Send CertificateRequest
    SendCertificateRequest,
    /// Send ServerHelloDone
    SendServerHelloDone,
    /// Send Finished
    SendFinished,
    /// Send a fatal alert with this description
    SendAlert(AlertDescription),
    /// Announce the switch to a new cipher spec
    EmitChangeRequest(CipherSpec),
    /// Persist the new cipher spec locally
    PersistSpec(CipherSpec),
    /// Signal that the cipher spec change is complete on our side
    EmitServerDone,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendServerHello => f.write_str("server hello"),
            Self::SendCertificate => f.write_str("certificate response"),
            Self::SendServerKeyExchange => f.write_str("server key exchange"),
            Self::SendCertificateRequest => f.write_str("certificate request"),
            Self::SendServerHelloDone => f.write_str("server hello done"),
            Self::SendFinished => f.write_str("finished"),
            Self::SendAlert(_) => f.write_str("alert"),
            Self::EmitChangeRequest(spec) => write!(f, "change to {spec}"),
            Self::PersistSpec(_) => f.write_str("saving cipherspec"),
            Self::EmitServerDone => f.write_str("server done"),
        }
    }
}

/// Executes actions on behalf of a machine.
///
/// Implementations may block or defer internally, but `perform` must not
/// return before the action is complete: sibling actions of one transition
/// run strictly in order.
pub trait Performer {
    /// Value collected into the dispatch result for each action.
    type Outcome;
    /// Failure of a single action.
    type Error: Error + Send + Sync + 'static;

    /// Carry out `action`.
    fn perform(&mut self, action: Action) -> Result<Self::Outcome, Self::Error>;
}

impl<P: Performer + ?Sized> Performer for &mut P {
    type Outcome = P::Outcome;
    type Error = P::Error;

    fn perform(&mut self, action: Action) -> Result<Self::Outcome, Self::Error> {
        (**self).perform(action)
    }
}

/// Performer that returns every action unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentityPerformer;

impl Performer for IdentityPerformer {
    type Outcome = Action;
    type Error = Infallible;

    fn perform(&mut self, action: Action) -> Result<Action, Infallible> {
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors() {
        let spec = CipherSpec::from("spec_change");
        let rendered: Vec<String> = [
            Action::SendServerHello,
            Action::SendCertificate,
            Action::SendServerKeyExchange,
            Action::SendCertificateRequest,
            Action::SendServerHelloDone,
            Action::SendFinished,
            Action::SendAlert(AlertDescription::HandshakeFailure),
            Action::EmitChangeRequest(spec.clone()),
            Action::PersistSpec(spec),
            Action::EmitServerDone,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert_eq!(rendered, [
            "server hello",
            "certificate response",
            "server key exchange",
            "certificate request",
            "server hello done",
            "finished",
            "alert",
            "change to spec_change",
            "saving cipherspec",
            "server done",
        ]);
    }

    #[test]
    fn identity_returns_input() {
        let mut performer = IdentityPerformer;
        let action = Action::PersistSpec(CipherSpec::new("aes"));
        assert_eq!(performer.perform(action.clone()), Ok(action));
    }
}
