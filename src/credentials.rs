//! Credential lookup for sources behind a login.
//!
//! Credentials are owned by an external store; adapters only ask for the
//! pair belonging to their source. A missing pair degrades that one source.

use crate::models::SourceId;
use std::collections::HashMap;
use std::fmt;

/// An identity/secret pair. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    identity: String,
    secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

pub trait CredentialStore: Send + Sync {
    fn credentials(&self, source: SourceId) -> Option<Credentials>;
}

/// Reads credentials from the process environment.
///
/// | Source | Variables |
/// |--------|-----------|
/// | Valor Econômico | `VALOR_EMAIL`, `VALOR_PASSWORD` |
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl EnvCredentials {
    fn pair(identity_var: &str, secret_var: &str) -> Option<Credentials> {
        let identity = std::env::var(identity_var).ok().filter(|v| !v.trim().is_empty())?;
        let secret = std::env::var(secret_var).ok().filter(|v| !v.is_empty())?;
        Some(Credentials::new(identity, secret))
    }
}

impl CredentialStore for EnvCredentials {
    fn credentials(&self, source: SourceId) -> Option<Credentials> {
        match source {
            SourceId::ValorEconomico => Self::pair("VALOR_EMAIL", "VALOR_PASSWORD"),
            SourceId::PipelineValor | SourceId::FusoesAquisicoes => None,
        }
    }
}

/// Fixed in-memory credentials.
#[derive(Debug, Default, Clone)]
pub struct StaticCredentials {
    pairs: HashMap<SourceId, Credentials>,
}

impl StaticCredentials {
    pub fn with(mut self, source: SourceId, credentials: Credentials) -> Self {
        self.pairs.insert(source, credentials);
        self
    }
}

impl CredentialStore for StaticCredentials {
    fn credentials(&self, source: SourceId) -> Option<Credentials> {
        self.pairs.get(&source).cloned()
    }
}
