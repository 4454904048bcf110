//! Cascading credential lookup.
//!
//! The eventual upload step needs an auth token obtainable from several
//! fallback sources in priority order. Providers are tried in sequence and
//! the chain short-circuits on the first success; callers compose a chain
//! once instead of nesting lookups.

use crate::error::CredentialError;

/// One source a credential may come from.
pub trait CredentialProvider: Send + Sync {
    /// Short name used in diagnostics when the whole chain fails.
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<String, CredentialError>;
}

/// Try providers in order, returning the first successful credential.
///
/// When every provider fails, the error names each source that was tried.
pub fn first_success<'a, I>(providers: I) -> Result<String, CredentialError>
where
    I: IntoIterator<Item = &'a dyn CredentialProvider>,
{
    let mut attempted = Vec::new();
    for provider in providers {
        match provider.fetch() {
            Ok(credential) => return Ok(credential),
            Err(e) => {
                tracing::debug!(provider = provider.name(), "credential lookup failed: {}", e);
                attempted.push(provider.name().to_string());
            }
        }
    }
    Err(CredentialError::Exhausted { attempted })
}

/// Credential stored in an environment variable.
pub struct EnvProvider {
    variable: String,
}

impl EnvProvider {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl CredentialProvider for EnvProvider {
    fn name(&self) -> &str {
        &self.variable
    }

    fn fetch(&self) -> Result<String, CredentialError> {
        std::env::var(&self.variable)
            .ok()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CredentialError::NotFound(self.variable.clone()))
    }
}

/// Fixed credential, typically loaded from configuration.
pub struct StaticProvider {
    name: String,
    value: Option<String>,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

impl CredentialProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self) -> Result<String, CredentialError> {
        self.value
            .clone()
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CredentialError::NotFound(self.name.clone()))
    }
}
