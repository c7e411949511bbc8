//! Agent configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent::api::{AgentError, AgentResult};
use crate::customizers::{BRIDGE_DOMAIN_CONTEXT, LOCATOR_SET_CONTEXT};
use crate::storage::GitSignature;

/// Agent configuration options.
///
/// Every field has a default, so a configuration file only needs to name
/// what it changes:
///
/// ```json
/// { "data_dir": "/var/lib/cfgsync", "signature_name": "edge-router-1" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory of the configuration repository.
    pub data_dir: PathBuf,
    /// Create the repository if it doesn't exist.
    pub create_if_missing: bool,
    /// Author of configuration commits.
    pub signature_name: String,
    pub signature_email: String,
    /// Naming context for bridge domain ids.
    pub bridge_domain_context: String,
    /// Naming context for locator set indices.
    pub locator_set_context: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let signature = GitSignature::agent();
        Self {
            data_dir: PathBuf::from(".cfgsync"),
            create_if_missing: true,
            signature_name: signature.name,
            signature_email: signature.email,
            bridge_domain_context: BRIDGE_DOMAIN_CONTEXT.to_string(),
            locator_set_context: LOCATOR_SET_CONTEXT.to_string(),
        }
    }
}

impl AgentConfig {
    /// Create a new configuration with the given data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| AgentError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Set the data directory.
    pub fn data_dir(mut self, value: impl Into<PathBuf>) -> Self {
        self.data_dir = value.into();
        self
    }

    /// Set create_if_missing flag.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Set the commit author.
    pub fn signature(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.signature_name = name.into();
        self.signature_email = email.into();
        self
    }

    pub fn bridge_domain_context(mut self, value: impl Into<String>) -> Self {
        self.bridge_domain_context = value.into();
        self
    }

    pub fn locator_set_context(mut self, value: impl Into<String>) -> Self {
        self.locator_set_context = value.into();
        self
    }

    pub(crate) fn git_signature(&self) -> GitSignature {
        GitSignature::new(&self.signature_name, &self.signature_email)
    }
}
