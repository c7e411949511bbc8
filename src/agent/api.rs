//! Agent API - the wired-up configuration agent.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::agent::config::AgentConfig;
use crate::customizers::default_registry;
use crate::data::{DataNode, DataPath, InvalidPathError, NodeFormatError};
use crate::datatree::ModifiableDataTree;
use crate::naming::{NamingContext, NamingError};
use crate::storage::{CommitInfo, StorageError};
use crate::transaction::{DataBroker, LogicalDatastoreType, TransactionError};
use crate::translate::{CustomizerRegistry, OperationalReader, RegistryError};
use crate::vpp::{FakeVpp, VppApi};

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Agent errors.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("naming error: {0}")]
    Naming(#[from] NamingError),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] InvalidPathError),

    #[error("invalid node: {0}")]
    InvalidNode(#[from] NodeFormatError),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("configuration repository not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The configuration agent: configuration tree, device, customizers and
/// the broker handing out transactions over them.
pub struct Agent {
    config: AgentConfig,
    tree: ModifiableDataTree,
    registry: Arc<CustomizerRegistry>,
    broker: DataBroker,
}

impl Agent {
    /// Open the agent against an in-memory device.
    pub fn open(config: AgentConfig) -> AgentResult<Self> {
        Self::open_with_device(config, Arc::new(FakeVpp::new()))
    }

    /// Open the agent against `vpp`.
    pub fn open_with_device(config: AgentConfig, vpp: Arc<dyn VppApi>) -> AgentResult<Self> {
        let signature = config.git_signature();
        let tree = if config.create_if_missing {
            ModifiableDataTree::open_or_init(&config.data_dir, signature)?
        } else if config.data_dir.exists() {
            ModifiableDataTree::open(&config.data_dir, signature)?
        } else {
            return Err(AgentError::NotFound(config.data_dir.clone()));
        };

        let registry = Arc::new(default_registry(
            vpp,
            NamingContext::new(&config.bridge_domain_context)?,
            NamingContext::new(&config.locator_set_context)?,
        )?);
        let operational = Arc::new(OperationalReader::new(registry.clone(), tree.clone()));
        let broker = DataBroker::new(tree.clone(), operational, registry.clone());

        info!(
            "agent ready at {} (head {})",
            config.data_dir.display(),
            tree.head()?.short()
        );

        Ok(Self {
            config,
            tree,
            registry,
            broker,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tree(&self) -> &ModifiableDataTree {
        &self.tree
    }

    pub fn broker(&self) -> &DataBroker {
        &self.broker
    }

    pub fn registry(&self) -> &Arc<CustomizerRegistry> {
        &self.registry
    }

    /// Read `path` in a one-shot read-only transaction.
    pub fn read(&self, store: LogicalDatastoreType, path: &DataPath) -> AgentResult<Option<DataNode>> {
        let tx = self.broker.new_read_only_transaction()?;
        Ok(tx.read(store, path)?)
    }

    /// Committed mappings of naming context `context`, by name.
    pub fn mappings(&self, context: &str) -> AgentResult<BTreeMap<String, u32>> {
        let context = NamingContext::new(context)?;
        let snapshot = self.tree.take_snapshot()?;
        Ok(context.mappings(&snapshot)?)
    }

    /// Committed configuration changes, newest first.
    pub fn history(&self, limit: Option<usize>) -> AgentResult<Vec<CommitInfo>> {
        Ok(self.tree.history(limit)?)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("data_dir", &self.config.data_dir)
            .field("tree", &self.tree)
            .field("broker", &self.broker)
            .finish()
    }
}
