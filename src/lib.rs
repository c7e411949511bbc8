//! cfgsync - a transactional device configuration agent
//!
//! Configuration lives in a git-backed data tree: every node is a
//! directory, every submitted transaction is a commit, and the whole
//! configuration history is preserved in `.git/`. Submitting a transaction
//! first pushes its changes to the device through writer customizers and
//! only then commits them. Reads of the operational store go to the device
//! through reader customizers.
//!
//! # Example
//!
//! ```no_run
//! use cfgsync::agent::{Agent, AgentConfig};
//! use cfgsync::data::{DataNode, DataPath};
//! use cfgsync::transaction::LogicalDatastoreType;
//!
//! let agent = Agent::open(AgentConfig::new("./agent-data")).unwrap();
//! let path: DataPath = "/lisp/locator-sets/locator-set=ls1".parse().unwrap();
//!
//! let mut tx = agent.broker().new_write_only_transaction().unwrap();
//! tx.put(LogicalDatastoreType::Configuration, &path, &DataNode::new().with("name", "ls1"))
//!     .unwrap();
//! tx.submit().unwrap();
//!
//! let node = agent.read(LogicalDatastoreType::Operational, &path).unwrap();
//! assert_eq!(node.unwrap().get_str("name"), Some("ls1"));
//! ```

pub mod agent;
pub mod customizers;
pub mod data;
pub mod datatree;
pub mod naming;
pub mod storage;
pub mod transaction;
pub mod translate;
pub mod vpp;
