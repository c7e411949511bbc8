//! Console commands against an agent.
//!
//! A session runs one command at a time. Writes outside `begin` ... `commit`
//! are submitted right away, each in its own transaction.

use std::collections::BTreeMap;

use tracing::debug;

use crate::agent::api::{Agent, AgentError, AgentResult};
use crate::data::{DataNode, DataPath};
use crate::storage::{CommitId, CommitInfo};
use crate::transaction::{LogicalDatastoreType, TransactionResult, TxActive, WriteTransaction};
use crate::translate::AppliedChange;

/// Number of commits `.log` shows by default.
const DEFAULT_LOG_LIMIT: usize = 10;

/// What a command produced.
#[derive(Debug)]
pub enum Response {
    /// Result of `get`.
    Node(Option<DataNode>),
    /// A transaction was submitted.
    Submitted {
        commit: CommitId,
        applied: Vec<AppliedChange>,
    },
    Message(String),
    Log(Vec<CommitInfo>),
    Mappings {
        context: String,
        mappings: BTreeMap<String, u32>,
    },
    Help,
    Quit,
}

/// A command line interface to one agent, with at most one open
/// transaction.
pub struct Session {
    agent: Agent,
    tx: Option<WriteTransaction<TxActive>>,
}

impl Session {
    pub fn new(agent: Agent) -> Self {
        Self { agent, tx: None }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// The open transaction, if any.
    pub fn transaction_id(&self) -> Option<&str> {
        self.tx.as_ref().map(|tx| tx.id())
    }

    /// Run one command line.
    pub fn execute(&mut self, line: &str) -> AgentResult<Response> {
        let line = line.trim();
        debug!("command: {}", line);

        let (command, rest) = split_word(line);
        match command {
            "get" => {
                let (store, path) = split_word(rest);
                let store = store
                    .parse::<LogicalDatastoreType>()
                    .map_err(AgentError::InvalidCommand)?;
                self.get(store, &parse_path(path)?)
            }
            "put" => {
                let (path, json) = split_word(rest);
                let (path, node) = (parse_path(path)?, parse_node(json)?);
                self.stage(|tx| tx.put(LogicalDatastoreType::Configuration, &path, &node))
            }
            "merge" => {
                let (path, json) = split_word(rest);
                let (path, node) = (parse_path(path)?, parse_node(json)?);
                self.stage(|tx| tx.merge(LogicalDatastoreType::Configuration, &path, node))
            }
            "delete" => {
                let path = parse_path(rest)?;
                self.stage(|tx| tx.delete(LogicalDatastoreType::Configuration, &path))
            }
            "begin" => self.begin(),
            "commit" => self.commit(),
            "abort" => self.abort(),
            ".log" => {
                let limit = match rest {
                    "" => DEFAULT_LOG_LIMIT,
                    n => n
                        .parse()
                        .map_err(|_| AgentError::InvalidCommand(format!("not a count: {}", n)))?,
                };
                Ok(Response::Log(self.agent.history(Some(limit))?))
            }
            ".mappings" => {
                if rest.is_empty() {
                    return Err(AgentError::InvalidCommand("usage: .mappings <context>".to_string()));
                }
                Ok(Response::Mappings {
                    context: rest.to_string(),
                    mappings: self.agent.mappings(rest)?,
                })
            }
            ".help" | ".h" | ".?" => Ok(Response::Help),
            ".quit" | ".exit" | ".q" => Ok(Response::Quit),
            "" => Ok(Response::Message(String::new())),
            other => Err(AgentError::InvalidCommand(format!(
                "unknown command '{}', type .help for available commands",
                other
            ))),
        }
    }

    fn get(&self, store: LogicalDatastoreType, path: &DataPath) -> AgentResult<Response> {
        // inside a transaction, configuration reads see its own writes
        let node = match (&self.tx, store) {
            (Some(tx), LogicalDatastoreType::Configuration) => tx.read(store, path)?,
            _ => self.agent.read(store, path)?,
        };
        Ok(Response::Node(node))
    }

    fn stage<F>(&mut self, f: F) -> AgentResult<Response>
    where
        F: FnOnce(&mut WriteTransaction<TxActive>) -> TransactionResult<()>,
    {
        match self.tx.as_mut() {
            Some(tx) => {
                f(tx)?;
                Ok(Response::Message(format!("staged in {}", tx.id())))
            }
            None => {
                let ((), committed) = self.agent.broker().with_transaction(f)?;
                Ok(Response::Submitted {
                    commit: committed.final_commit(),
                    applied: committed.applied().to_vec(),
                })
            }
        }
    }

    fn begin(&mut self) -> AgentResult<Response> {
        if let Some(tx) = &self.tx {
            return Err(AgentError::InvalidCommand(format!(
                "transaction {} already in progress",
                tx.id()
            )));
        }
        let tx = self.agent.broker().new_write_only_transaction()?;
        let message = format!("transaction {} started", tx.id());
        self.tx = Some(tx);
        Ok(Response::Message(message))
    }

    fn commit(&mut self) -> AgentResult<Response> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AgentError::InvalidCommand("no transaction in progress".to_string()))?;
        let committed = tx.submit()?;
        Ok(Response::Submitted {
            commit: committed.final_commit(),
            applied: committed.applied().to_vec(),
        })
    }

    fn abort(&mut self) -> AgentResult<Response> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AgentError::InvalidCommand("no transaction in progress".to_string()))?;
        let cancelled = tx.cancel();
        Ok(Response::Message(format!("transaction {} aborted", cancelled.id())))
    }
}

/// Split off the first whitespace-separated word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

fn parse_path(s: &str) -> AgentResult<DataPath> {
    if s.is_empty() {
        return Err(AgentError::InvalidCommand("missing path".to_string()));
    }
    Ok(s.parse()?)
}

fn parse_node(json: &str) -> AgentResult<DataNode> {
    if json.is_empty() {
        return Err(AgentError::InvalidCommand("missing JSON node".to_string()));
    }
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(DataNode::from_json(value)?)
}
