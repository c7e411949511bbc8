//! The configuration agent and its command console.
//!
//! [`Agent`] wires the configuration tree, the device and the customizers
//! together behind a [`DataBroker`](crate::transaction::DataBroker).
//! [`Session`] runs text commands against it, and [`Console`] runs a session
//! interactively.

mod api;
mod config;
mod console;
mod session;

pub use api::{Agent, AgentError, AgentResult};
pub use config::AgentConfig;
pub use console::{print_help, render, Console, ConsoleConfig};
pub use session::{Response, Session};
