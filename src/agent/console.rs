//! Interactive console for cfgsync.

use std::io::{self, BufRead, Write};

use super::api::AgentResult;
use super::session::{Response, Session};

/// Console configuration.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Prompt string.
    pub prompt: String,
    /// Show timing information.
    pub timing: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: "cfgsync> ".into(),
            timing: false,
        }
    }
}

/// The interactive console.
pub struct Console {
    session: Session,
    config: ConsoleConfig,
    history: Vec<String>,
}

impl Console {
    pub fn new(session: Session) -> Self {
        Self::with_config(session, ConsoleConfig::default())
    }

    pub fn with_config(session: Session, config: ConsoleConfig) -> Self {
        Self {
            session,
            config,
            history: Vec::new(),
        }
    }

    /// Run the console until `.quit` or end of input.
    pub fn run(&mut self) -> AgentResult<()> {
        self.print_banner();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            // a transaction in progress shows in the prompt
            match self.session.transaction_id() {
                Some(id) => print!("{}[{}]> ", self.config.prompt.trim_end().trim_end_matches('>'), short(id)),
                None => print!("{}", self.config.prompt),
            }
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                println!();
                break;
            }

            let cmd = line.trim().to_string();
            if cmd.is_empty() {
                continue;
            }

            match cmd.as_str() {
                ".history" => {
                    self.print_history();
                    continue;
                }
                ".timing" => {
                    self.config.timing = !self.config.timing;
                    println!("Timing: {}", if self.config.timing { "on" } else { "off" });
                    continue;
                }
                _ => {}
            }
            self.history.push(cmd.clone());

            let start = std::time::Instant::now();
            match self.session.execute(&cmd) {
                Ok(Response::Quit) => break,
                Ok(Response::Help) => print_help(),
                Ok(response) => {
                    let text = render(&response);
                    if !text.is_empty() {
                        println!("{}", text);
                    }
                    if self.config.timing {
                        println!("Time: {:.3}ms", start.elapsed().as_secs_f64() * 1000.0);
                    }
                }
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        if let Some(id) = self.session.transaction_id() {
            println!("Transaction {} discarded", id);
        }
        Ok(())
    }

    fn print_banner(&self) {
        println!("╔═══════════════════════════════════════════════════╗");
        println!("║              cfgsync v{:<28}║", env!("CARGO_PKG_VERSION"));
        println!("║     Transactional device configuration agent      ║");
        println!("╠═══════════════════════════════════════════════════╣");
        println!("║         Type .help for available commands         ║");
        println!("╚═══════════════════════════════════════════════════╝");
        println!();
    }

    fn print_history(&self) {
        println!("Command History:");
        for (i, cmd) in self.history.iter().enumerate() {
            println!("  {}: {}", i + 1, cmd);
        }
    }
}

pub fn print_help() {
    println!("Data:");
    println!("  get config|oper <path>  Read a node from the configuration or the device");
    println!("  put <path> <json>       Replace the node at <path>");
    println!("  merge <path> <json>     Merge into the node at <path>");
    println!("  delete <path>           Remove the node at <path>");
    println!();
    println!("Transactions:");
    println!("  begin                   Start a transaction");
    println!("  commit                  Push the transaction to the device and commit it");
    println!("  abort                   Discard the transaction");
    println!("  Outside a transaction every write is submitted on its own.");
    println!();
    println!("Commands:");
    println!("  .help, .h, .?           Show this help message");
    println!("  .quit, .exit, .q        Exit the console");
    println!("  .log [n]                Show the last n configuration commits");
    println!("  .mappings <context>     Show the name to index mappings of a naming context");
    println!("  .history                Show command history");
    println!("  .timing                 Toggle timing display");
    println!();
    println!("Paths look like /vpp/bridge-domains/bridge-domain=bd1");
    println!();
}

/// Text form of a command response.
pub fn render(response: &Response) -> String {
    match response {
        Response::Node(Some(node)) => {
            serde_json::to_string_pretty(&node.to_json()).unwrap_or_else(|e| format!("<{}>", e))
        }
        Response::Node(None) => "(not found)".to_string(),
        Response::Submitted { commit, applied } => {
            let mut out = format!("committed {}", commit.short());
            for change in applied {
                out.push_str(&format!("\n  {}", change));
            }
            out
        }
        Response::Message(message) => message.clone(),
        Response::Log(commits) => commits
            .iter()
            .map(|c| format!("{} {} {}", c.id.short(), c.timestamp.format("%Y-%m-%d %H:%M:%S"), c.summary()))
            .collect::<Vec<_>>()
            .join("\n"),
        Response::Mappings { context, mappings } => {
            if mappings.is_empty() {
                return format!("{}: (empty)", context);
            }
            let width = mappings.keys().map(|k| k.len()).max().unwrap_or(0);
            let mut out = format!("{}:", context);
            for (name, index) in mappings {
                out.push_str(&format!("\n  {:width$}  {}", name, index, width = width));
            }
            out
        }
        Response::Help | Response::Quit => String::new(),
    }
}

fn short(id: &str) -> &str {
    let start = id.len().saturating_sub(6);
    id.get(start..).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataNode;
    use std::collections::BTreeMap;

    #[test]
    fn test_render_node() {
        assert_eq!(render(&Response::Node(None)), "(not found)");
        let text = render(&Response::Node(Some(DataNode::new().with("name", "bd1"))));
        assert!(text.contains("\"name\": \"bd1\""));
    }

    #[test]
    fn test_render_mappings() {
        let mut mappings = BTreeMap::new();
        mappings.insert("bd1".to_string(), 1);
        mappings.insert("long-name".to_string(), 2);
        let text = render(&Response::Mappings {
            context: "bridge-domain-context".to_string(),
            mappings,
        });
        assert_eq!(text, "bridge-domain-context:\n  bd1        1\n  long-name  2");

        let empty = render(&Response::Mappings {
            context: "ctx".to_string(),
            mappings: BTreeMap::new(),
        });
        assert_eq!(empty, "ctx: (empty)");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short("01HX3ABCDEFGH"), "CDEFGH");
        assert_eq!(short("abc"), "abc");
    }
}
