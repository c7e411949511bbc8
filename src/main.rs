//! cfgsync - transactional device configuration agent
//!
//! Command-line entry point: runs commands given with `-e`, or an
//! interactive console.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use cfgsync::agent::{print_help, render, Agent, AgentConfig, AgentResult, Console, Response, Session};

#[derive(Debug, Parser)]
#[command(name = "cfgsync", version, about = "Transactional device configuration agent")]
struct Cli {
    /// Configuration repository directory (default: .cfgsync)
    #[arg(short = 'd', long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// JSON agent configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Execute a command and exit; may be repeated
    #[arg(short, long = "execute", value_name = "COMMAND")]
    execute: Vec<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> AgentResult<()> {
    let mut config = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config = config.data_dir(dir);
    }
    debug!("{:?}", config);

    let mut session = Session::new(Agent::open(config)?);

    if cli.execute.is_empty() {
        return Console::new(session).run();
    }

    for command in &cli.execute {
        match session.execute(command)? {
            Response::Quit => break,
            Response::Help => print_help(),
            response => println!("{}", render(&response)),
        }
    }
    Ok(())
}
