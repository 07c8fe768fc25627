//! Interactive client over an in-process cluster.

use std::path::Path;

use anyhow::{Context, Result};
use causeway_config::CausewayConfig;
use causeway_frontend::{FrontEnd, FrontEndApi};
use causeway_replica::Catalog;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::client::{ClientCommand, HELP_TEXT, format_details, format_snapshot};
use crate::network::Network;

/// REPL prompt.
const PROMPT: &str = "causeway> ";

pub fn run(path: &str, replicas: Option<usize>, gossip_ms: Option<u64>) -> Result<()> {
    let mut config = CausewayConfig::load_from_dir(path)
        .with_context(|| format!("Failed to load configuration from {path}"))?;
    if let Some(replicas) = replicas {
        config.cluster.replicas = replicas;
    }
    if let Some(gossip_ms) = gossip_ms {
        config.gossip.period_ms = gossip_ms;
    }
    config.validate()?;

    let catalog = match config.catalog.paths() {
        Some((items, ratings)) => Some(load_catalog(items, ratings)?),
        None => {
            tracing::info!("no catalog configured, starting with empty replicas");
            None
        }
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let network = {
        let _guard = runtime.enter();
        Network::launch(&config, catalog.as_ref())?
    };

    println!("Causeway interactive client");
    println!(
        "  Replicas: {}   write fan-out: {}   gossip every {} ms",
        config.cluster.replicas, config.frontend.write_replicas, config.gossip.period_ms
    );
    println!();
    println!("Type help for help, quit to exit.");
    println!();

    let result = read_loop(&network);

    runtime.block_on(network.shutdown())?;
    println!("Goodbye!");
    result
}

fn load_catalog(items: &Path, ratings: &Path) -> Result<Catalog> {
    Catalog::load(items, ratings).with_context(|| {
        format!(
            "Failed to load catalog from {} and {}",
            items.display(),
            ratings.display()
        )
    })
}

fn read_loop(network: &Network) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to open terminal")?;

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => return Ok(()),
            Err(e) => return Err(e).context("Failed to read input"),
        };

        let command = match ClientCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("Error: {e:#}");
                println!("Type help for available commands.");
                continue;
            }
        };
        let _ = editor.add_history_entry(line.as_str());

        if command == ClientCommand::Quit {
            return Ok(());
        }
        execute(network, command);
    }
}

fn execute(network: &Network, command: ClientCommand) {
    let front_end: &FrontEnd = network.front_end();

    match command {
        ClientCommand::Query(params) => match front_end.query(params) {
            Ok(details) => print!("{}", format_details(params.item, &details)),
            Err(e) => println!("Error: {e}"),
        },
        ClientCommand::Submit(params) => match front_end.submit(params) {
            Ok(true) => println!("Rating recorded."),
            Ok(false) => println!(
                "Not recorded: user {} already rated item {}.",
                params.user, params.item
            ),
            Err(e) => println!("Error: {e}"),
        },
        ClientCommand::Update(params) => match front_end.update(params) {
            Ok(true) => println!("Rating updated."),
            Ok(false) => println!(
                "Not updated: user {} has not rated item {}.",
                params.user, params.item
            ),
            Err(e) => println!("Error: {e}"),
        },
        ClientCommand::Status { replica, status } => {
            match front_end.change_replica_status(replica, status) {
                Ok(()) => println!("{replica} is now {status}."),
                Err(e) => println!("Error: {e}"),
            }
        }
        ClientCommand::Replicas => match network.snapshots() {
            Ok(snapshots) => {
                for snapshot in &snapshots {
                    println!("{}", format_snapshot(snapshot));
                }
            }
            Err(e) => println!("Error: {e:#}"),
        },
        ClientCommand::Reset => match front_end.reset_picker_state() {
            Ok(()) => println!("Replica order reset."),
            Err(e) => println!("Error: {e}"),
        },
        ClientCommand::Help => println!("{HELP_TEXT}"),
        ClientCommand::Quit => {}
    }
}
