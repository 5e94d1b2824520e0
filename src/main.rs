//! # Fireline CLI
//!
//! Routes between road nodes with plain Dijkstra and a Contraction Hierarchy
//! that is repaired in place as roads close and reopen.

use clap::Parser;
use tracing::error;

mod cli;

fn main() {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbose, cli.log_json);

    if let Err(e) = cli.run() {
        error!("{e:#}");
        std::process::exit(1);
    }
}
