//! prism - formula extraction and dependency analysis for academic papers

mod formula_cli;
mod graph_cli;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "prism")]
#[command(about = "Formula extraction and dependency analysis for academic papers", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Formula extraction and variable analysis
    #[command(subcommand)]
    Formula(formula_cli::FormulaCommands),
    /// Dependency graph analysis and diagrams
    #[command(subcommand)]
    Graph(graph_cli::GraphCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Formula(cmd) => formula_cli::run(cmd).await?,
        Commands::Graph(cmd) => graph_cli::run(cmd).await?,
    }

    Ok(())
}
