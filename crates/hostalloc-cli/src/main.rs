use clap::{Parser, Subcommand};

mod commands;

use commands::Inputs;

#[derive(Parser)]
#[command(
    name = "hostalloc",
    about = "hostalloc — pick a server for a VM from an inventory snapshot",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the plugin chain and print the chosen server with reasons
    Allocate {
        #[command(flatten)]
        inputs: Inputs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print each server's free capacity after capacity-affecting plugins
    Capacity {
        #[command(flatten)]
        inputs: Inputs,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// List the built-in plugins.
    ///
    /// With --config, only the configured chain is listed, in order.
    Plugins {
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Write an engine.toml with the recommended chain
    Init {
        #[arg(short, long, default_value = ".")]
        path: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hostalloc=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Allocate { inputs, format } => commands::allocate::run(&inputs, &format),
        Commands::Capacity { inputs, format } => commands::capacity::run(&inputs, &format),
        Commands::Plugins { config } => commands::plugins::run(config.as_deref()),
        Commands::Init { path } => commands::init::run(&path),
    }
}
