use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod utils;

/// ndnfwd command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Forwarder configuration file (TOML, JSON or YAML)
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the forwarding table built from the configured routes
    Fib {
        #[clap(subcommand)]
        cmd: FibCommands,
    },

    /// Build Interest packets
    Interest {
        #[clap(subcommand)]
        cmd: InterestCommands,
    },

    /// Decode packets
    Packet {
        #[clap(subcommand)]
        cmd: PacketCommands,
    },

    /// Run consumer/producer traffic through an in-process forwarder
    Simulate {
        /// Name prefix served by the producers
        #[clap(short, long, default_value = "/simulate")]
        prefix: String,

        /// Number of Interests to express
        #[clap(short = 'n', long, default_value = "100")]
        count: usize,

        /// Number of producer faces
        #[clap(long, default_value = "2")]
        producers: usize,

        /// Round-trip time between forwarder and producers, in milliseconds
        #[clap(long, default_value = "10")]
        rtt: u64,

        /// The cheapest producer ignores every N-th Interest (0 = never)
        #[clap(long, default_value = "0")]
        drop_every: usize,
    },
}

#[derive(Subcommand)]
pub enum FibCommands {
    /// Show all routes in the FIB
    Show {
        /// Print entries as JSON
        #[clap(long)]
        json: bool,
    },

    /// Longest-prefix match a name against the FIB
    Lookup {
        /// Name to look up
        name: String,
    },
}

#[derive(Subcommand)]
pub enum InterestCommands {
    /// Encode an Interest and print it as hex
    Encode {
        /// Name to request
        name: String,

        /// Nonce (random if omitted)
        #[clap(long)]
        nonce: Option<u32>,

        /// Lifetime in milliseconds
        #[clap(short, long, default_value = "4000")]
        lifetime: u64,

        /// Scope
        #[clap(short, long)]
        scope: Option<u8>,

        /// Print the full packet serialization (uid, metadata, bytes)
        #[clap(long)]
        wire: bool,
    },
}

#[derive(Subcommand)]
pub enum PacketCommands {
    /// Decode a hex-encoded Interest or ContentObject and print it as JSON
    Decode {
        /// Header bytes or full packet serialization, in hex
        hex: String,
    },
}

fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(
        if cli.verbose { "debug" } else { "warn" }
    )).init();

    // Execute the specified command
    match cli.command {
        Commands::Fib { cmd } => {
            commands::fib::handle_command(cmd, cli.config.as_deref())?;
        }
        Commands::Interest { cmd } => {
            commands::interest::handle_command(cmd)?;
        }
        Commands::Packet { cmd } => {
            commands::packet::handle_command(cmd)?;
        }
        Commands::Simulate { prefix, count, producers, rtt, drop_every } => {
            let options = commands::simulate::SimulateOptions {
                prefix,
                count,
                producers,
                rtt_ms: rtt,
                drop_every,
            };
            commands::simulate::run(options, cli.config.as_deref())?;
        }
    }

    Ok(())
}
