//! FIB command implementation for the ndnfwd CLI

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rust_ndnfwd_common::Name;
use rust_ndnfwd_core::{Fib, ForwarderConfig};
use std::path::Path;

use crate::utils::print_header;
use crate::FibCommands;

/// Handle FIB-related commands
pub fn handle_command(cmd: FibCommands, config: Option<&Path>) -> Result<()> {
    let fib = load_fib(config)?;
    match cmd {
        FibCommands::Show { json } => show_routes(&fib, json),
        FibCommands::Lookup { name } => lookup(&fib, &name),
    }
}

/// Builds a FIB from the configured static routes.
fn load_fib(config: Option<&Path>) -> Result<Fib> {
    let config = ForwarderConfig::load(config).context("Failed to load forwarder configuration")?;
    let mut fib = Fib::new();
    for route in config.routes {
        debug!("Route {} -> {} (cost {})", route.prefix, route.face, route.cost);
        fib.add(route.prefix, route.face, route.cost);
    }
    info!("Loaded {} FIB entries", fib.len());
    Ok(fib)
}

/// Show all routes in the FIB
fn show_routes(fib: &Fib, json: bool) -> Result<()> {
    if json {
        let entries: Vec<_> = fib.iter().collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    print_header(&format!("FIB ({} entries)", fib.len()));
    for entry in fib.iter() {
        println!("{}", entry);
    }
    Ok(())
}

fn lookup(fib: &Fib, name: &str) -> Result<()> {
    let name: Name = name.parse().with_context(|| format!("Invalid name {:?}", name))?;
    let entry = fib
        .longest_prefix_match(&name)
        .ok_or_else(|| anyhow!("No route for {}", name))?;

    println!("{} matches {}", name, entry.prefix());
    for (rank, metric) in entry.ranked().into_iter().enumerate() {
        println!("  {}. {} cost={} status={}", rank + 1, metric.face(), metric.cost(), metric.status());
    }
    Ok(())
}
