//! Interest command implementation for the ndnfwd CLI

use anyhow::{Context, Result};
use log::debug;
use rust_ndnfwd_common::{Interest, Name};
use std::time::Duration;

use crate::utils::hex;
use crate::InterestCommands;

pub fn handle_command(cmd: InterestCommands) -> Result<()> {
    match cmd {
        InterestCommands::Encode { name, nonce, lifetime, scope, wire } => {
            let name: Name = name.parse().with_context(|| format!("Invalid name {:?}", name))?;
            let mut interest = Interest::new(name).with_lifetime(Duration::from_millis(lifetime));
            if let Some(nonce) = nonce {
                interest = interest.with_nonce(nonce);
            }
            if let Some(scope) = scope {
                interest = interest.with_scope(scope);
            }
            debug!("Encoding {:?}", interest);

            let packet = interest.to_packet();
            if wire {
                println!("{}", hex(&packet.to_wire()));
            } else {
                println!("{}", hex(packet.as_slice()));
            }
            Ok(())
        }
    }
}
