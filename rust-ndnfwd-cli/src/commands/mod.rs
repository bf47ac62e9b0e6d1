//! Subcommand implementations

pub mod fib;
pub mod interest;
pub mod packet;
pub mod simulate;
