//! Command execution: spawning a single shell command with a wall timeout,
//! and running an ordered chain of such commands under a
//! failure-and-continuation policy.

pub mod chain;
pub mod executor;

pub use chain::ChainRunner;
pub use executor::{CommandExecutor, SystemCommandExecutor};
