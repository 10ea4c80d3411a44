//! CLI modules for Tech Check.

pub mod seed;
pub mod seed_runner;

pub use seed::SeedCli;
pub use seed_runner::run as run_seed;
