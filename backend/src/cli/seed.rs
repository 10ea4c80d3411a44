//! Command-line options for the fixture loader.

use clap::Parser;

/// Load demo categories, questions, permissions and accounts
#[derive(Parser, Debug)]
#[command(name = "tc-seed")]
#[command(about = "Seed Tech Check with fixture data", long_about = None)]
pub struct SeedCli {
    /// Truncate every table before seeding (Postgres only)
    #[arg(long)]
    pub reset: bool,

    /// Password for the seeded admin and default accounts
    #[arg(long, env = "SEED_PASSWORD", default_value = "password")]
    pub password: String,
}
