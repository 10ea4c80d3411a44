//! Tech Check - fixture loader

use clap::Parser;

use tech_check_backend::{
    cli::{run_seed, SeedCli},
    config::Config,
    error::Result,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = SeedCli::parse();
    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_format);

    let report = run_seed(cli, config).await?;
    println!(
        "Seeded {} categories, {} questions, {} permissions, {} users",
        report.categories, report.questions, report.permissions, report.users
    );
    Ok(())
}
