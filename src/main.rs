use clap::Parser;
use pmp_teams::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Migrate(args) => cli::migrate::run(args).await,
        Command::CreateTeam(args) => cli::team::run(args).await,
        Command::Maintenance(command) => cli::maintenance::run(command).await,
        Command::Analytics(args) => cli::analytics::run(args).await,
    }
}
