use clap::Parser;
use skillswap::db::DatabaseConfig;
use skillswap::{get_db_pool, utils};

/// Applies pending database migrations.
#[derive(Parser, Debug)]
#[command(name = "migrate")]
struct Args {
    /// Database URL (overrides DATABASE_URL from the environment)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let args = Args::parse();
    let mut db_config = DatabaseConfig::from_env()?;
    if let Some(database_url) = args.database_url {
        db_config.database_url = database_url;
    }
    let pool = get_db_pool(&db_config).await?;

    println!("Running database migrations...");
    skillswap::db::migrations::run_migrations(&pool).await?;
    println!("Migrations completed successfully!");

    Ok(())
}
