// src/bin/import_ingredients.rs

use std::{fs::File, path::PathBuf};

use clap::Parser;
use dotenvy::dotenv;
use foodgram::{config::Config, import};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "import_ingredients")]
#[command(about = "Load the ingredient catalogue into the database")]
struct Args {
    /// Read ingredients.json instead of ingredients.csv
    #[arg(long)]
    json: bool,

    /// Input file; defaults to DATA_FOLDER/ingredients.{csv,json}
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.rust_log))
        .with_target(false)
        .init();

    let path = args
        .file
        .unwrap_or_else(|| import::default_path(&config.data_folder, args.json));
    tracing::info!("Reading ingredients from {}", path.display());

    let file = File::open(&path)?;
    let ingredients = if args.json {
        import::parse_json(file)?
    } else {
        import::parse_csv(file)?
    };
    tracing::info!("Parsed {} ingredients", ingredients.len());

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(config.database.connect_options()?)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let inserted = import::load(&pool, &ingredients).await?;
    tracing::info!(
        "Imported {} new ingredients ({} already present)",
        inserted,
        (ingredients.len() as u64).saturating_sub(inserted)
    );

    Ok(())
}
