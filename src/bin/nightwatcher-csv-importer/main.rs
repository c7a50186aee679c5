mod args;
mod csv;

use std::fs::File;

use anyhow::Context as _;
use args::Args;
use clap::Parser as _;
use nightwatcher::{
    db::{PgReadingStore, new_pool},
    store::ReadingStore as _,
};

use crate::csv::CsvReadingIter;

const BULK_INSERT_SIZE: usize = 1000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let file =
        File::open(&args.file).with_context(|| format!("failed to open file: {:?}", args.file))?;
    let iter = CsvReadingIter::new(file, args.site_name.clone())
        .context("failed to create CSV reading iterator")?;

    let pool = new_pool(&args.database_url, 1).await?;
    let store = PgReadingStore::new(pool);
    store
        .ensure_schema()
        .await
        .context("failed to ensure reading schema")?;

    let mut buffer = Vec::with_capacity(BULK_INSERT_SIZE);
    let mut total = 0;

    for result in iter {
        let reading = result.context("failed to parse CSV record")?;
        buffer.push(reading);

        if buffer.len() >= BULK_INSERT_SIZE {
            total += store
                .insert_batch(&buffer)
                .await
                .context("failed to bulk insert readings")?;
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        total += store
            .insert_batch(&buffer)
            .await
            .context("failed to bulk insert remaining readings")?;
    }

    println!("Inserted {} readings from {:?}", total, args.file);

    Ok(())
}
