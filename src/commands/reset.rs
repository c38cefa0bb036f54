use std::path::Path;

use anyhow::Result;
use calsync_core::setup::async_remove_entry;
use owo_colors::OwoColorize;

use crate::app::{load_config, local_store};

pub async fn run(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let store = local_store(&config)?;
    async_remove_entry(&store).await?;
    println!("{} {}", "Removed".red(), store.path().display().dimmed());
    Ok(())
}
