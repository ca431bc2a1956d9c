use crate::docker;
use baseflow_build::{BuildError, TrackingStore};
use baseflow_config::Settings;
use colored::Colorize;
use std::sync::Arc;

pub async fn handle(settings: &Settings, tag: Option<String>, verbose: bool) -> anyhow::Result<()> {
    // Fail on a missing tracking file before touching the daemon
    let has_records = super::tracking_store(settings)
        .load()
        .await?
        .is_some_and(|data| !data.is_empty());
    if !has_records {
        return Err(BuildError::NothingBuilt.into());
    }

    println!("{}", "Publishing base images...".blue());

    let engine = docker::connect_with_error_handling().await?;
    let manager = super::manager(settings, Arc::new(engine), None);

    let pushed = manager.publish(tag.as_deref(), verbose).await?;

    if !pushed.is_empty() {
        println!();
        println!(
            "{}",
            format!("✓ Published {} image(s)", pushed.len()).green().bold()
        );
    }
    Ok(())
}
