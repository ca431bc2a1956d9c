use baseflow_build::TrackingStore;
use baseflow_config::Settings;
use colored::Colorize;

pub async fn handle(settings: &Settings) -> anyhow::Result<()> {
    let data = super::tracking_store(settings)
        .load()
        .await?
        .unwrap_or_default();

    if data.is_empty() {
        println!("{}", "No images have been built yet".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Tracked images ({}):", data.len()).bold()
    );
    for (tag, record) in data.iter() {
        let state = if record.is_published {
            "published".green()
        } else if record.is_built {
            "built".yellow()
        } else {
            "pending".normal()
        };
        let built_on = record
            .built_on
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());

        println!("  {:<10} {} ({})", state, tag.cyan(), built_on);
    }

    let pending = data.unpublished().len();
    if pending > 0 {
        println!();
        println!("{} image(s) waiting to be published", pending);
    }
    Ok(())
}
