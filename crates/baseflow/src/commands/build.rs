use crate::docker;
use baseflow_build::BuildOptions;
use baseflow_config::Settings;
use colored::Colorize;
use std::sync::Arc;

pub async fn handle(
    settings: &Settings,
    image: Option<String>,
    options: BuildOptions,
    commit: Option<String>,
) -> anyhow::Result<()> {
    println!("{}", "Building base images...".green());
    println!(
        "Images: {}",
        settings.images_dir.display().to_string().cyan()
    );

    // Resolve the build list before connecting so a bad name fails fast
    let definitions = baseflow_build::discover(&settings.images_dir, image.as_deref())?;
    println!();
    println!(
        "{}",
        format!("Build order ({}):", definitions.len()).bold()
    );
    for definition in &definitions {
        println!("  • {}", definition.name.cyan());
    }
    println!();

    let engine = docker::connect_with_error_handling().await?;
    let manager = super::manager(settings, Arc::new(engine), commit);

    let tags = manager.build(image.as_deref(), options).await?;

    println!();
    println!(
        "{}",
        format!("✓ Built {} image(s)", tags.len()).green().bold()
    );
    println!("Run {} to push them.", "baseflow publish".cyan());
    Ok(())
}
