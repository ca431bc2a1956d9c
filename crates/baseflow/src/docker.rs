use baseflow_build::DockerEngine;
use colored::Colorize;

/// Connect to the Docker daemon, explaining how to fix a failed connection
pub async fn connect_with_error_handling() -> anyhow::Result<DockerEngine> {
    match DockerEngine::connect().await {
        Ok(engine) => Ok(engine),
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Docker connection error".red().bold());
            eprintln!();
            eprintln!("{}", "Cause:".yellow());
            eprintln!("  {}", e);
            eprintln!();
            eprintln!("{}", "How to fix:".yellow());
            eprintln!("  • Check that the Docker daemon is running");
            eprintln!("  • Check DOCKER_HOST if you use a remote or rootless daemon");
            eprintln!("  • Check that `docker ps` works for the current user");
            Err(anyhow::anyhow!("Failed to connect to Docker"))
        }
    }
}
