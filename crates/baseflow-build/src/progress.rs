use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;

/// Console output for an engine stream
///
/// Verbose mode prints every line as it arrives. Otherwise a single spinner
/// shows the latest status line and disappears when the stream ends.
pub struct StreamProgress {
    spinner: Option<ProgressBar>,
}

impl StreamProgress {
    pub fn new(verbose: bool, label: &str) -> Self {
        if verbose {
            return Self { spinner: None };
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        pb.set_message(label.to_string());

        Self { spinner: Some(pb) }
    }

    /// Raw build output (`stream` field); already newline-terminated
    pub fn stream(&self, text: &str) {
        match &self.spinner {
            None => {
                print!("{}", text);
                std::io::stdout().flush().ok();
            }
            Some(pb) => {
                let line = text.trim();
                if !line.is_empty() {
                    pb.set_message(line.to_string());
                }
            }
        }
    }

    /// Status line such as `Pulling fs layer` with optional progress bar text
    pub fn status(&self, status: &str, progress: Option<&str>) {
        let line = match progress {
            Some(p) if !p.is_empty() => format!("{} {}", status, p),
            _ => status.to_string(),
        };
        match &self.spinner {
            None => println!("{}", line.cyan()),
            Some(pb) => pb.set_message(line),
        }
    }

    pub fn finish(self) {
        if let Some(pb) = self.spinner {
            pb.finish_and_clear();
        }
    }
}
