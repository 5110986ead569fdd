//! Progress bar and summary reporting for CLI installs.

use console::style;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};

use crate::{InstallProgress, InstallReport};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Install progress rendered as a single bar counting assets.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("━━╌"),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl InstallProgress for BarProgress {
    fn on_install_start(&self, cache_name: &str, assets: usize) {
        self.bar.set_length(assets as u64);
        self.bar.set_message(format!("caching into {cache_name}"));
    }

    fn on_asset_fetched(&self, url: &str, bytes: u64) {
        self.bar.inc(1);
        self.bar.set_message(format!("{url} ({})", HumanBytes(bytes)));
    }

    fn on_asset_failed(&self, url: &str, error: &str) {
        self.bar
            .println(format!("  {} {url}: {error}", style("failed").red()));
    }
}

/// Prints a summary of a finished install.
pub fn print_install_report(report: &InstallReport) {
    println!("\n{SEPARATOR}");
    println!("{} {}", style("Installed").green().bold(), report.cache_name);
    println!("{SEPARATOR}");
    println!("  Entries:     {}", report.entries);
    println!("  Total size:  {}", HumanBytes(report.total_bytes));
    println!("  Took:        {}", HumanDuration(report.elapsed));
    println!("{SEPARATOR}");
}

/// Prints the URLs stored in a bucket.
pub fn print_keys(cache_name: &str, keys: &[String]) {
    if keys.is_empty() {
        println!("Cache bucket {cache_name} is empty.");
        return;
    }

    println!("{}:", style(cache_name).cyan());
    for key in keys {
        println!("  {key}");
    }
    println!("  {} entr{}", keys.len(), if keys.len() == 1 { "y" } else { "ies" });
}
