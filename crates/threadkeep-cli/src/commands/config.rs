use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;
use threadkeep_infrastructure::{ConfigService, ThreadkeepConfig};

use super::output::Output;

/// Shows the effective configuration; with `init`, writes it to disk first
/// if no config file exists yet.
pub fn run(service: &ConfigService, config: &ThreadkeepConfig, init: bool, out: &Output) -> Result<()> {
    let path = service.path();
    let mut created = false;
    if init && !path.exists() {
        service
            .save(config)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        created = true;
    }

    let value = json!({
        "path": path,
        "created": created,
        "config": config,
    });
    out.emit(&value, || {
        if created {
            println!("{} {}", "Wrote".green(), path.display());
        }
        println!("{}  {}", "config file:".bold(), path.display());
        match &config.data_dir {
            Some(dir) => println!("{}  {}", "data_dir:".bold(), dir.display()),
            None => println!("{}  {}", "data_dir:".bold(), "(default)".dimmed()),
        }
        println!("{}  {}", "log_filter:".bold(), config.log_filter);
        println!("{}  {}", "title_max_chars:".bold(), config.title_max_chars);
    })
}
