//! Consistency check and repair.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use super::output::Output;
use crate::app::App;

/// Prints broken invariants, repairs them and lists history blobs whose
/// thread is gone.
pub async fn run(app: &App, out: &Output) -> Result<()> {
    let violations: Vec<String> = app
        .directory
        .validate()
        .await
        .iter()
        .map(ToString::to_string)
        .collect();
    let report = app.directory.repair().await?;

    let orphaned = orphaned_histories(app).await?;

    let value = json!({
        "store": app.store_root,
        "violations": violations,
        "repaired": !report.is_clean(),
        "orphanedHistories": orphaned,
    });
    out.emit(&value, || {
        if violations.is_empty() {
            println!("{}", "Directory is consistent".green());
        } else {
            for violation in &violations {
                println!("{} {}", "violation:".red(), violation);
            }
            println!("{} {:?}", "repaired:".yellow(), report);
        }
        for thread_id in &orphaned {
            println!("{} {}", "orphaned history:".yellow(), thread_id);
        }
    })
}

/// Ids of stored histories whose thread is no longer in the directory.
pub async fn orphaned_histories(app: &App) -> Result<Vec<String>> {
    let mut orphaned = Vec::new();
    for thread_id in app.history_store.stored_thread_ids().await? {
        if app.directory.get_item_by_id(&thread_id).await.is_none() {
            orphaned.push(thread_id);
        }
    }
    Ok(orphaned)
}
