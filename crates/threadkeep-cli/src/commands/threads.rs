//! Directory commands: listing and lifecycle transitions.

use anyhow::Result;
use colored::Colorize;
use serde_json::json;
use threadkeep_core::error::ThreadkeepError;
use threadkeep_core::thread::ThreadRecord;

use super::output::Output;
use crate::app::App;

fn print_record(record: &ThreadRecord, is_main: bool) {
    let marker = if is_main { "*".green().bold() } else { " ".normal() };
    println!(
        "{} {}  {}",
        marker,
        record.thread_id.cyan(),
        record.title
    );
}

pub async fn list(app: &App, out: &Output) -> Result<()> {
    let snapshot = app.directory.snapshot().await?;
    out.emit(&snapshot, || {
        for record in &snapshot.threads {
            print_record(record, record.thread_id == snapshot.main_thread_id);
        }
        if !snapshot.archived_threads.is_empty() {
            println!(
                "{}",
                format!("({} archived)", snapshot.archived_threads.len()).dimmed()
            );
        }
    })
}

pub async fn archived(app: &App, out: &Output) -> Result<()> {
    let records = app.directory.list_archived().await?;
    out.emit(&records, || {
        if records.is_empty() {
            println!("{}", "No archived threads".dimmed());
        }
        for record in &records {
            print_record(record, false);
        }
    })
}

pub async fn show(app: &App, id: &str, out: &Output) -> Result<()> {
    let record = app
        .directory
        .get_item_by_id(id)
        .await
        .ok_or_else(|| ThreadkeepError::not_found("Thread", id))?;
    let is_main = app.directory.main_thread_id().await? == id;
    let history = app.directory.history(id).await?;
    let messages = history.as_ref().map_or(0, |tree| tree.len());
    let branches = history.as_ref().map_or(0, |tree| tree.branch_tips().len());

    let value = json!({
        "thread": record,
        "isMain": is_main,
        "messageCount": messages,
        "branchCount": branches,
    });
    out.emit(&value, || {
        println!("{}  {}", "id:".bold(), record.thread_id);
        println!("{}  {}", "title:".bold(), record.title);
        println!("{}  {}", "status:".bold(), record.status);
        println!("{}  {}", "main:".bold(), is_main);
        println!("{}  {} in {} branch(es)", "messages:".bold(), messages, branches);
    })
}

pub async fn new(app: &App, out: &Output) -> Result<()> {
    let id = app.directory.switch_to_new_thread().await?;
    out.emit(&json!({ "threadId": id }), || {
        println!("{} {}", "Created and switched to".green(), id);
    })
}

pub async fn init(app: &App, id: &str, out: &Output) -> Result<()> {
    let result = app.directory.initialize(id).await?;
    out.emit(&result, || {
        println!("{} {}", "Initialized".green(), result.remote_id);
    })
}

pub async fn switch(app: &App, id: &str, out: &Output) -> Result<()> {
    app.directory.switch_to_thread(id).await?;
    out.emit(&json!({ "mainThreadId": id }), || {
        println!("{} {}", "Switched to".green(), id);
    })
}

pub async fn rename(app: &App, id: &str, title: &str, out: &Output) -> Result<()> {
    app.directory.rename(id, title).await?;
    out.emit(&json!({ "threadId": id, "title": title }), || {
        println!("{} {} -> {}", "Renamed".green(), id, title);
    })
}

pub async fn archive(app: &App, id: &str, out: &Output) -> Result<()> {
    app.directory.archive(id).await?;
    out.emit(&json!({ "threadId": id, "status": "archived" }), || {
        println!("{} {}", "Archived".green(), id);
    })
}

pub async fn unarchive(app: &App, id: &str, out: &Output) -> Result<()> {
    app.directory.unarchive(id).await?;
    out.emit(&json!({ "threadId": id, "status": "regular" }), || {
        println!("{} {}", "Unarchived".green(), id);
    })
}

pub async fn delete(app: &App, id: &str, out: &Output) -> Result<()> {
    app.directory.delete(id).await?;
    out.emit(&json!({ "threadId": id, "deleted": true }), || {
        println!("{} {}", "Deleted".green(), id);
    })
}

pub async fn title(app: &App, id: &str, out: &Output) -> Result<()> {
    let title = app.directory.generate_title(id).await?;
    out.emit(&json!({ "threadId": id, "title": title }), || {
        println!("{}", title);
    })
}
