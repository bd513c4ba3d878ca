//! Message commands.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use serde_json::json;
use threadkeep_core::history::{Message, MessageRole};

use super::output::Output;
use crate::app::App;

fn role_label(role: MessageRole) -> ColoredString {
    let label = format!("[{}]", role);
    match role {
        MessageRole::User => label.green(),
        MessageRole::Assistant => label.cyan(),
        MessageRole::System => label.yellow(),
    }
}

fn print_message(message: &Message) {
    println!("{} {}", role_label(message.role), message.content);
}

/// Appends a message to the main thread through its runtime.
///
/// The first user message also gives a still-untitled thread its title.
pub async fn say(app: &App, role: MessageRole, text: &str, out: &Output) -> Result<()> {
    let runtime = app.directory.main_runtime().await?;
    let message = runtime.say(role, text).await?;
    let title = if role == MessageRole::User {
        Some(app.directory.generate_title(runtime.thread_id()).await?)
    } else {
        None
    };

    let value = json!({
        "threadId": runtime.thread_id(),
        "message": message,
        "title": title,
    });
    out.emit(&value, || print_message(&message))
}

/// Prints the current branch of `id`, or of the main thread.
pub async fn history(app: &App, id: Option<&str>, out: &Output) -> Result<()> {
    let thread_id = match id {
        Some(id) => id.to_string(),
        None => app.directory.main_thread_id().await?,
    };
    let tree = app.directory.history(&thread_id).await?.unwrap_or_default();
    let branch: Vec<&Message> = tree
        .current_branch()
        .into_iter()
        .map(|node| &node.message)
        .collect();
    let branch_count = tree.branch_tips().len();

    let value = json!({
        "threadId": thread_id,
        "headId": tree.head_id,
        "branchCount": branch_count,
        "messages": branch,
    });
    out.emit(&value, || {
        if branch.is_empty() {
            println!("{}", "No messages".dimmed());
            return;
        }
        for message in &branch {
            print_message(message);
        }
        if branch_count > 1 {
            println!(
                "{}",
                format!("({} branches; showing the current one)", branch_count).dimmed()
            );
        }
    })
}
