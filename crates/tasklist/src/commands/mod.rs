use std::fmt::Write as _;

use anyhow::{Context, Result, anyhow};
use tasklist_app::{DisplayConfig, Snapshot, TaskListController};
use tasklist_core::{Task, TaskId};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::Command;

/// Parse a due date given as RFC 3339 or `YYYY-MM-DD HH:MM` (UTC).
///
/// # Errors
/// Returns an error when neither form matches.
pub fn parse_due(input: &str) -> Result<OffsetDateTime> {
    let input = input.trim();
    if let Ok(due) = OffsetDateTime::parse(input, &Rfc3339) {
        return Ok(due);
    }
    PrimitiveDateTime::parse(input, format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| anyhow!("invalid due date '{input}': expected RFC 3339 or YYYY-MM-DD HH:MM"))
}

pub async fn run(command: Command, controller: &TaskListController, display: &DisplayConfig) -> Result<()> {
    let output = execute(command, controller, display).await?;
    print!("{output}");
    Ok(())
}

async fn execute(command: Command, controller: &TaskListController, display: &DisplayConfig) -> Result<String> {
    match command {
        Command::Add { title, details, due } => {
            let created = controller
                .create(title, details, due)
                .wait()
                .await
                .context("Not saved.")?;
            Ok(created.map_or_else(
                || "Not saved.\n".to_owned(),
                |id| format!("Task {id} added.\n"),
            ))
        }
        Command::Edit {
            id,
            title,
            details,
            due,
            clear_due,
        } => {
            let snapshot = current(controller).await?;
            let Some(task) = find(&snapshot, id) else {
                return Ok(format!("Task {id} no longer exists.\n"));
            };
            let due = if clear_due { None } else { due.or(task.due) };
            let edited = controller
                .edit(
                    id,
                    title.unwrap_or_else(|| task.title.clone()),
                    details.unwrap_or_else(|| task.details.clone()),
                    due,
                )
                .wait()
                .await
                .context("Not saved.")?;
            Ok(match edited {
                Some(true) => "Task updated.\n".to_owned(),
                Some(false) => format!("Task {id} no longer exists.\n"),
                None => "Not saved.\n".to_owned(),
            })
        }
        Command::Done { id } => {
            let snapshot = current(controller).await?;
            let Some(task) = find(&snapshot, id) else {
                return Ok(format!("Task {id} is already completed.\n"));
            };
            let removed = controller.remove(task).await.context("Not completed.")?;
            Ok(if removed {
                "Task completed.\n".to_owned()
            } else {
                format!("Task {id} is already completed.\n")
            })
        }
        Command::Clear { yes } => {
            let snapshot = current(controller).await?;
            if snapshot.is_empty() {
                return Ok("Nothing to clear. Add a task with `tasklist add --title <TITLE>`.\n".to_owned());
            }
            if !yes {
                return Ok(format!(
                    "{} would be removed. Re-run with --yes to delete them.\n",
                    count(snapshot.len())
                ));
            }
            let removed = controller.remove_all().await.context("Tasks not removed.")?;
            Ok(format!("Removed {}.\n", count(removed)))
        }
        Command::Ls { json } => {
            let snapshot = current(controller).await?;
            if json {
                let mut rendered = serde_json::to_string_pretty(snapshot.tasks())?;
                rendered.push('\n');
                return Ok(rendered);
            }
            render_list(snapshot.tasks(), display)
        }
    }
}

async fn current(controller: &TaskListController) -> Result<Snapshot> {
    controller.refresh().await?;
    controller
        .latest()
        .ok_or_else(|| anyhow!("task list has not been loaded"))
}

fn find(snapshot: &Snapshot, id: TaskId) -> Option<&Task> {
    snapshot.tasks().iter().find(|task| task.id == id)
}

fn count(n: usize) -> String {
    if n == 1 { "1 task".to_owned() } else { format!("{n} tasks") }
}

fn render_list(tasks: &[Task], display: &DisplayConfig) -> Result<String> {
    if tasks.is_empty() {
        return Ok("No tasks.\n".to_owned());
    }
    let mut out = String::new();
    for task in tasks {
        let due = task
            .due
            .map(|due| display.format_due(due))
            .transpose()?
            .unwrap_or_else(|| "-".to_owned());
        writeln!(out, "{:>4}  {due:<24}  {}", task.id.get(), task.title)?;
        if !task.details.is_empty() {
            writeln!(out, "      {}", task.details)?;
        }
    }
    Ok(out)
}
