use anyhow::Result;
use clap::{Args, Subcommand};

use super::context::CliContext;
use super::output::print_json;

#[derive(Args, Clone, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum HistoryAction {
    /// Show sent prompts, newest first
    List {
        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Forget every recorded prompt
    Clear,
}

pub async fn cmd_history(args: HistoryArgs, ctx: &CliContext) -> Result<()> {
    let mut history = ctx.history().await?;
    match args.action {
        HistoryAction::List { limit } => {
            let entries: Vec<_> = history
                .entries()
                .take(limit.unwrap_or(usize::MAX))
                .collect();
            if ctx.output().is_json() {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("No prompts sent yet.");
            }
            for (index, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}. {}  {}",
                    index + 1,
                    entry.sent_at.format("%Y-%m-%d %H:%M"),
                    preview(&entry.message)
                );
            }
        }
        HistoryAction::Clear => {
            let removed = history.len();
            history.clear();
            history.save().await?;
            println!("Cleared {removed} entries from {}", history.path().display());
        }
    }
    Ok(())
}

/// First line of `message`, cut to 72 characters.
fn preview(message: &str) -> String {
    const WIDTH: usize = 72;
    let first = message.lines().next().unwrap_or_default();
    let mut out: String = first.chars().take(WIDTH).collect();
    if first.chars().count() > WIDTH || message.lines().nth(1).is_some() {
        out.push_str("...");
    }
    out
}
