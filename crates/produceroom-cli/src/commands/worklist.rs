use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::Subcommand;
use produceroom_core::lifecycle::list_data_files;
use produceroom_core::NewItem;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum WorklistAction {
    /// Replace today's items with records from a JSON file
    ///
    /// The file holds an array of {name, location, cases, priority} objects.
    Load {
        file: PathBuf,
        /// Worklist date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Clear yesterday's data if the stored worklist date is stale
    Sync {
        /// Date to reconcile against; defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List dated CSV source files in the blob store, newest first
    Files,
}

pub fn run(action: WorklistAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    match action {
        WorklistAction::Load { file, date } => {
            let content = std::fs::read_to_string(&file)?;
            let records: Vec<NewItem> = serde_json::from_str(&content)?;
            tracing::info!(file = %file.display(), records = records.len(), "loading worklist");
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            print_json(&ctx.lifecycle.load_worklist(records, Some(date))?)?;
        }
        WorklistAction::Sync { date } => {
            let today = date.unwrap_or_else(|| Local::now().date_naive());
            print_json(&ctx.lifecycle.reconcile_day(today)?)?;
        }
        WorklistAction::Files => print_json(&list_data_files(&ctx.blobs())?)?,
    }
    ctx.save()
}
