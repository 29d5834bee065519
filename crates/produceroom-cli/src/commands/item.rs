use std::path::PathBuf;

use clap::Subcommand;
use produceroom_core::{CompletionPhoto, NewItem, Priority};
use serde_json::json;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum ItemAction {
    /// Add an item to today's list by hand
    Add {
        /// Full item name, e.g. "Kale #77"
        name: String,
        /// Storage location
        #[arg(long)]
        location: String,
        /// Number of cases
        #[arg(long, default_value = "1")]
        cases: u32,
        /// Priority label: an integer or "missing"
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// List active items in priority order, or the completed ledger
    List {
        #[arg(long)]
        completed: bool,
    },
    /// Mark an item completed, recording its timer against the SKU
    Complete {
        id: String,
        /// JPEG taken at completion
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Move a completed item back to the active list
    Undo { id: String },
    /// Change an item's storage location
    Location { id: String, location: String },
    /// Change an item's priority label
    Priority { id: String, label: Priority },
    /// Print an item's lifecycle state and time estimate
    Show { id: String },
}

pub fn run(action: ItemAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    match action {
        ItemAction::Add {
            name,
            location,
            cases,
            priority,
        } => {
            let event = ctx.lifecycle.add_item(NewItem {
                name,
                location,
                cases,
                priority: priority.unwrap_or_default(),
            })?;
            print_json(&event)?;
        }
        ItemAction::List { completed } => {
            if completed {
                let ledger: Vec<_> = ctx.lifecycle.state().completed.values().collect();
                print_json(&ledger)?;
            } else {
                print_json(&ctx.lifecycle.state().queue())?;
            }
        }
        ItemAction::Complete { id, photo } => {
            let photo = match photo {
                Some(path) => {
                    let bytes = std::fs::read(&path)?;
                    Some(CompletionPhoto::from_jpeg(&bytes, ctx.lifecycle.now()))
                }
                None => None,
            };
            let event = ctx.lifecycle.complete(&id, photo)?;
            print_json(&event)?;
        }
        ItemAction::Undo { id } => print_json(&ctx.lifecycle.undo(&id)?)?,
        ItemAction::Location { id, location } => {
            print_json(&ctx.lifecycle.set_location(&id, &location)?)?
        }
        ItemAction::Priority { id, label } => {
            print_json(&ctx.lifecycle.set_priority(&id, label)?)?
        }
        ItemAction::Show { id } => {
            let Some(state) = ctx.lifecycle.item_state(&id) else {
                return Err(format!("no item '{id}'").into());
            };
            let item = ctx.lifecycle.state().items.get(&id);
            print_json(&json!({
                "id": id,
                "item": item,
                "status": state,
                "estimateSecs": ctx.lifecycle.estimate(&id),
            }))?;
        }
    }
    ctx.save()
}
