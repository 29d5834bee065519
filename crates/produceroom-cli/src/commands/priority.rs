use clap::Subcommand;
use produceroom_core::Priority;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum PriorityAction {
    /// List known labels, "missing" first
    List,
    /// Register a label
    Add { label: Priority },
    /// Remove a label; items already carrying it keep it
    Remove { label: Priority },
}

pub fn run(action: PriorityAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    let changed = match action {
        PriorityAction::List => {
            print_json(ctx.lifecycle.priorities())?;
            return Ok(());
        }
        PriorityAction::Add { label } => ctx.lifecycle.add_priority(label)?,
        PriorityAction::Remove { label } => ctx.lifecycle.remove_priority(label)?,
    };
    match changed {
        Some(event) => print_json(&event)?,
        None => println!("unchanged"),
    }
    Ok(())
}
