use clap::Subcommand;
use produceroom_core::timer::format;
use serde_json::json;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Begin the processing stopwatch on an item
    Start { id: String },
    /// Stop the stopwatch and log the session against its item
    Stop,
    /// Print the running session, if any
    Status,
    /// Print logged sessions for an item
    Log { id: String },
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    match action {
        FocusAction::Start { id } => print_json(&ctx.lifecycle.begin_focus(&id)?)?,
        FocusAction::Stop => print_json(&ctx.lifecycle.end_focus()?)?,
        FocusAction::Status => match (ctx.lifecycle.focus(), ctx.lifecycle.focus_elapsed()) {
            (Some(session), Some(elapsed)) => print_json(&json!({
                "itemId": session.item_id,
                "startedAt": session.started_at,
                "elapsedSecs": elapsed,
                "display": format::with_units(elapsed),
            }))?,
            _ => println!("idle"),
        },
        FocusAction::Log { id } => print_json(&ctx.lifecycle.focus_log(&id)?)?,
    }
    ctx.save()
}
