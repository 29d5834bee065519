use clap::Subcommand;
use produceroom_core::timer::format;
use serde_json::json;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start timing an item that is not tracked yet
    Start { id: String },
    /// Pause a running timer or resume a paused one
    Toggle { id: String },
    /// Discard an item's timer without recording anything
    Cancel { id: String },
    /// Print tracked timers with elapsed seconds
    Status,
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    match action {
        TimerAction::Start { id } => print_json(&ctx.lifecycle.start_timer(&id)?)?,
        TimerAction::Toggle { id } => print_json(&ctx.lifecycle.toggle(&id)?)?,
        TimerAction::Cancel { id } => print_json(&ctx.lifecycle.cancel_timer(&id)?)?,
        TimerAction::Status => {
            let lc = &ctx.lifecycle;
            let now = lc.now();
            let timers: Vec<_> = lc
                .timers()
                .tracked_ids()
                .map(|id| {
                    let elapsed = lc.timers().elapsed(id, now);
                    json!({
                        "id": id,
                        "state": lc.timers().state(id),
                        "elapsedSecs": elapsed,
                        "display": format::clock(elapsed as f64),
                        "estimateSecs": lc.estimate(id),
                    })
                })
                .collect();
            print_json(&timers)?;
        }
    }
    ctx.save()
}
