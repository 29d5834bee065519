use clap::Subcommand;
use produceroom_core::Sku;

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Average, fastest and total cases for a SKU
    Show { sku: String },
    /// Recorded timing events for a SKU, oldest first
    Events { sku: String },
    /// Delete one timing event by index and recompute the average
    Delete { sku: String, index: usize },
    /// Stored averages for every SKU
    Averages,
    /// Cases completed and remaining today
    Progress,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    match action {
        StatsAction::Show { sku } => {
            let sku = Sku::parse(&sku)?;
            match ctx.lifecycle.stats(&sku) {
                Some(stats) => print_json(&stats)?,
                None => println!("no history for SKU {sku}"),
            }
        }
        StatsAction::Events { sku } => {
            let sku = Sku::parse(&sku)?;
            print_json(ctx.lifecycle.stats_engine().events(&sku))?;
        }
        StatsAction::Delete { sku, index } => {
            let sku = Sku::parse(&sku)?;
            print_json(&ctx.lifecycle.delete_timing_event(&sku, index)?)?;
        }
        StatsAction::Averages => print_json(&ctx.lifecycle.stats_engine().averages())?,
        StatsAction::Progress => print_json(&ctx.lifecycle.progress())?,
    }
    Ok(())
}
