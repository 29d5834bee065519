use clap::Subcommand;
use produceroom_core::storage::{migrate_timing_data, MigrationOutcome};

use super::{print_json, Context};

#[derive(Subcommand)]
pub enum MaintenanceAction {
    /// Delete completed items older than the retention window
    Purge,
    /// Copy timing history from the device cache into the store, once
    Migrate,
}

pub fn run(action: MaintenanceAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    match action {
        MaintenanceAction::Purge => {
            let report = ctx.lifecycle.purge_stale();
            print_json(&report)?;
        }
        MaintenanceAction::Migrate => {
            match migrate_timing_data(&ctx.cache, ctx.lifecycle.store())? {
                MigrationOutcome::AlreadyMigrated => println!("already migrated"),
                outcome => print_json(&outcome)?,
            }
        }
    }
    Ok(())
}
