//! Long-running follower: mirrors store changes as they arrive and runs the
//! periodic chores (display refresh, focus tick, retention purge) on one
//! tokio interval until Ctrl-C.

use std::time::Duration as StdDuration;

use chrono::Duration;
use clap::Args;
use produceroom_core::timer::Chore;
use produceroom_core::{ConfigError, Housekeeping};
use serde_json::json;

use super::Context;

#[derive(Args)]
pub struct WatchArgs {
    /// Stop after this many display refreshes
    #[arg(long)]
    pub ticks: Option<u64>,
}

pub fn run(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(follow(args))
}

fn millis(key: &str, ms: u64) -> Result<Duration, ConfigError> {
    i64::try_from(ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{ms} ms is out of range"),
        })
}

async fn follow(args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = Context::open()?;
    let rx = ctx.lifecycle.watch()?;

    let display = &ctx.config.display;
    let mut chores = Housekeeping::new(
        millis("display.refresh_ms", display.refresh_ms)?,
        millis("display.focus_tick_ms", display.focus_tick_ms)?,
        Duration::hours(i64::from(ctx.config.retention.purge_interval_hours)),
    );
    let tick_ms = display.refresh_ms.min(display.focus_tick_ms).max(10);
    let mut interval = tokio::time::interval(StdDuration::from_millis(tick_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!(tick_ms, "watching store");
    let mut refreshes = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
        }

        let applied = ctx.lifecycle.pump(&rx);
        if applied > 0 {
            tracing::debug!(applied, "store changes applied");
        }

        let now = ctx.lifecycle.now();
        for chore in chores.poll(now, ctx.lifecycle.is_focused()) {
            match chore {
                Chore::PurgeStale => {
                    let report = ctx.lifecycle.purge_stale();
                    if !report.removed.is_empty() {
                        println!("{}", serde_json::to_string(&report.event(now))?);
                    }
                }
                Chore::RefreshDisplay => {
                    let lc = &ctx.lifecycle;
                    let line = json!({
                        "at": now,
                        "connected": lc.state().connected,
                        "timers": lc.timers().snapshot(now),
                        "focusSecs": lc.focus_elapsed(),
                        "progress": lc.progress(),
                    });
                    println!("{line}");
                    refreshes += 1;
                }
                Chore::FocusTick => {
                    if let Some(elapsed) = ctx.lifecycle.focus_elapsed() {
                        tracing::trace!(elapsed, "focus tick");
                    }
                }
            }
        }

        if args.ticks.map_or(false, |limit| refreshes >= limit) {
            break;
        }
    }

    ctx.lifecycle.unwatch();
    ctx.save()
}
