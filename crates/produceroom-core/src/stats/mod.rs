//! Historical timing statistics and day progress.

mod engine;
mod progress;

pub use engine::{mean, SkuStats, StatsEngine, TimingEvent};
pub use progress::Progress;
