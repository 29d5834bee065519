pub mod completions;
pub mod config;
mod context;
pub mod focus;
pub mod item;
pub mod maintenance;
pub mod photo;
pub mod priority;
pub mod stats;
pub mod timer;
pub mod video;
pub mod watch;
pub mod worklist;

pub use context::{print_json, Context};
