mod cadence;
mod clock;
pub mod format;
mod keeper;

pub use cadence::{Cadence, Chore, Housekeeping};
pub use clock::{Clock, ManualClock, SystemClock};
pub use keeper::{TimeKeeper, TimerState, Transition};
