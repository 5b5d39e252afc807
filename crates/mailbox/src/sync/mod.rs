//! Scheduled work: the draft autosave debounce

mod autosave;
mod timing;

pub use autosave::{AutosaveOutcome, DraftAutosave};
pub use timing::delay_elapsed;
