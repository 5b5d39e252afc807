//! Draft autosave debounce
//!
//! `request` opens a window; further requests inside it are coalesced.
//! Once the window runs out, the next `poll` checks the guard and saves
//! whatever the draft holds at that moment.

use std::time::{Duration, Instant};

use log::{debug, warn};

use super::timing::delay_elapsed;
use crate::config::MailboxConfig;
use crate::error::{MailboxError, Result};

/// What a `poll` did
#[derive(Debug)]
pub enum AutosaveOutcome {
    /// No save is scheduled
    Idle,
    /// A save is scheduled but not due yet
    Waiting,
    /// The save ran
    Saved,
    /// The save was due but the guard refused it
    Skipped,
    Failed(MailboxError),
}

/// Single-flight scheduled save
#[derive(Debug, Clone)]
pub struct DraftAutosave {
    delay: Duration,
    pending_since: Option<Instant>,
}

impl DraftAutosave {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending_since: None,
        }
    }

    pub fn from_config(config: &MailboxConfig) -> Self {
        Self::new(config.autosave_delay())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule a save. Returns `false` when one was already pending; the
    /// pending deadline is kept.
    pub fn request(&mut self, now: Instant) -> bool {
        if self.pending_since.is_some() {
            return false;
        }
        self.pending_since = Some(now);
        debug!("Autosave scheduled in {:?}", self.delay);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending_since.map(|since| since + self.delay)
    }

    pub fn cancel(&mut self) {
        self.pending_since = None;
    }

    /// Fire the save if it is due and `guard` allows it
    pub fn poll<G, S>(&mut self, now: Instant, guard: G, save: S) -> AutosaveOutcome
    where
        G: FnOnce() -> bool,
        S: FnOnce() -> Result<()>,
    {
        if self.pending_since.is_none() {
            return AutosaveOutcome::Idle;
        }
        if !delay_elapsed(self.pending_since, self.delay, now) {
            return AutosaveOutcome::Waiting;
        }
        self.pending_since = None;

        if !guard() {
            debug!("Autosave skipped");
            return AutosaveOutcome::Skipped;
        }
        match save() {
            Ok(()) => AutosaveOutcome::Saved,
            Err(e) => {
                warn!("Autosave failed: {}", e);
                AutosaveOutcome::Failed(e)
            }
        }
    }
}
