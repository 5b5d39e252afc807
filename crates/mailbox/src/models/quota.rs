//! Storage quota and user preferences cached by the folder tree

use serde::{Deserialize, Serialize};

const UNITS: [&str; 5] = ["byte", "KB", "MB", "GB", "TB"];

/// Storage used against the allowed maximum, in bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    pub max: u64,
    pub used: u64,
}

/// A byte count scaled to the largest unit that keeps it at or above one
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledSize {
    pub value: f64,
    pub unit: &'static str,
}

impl Quota {
    pub fn new(max: u64, used: u64) -> Self {
        Self { max, used }
    }

    /// Used share in percent, clamped to 100
    pub fn percent(&self) -> u32 {
        if self.max == 0 {
            return 0;
        }
        let percent = (self.used as f64 / self.max as f64 * 100.0).round();
        percent.min(100.0) as u32
    }

    pub fn is_exceeded(&self) -> bool {
        self.max > 0 && self.used >= self.max
    }

    pub fn used_scaled(&self) -> ScaledSize {
        scale(self.used)
    }

    pub fn max_scaled(&self) -> ScaledSize {
        scale(self.max)
    }
}

/// Scale bytes by powers of 1024, rounded to two decimals
pub fn scale(bytes: u64) -> ScaledSize {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    ScaledSize {
        value: (value * 100.0).round() / 100.0,
        unit: UNITS[unit],
    }
}

/// Whether new drafts carry a signature, and which
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePreference {
    #[serde(alias = "prefered")]
    pub use_signature: bool,
    #[serde(alias = "content")]
    pub signature: String,
}

impl SignaturePreference {
    /// The signature to append, if enabled and non-empty
    pub fn active(&self) -> Option<&str> {
        (self.use_signature && !self.signature.is_empty()).then_some(self.signature.as_str())
    }
}
