use anyhow::Context;

use crate::error::AggregateResult;
use crate::models::{CountingMode, Subject};
use crate::risk;

pub const DEFAULT_THRESHOLD: u8 = 75;
/// Width of the Risk band above a subject's threshold, in percentage points.
pub const DEFAULT_RISK_BAND: u8 = 5;
pub const DEFAULT_MODE: CountingMode = CountingMode::BunkAsPresent;

/// Counting and banding policy handed to every aggregation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub default_threshold: u8,
    pub risk_band: u8,
    pub default_mode: CountingMode,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            risk_band: DEFAULT_RISK_BAND,
            default_mode: DEFAULT_MODE,
        }
    }
}

impl PolicyConfig {
    /// Reads `ATTENDANCE_DEFAULT_THRESHOLD`, `ATTENDANCE_RISK_BAND` and
    /// `ATTENDANCE_MODE`, falling back to the built-in defaults for unset keys.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("ATTENDANCE_DEFAULT_THRESHOLD") {
            let parsed: i64 = value
                .trim()
                .parse()
                .with_context(|| format!("ATTENDANCE_DEFAULT_THRESHOLD is not a number: {value}"))?;
            config.default_threshold = risk::validate_threshold(parsed)?;
        }

        if let Some(value) = lookup("ATTENDANCE_RISK_BAND") {
            config.risk_band = value
                .trim()
                .parse()
                .with_context(|| format!("ATTENDANCE_RISK_BAND must be 0-255: {value}"))?;
        }

        if let Some(value) = lookup("ATTENDANCE_MODE") {
            config.default_mode = value.trim().parse()?;
        }

        Ok(config)
    }

    /// Subject threshold, or the configured default when the subject has none.
    pub fn threshold_for(&self, subject: &Subject) -> AggregateResult<u8> {
        match subject.min_attendance {
            Some(value) => risk::validate_threshold(i64::from(value)),
            None => Ok(self.default_threshold),
        }
    }
}
