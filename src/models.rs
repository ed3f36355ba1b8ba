use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AggregateError;

/// Status values that can be stored for a (user, subject, date).
///
/// `no_class` is deliberately absent: the calendar UI shows it for days
/// without a record, but it is never persisted or counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Bunk,
    Cancelled,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Bunk => "bunk",
            AttendanceStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = AggregateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "bunk" => Ok(AttendanceStatus::Bunk),
            "cancelled" => Ok(AttendanceStatus::Cancelled),
            other => Err(AggregateError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How `bunk` records contribute to the classified totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum CountingMode {
    #[serde(alias = "bunk_present")]
    #[value(alias = "bunk_present")]
    BunkAsPresent,
    #[serde(alias = "bunk_absent")]
    #[value(alias = "bunk_absent")]
    BunkAsAbsent,
    #[serde(alias = "bunk_ignore")]
    #[value(alias = "bunk_ignore")]
    BunkIgnored,
}

impl CountingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CountingMode::BunkAsPresent => "bunk_as_present",
            CountingMode::BunkAsAbsent => "bunk_as_absent",
            CountingMode::BunkIgnored => "bunk_ignored",
        }
    }

    /// Name used by the users table, kept for existing rows.
    pub fn storage_name(self) -> &'static str {
        match self {
            CountingMode::BunkAsPresent => "bunk_present",
            CountingMode::BunkAsAbsent => "bunk_absent",
            CountingMode::BunkIgnored => "bunk_ignore",
        }
    }

    /// Human readable formula, shown next to analytics results.
    pub fn describe(self) -> &'static str {
        match self {
            CountingMode::BunkAsPresent => {
                "Classes = Present + Absent + Bunk | Present = Present + Bunk"
            }
            CountingMode::BunkAsAbsent => {
                "Classes = Present + Absent + Bunk | Absent = Absent + Bunk"
            }
            CountingMode::BunkIgnored => "Classes = Present + Absent | Bunks ignored",
        }
    }
}

impl FromStr for CountingMode {
    type Err = AggregateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bunk_as_present" | "bunk_present" => Ok(CountingMode::BunkAsPresent),
            "bunk_as_absent" | "bunk_absent" => Ok(CountingMode::BunkAsAbsent),
            "bunk_ignored" | "bunk_ignore" => Ok(CountingMode::BunkIgnored),
            other => Err(AggregateError::InvalidMode {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CountingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskStatus {
    Safe,
    Risk,
    Danger,
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RiskStatus::Safe => "Safe",
            RiskStatus::Risk => "Risk",
            RiskStatus::Danger => "Danger",
        };
        f.write_str(label)
    }
}

/// One stored attendance mark. Storage guarantees at most one per
/// (user, subject, date); nothing here deduplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub subject_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

/// A record as read from storage or a file, before its status is checked.
#[derive(Debug, Clone, Deserialize)]
pub struct RawStatusRecord {
    pub subject_id: Uuid,
    pub date: NaiveDate,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subject {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub min_attendance: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RawTally {
    pub present: u32,
    pub absent: u32,
    pub bunk: u32,
    pub cancelled: u32,
}

impl RawTally {
    pub fn record_count(&self) -> u32 {
        self.present + self.absent + self.bunk + self.cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassifiedMetrics {
    pub total_classes: u32,
    pub classified_present: u32,
    pub classified_absent: u32,
    pub percentage: u8,
    pub risk_status: RiskStatus,
}

/// Analytics for a single subject.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectMetrics {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub subject_code: Option<String>,
    pub threshold: u8,
    pub mode: CountingMode,
    pub logic_used: &'static str,
    pub raw: RawTally,
    pub metrics: ClassifiedMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectRef {
    pub subject_id: Uuid,
    pub subject_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateRanking {
    pub best_subject: Option<SubjectRef>,
    pub worst_subject: Option<SubjectRef>,
}

/// Whole-dashboard summary across every subject of a user.
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub has_subjects: bool,
    pub total_subjects: usize,
    pub mode: CountingMode,
    pub raw_present: u32,
    pub raw_absent: u32,
    pub total_bunks: u32,
    pub overall: ClassifiedMetrics,
    pub ranking: AggregateRanking,
    pub subjects: Vec<SubjectMetrics>,
}

/// Representative status of one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub count: u32,
}

/// A stored mark joined with its subject's name, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkEntry {
    pub subject_id: Uuid,
    pub subject_name: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}
