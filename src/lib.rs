//! Attendance aggregation: turns dated attendance marks into counts,
//! percentages and Safe/Risk/Danger classifications under a configurable
//! bunk counting policy.
//!
//! Everything outside [`db`] is pure and synchronous. [`db`] is the Postgres
//! storage collaborator used by the `attendance` binary.

pub mod config;
pub mod db;
pub mod error;
pub mod heatmap;
pub mod models;
pub mod overview;
pub mod report;
pub mod risk;

pub use config::PolicyConfig;
pub use error::{AggregateError, AggregateResult};
pub use models::{
    AggregateRanking, AttendanceStatus, ClassifiedMetrics, CountingMode, DaySummary, MarkEntry,
    Overview, RawStatusRecord, RawTally, RiskStatus, StatusRecord, Subject, SubjectMetrics,
    SubjectRef,
};
