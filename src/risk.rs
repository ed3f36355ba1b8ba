use crate::config::DEFAULT_RISK_BAND;
use crate::error::{AggregateError, AggregateResult};
use crate::models::{
    AttendanceStatus, ClassifiedMetrics, CountingMode, RawStatusRecord, RawTally, RiskStatus,
    StatusRecord,
};

pub fn validate_threshold(value: i64) -> AggregateResult<u8> {
    match u8::try_from(value) {
        Ok(threshold) if threshold <= 100 => Ok(threshold),
        _ => Err(AggregateError::InvalidThreshold { value }),
    }
}

/// Checks every raw status before any record is accepted; a single unknown
/// value rejects the whole batch.
pub fn parse_records(raw: Vec<RawStatusRecord>) -> AggregateResult<Vec<StatusRecord>> {
    raw.into_iter()
        .map(|record| {
            Ok(StatusRecord {
                subject_id: record.subject_id,
                date: record.date,
                status: record.status.parse()?,
            })
        })
        .collect()
}

pub fn tally<'a, I>(records: I) -> RawTally
where
    I: IntoIterator<Item = &'a StatusRecord>,
{
    let mut tally = RawTally::default();

    for record in records {
        match record.status {
            AttendanceStatus::Present => tally.present += 1,
            AttendanceStatus::Absent => tally.absent += 1,
            AttendanceStatus::Bunk => tally.bunk += 1,
            AttendanceStatus::Cancelled => tally.cancelled += 1,
        }
    }

    tally
}

/// Classified (present, absent) under `mode`. Cancelled never counts; the
/// total is always the sum of the pair.
///
/// | mode            | present          | absent          |
/// |-----------------|------------------|-----------------|
/// | bunk_as_present | present + bunk   | absent          |
/// | bunk_as_absent  | present          | absent + bunk   |
/// | bunk_ignored    | present          | absent          |
pub fn counted(tally: &RawTally, mode: CountingMode) -> (u32, u32) {
    match mode {
        CountingMode::BunkAsPresent => (tally.present + tally.bunk, tally.absent),
        CountingMode::BunkAsAbsent => (tally.present, tally.absent + tally.bunk),
        CountingMode::BunkIgnored => (tally.present, tally.absent),
    }
}

/// Rounded half-up share of `present` in `total`; 100 when nothing was held.
pub fn percentage(present: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    let present = u64::from(present.min(total));
    let total = u64::from(total);
    ((present * 200 + total) / (total * 2)) as u8
}

pub fn risk_status(percentage: u8, threshold: u8, band: u8) -> RiskStatus {
    let percentage = u16::from(percentage);
    let threshold = u16::from(threshold);

    if percentage < threshold {
        RiskStatus::Danger
    } else if percentage < threshold + u16::from(band) {
        RiskStatus::Risk
    } else {
        RiskStatus::Safe
    }
}

pub fn classify(
    tally: &RawTally,
    mode: CountingMode,
    threshold: i64,
) -> AggregateResult<ClassifiedMetrics> {
    classify_with_band(tally, mode, threshold, DEFAULT_RISK_BAND)
}

pub fn classify_with_band(
    tally: &RawTally,
    mode: CountingMode,
    threshold: i64,
    band: u8,
) -> AggregateResult<ClassifiedMetrics> {
    let threshold = validate_threshold(threshold)?;
    let (present, absent) = counted(tally, mode);
    Ok(metrics_from_counts(present, absent, |pct| {
        risk_status(pct, threshold, band)
    }))
}

pub(crate) fn metrics_from_counts<F>(present: u32, absent: u32, status: F) -> ClassifiedMetrics
where
    F: FnOnce(u8) -> RiskStatus,
{
    let total_classes = present + absent;
    let percentage = percentage(present, total_classes);
    ClassifiedMetrics {
        total_classes,
        classified_present: present,
        classified_absent: absent,
        percentage,
        risk_status: status(percentage),
    }
}
