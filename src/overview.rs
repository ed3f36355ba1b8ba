use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PolicyConfig;
use crate::error::AggregateResult;
use crate::models::{
    AggregateRanking, CountingMode, Overview, RawTally, RiskStatus, StatusRecord, Subject,
    SubjectMetrics, SubjectRef,
};
use crate::risk;

pub fn subject_metrics(
    subject: &Subject,
    tally: RawTally,
    mode: CountingMode,
    policy: &PolicyConfig,
) -> AggregateResult<SubjectMetrics> {
    let threshold = policy.threshold_for(subject)?;
    let metrics = risk::classify_with_band(&tally, mode, i64::from(threshold), policy.risk_band)?;

    Ok(SubjectMetrics {
        subject_id: subject.id,
        subject_name: subject.name.clone(),
        subject_code: subject.code.clone(),
        threshold,
        mode,
        logic_used: mode.describe(),
        raw: tally,
        metrics,
    })
}

/// Analytics for one subject. Records belonging to other subjects are
/// skipped and logged.
pub fn analyze_subject(
    subject: &Subject,
    records: &[StatusRecord],
    mode: CountingMode,
    policy: &PolicyConfig,
) -> AggregateResult<SubjectMetrics> {
    let (own, foreign): (Vec<&StatusRecord>, Vec<&StatusRecord>) = records
        .iter()
        .partition(|record| record.subject_id == subject.id);

    if !foreign.is_empty() {
        warn!(
            subject_id = %subject.id,
            skipped = foreign.len(),
            "records for other subjects excluded from subject analytics"
        );
    }

    subject_metrics(subject, risk::tally(own), mode, policy)
}

/// Groups `records` by subject and classifies every subject in `subjects`,
/// in the order given. Subjects without records classify as empty tallies.
pub fn build_overview(
    subjects: &[Subject],
    records: &[StatusRecord],
    mode: CountingMode,
    policy: &PolicyConfig,
) -> AggregateResult<Overview> {
    let mut by_subject: HashMap<Uuid, Vec<&StatusRecord>> = HashMap::new();
    for record in records {
        by_subject.entry(record.subject_id).or_default().push(record);
    }

    let mut per_subject = Vec::with_capacity(subjects.len());
    for subject in subjects {
        let tally = by_subject
            .remove(&subject.id)
            .map(risk::tally)
            .unwrap_or_default();
        per_subject.push(subject_metrics(subject, tally, mode, policy)?);
    }

    if !by_subject.is_empty() {
        let orphaned: usize = by_subject.values().map(Vec::len).sum();
        warn!(
            orphaned,
            unknown_subjects = by_subject.len(),
            "records reference subjects outside the overview scope"
        );
    }

    Ok(reduce(per_subject, mode))
}

/// Sums the classified counts of every subject before taking one overall
/// percentage. Overall status is the worst individual subject status,
/// since subjects may carry different thresholds.
pub fn reduce(subjects: Vec<SubjectMetrics>, mode: CountingMode) -> Overview {
    let mut raw_present = 0;
    let mut raw_absent = 0;
    let mut total_bunks = 0;
    let mut present = 0;
    let mut absent = 0;
    let mut any_danger = false;
    let mut any_risk = false;

    for subject in &subjects {
        raw_present += subject.raw.present;
        raw_absent += subject.raw.absent;
        total_bunks += subject.raw.bunk;
        present += subject.metrics.classified_present;
        absent += subject.metrics.classified_absent;

        match subject.metrics.risk_status {
            RiskStatus::Danger => any_danger = true,
            RiskStatus::Risk => any_risk = true,
            RiskStatus::Safe => {}
        }
    }

    let overall = risk::metrics_from_counts(present, absent, |_| {
        if any_danger {
            RiskStatus::Danger
        } else if any_risk {
            RiskStatus::Risk
        } else {
            RiskStatus::Safe
        }
    });
    let ranking = rank(&subjects);

    debug!(
        subjects = subjects.len(),
        percentage = overall.percentage,
        status = %overall.risk_status,
        "overview reduced"
    );

    Overview {
        has_subjects: !subjects.is_empty(),
        total_subjects: subjects.len(),
        mode,
        raw_present,
        raw_absent,
        total_bunks,
        overall,
        ranking,
        subjects,
    }
}

/// Best is the first subject holding the highest percentage, worst the
/// first holding the lowest. When both land on the same subject, worst is
/// left empty.
pub fn rank(subjects: &[SubjectMetrics]) -> AggregateRanking {
    let mut best: Option<&SubjectMetrics> = None;
    let mut worst: Option<&SubjectMetrics> = None;

    for subject in subjects {
        let pct = subject.metrics.percentage;
        if best.map_or(true, |b| pct > b.metrics.percentage) {
            best = Some(subject);
        }
        if worst.map_or(true, |w| pct < w.metrics.percentage) {
            worst = Some(subject);
        }
    }

    if let (Some(b), Some(w)) = (best, worst) {
        if std::ptr::eq(b, w) {
            worst = None;
        }
    }

    AggregateRanking {
        best_subject: best.map(subject_ref),
        worst_subject: worst.map(subject_ref),
    }
}

fn subject_ref(subject: &SubjectMetrics) -> SubjectRef {
    SubjectRef {
        subject_id: subject.subject_id,
        subject_name: subject.subject_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttendanceStatus;
    use chrono::NaiveDate;

    fn subject(name: &str, min_attendance: Option<i32>) -> Subject {
        Subject {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: None,
            min_attendance,
        }
    }

    fn records_for(subject: &Subject, present: u32, absent: u32) -> Vec<StatusRecord> {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        (0..present + absent)
            .map(|offset| StatusRecord {
                subject_id: subject.id,
                date: start + chrono::Duration::days(i64::from(offset)),
                status: if offset < present {
                    AttendanceStatus::Present
                } else {
                    AttendanceStatus::Absent
                },
            })
            .collect()
    }

    #[test]
    fn best_and_worst_follow_first_encountered() {
        let a = subject("Algorithms", Some(75));
        let b = subject("Biology", Some(75));
        let c = subject("Chemistry", Some(75));
        let mut records = records_for(&a, 9, 1);
        records.extend(records_for(&b, 6, 4));
        records.extend(records_for(&c, 9, 1));

        let subjects = vec![a.clone(), b.clone(), c];
        let overview = build_overview(
            &subjects,
            &records,
            CountingMode::BunkAsPresent,
            &PolicyConfig::default(),
        )
        .unwrap();

        let best = overview.ranking.best_subject.unwrap();
        let worst = overview.ranking.worst_subject.unwrap();
        assert_eq!(best.subject_id, a.id);
        assert_eq!(worst.subject_id, b.id);
        assert_eq!(overview.overall.risk_status, RiskStatus::Danger);
        assert_eq!(overview.overall.total_classes, 30);
        assert_eq!(overview.overall.percentage, 80);
    }

    #[test]
    fn single_subject_has_no_worst() {
        let only = subject("Physics", None);
        let records = records_for(&only, 3, 1);
        let overview = build_overview(
            &[only.clone()],
            &records,
            CountingMode::BunkIgnored,
            &PolicyConfig::default(),
        )
        .unwrap();
        assert_eq!(overview.ranking.best_subject.unwrap().subject_id, only.id);
        assert!(overview.ranking.worst_subject.is_none());
    }

    #[test]
    fn all_tied_subjects_report_best_only() {
        let a = subject("Art", None);
        let b = subject("Botany", None);
        let overview = build_overview(
            &[a.clone(), b],
            &[],
            CountingMode::BunkAsAbsent,
            &PolicyConfig::default(),
        )
        .unwrap();
        assert_eq!(overview.ranking.best_subject.unwrap().subject_id, a.id);
        assert!(overview.ranking.worst_subject.is_none());
        assert_eq!(overview.overall.percentage, 100);
        assert_eq!(overview.overall.risk_status, RiskStatus::Safe);
    }

    #[test]
    fn overall_status_uses_per_subject_thresholds() {
        // 70% in both; each threshold sits below 70 minus the band.
        let lenient = subject("Drawing", Some(60));
        let strict = subject("Ethics", Some(50));
        let mut records = records_for(&lenient, 7, 3);
        records.extend(records_for(&strict, 7, 3));
        let overview = build_overview(
            &[lenient, strict],
            &records,
            CountingMode::BunkAsPresent,
            &PolicyConfig::default(),
        )
        .unwrap();
        assert_eq!(overview.overall.percentage, 70);
        assert_eq!(overview.overall.risk_status, RiskStatus::Safe);
    }

    #[test]
    fn empty_subject_list_has_no_subjects() {
        let policy = PolicyConfig::default();
        let overview = build_overview(&[], &[], CountingMode::BunkAsPresent, &policy).unwrap();
        assert!(!overview.has_subjects);
        assert_eq!(overview.total_subjects, 0);
        assert_eq!(overview.overall.percentage, 100);
        assert_eq!(overview.overall.risk_status, RiskStatus::Safe);
        assert_eq!(overview.ranking, AggregateRanking::default());
    }

    #[test]
    fn raw_totals_and_bunks_are_summed() {
        let a = subject("Geology", None);
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let records = vec![
            StatusRecord {
                subject_id: a.id,
                date,
                status: AttendanceStatus::Bunk,
            },
            StatusRecord {
                subject_id: a.id,
                date: date.succ_opt().unwrap(),
                status: AttendanceStatus::Present,
            },
            StatusRecord {
                subject_id: Uuid::new_v4(),
                date,
                status: AttendanceStatus::Absent,
            },
        ];
        let overview =
            build_overview(&[a], &records, CountingMode::BunkAsAbsent, &PolicyConfig::default())
                .unwrap();
        assert_eq!(overview.raw_present, 1);
        assert_eq!(overview.raw_absent, 0);
        assert_eq!(overview.total_bunks, 1);
        assert_eq!(overview.overall.classified_absent, 1);
        assert_eq!(overview.overall.percentage, 50);
    }

    #[test]
    fn analyze_subject_ignores_other_subjects() {
        let a = subject("History", Some(75));
        let b = subject("Music", Some(75));
        let mut records = records_for(&a, 3, 1);
        records.extend(records_for(&b, 0, 5));
        let metrics = analyze_subject(
            &a,
            &records,
            CountingMode::BunkAsPresent,
            &PolicyConfig::default(),
        )
        .unwrap();
        assert_eq!(metrics.raw.record_count(), 4);
        assert_eq!(metrics.metrics.percentage, 75);
        assert_eq!(metrics.metrics.risk_status, RiskStatus::Risk);
        assert_eq!(metrics.logic_used, CountingMode::BunkAsPresent.describe());
    }
}
