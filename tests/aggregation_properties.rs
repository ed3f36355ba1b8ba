use attendance_aggregator::overview::{build_overview, rank, reduce, subject_metrics};
use attendance_aggregator::risk::{classify, parse_records, tally};
use attendance_aggregator::{
    AttendanceStatus, CountingMode, PolicyConfig, RawStatusRecord, RawTally, RiskStatus,
    StatusRecord, Subject,
};
use chrono::{Duration, NaiveDate};
use uuid::Uuid;

const MODES: [CountingMode; 3] = [
    CountingMode::BunkAsPresent,
    CountingMode::BunkAsAbsent,
    CountingMode::BunkIgnored,
];

fn subject(name: &str, min_attendance: i32) -> Subject {
    Subject {
        id: Uuid::new_v4(),
        name: name.to_string(),
        code: None,
        min_attendance: Some(min_attendance),
    }
}

fn tallies() -> Vec<RawTally> {
    let mut out = Vec::new();
    for present in [0, 1, 7, 18] {
        for absent in [0, 2, 6] {
            for bunk in [0, 2, 5] {
                for cancelled in [0, 1] {
                    out.push(RawTally {
                        present,
                        absent,
                        bunk,
                        cancelled,
                    });
                }
            }
        }
    }
    out
}

#[test]
fn totals_are_present_plus_absent_in_every_mode() {
    for tally in tallies() {
        for mode in MODES {
            let metrics = classify(&tally, mode, 75).unwrap();
            assert_eq!(
                metrics.total_classes,
                metrics.classified_present + metrics.classified_absent
            );
            assert!(metrics.percentage <= 100);
        }
    }
}

#[test]
fn classification_is_repeatable() {
    for tally in tallies() {
        for mode in MODES {
            assert_eq!(classify(&tally, mode, 60), classify(&tally, mode, 60));
        }
    }
}

#[test]
fn shifting_absences_to_presence_never_lowers_percentage() {
    for mode in MODES {
        for bunk in [0, 3] {
            let mut previous = 0;
            for present in 0..=10 {
                let tally = RawTally {
                    present,
                    absent: 10 - present,
                    bunk,
                    cancelled: 2,
                };
                let pct = classify(&tally, mode, 75).unwrap().percentage;
                assert!(pct >= previous, "{mode}: {pct} < {previous}");
                previous = pct;
            }
        }
    }
}

#[test]
fn zero_records_are_safe_for_any_threshold() {
    for threshold in [0, 50, 75, 100] {
        for mode in MODES {
            let metrics = classify(&tally(&[]), mode, threshold).unwrap();
            assert_eq!(metrics.total_classes, 0);
            assert_eq!(metrics.percentage, 100);
            assert_eq!(metrics.risk_status, RiskStatus::Safe);
        }
    }
}

#[test]
fn tally_counts_every_input_record() {
    let subject_id = Uuid::new_v4();
    let start = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    let statuses = ["present", "bunk", "absent", "cancelled", "present", "bunk"];
    let raw: Vec<RawStatusRecord> = statuses
        .iter()
        .enumerate()
        .map(|(offset, status)| RawStatusRecord {
            subject_id,
            date: start + Duration::days(offset as i64),
            status: status.to_string(),
        })
        .collect();

    let records = parse_records(raw).unwrap();
    let counts = tally(&records);
    assert_eq!(counts.record_count() as usize, statuses.len());
    assert_eq!(counts.bunk, 2);
}

#[test]
fn scenarios_for_each_counting_mode() {
    let sample = RawTally {
        present: 18,
        absent: 6,
        bunk: 2,
        cancelled: 1,
    };

    let a = classify(&sample, CountingMode::BunkAsPresent, 75).unwrap();
    assert_eq!((a.total_classes, a.classified_present, a.classified_absent), (26, 20, 6));
    assert_eq!((a.percentage, a.risk_status), (77, RiskStatus::Risk));

    let b = classify(&sample, CountingMode::BunkAsAbsent, 75).unwrap();
    assert_eq!((b.total_classes, b.classified_present, b.classified_absent), (26, 18, 8));
    assert_eq!((b.percentage, b.risk_status), (69, RiskStatus::Danger));

    let c = classify(&sample, CountingMode::BunkIgnored, 75).unwrap();
    assert_eq!((c.total_classes, c.classified_present, c.classified_absent), (24, 18, 6));
    assert_eq!((c.percentage, c.risk_status), (75, RiskStatus::Risk));
}

#[test]
fn reduction_picks_first_best_and_flags_danger() {
    let policy = PolicyConfig::default();
    let subjects = [subject("A", 75), subject("B", 75), subject("C", 75)];
    let attended = |present, absent| RawTally {
        present,
        absent,
        ..RawTally::default()
    };
    let tallies = [attended(9, 1), attended(6, 4), attended(9, 1)];

    let per_subject: Vec<_> = subjects
        .iter()
        .zip(tallies)
        .map(|(s, t)| subject_metrics(s, t, CountingMode::BunkAsPresent, &policy).unwrap())
        .collect();

    let percentages: Vec<u8> = per_subject.iter().map(|s| s.metrics.percentage).collect();
    assert_eq!(percentages, vec![90, 60, 90]);

    let ranking = rank(&per_subject);
    assert_eq!(ranking.best_subject.unwrap().subject_id, subjects[0].id);
    assert_eq!(ranking.worst_subject.unwrap().subject_id, subjects[1].id);

    let overview = reduce(per_subject, CountingMode::BunkAsPresent);
    assert_eq!(overview.overall.risk_status, RiskStatus::Danger);
    assert_eq!(overview.total_subjects, 3);
}

#[test]
fn best_and_worst_differ_whenever_both_exist() {
    let policy = PolicyConfig::default();
    let subjects = vec![subject("X", 75), subject("Y", 75), subject("Z", 75)];
    let start = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

    for pattern in [[1, 1, 1], [0, 1, 2], [2, 2, 0], [0, 0, 2]] {
        let mut records = Vec::new();
        for (subject, absences) in subjects.iter().zip(pattern) {
            for offset in 0..4 {
                records.push(StatusRecord {
                    subject_id: subject.id,
                    date: start + Duration::days(offset),
                    status: if offset < absences {
                        AttendanceStatus::Absent
                    } else {
                        AttendanceStatus::Present
                    },
                });
            }
        }

        let overview =
            build_overview(&subjects, &records, CountingMode::BunkIgnored, &policy).unwrap();
        let best = overview.ranking.best_subject.expect("best always exists");
        if let Some(worst) = overview.ranking.worst_subject {
            assert_ne!(best.subject_id, worst.subject_id);
        }
    }
}
