use std::fmt::Write;
use std::io;

use crate::models::{MarkEntry, Overview, StatusRecord, Subject};

/// Writes `Date,Status` rows for one subject, oldest first.
pub fn export_csv<W: io::Write>(writer: W, records: &[StatusRecord]) -> anyhow::Result<usize> {
    let mut sorted: Vec<&StatusRecord> = records.iter().collect();
    sorted.sort_by_key(|record| record.date);

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["Date", "Status"])?;
    for record in &sorted {
        csv_writer.write_record([record.date.to_string(), record.status.to_string()])?;
    }
    csv_writer.flush()?;

    Ok(sorted.len())
}

/// Plain-text listing of one subject's records, as printed in exported reports.
pub fn subject_sheet(subject: &Subject, records: &[StatusRecord]) -> String {
    let mut sorted: Vec<&StatusRecord> = records.iter().collect();
    sorted.sort_by_key(|record| record.date);

    let mut output = String::new();
    let _ = writeln!(output, "# Attendance Report");
    let _ = writeln!(output, "Subject: {}", subject.name);
    let _ = writeln!(output);

    if sorted.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        for record in sorted {
            let _ = writeln!(
                output,
                "- {}: {}",
                record.date.format("%a %b %d %Y"),
                record.status.as_str().to_uppercase()
            );
        }
    }

    output
}

/// One line per mark in the order given (storage returns newest first).
pub fn mark_listing(marks: &[MarkEntry]) -> String {
    let mut output = String::new();

    if marks.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
        return output;
    }

    for mark in marks {
        let _ = writeln!(
            output,
            "{}  {:<9}  {} ({})",
            mark.date,
            mark.status.as_str(),
            mark.subject_name,
            mark.subject_id
        );
    }

    output
}

pub fn build_report(owner: &str, overview: &Overview, records: &[StatusRecord]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Attendance Overview");
    let _ = writeln!(
        output,
        "Generated for {} (counting mode {}: {})",
        owner,
        overview.mode,
        overview.mode.describe()
    );
    let _ = writeln!(output);

    if !overview.has_subjects {
        let _ = writeln!(output, "No subjects registered yet.");
        return output;
    }

    let overall = &overview.overall;
    let _ = writeln!(output, "## Overall");
    let _ = writeln!(
        output,
        "- {}% across {} classes ({} present, {} absent): {}",
        overall.percentage,
        overall.total_classes,
        overall.classified_present,
        overall.classified_absent,
        overall.risk_status
    );
    let _ = writeln!(output, "- Bunks recorded: {}", overview.total_bunks);
    if let Some(best) = &overview.ranking.best_subject {
        let _ = writeln!(output, "- Best subject: {}", best.subject_name);
    }
    if let Some(worst) = &overview.ranking.worst_subject {
        let _ = writeln!(output, "- Worst subject: {}", worst.subject_name);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Subjects");
    let _ = writeln!(
        output,
        "| Subject | Present | Absent | Bunk | Cancelled | % | Min | Status |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
    for subject in &overview.subjects {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} | {} |",
            subject.subject_name,
            subject.raw.present,
            subject.raw.absent,
            subject.raw.bunk,
            subject.raw.cancelled,
            subject.metrics.percentage,
            subject.threshold,
            subject.metrics.risk_status
        );
    }

    let mut recent: Vec<&StatusRecord> = records.iter().collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Marks");

    if recent.is_empty() {
        let _ = writeln!(output, "No attendance recorded.");
    } else {
        for record in recent.iter().take(5) {
            let name = overview
                .subjects
                .iter()
                .find(|subject| subject.subject_id == record.subject_id)
                .map(|subject| subject.subject_name.as_str())
                .unwrap_or("unknown subject");
            let _ = writeln!(output, "- {} on {}: {}", name, record.date, record.status);
        }
    }

    output
}
