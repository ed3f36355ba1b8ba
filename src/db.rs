use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgExecutor, PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    AttendanceStatus, CountingMode, MarkEntry, RawStatusRecord, StatusRecord, Subject,
};
use crate::risk;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("schema migrations applied");
    Ok(())
}

pub async fn upsert_user<'e, E>(executor: E, email: &str, full_name: &str) -> anyhow::Result<Uuid>
where
    E: PgExecutor<'e>,
{
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_portal.users (id, email, full_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET full_name = EXCLUDED.full_name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(full_name)
    .fetch_one(executor)
    .await?
    .get("id");

    Ok(id)
}

pub async fn user_id(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM attendance_portal.users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no user registered with email {email}"))?;
    Ok(row.get("id"))
}

/// Stored counting mode for a user, if one was ever chosen.
pub async fn attendance_mode(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Option<CountingMode>> {
    let stored: Option<String> =
        sqlx::query("SELECT attendance_mode FROM attendance_portal.users WHERE id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?
            .get("attendance_mode");

    stored
        .map(|value| value.parse::<CountingMode>())
        .transpose()
        .context("users table holds an unknown attendance mode")
}

pub async fn set_attendance_mode(
    pool: &PgPool,
    user_id: Uuid,
    mode: CountingMode,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE attendance_portal.users SET attendance_mode = $2 WHERE id = $1")
        .bind(user_id)
        .bind(mode.storage_name())
        .execute(pool)
        .await?;
    info!(%user_id, mode = %mode, "attendance mode updated");
    Ok(())
}

pub async fn upsert_subject<'e, E>(
    executor: E,
    user_id: Uuid,
    name: &str,
    code: Option<&str>,
    min_attendance: Option<i32>,
) -> anyhow::Result<Uuid>
where
    E: PgExecutor<'e>,
{
    if let Some(value) = min_attendance {
        risk::validate_threshold(i64::from(value))?;
    }

    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO attendance_portal.subjects
        (id, user_id, subject_name, subject_code, min_attendance)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, subject_name) DO UPDATE
        SET subject_code =
                COALESCE(EXCLUDED.subject_code, attendance_portal.subjects.subject_code),
            min_attendance =
                COALESCE(EXCLUDED.min_attendance, attendance_portal.subjects.min_attendance)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .bind(code)
    .bind(min_attendance)
    .fetch_one(executor)
    .await?
    .get("id");

    Ok(id)
}

pub async fn set_subject_threshold(
    pool: &PgPool,
    user_id: Uuid,
    subject_id: Uuid,
    min_attendance: i32,
) -> anyhow::Result<bool> {
    risk::validate_threshold(i64::from(min_attendance))?;

    let result = sqlx::query(
        "UPDATE attendance_portal.subjects SET min_attendance = $3 WHERE id = $1 AND user_id = $2",
    )
    .bind(subject_id)
    .bind(user_id)
    .bind(min_attendance)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Removes a subject and, through the foreign key, all of its marks.
pub async fn delete_subject(
    pool: &PgPool,
    user_id: Uuid,
    subject_id: Uuid,
) -> anyhow::Result<bool> {
    let result =
        sqlx::query("DELETE FROM attendance_portal.subjects WHERE id = $1 AND user_id = $2")
            .bind(subject_id)
            .bind(user_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn fetch_subjects(pool: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Subject>> {
    let rows = sqlx::query(
        r#"
        SELECT id, subject_name, subject_code, min_attendance
        FROM attendance_portal.subjects
        WHERE user_id = $1
        ORDER BY created_at, subject_name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|row| subject_from_row(&row)).collect())
}

pub async fn find_subject(
    pool: &PgPool,
    user_id: Uuid,
    subject_id: Uuid,
) -> anyhow::Result<Subject> {
    let row = sqlx::query(
        r#"
        SELECT id, subject_name, subject_code, min_attendance
        FROM attendance_portal.subjects
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(subject_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .with_context(|| format!("subject {subject_id} not found"))?;

    Ok(subject_from_row(&row))
}

fn subject_from_row(row: &sqlx::postgres::PgRow) -> Subject {
    Subject {
        id: row.get("id"),
        name: row.get("subject_name"),
        code: row.get("subject_code"),
        min_attendance: row.get("min_attendance"),
    }
}

/// Insert or overwrite the mark for (user, subject, day).
pub async fn mark_attendance<'e, E>(
    executor: E,
    user_id: Uuid,
    subject_id: Uuid,
    day: NaiveDate,
    status: AttendanceStatus,
) -> anyhow::Result<()>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO attendance_portal.attendance
        (id, user_id, subject_id, day, status)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, subject_id, day) DO UPDATE
        SET status = EXCLUDED.status, updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(subject_id)
    .bind(day)
    .bind(status.as_str())
    .execute(executor)
    .await?;

    debug!(%subject_id, %day, %status, "attendance marked");
    Ok(())
}

/// Removes the mark for (user, subject, day). Returns false when there was none.
pub async fn delete_mark(
    pool: &PgPool,
    user_id: Uuid,
    subject_id: Uuid,
    day: NaiveDate,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        "DELETE FROM attendance_portal.attendance \
         WHERE user_id = $1 AND subject_id = $2 AND day = $3",
    )
    .bind(user_id)
    .bind(subject_id)
    .bind(day)
    .execute(pool)
    .await?;

    debug!(%subject_id, %day, removed = result.rows_affected(), "attendance unmarked");
    Ok(result.rows_affected() > 0)
}

/// Every mark of a user across subjects, newest day first.
pub async fn fetch_marks_with_subjects(
    pool: &PgPool,
    user_id: Uuid,
) -> anyhow::Result<Vec<MarkEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT a.subject_id, s.subject_name, a.day, a.status
        FROM attendance_portal.attendance a
        JOIN attendance_portal.subjects s ON s.id = a.subject_id
        WHERE a.user_id = $1
        ORDER BY a.day DESC, s.subject_name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut marks = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.get("status");
        marks.push(MarkEntry {
            subject_id: row.get("subject_id"),
            subject_name: row.get("subject_name"),
            date: row.get("day"),
            status: status
                .parse()
                .context("attendance table holds an unknown status")?,
        });
    }

    Ok(marks)
}

/// Records for a user ordered by day then insertion time, optionally
/// narrowed to one subject and a half-open day range.
pub async fn fetch_records(
    pool: &PgPool,
    user_id: Uuid,
    subject_id: Option<Uuid>,
    range: Option<(NaiveDate, NaiveDate)>,
) -> anyhow::Result<Vec<StatusRecord>> {
    let mut query = String::from(
        "SELECT subject_id, day, status \
         FROM attendance_portal.attendance \
         WHERE user_id = $1",
    );

    if subject_id.is_some() {
        query.push_str(" AND subject_id = $2");
    }
    if range.is_some() {
        let first = if subject_id.is_some() { 3 } else { 2 };
        query.push_str(&format!(" AND day >= ${} AND day < ${}", first, first + 1));
    }
    query.push_str(" ORDER BY day, created_at");

    let mut rows = sqlx::query(&query).bind(user_id);
    if let Some(value) = subject_id {
        rows = rows.bind(value);
    }
    if let Some((start, end)) = range {
        rows = rows.bind(start).bind(end);
    }

    let raw: Vec<RawStatusRecord> = rows
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| RawStatusRecord {
            subject_id: row.get("subject_id"),
            date: row.get("day"),
            status: row.get("status"),
        })
        .collect();

    let records = risk::parse_records(raw).context("attendance table holds an unknown status")?;
    debug!(%user_id, count = records.len(), "attendance records fetched");
    Ok(records)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let user_id = upsert_user(pool, "avery.lee@example.com", "Avery Lee").await?;

    let subjects = vec![
        ("Operating Systems", Some("CS301"), Some(75)),
        ("Linear Algebra", Some("MA204"), Some(70)),
        ("Technical Writing", None, None),
    ];

    let start = NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?;
    let patterns: [&[AttendanceStatus]; 3] = [
        &[
            AttendanceStatus::Present,
            AttendanceStatus::Present,
            AttendanceStatus::Bunk,
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
        ],
        &[
            AttendanceStatus::Absent,
            AttendanceStatus::Present,
            AttendanceStatus::Bunk,
            AttendanceStatus::Bunk,
            AttendanceStatus::Cancelled,
        ],
        &[
            AttendanceStatus::Present,
            AttendanceStatus::Present,
            AttendanceStatus::Present,
            AttendanceStatus::Cancelled,
            AttendanceStatus::Present,
        ],
    ];

    for ((name, code, min_attendance), pattern) in subjects.into_iter().zip(patterns) {
        let subject_id = upsert_subject(pool, user_id, name, code, min_attendance).await?;
        for (offset, status) in pattern.iter().enumerate() {
            let day = start + chrono::Duration::days(offset as i64);
            mark_attendance(pool, user_id, subject_id, day, *status).await?;
        }
    }

    info!("seed data inserted");
    Ok(())
}

/// Imports marks from a CSV file. Every row is validated before anything is
/// written and all writes share one transaction, so a bad row or a failed
/// insert leaves the database untouched.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        email: String,
        full_name: String,
        subject_name: String,
        subject_code: Option<String>,
        min_attendance: Option<i32>,
        date: NaiveDate,
        status: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        let status = row
            .status
            .parse::<AttendanceStatus>()
            .with_context(|| format!("row {} of {}", index + 1, csv_path.display()))?;
        if let Some(value) = row.min_attendance {
            risk::validate_threshold(i64::from(value))
                .with_context(|| format!("row {} of {}", index + 1, csv_path.display()))?;
        }
        rows.push((row, status));
    }

    let mut tx = pool.begin().await?;
    let mut written = 0usize;
    for (row, status) in rows {
        let user_id = upsert_user(&mut *tx, &row.email, &row.full_name).await?;
        let subject_id = upsert_subject(
            &mut *tx,
            user_id,
            &row.subject_name,
            row.subject_code.as_deref(),
            row.min_attendance,
        )
        .await?;
        mark_attendance(&mut *tx, user_id, subject_id, row.date, status).await?;
        written += 1;
    }
    tx.commit().await?;

    info!(written, path = %csv_path.display(), "csv import finished");
    Ok(written)
}
