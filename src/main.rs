use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use attendance_aggregator::models::{AttendanceStatus, CountingMode};
use attendance_aggregator::{db, heatmap, overview, report, risk, PolicyConfig};

#[derive(Parser)]
#[command(name = "attendance")]
#[command(about = "Attendance tracking and risk analytics for students", long_about = None)]
struct Cli {
    /// Threshold used for subjects without their own minimum
    #[arg(long, global = true)]
    default_threshold: Option<i64>,
    /// Width of the Risk band above each threshold
    #[arg(long, global = true)]
    risk_band: Option<u8>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance marks from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Register a user
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
    },
    /// Register a subject, or update its code and minimum
    AddSubject {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        min_attendance: Option<i32>,
    },
    /// Change a subject's minimum attendance
    SetThreshold {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Uuid,
        #[arg(long)]
        min_attendance: i32,
    },
    /// Delete a subject and its attendance marks
    DeleteSubject {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Uuid,
    },
    /// Mark attendance for a subject on a day
    Mark {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Uuid,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        status: String,
    },
    /// Remove the mark for a subject on a day
    Unmark {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Uuid,
        #[arg(long)]
        date: NaiveDate,
    },
    /// List every mark across subjects, newest first
    List {
        #[arg(long)]
        email: String,
        #[arg(long)]
        json: bool,
    },
    /// Show or change the counting mode stored for a user
    Settings {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        mode: Option<CountingMode>,
    },
    /// Attendance analytics for one subject
    Analytics {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Uuid,
        #[arg(long, value_enum)]
        mode: Option<CountingMode>,
        #[arg(long)]
        json: bool,
    },
    /// Dashboard overview across all subjects
    Overview {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        mode: Option<CountingMode>,
        #[arg(long)]
        json: bool,
    },
    /// Per-day status summary for one subject or all of them
    Heatmap {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Option<Uuid>,
        /// Restrict to a month, formatted YYYY-MM
        #[arg(long)]
        month: Option<String>,
    },
    /// Raw marks of one subject within a month
    Calendar {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Uuid,
        /// Month formatted YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Export one subject's marks as CSV, or as a plain listing with --sheet
    Export {
        #[arg(long)]
        email: String,
        #[arg(long)]
        subject: Uuid,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        sheet: bool,
    },
    /// Generate a markdown overview report
    Report {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        mode: Option<CountingMode>,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut policy = PolicyConfig::from_env().context("invalid attendance policy settings")?;
    if let Some(value) = cli.default_threshold {
        policy.default_threshold = risk::validate_threshold(value)?;
    }
    if let Some(value) = cli.risk_band {
        policy.risk_band = value;
    }

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let written = db::import_csv(&pool, &csv).await?;
            println!("Imported {written} marks from {}.", csv.display());
        }
        Commands::AddUser { email, name } => {
            let id = db::upsert_user(&pool, &email, &name).await?;
            println!("User {email} ready ({id}).");
        }
        Commands::AddSubject {
            email,
            name,
            code,
            min_attendance,
        } => {
            let user_id = db::user_id(&pool, &email).await?;
            let id =
                db::upsert_subject(&pool, user_id, &name, code.as_deref(), min_attendance).await?;
            println!("Subject {name} ready ({id}).");
        }
        Commands::SetThreshold {
            email,
            subject,
            min_attendance,
        } => {
            let user_id = db::user_id(&pool, &email).await?;
            if !db::set_subject_threshold(&pool, user_id, subject, min_attendance).await? {
                anyhow::bail!("subject {subject} not found");
            }
            println!("Minimum attendance set to {min_attendance}%.");
        }
        Commands::DeleteSubject { email, subject } => {
            let user_id = db::user_id(&pool, &email).await?;
            if !db::delete_subject(&pool, user_id, subject).await? {
                anyhow::bail!("subject {subject} not found");
            }
            println!("Subject {subject} deleted.");
        }
        Commands::Mark {
            email,
            subject,
            date,
            status,
        } => {
            let status: AttendanceStatus = status.parse()?;
            let user_id = db::user_id(&pool, &email).await?;
            db::find_subject(&pool, user_id, subject).await?;
            db::mark_attendance(&pool, user_id, subject, date, status).await?;
            println!("Marked {status} on {date}.");
        }
        Commands::Unmark {
            email,
            subject,
            date,
        } => {
            let user_id = db::user_id(&pool, &email).await?;
            if !db::delete_mark(&pool, user_id, subject, date).await? {
                anyhow::bail!("no mark for subject {subject} on {date}");
            }
            println!("Removed mark on {date}.");
        }
        Commands::List { email, json } => {
            let user_id = db::user_id(&pool, &email).await?;
            let marks = db::fetch_marks_with_subjects(&pool, user_id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&marks)?);
            } else {
                print!("{}", report::mark_listing(&marks));
            }
        }
        Commands::Settings { email, mode } => {
            let user_id = db::user_id(&pool, &email).await?;
            match mode {
                Some(mode) => {
                    db::set_attendance_mode(&pool, user_id, mode).await?;
                    println!("Attendance mode set to {mode}.");
                }
                None => {
                    let stored = db::attendance_mode(&pool, user_id).await?;
                    let mode = stored.unwrap_or(policy.default_mode);
                    println!("Attendance mode: {mode} ({})", mode.describe());
                }
            }
        }
        Commands::Analytics {
            email,
            subject,
            mode,
            json,
        } => {
            let user_id = db::user_id(&pool, &email).await?;
            let mode = resolve_mode(&pool, user_id, mode, &policy).await?;
            let subject = db::find_subject(&pool, user_id, subject).await?;
            let records = db::fetch_records(&pool, user_id, Some(subject.id), None).await?;
            let metrics = overview::analyze_subject(&subject, &records, mode, &policy)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                println!("{} ({})", metrics.subject_name, metrics.logic_used);
                println!(
                    "- raw: {} present, {} absent, {} bunk, {} cancelled",
                    metrics.raw.present, metrics.raw.absent, metrics.raw.bunk, metrics.raw.cancelled
                );
                println!(
                    "- {}% of {} classes (minimum {}%): {}",
                    metrics.metrics.percentage,
                    metrics.metrics.total_classes,
                    metrics.threshold,
                    metrics.metrics.risk_status
                );
            }
        }
        Commands::Overview { email, mode, json } => {
            let user_id = db::user_id(&pool, &email).await?;
            let mode = resolve_mode(&pool, user_id, mode, &policy).await?;
            let subjects = db::fetch_subjects(&pool, user_id).await?;
            let records = db::fetch_records(&pool, user_id, None, None).await?;
            let summary = overview::build_overview(&subjects, &records, mode, &policy)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else if !summary.has_subjects {
                println!("No subjects registered yet.");
            } else {
                println!(
                    "Overall {}% across {} classes: {}",
                    summary.overall.percentage,
                    summary.overall.total_classes,
                    summary.overall.risk_status
                );
                for subject in &summary.subjects {
                    println!(
                        "- {} {}% ({})",
                        subject.subject_name,
                        subject.metrics.percentage,
                        subject.metrics.risk_status
                    );
                }
            }
        }
        Commands::Heatmap {
            email,
            subject,
            month,
        } => {
            let user_id = db::user_id(&pool, &email).await?;
            let range = month.as_deref().map(heatmap::month_bounds).transpose()?;
            let records = db::fetch_records(&pool, user_id, subject, range).await?;
            let days = heatmap::summarize_days(&records);
            let days: Vec<_> = days.into_values().collect();
            println!("{}", serde_json::to_string_pretty(&days)?);
        }
        Commands::Calendar {
            email,
            subject,
            month,
        } => {
            let user_id = db::user_id(&pool, &email).await?;
            let range = heatmap::month_bounds(&month)?;
            let records = db::fetch_records(&pool, user_id, Some(subject), Some(range)).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Export {
            email,
            subject,
            out,
            sheet,
        } => {
            let user_id = db::user_id(&pool, &email).await?;
            let subject = db::find_subject(&pool, user_id, subject).await?;
            let records = db::fetch_records(&pool, user_id, Some(subject.id), None).await?;

            if sheet {
                std::fs::write(&out, report::subject_sheet(&subject, &records))?;
            } else {
                let file = std::fs::File::create(&out)
                    .with_context(|| format!("failed to create {}", out.display()))?;
                report::export_csv(file, &records)?;
            }
            info!(subject = %subject.name, records = records.len(), "export written");
            println!("Export written to {}.", out.display());
        }
        Commands::Report { email, mode, out } => {
            let user_id = db::user_id(&pool, &email).await?;
            let mode = resolve_mode(&pool, user_id, mode, &policy).await?;
            let subjects = db::fetch_subjects(&pool, user_id).await?;
            let records = db::fetch_records(&pool, user_id, None, None).await?;
            let summary = overview::build_overview(&subjects, &records, mode, &policy)?;
            let markdown = report::build_report(&email, &summary, &records);
            std::fs::write(&out, markdown)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Explicit flag, then the user's stored choice, then the configured default.
async fn resolve_mode(
    pool: &PgPool,
    user_id: Uuid,
    requested: Option<CountingMode>,
    policy: &PolicyConfig,
) -> anyhow::Result<CountingMode> {
    if let Some(mode) = requested {
        return Ok(mode);
    }
    Ok(db::attendance_mode(pool, user_id)
        .await?
        .unwrap_or(policy.default_mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmark_takes_subject_and_date() {
        let subject = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "attendance",
            "unmark",
            "--email",
            "avery@example.com",
            "--subject",
            &subject.to_string(),
            "--date",
            "2026-02-03",
        ])
        .unwrap();

        match cli.command {
            Commands::Unmark {
                subject: parsed,
                date,
                ..
            } => {
                assert_eq!(parsed, subject);
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 2, 3).unwrap());
            }
            _ => panic!("expected unmark"),
        }
    }

    #[test]
    fn unmark_rejects_malformed_dates() {
        let result = Cli::try_parse_from([
            "attendance",
            "unmark",
            "--email",
            "avery@example.com",
            "--subject",
            &Uuid::nil().to_string(),
            "--date",
            "03/02/2026",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn list_needs_only_an_email() {
        let cli =
            Cli::try_parse_from(["attendance", "list", "--email", "a@b.c", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::List { json: true, .. }));
    }

    #[test]
    fn modes_accept_legacy_names_on_the_command_line() {
        let cli = Cli::try_parse_from([
            "attendance",
            "overview",
            "--email",
            "a@b.c",
            "--mode",
            "bunk_ignore",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Overview {
                mode: Some(CountingMode::BunkIgnored),
                ..
            }
        ));
    }
}
