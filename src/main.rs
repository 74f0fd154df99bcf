use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

mod config;
mod db;
mod ingest;
mod models;
mod report;
mod service;
mod stats;
mod store;

use config::DatabaseConfig;
use db::PgStudentStore;
use models::{NewStudent, Scores, StudentPatch, StudentRecord, Subject, SubjectGroup};
use service::ServiceError;

#[derive(Parser)]
#[command(name = "exam-scores")]
#[command(
    about = "Student exam records: score lookup, band statistics and group rankings",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    database: DatabaseConfig,

    #[command(subcommand)]
    command: Commands,
}

/// Score and language flags shared by `create` and `update`.
#[derive(Args, Debug, Default)]
struct ScoreArgs {
    #[arg(long)]
    math: Option<f64>,
    #[arg(long)]
    literature: Option<f64>,
    #[arg(long)]
    foreign_language: Option<f64>,
    #[arg(long)]
    physics: Option<f64>,
    #[arg(long)]
    chemistry: Option<f64>,
    #[arg(long)]
    biology: Option<f64>,
    #[arg(long)]
    history: Option<f64>,
    #[arg(long)]
    geography: Option<f64>,
    #[arg(long)]
    civic_education: Option<f64>,
    #[arg(long)]
    foreign_language_code: Option<String>,
}

impl ScoreArgs {
    fn scores(&self) -> Scores {
        Scores {
            math: self.math,
            literature: self.literature,
            foreign_language: self.foreign_language,
            physics: self.physics,
            chemistry: self.chemistry,
            biology: self.biology,
            history: self.history,
            geography: self.geography,
            civic_education: self.civic_education,
        }
    }

    fn into_new_student(self, sbd: String) -> NewStudent {
        NewStudent {
            sbd,
            scores: self.scores(),
            foreign_language_code: self.foreign_language_code,
        }
    }

    fn into_patch(
        self,
        clear: &[Subject],
        clear_language_code: bool,
    ) -> Result<StudentPatch, ServiceError> {
        let scores = self.scores();
        let mut patch = StudentPatch::default();
        for (subject, score) in scores.present() {
            patch.set_score(subject, Some(score));
        }
        for &subject in clear {
            if scores.get(subject).is_some() {
                return Err(ServiceError::Invalid(format!(
                    "--{} and --clear {} cannot be combined",
                    subject.key().replace('_', "-"),
                    subject.key()
                )));
            }
            patch.set_score(subject, None);
        }
        if clear_language_code {
            patch.foreign_language_code = Some(None);
        } else if let Some(code) = self.foreign_language_code {
            patch.foreign_language_code = Some(Some(code));
        }
        Ok(patch)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the sample students
    Seed,
    /// Import students from the exam results CSV
    Import {
        #[arg(long)]
        csv: PathBuf,
        /// Delete all stored students before importing
        #[arg(long)]
        replace: bool,
    },
    /// List students ordered by registration code
    List {
        #[arg(long, default_value_t = 0)]
        skip: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Show one student by internal id
    Show {
        #[arg(long)]
        id: Uuid,
    },
    /// Look up scores by registration code
    Score {
        sbd: String,
        #[arg(long)]
        json: bool,
    },
    /// Create a student
    Create {
        #[arg(long)]
        sbd: String,
        #[command(flatten)]
        scores: ScoreArgs,
    },
    /// Change some fields of a student; unspecified fields keep their value
    Update {
        #[arg(long)]
        id: Uuid,
        #[command(flatten)]
        scores: ScoreArgs,
        /// Remove a subject score
        #[arg(long, value_enum)]
        clear: Vec<Subject>,
        /// Remove the foreign language code
        #[arg(long, conflicts_with = "foreign_language_code")]
        clear_language_code: bool,
    },
    /// Delete a student
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// Count scores per band for every subject
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Rank students by the total of a subject group
    Top {
        #[arg(long, value_enum, ignore_case = true, default_value_t = SubjectGroup::A00)]
        group: SubjectGroup,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report with both statistics
    Report {
        #[arg(long, value_enum, ignore_case = true, default_value_t = SubjectGroup::A00)]
        group: SubjectGroup,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_student(record: &StudentRecord) {
    let scores: Vec<String> = record
        .scores
        .present()
        .map(|(subject, score)| format!("{} {score:.2}", subject.key()))
        .collect();
    println!(
        "- {} [{}] {}{}",
        record.sbd,
        record.id,
        if scores.is_empty() {
            "no scores".to_string()
        } else {
            scores.join(", ")
        },
        record
            .foreign_language_code
            .as_deref()
            .map(|code| format!(" ({code})"))
            .unwrap_or_default()
    );
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let pool = cli.database.connect().await?;
    let store = PgStudentStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(store.pool()).await?;
            println!("Seed data inserted ({inserted} new students).");
        }
        Commands::Import { csv, replace } => {
            let summary = db::import_csv(store.pool(), &csv, replace).await?;
            println!(
                "Inserted {} students from {} ({} already stored, {} rows rejected).",
                summary.inserted,
                csv.display(),
                summary.duplicates,
                summary.rejected
            );
        }
        Commands::List { skip, limit, json } => {
            let students = service::list_students(&store, skip, limit).await?;
            if json {
                print_json(&students)?;
            } else if students.is_empty() {
                println!("No students found.");
            } else {
                for student in students.iter() {
                    print_student(student);
                }
            }
        }
        Commands::Show { id } => {
            let student = service::get_student(&store, id).await?;
            print_json(&student)?;
        }
        Commands::Score { sbd, json } => {
            let card = service::lookup_score(&store, &sbd).await?;
            if json {
                print_json(&card)?;
            } else {
                print!("{}", report::render_score_card(&card));
            }
        }
        Commands::Create { sbd, scores } => {
            let student = scores.into_new_student(sbd.trim().to_string());
            let created = service::create_student(&store, student).await?;
            println!("Created student {} with id {}.", created.sbd, created.id);
        }
        Commands::Update {
            id,
            scores,
            clear,
            clear_language_code,
        } => {
            let patch = scores.into_patch(&clear, clear_language_code)?;
            let updated = service::update_student(&store, id, &patch).await?;
            print_json(&updated)?;
        }
        Commands::Delete { id } => {
            service::delete_student(&store, id).await?;
            println!("Student deleted.");
        }
        Commands::Stats { json } => {
            let bands = service::band_report(&store).await?;
            if json {
                print_json(&bands)?;
            } else {
                print!("{}", report::render_band_table(&bands));
            }
        }
        Commands::Top { group, limit, json } => {
            let ranking = service::top_composite(&store, group, limit).await?;
            if json {
                print_json(&ranking)?;
            } else {
                println!("Top students for group {}:", group.code());
                print!("{}", report::render_ranking(group, &ranking));
            }
        }
        Commands::Report { group, limit, out } => {
            let bands = service::band_report(&store).await?;
            let ranking = service::top_composite(&store, group, limit).await?;
            let report = report::build_report(Utc::now().date_naive(), &bands, group, &ranking);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    config::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<ServiceError>()
                .map(ServiceError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_flags_build_a_partial_patch() {
        let cli = Cli::parse_from([
            "exam-scores",
            "update",
            "--id",
            "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "--math",
            "8.25",
            "--clear",
            "chemistry",
            "--clear",
            "foreign_language",
        ]);

        let Commands::Update {
            scores,
            clear,
            clear_language_code,
            ..
        } = cli.command
        else {
            panic!("expected update");
        };
        let patch = scores.into_patch(&clear, clear_language_code).unwrap();

        assert_eq!(patch.math, Some(Some(8.25)));
        assert_eq!(patch.chemistry, Some(None));
        assert_eq!(patch.foreign_language, Some(None));
        assert_eq!(patch.physics, None);
        assert_eq!(patch.foreign_language_code, None);
    }

    #[test]
    fn top_defaults_to_group_a00_and_ten_entries() {
        let cli = Cli::parse_from(["exam-scores", "top"]);
        let Commands::Top { group, limit, json } = cli.command else {
            panic!("expected top");
        };
        assert_eq!(group, SubjectGroup::A00);
        assert_eq!(limit, 10);
        assert!(!json);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let result =
            Cli::try_parse_from(["exam-scores", "create", "--sbd", "01001001", "--art", "9"]);
        assert!(result.is_err());
    }

    #[test]
    fn setting_and_clearing_the_same_subject_is_rejected() {
        let cli = Cli::parse_from([
            "exam-scores",
            "update",
            "--id",
            "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2",
            "--math",
            "8",
            "--clear",
            "math",
        ]);
        let Commands::Update {
            scores,
            clear,
            clear_language_code,
            ..
        } = cli.command
        else {
            panic!("expected update");
        };

        let err = scores.into_patch(&clear, clear_language_code).unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("--math and --clear math"));
    }
}
