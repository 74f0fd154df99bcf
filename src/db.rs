use std::path::Path;

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ingest;
use crate::models::{NewStudent, Scores, StudentPatch, StudentRecord};
use crate::store::{StoreError, StudentStore};

const COLUMNS: &str = "id, sbd, math, literature, foreign_language, physics, chemistry, \
                       biology, history, geography, civic_education, foreign_language_code";

const INSERT_STUDENT: &str = r#"
    INSERT INTO exam_scores.students
    (id, sbd, math, literature, foreign_language, physics, chemistry,
     biology, history, geography, civic_education, foreign_language_code)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

const PROGRESS_EVERY: usize = 1000;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn record_from_row(row: &PgRow) -> StudentRecord {
    StudentRecord {
        id: row.get("id"),
        sbd: row.get("sbd"),
        scores: Scores {
            math: row.get("math"),
            literature: row.get("literature"),
            foreign_language: row.get("foreign_language"),
            physics: row.get("physics"),
            chemistry: row.get("chemistry"),
            biology: row.get("biology"),
            history: row.get("history"),
            geography: row.get("geography"),
            civic_education: row.get("civic_education"),
        },
        foreign_language_code: row.get("foreign_language_code"),
    }
}

fn bind_scores<'q>(
    query: Query<'q, Postgres, PgArguments>,
    scores: &Scores,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(scores.math)
        .bind(scores.literature)
        .bind(scores.foreign_language)
        .bind(scores.physics)
        .bind(scores.chemistry)
        .bind(scores.biology)
        .bind(scores.history)
        .bind(scores.geography)
        .bind(scores.civic_education)
}

fn insert_query<'q>(
    sql: &'q str,
    id: Uuid,
    student: &'q NewStudent,
) -> Query<'q, Postgres, PgArguments> {
    let query = sqlx::query(sql).bind(id).bind(student.sbd.as_str());
    bind_scores(query, &student.scores).bind(student.foreign_language_code.as_deref())
}

#[derive(Debug, Clone)]
pub struct PgStudentStore {
    pool: PgPool,
}

impl PgStudentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl StudentStore for PgStudentStore {
    async fn list_all(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM exam_scores.students ORDER BY sbd");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<StudentRecord>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM exam_scores.students ORDER BY sbd OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(i64::try_from(skip).unwrap_or(i64::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<StudentRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM exam_scores.students WHERE id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn get_by_registration_code(
        &self,
        sbd: &str,
    ) -> Result<Option<StudentRecord>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM exam_scores.students WHERE sbd = $1");
        let row = sqlx::query(&query).bind(sbd).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn create(&self, student: NewStudent) -> Result<StudentRecord, StoreError> {
        let id = Uuid::new_v4();
        let result = insert_query(INSERT_STUDENT, id, &student)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(student.into_record(id)),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::DuplicateKey { sbd: student.sbd })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &StudentPatch,
    ) -> Result<Option<StudentRecord>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("SELECT {COLUMNS} FROM exam_scores.students WHERE id = $1 FOR UPDATE");
        let Some(row) = sqlx::query(&query).bind(id).fetch_optional(&mut *tx).await? else {
            return Ok(None);
        };

        let mut record = record_from_row(&row);
        patch.apply(&mut record);

        let statement = sqlx::query(
            r#"
            UPDATE exam_scores.students
            SET math = $2, literature = $3, foreign_language = $4, physics = $5,
                chemistry = $6, biology = $7, history = $8, geography = $9,
                civic_education = $10, foreign_language_code = $11
            WHERE id = $1
            "#,
        )
        .bind(id);
        bind_scores(statement, &record.scores)
            .bind(record.foreign_language_code.as_deref())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM exam_scores.students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Sample students from the reference deployment.
fn sample_students() -> Vec<NewStudent> {
    let rows: [(&str, f64, f64, f64, f64, f64); 10] = [
        ("01001001", 9.5, 9.2, 9.8, 8.0, 8.5),
        ("01001002", 9.0, 9.5, 9.0, 7.8, 8.2),
        ("01001003", 8.8, 9.0, 9.2, 8.5, 8.0),
        ("01001004", 8.5, 8.8, 9.0, 7.5, 7.8),
        ("01001005", 8.2, 8.5, 8.8, 8.2, 8.3),
        ("01001006", 8.0, 8.2, 8.5, 7.0, 7.5),
        ("01001007", 7.8, 8.0, 8.2, 7.8, 7.2),
        ("01001008", 7.5, 7.8, 8.0, 6.5, 7.0),
        ("01001009", 7.2, 7.5, 7.8, 7.0, 6.8),
        ("01001010", 7.0, 7.2, 7.5, 6.2, 6.5),
    ];

    rows.into_iter()
        .map(|(sbd, math, physics, chemistry, literature, foreign_language)| NewStudent {
            sbd: sbd.to_string(),
            scores: Scores {
                math: Some(math),
                physics: Some(physics),
                chemistry: Some(chemistry),
                literature: Some(literature),
                foreign_language: Some(foreign_language),
                ..Scores::default()
            },
            foreign_language_code: Some("N1".to_string()),
        })
        .collect()
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<usize> {
    let sql = format!("{INSERT_STUDENT} ON CONFLICT (sbd) DO NOTHING");
    let mut inserted = 0usize;

    for student in sample_students() {
        let result = insert_query(&sql, Uuid::new_v4(), &student)
            .execute(pool)
            .await?;
        inserted += result.rows_affected() as usize;
    }

    Ok(inserted)
}

#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

pub async fn import_csv(
    pool: &PgPool,
    csv_path: &Path,
    replace: bool,
) -> anyhow::Result<ImportSummary> {
    let parsed = ingest::read_path(csv_path)?;
    for error in &parsed.errors {
        warn!(line = error.line, "skipping CSV row: {}", error.message);
    }
    info!(
        rows = parsed.students.len(),
        rejected = parsed.errors.len(),
        path = %csv_path.display(),
        "parsed CSV"
    );

    let mut summary = ImportSummary {
        rejected: parsed.errors.len(),
        ..ImportSummary::default()
    };
    let sql = format!("{INSERT_STUDENT} ON CONFLICT (sbd) DO NOTHING");
    let mut tx = pool.begin().await?;

    if replace {
        let cleared = sqlx::query("DELETE FROM exam_scores.students")
            .execute(&mut *tx)
            .await?;
        info!(removed = cleared.rows_affected(), "cleared existing students");
    }

    for (index, student) in parsed.students.iter().enumerate() {
        let result = insert_query(&sql, Uuid::new_v4(), student)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() > 0 {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
            debug!(sbd = %student.sbd, "registration code already stored");
        }

        if (index + 1) % PROGRESS_EVERY == 0 {
            info!(processed = index + 1, "import progress");
        }
    }

    tx.commit().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service;

    #[test]
    fn sample_students_are_valid_and_unique() {
        let students = sample_students();
        assert_eq!(students.len(), 10);
        for student in &students {
            service::validate_new_student(student).unwrap();
        }
        let mut codes: Vec<&str> = students.iter().map(|s| s.sbd.as_str()).collect();
        codes.dedup();
        assert_eq!(codes.len(), 10);
    }
}
