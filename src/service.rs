use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{NewStudent, StudentPatch, StudentRecord, Subject, SubjectGroup};
use crate::stats::{self, BandReport, RankedEntry, ScoreCard};
use crate::store::{StoreError, StudentStore};

pub const MAX_SBD_LEN: usize = 20;
pub const MAX_LANGUAGE_CODE_LEN: usize = 10;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("student not found: {0}")]
    NotFound(String),

    #[error("registration code already exists: {0}")]
    Duplicate(String),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ServiceError::Store(_) => 1,
            ServiceError::Invalid(_) => 2,
            ServiceError::NotFound(_) => 3,
            ServiceError::Duplicate(_) => 4,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey { sbd } => ServiceError::Duplicate(sbd),
            other => ServiceError::Store(other),
        }
    }
}

pub fn validate_sbd(sbd: &str) -> Result<(), ServiceError> {
    if sbd.is_empty() {
        return Err(ServiceError::Invalid("registration code is empty".to_string()));
    }
    if sbd.chars().count() > MAX_SBD_LEN {
        return Err(ServiceError::Invalid(format!(
            "registration code {sbd:?} is longer than {MAX_SBD_LEN} characters"
        )));
    }
    if sbd.chars().any(char::is_whitespace) {
        return Err(ServiceError::Invalid(format!(
            "registration code {sbd:?} contains whitespace"
        )));
    }
    Ok(())
}

fn validate_score(subject: Subject, score: Option<f64>) -> Result<(), ServiceError> {
    match score {
        Some(value) if !value.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&value) => {
            Err(ServiceError::Invalid(format!(
                "{} score {value} is outside {MIN_SCORE}..={MAX_SCORE}",
                subject.key()
            )))
        }
        _ => Ok(()),
    }
}

fn validate_language_code(code: Option<&str>) -> Result<(), ServiceError> {
    match code {
        Some(code) if code.chars().count() > MAX_LANGUAGE_CODE_LEN => {
            Err(ServiceError::Invalid(format!(
                "foreign language code {code:?} is longer than {MAX_LANGUAGE_CODE_LEN} characters"
            )))
        }
        _ => Ok(()),
    }
}

pub fn validate_new_student(student: &NewStudent) -> Result<(), ServiceError> {
    validate_sbd(&student.sbd)?;
    for subject in Subject::ALL {
        validate_score(subject, student.scores.get(subject))?;
    }
    validate_language_code(student.foreign_language_code.as_deref())
}

pub fn validate_patch(patch: &StudentPatch) -> Result<(), ServiceError> {
    if patch.is_empty() {
        return Err(ServiceError::Invalid("update does not change any field".to_string()));
    }
    for subject in Subject::ALL {
        validate_score(subject, patch.score_change(subject).flatten())?;
    }
    validate_language_code(
        patch
            .foreign_language_code
            .as_ref()
            .and_then(|code| code.as_deref()),
    )
}

pub async fn list_students<S: StudentStore>(
    store: &S,
    skip: usize,
    limit: usize,
) -> Result<Vec<StudentRecord>, ServiceError> {
    Ok(store.list(skip, limit).await?)
}

pub async fn get_student<S: StudentStore>(
    store: &S,
    id: Uuid,
) -> Result<StudentRecord, ServiceError> {
    store
        .get_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(id.to_string()))
}

pub async fn lookup_score<S: StudentStore>(
    store: &S,
    sbd: &str,
) -> Result<ScoreCard, ServiceError> {
    let sbd = sbd.trim();
    validate_sbd(sbd)?;
    let record = store
        .get_by_registration_code(sbd)
        .await?
        .ok_or_else(|| ServiceError::NotFound(sbd.to_string()))?;
    Ok(stats::score_card(&record))
}

pub async fn create_student<S: StudentStore>(
    store: &S,
    student: NewStudent,
) -> Result<StudentRecord, ServiceError> {
    validate_new_student(&student)?;
    let record = store.create(student).await?;
    info!(id = %record.id, sbd = %record.sbd, "student created");
    Ok(record)
}

pub async fn update_student<S: StudentStore>(
    store: &S,
    id: Uuid,
    patch: &StudentPatch,
) -> Result<StudentRecord, ServiceError> {
    validate_patch(patch)?;
    let record = store
        .update(id, patch)
        .await?
        .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
    info!(id = %record.id, sbd = %record.sbd, "student updated");
    Ok(record)
}

pub async fn delete_student<S: StudentStore>(store: &S, id: Uuid) -> Result<(), ServiceError> {
    if !store.delete(id).await? {
        return Err(ServiceError::NotFound(id.to_string()));
    }
    info!(%id, "student deleted");
    Ok(())
}

pub async fn band_report<S: StudentStore>(store: &S) -> Result<BandReport, ServiceError> {
    let records = store.list_all().await?;
    debug!(records = records.len(), "computing band report");
    Ok(stats::compute_band_report(&records, &Subject::ALL))
}

pub async fn top_composite<S: StudentStore>(
    store: &S,
    group: SubjectGroup,
    limit: usize,
) -> Result<Vec<RankedEntry>, ServiceError> {
    let records = store.list_all().await?;
    debug!(records = records.len(), group = group.code(), limit, "ranking by composite");
    Ok(stats::compute_top_composite(&records, group, limit))
}
