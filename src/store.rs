use uuid::Uuid;

use crate::models::{NewStudent, StudentPatch, StudentRecord};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("registration code already exists: {sbd}")]
    DuplicateKey { sbd: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for student records. Callers receive the store explicitly; the
/// statistics functions only ever see the records it returns.
pub trait StudentStore {
    /// Every record, ordered by registration code.
    async fn list_all(&self) -> Result<Vec<StudentRecord>, StoreError>;

    async fn list(&self, skip: usize, limit: usize) -> Result<Vec<StudentRecord>, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<StudentRecord>, StoreError>;

    async fn get_by_registration_code(
        &self,
        sbd: &str,
    ) -> Result<Option<StudentRecord>, StoreError>;

    /// Fails with [`StoreError::DuplicateKey`] when the registration code is taken.
    async fn create(&self, student: NewStudent) -> Result<StudentRecord, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        patch: &StudentPatch,
    ) -> Result<Option<StudentRecord>, StoreError>;

    /// Returns `true` when a record was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[cfg(test)]
pub use memory::MemoryStore;
