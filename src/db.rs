use sqlx::{Pool, Postgres};

pub mod scheduler;

mod user;
pub use user::{AdminUserPatch, NewUser, ProfilePatch, UserExt};

mod internship;
pub use internship::{
    DeleteOutcome, InternshipExt, InternshipFilter, InternshipSort, NewInternship,
};

mod application;
pub use application::{
    ApplicantSummary, ApplicationExt, DecisionUpdate, InternshipSummary, NewApplication,
    ReceivedApplication, StatsScope, StudentApplication, SubmitOutcome,
};

#[cfg(test)]
pub mod memory;

/// Storage failures, already sorted into the cases callers branch on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the constraint name.
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Conflict(db_err.constraint().unwrap_or("unique").to_string())
            }
            other => StoreError::Sqlx(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Offset for a 1-based page number.
pub(crate) fn page_offset(page: u32, limit: u32) -> i64 {
    (page.max(1) as i64 - 1) * limit as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[test]
    fn offsets_start_at_zero() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 10), 0);
    }
}
