use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{DBClient, StoreResult};
use crate::models::{Application, ApplicationStatus, InternshipStatus, StudyLevel};

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub internship_id: Uuid,
    pub student_id: Uuid,
    pub resume: String,
    pub cover_letter: String,
    pub portfolio: String,
}

/// Result of the atomic submit. Only `Created` leaves a trace in storage.
#[derive(Debug)]
pub enum SubmitOutcome {
    Created(Application),
    InternshipMissing,
    CapacityReached,
    AlreadyApplied,
}

/// Reviewer fields. `None` keeps what is stored; `status` is always written.
#[derive(Debug, Clone)]
pub struct DecisionUpdate {
    pub status: ApplicationStatus,
    pub rejection_reason: Option<String>,
    pub interview_date: Option<DateTime<Utc>>,
    pub interview_notes: Option<String>,
    pub rating: Option<i16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsScope {
    Student(Uuid),
    /// Applications to internships posted by this company.
    Company(Uuid),
    Global,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct InternshipSummary {
    #[sqlx(rename = "internship_ref")]
    pub id: Uuid,
    #[sqlx(rename = "internship_title")]
    pub title: String,
    #[sqlx(rename = "internship_company")]
    pub company: String,
    #[sqlx(rename = "internship_location")]
    pub location: String,
    #[sqlx(rename = "internship_salary")]
    pub salary: String,
    #[sqlx(rename = "internship_status")]
    pub status: InternshipStatus,
    #[sqlx(rename = "internship_deadline")]
    pub application_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantSummary {
    #[sqlx(rename = "student_ref")]
    pub id: Uuid,
    #[sqlx(rename = "student_name")]
    pub name: String,
    #[sqlx(rename = "student_email")]
    pub email: String,
    #[sqlx(rename = "student_avatar")]
    pub avatar: String,
    #[sqlx(rename = "student_university")]
    pub university: String,
    #[sqlx(rename = "student_study_level")]
    pub study_level: Option<StudyLevel>,
    #[sqlx(rename = "student_study_field")]
    pub study_field: String,
    #[sqlx(rename = "student_graduation_year")]
    pub graduation_year: Option<i32>,
}

/// An application as its student sees it: with the posting it targets.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentApplication {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub application: Application,
    #[sqlx(flatten)]
    pub internship: InternshipSummary,
}

/// An application as the posting company sees it: with the applicant.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReceivedApplication {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub application: Application,
    #[sqlx(flatten)]
    pub student: ApplicantSummary,
}

pub trait ApplicationExt {
    async fn get_application(&self, application_id: Uuid) -> StoreResult<Option<Application>>;

    async fn find_application(
        &self,
        internship_id: Uuid,
        student_id: Uuid,
    ) -> StoreResult<Option<Application>>;

    /// Reserve a capacity slot and insert the application in one transaction.
    /// Nothing is written unless the outcome is `Created`.
    async fn submit_application(&self, new_application: &NewApplication)
    -> StoreResult<SubmitOutcome>;

    async fn update_application_decision(
        &self,
        application_id: Uuid,
        update: &DecisionUpdate,
    ) -> StoreResult<Application>;

    /// Delete the application and release its capacity slot in one
    /// transaction. Returns the deleted row, or `None` if it was already gone.
    async fn withdraw_application(&self, application_id: Uuid)
    -> StoreResult<Option<Application>>;

    async fn applications_by_student(
        &self,
        student_id: Uuid,
    ) -> StoreResult<Vec<StudentApplication>>;

    async fn applications_by_internship(
        &self,
        internship_id: Uuid,
    ) -> StoreResult<Vec<ReceivedApplication>>;

    /// Per-status counts within the scope. Statuses with no applications are
    /// absent from the result.
    async fn count_applications_by_status(
        &self,
        scope: StatsScope,
    ) -> StoreResult<Vec<(ApplicationStatus, i64)>>;
}

impl ApplicationExt for DBClient {
    async fn get_application(&self, application_id: Uuid) -> StoreResult<Option<Application>> {
        let application =
            sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = $1")
                .bind(application_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(application)
    }

    async fn find_application(
        &self,
        internship_id: Uuid,
        student_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE internship_id = $1 AND student_id = $2",
        )
        .bind(internship_id)
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(application)
    }

    async fn submit_application(
        &self,
        new_application: &NewApplication,
    ) -> StoreResult<SubmitOutcome> {
        let mut tx = self.pool.begin().await?;

        // The row lock taken here serialises concurrent submits to one internship.
        let reserved = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE internships
            SET applications_count = applications_count + 1
            WHERE id = $1 AND applications_count < max_applications
            RETURNING id
            "#,
        )
        .bind(new_application.internship_id)
        .fetch_optional(&mut *tx)
        .await?;

        if reserved.is_none() {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM internships WHERE id = $1)",
            )
            .bind(new_application.internship_id)
            .fetch_one(&mut *tx)
            .await?;
            tx.rollback().await?;

            return Ok(if exists {
                SubmitOutcome::CapacityReached
            } else {
                SubmitOutcome::InternshipMissing
            });
        }

        let created = sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (internship_id, student_id, resume, cover_letter, portfolio)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (internship_id, student_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new_application.internship_id)
        .bind(new_application.student_id)
        .bind(&new_application.resume)
        .bind(&new_application.cover_letter)
        .bind(&new_application.portfolio)
        .fetch_optional(&mut *tx)
        .await?;

        match created {
            Some(application) => {
                tx.commit().await?;
                Ok(SubmitOutcome::Created(application))
            }
            None => {
                // Releases the reserved slot as well.
                tx.rollback().await?;
                Ok(SubmitOutcome::AlreadyApplied)
            }
        }
    }

    async fn update_application_decision(
        &self,
        application_id: Uuid,
        update: &DecisionUpdate,
    ) -> StoreResult<Application> {
        let application = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET status = $2,
                rejection_reason = COALESCE($3, rejection_reason),
                interview_date = COALESCE($4, interview_date),
                interview_notes = COALESCE($5, interview_notes),
                rating = COALESCE($6, rating),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(application_id)
        .bind(update.status)
        .bind(&update.rejection_reason)
        .bind(update.interview_date)
        .bind(&update.interview_notes)
        .bind(update.rating)
        .fetch_one(&self.pool)
        .await?;

        Ok(application)
    }

    async fn withdraw_application(
        &self,
        application_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query_as::<_, Application>(
            "DELETE FROM applications WHERE id = $1 RETURNING *",
        )
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(application) = &deleted {
            sqlx::query(
                r#"
                UPDATE internships
                SET applications_count = GREATEST(applications_count - 1, 0)
                WHERE id = $1
                "#,
            )
            .bind(application.internship_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(deleted)
    }

    async fn applications_by_student(
        &self,
        student_id: Uuid,
    ) -> StoreResult<Vec<StudentApplication>> {
        let rows = sqlx::query_as::<_, StudentApplication>(
            r#"
            SELECT a.*,
                   i.id AS internship_ref,
                   i.title AS internship_title,
                   i.company AS internship_company,
                   i.location AS internship_location,
                   i.salary AS internship_salary,
                   i.status AS internship_status,
                   i.application_deadline AS internship_deadline
            FROM applications a
            JOIN internships i ON i.id = a.internship_id
            WHERE a.student_id = $1
            ORDER BY a.created_at DESC
            "#,
        )
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn applications_by_internship(
        &self,
        internship_id: Uuid,
    ) -> StoreResult<Vec<ReceivedApplication>> {
        let rows = sqlx::query_as::<_, ReceivedApplication>(
            r#"
            SELECT a.*,
                   u.id AS student_ref,
                   u.name AS student_name,
                   u.email AS student_email,
                   u.avatar AS student_avatar,
                   u.university AS student_university,
                   u.study_level AS student_study_level,
                   u.study_field AS student_study_field,
                   u.graduation_year AS student_graduation_year
            FROM applications a
            JOIN users u ON u.id = a.student_id
            WHERE a.internship_id = $1
            ORDER BY a.created_at DESC
            "#,
        )
        .bind(internship_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_applications_by_status(
        &self,
        scope: StatsScope,
    ) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        let (student, company) = match scope {
            StatsScope::Student(id) => (Some(id), None),
            StatsScope::Company(id) => (None, Some(id)),
            StatsScope::Global => (None, None),
        };

        let counts = sqlx::query_as::<_, (ApplicationStatus, i64)>(
            r#"
            SELECT a.status, COUNT(*)
            FROM applications a
            JOIN internships i ON i.id = a.internship_id
            WHERE ($1::uuid IS NULL OR a.student_id = $1)
              AND ($2::uuid IS NULL OR i.posted_by = $2)
            GROUP BY a.status
            "#,
        )
        .bind(student)
        .bind(company)
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}
