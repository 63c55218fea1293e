//! Application lifecycle: submit, review, withdraw.
//!
//! Submission preconditions are checked in a fixed order and the first one
//! that fails is reported. The capacity and uniqueness checks are repeated
//! atomically by the store, so a request that passes the early checks can
//! still be refused if a concurrent submit took the last slot.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ServiceError;
use super::identity::discard_blob;
use crate::access::{Action, Actor, Resource, authorize, require_role};
use crate::config::TransitionPolicy;
use crate::db::{
    ApplicationExt, DecisionUpdate, InternshipExt, NewApplication, ReceivedApplication,
    StudentApplication, SubmitOutcome,
};
use crate::dtos::DecideApplicationDto;
use crate::error::ErrorMessage;
use crate::models::{Application, InternshipStatus, UserRole};
use crate::upload::{BlobStore, FileUpload};

#[derive(Debug)]
pub struct Submission {
    pub internship_id: Uuid,
    pub cover_letter: String,
    pub portfolio: Option<String>,
    pub resume: Option<FileUpload>,
}

fn internship_not_found() -> ServiceError {
    ServiceError::NotFound(ErrorMessage::InternshipNotFound)
}

fn application_not_found() -> ServiceError {
    ServiceError::NotFound(ErrorMessage::ApplicationNotFound)
}

pub async fn submit_application<D, B>(
    db: &D,
    blobs: &B,
    actor: &Actor,
    submission: Submission,
    now: DateTime<Utc>,
) -> Result<Application, ServiceError>
where
    D: InternshipExt + ApplicationExt,
    B: BlobStore,
{
    require_role(actor, &[UserRole::Student])?;

    let internship = db
        .get_internship(submission.internship_id)
        .await?
        .ok_or_else(internship_not_found)?;

    if internship.status != InternshipStatus::Active {
        return Err(ServiceError::Closed);
    }
    if now > internship.application_deadline {
        return Err(ServiceError::DeadlinePassed);
    }
    if db
        .find_application(internship.id, actor.id)
        .await?
        .is_some()
    {
        return Err(ServiceError::AlreadyApplied);
    }
    if !internship.has_capacity() {
        return Err(ServiceError::CapacityReached);
    }
    let resume = submission.resume.ok_or(ServiceError::ResumeRequired)?;

    let locator = blobs.put(&resume).await.map_err(ServiceError::server)?;

    let outcome = db
        .submit_application(&NewApplication {
            internship_id: internship.id,
            student_id: actor.id,
            resume: locator.clone(),
            cover_letter: submission.cover_letter,
            portfolio: submission.portfolio.unwrap_or_default(),
        })
        .await;

    let refusal = match outcome {
        Ok(SubmitOutcome::Created(application)) => {
            tracing::info!(
                application_id = %application.id,
                internship_id = %internship.id,
                student_id = %actor.id,
                "Application submitted"
            );
            return Ok(application);
        }
        Ok(SubmitOutcome::InternshipMissing) => internship_not_found(),
        Ok(SubmitOutcome::CapacityReached) => ServiceError::CapacityReached,
        Ok(SubmitOutcome::AlreadyApplied) => ServiceError::AlreadyApplied,
        Err(e) => e.into(),
    };

    // Nothing references the resume once the submit is refused.
    discard_blob(blobs, &locator).await;
    Err(refusal)
}

pub async fn decide_application<D>(
    db: &D,
    actor: &Actor,
    application_id: Uuid,
    body: DecideApplicationDto,
    policy: TransitionPolicy,
) -> Result<Application, ServiceError>
where
    D: InternshipExt + ApplicationExt,
{
    let application = db
        .get_application(application_id)
        .await?
        .ok_or_else(application_not_found)?;
    let internship = db
        .get_internship(application.internship_id)
        .await?
        .ok_or_else(internship_not_found)?;

    authorize(
        actor,
        Resource::Application {
            student: application.student_id,
            internship_owner: internship.posted_by,
        },
        Action::Decide,
    )?;

    if policy == TransitionPolicy::Strict && !application.status.can_move_to(body.status) {
        return Err(ServiceError::IllegalTransition {
            from: application.status,
            to: body.status,
        });
    }
    if body.rating.is_some_and(|r| !(1..=5).contains(&r)) {
        return Err(ServiceError::InvalidInput(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let updated = db
        .update_application_decision(
            application.id,
            &DecisionUpdate {
                status: body.status,
                rejection_reason: body.rejection_reason,
                interview_date: body.interview_date,
                interview_notes: body.interview_notes,
                rating: body.rating,
            },
        )
        .await?;

    tracing::info!(
        application_id = %updated.id,
        from = %application.status,
        to = %updated.status,
        "Application status changed"
    );
    Ok(updated)
}

pub async fn withdraw_application<D, B>(
    db: &D,
    blobs: &B,
    actor: &Actor,
    application_id: Uuid,
) -> Result<(), ServiceError>
where
    D: InternshipExt + ApplicationExt,
    B: BlobStore,
{
    let application = db
        .get_application(application_id)
        .await?
        .ok_or_else(application_not_found)?;
    // The owner id only matters for decisions; withdrawal is the student's.
    let internship_owner = db
        .get_internship(application.internship_id)
        .await?
        .map(|i| i.posted_by)
        .unwrap_or_default();

    authorize(
        actor,
        Resource::Application {
            student: application.student_id,
            internship_owner,
        },
        Action::Withdraw,
    )?;

    let removed = db
        .withdraw_application(application.id)
        .await?
        .ok_or_else(application_not_found)?;

    discard_blob(blobs, &removed.resume).await;
    tracing::info!(application_id = %removed.id, "Application withdrawn");
    Ok(())
}

pub async fn my_applications<D: ApplicationExt>(
    db: &D,
    actor: &Actor,
) -> Result<Vec<StudentApplication>, ServiceError> {
    require_role(actor, &[UserRole::Student])?;
    Ok(db.applications_by_student(actor.id).await?)
}

pub async fn internship_applications<D>(
    db: &D,
    actor: &Actor,
    internship_id: Uuid,
) -> Result<Vec<ReceivedApplication>, ServiceError>
where
    D: InternshipExt + ApplicationExt,
{
    let internship = db
        .get_internship(internship_id)
        .await?
        .ok_or_else(internship_not_found)?;
    authorize(
        actor,
        Resource::Internship {
            owner: internship.posted_by,
        },
        Action::ViewApplications,
    )?;

    Ok(db.applications_by_internship(internship.id).await?)
}
