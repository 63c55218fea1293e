use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ServiceError;
use super::identity::discard_blob;
use crate::access::{Action, Actor, Resource, authorize, require_role};
use crate::config::DeletionPolicy;
use crate::db::{DeleteOutcome, InternshipExt, InternshipFilter, NewInternship, StoreError};
use crate::dtos::{CreateInternshipDto, InternshipQueryDto, UpdateInternshipDto};
use crate::error::ErrorMessage;
use crate::models::{Internship, InternshipStatus, JobType, User, UserRole};
use crate::upload::{BlobStore, FileUpload};
use crate::utils::slug;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const FEATURED_LIMIT: i64 = 5;
pub const RECENT_LIMIT: i64 = 3;
const DEFAULT_MAX_APPLICATIONS: i32 = 50;
const MAX_SLUG_ATTEMPTS: u32 = 50;

/// One page of a listing query.
#[derive(Debug)]
pub struct ListingPage {
    pub internships: Vec<Internship>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

fn not_found() -> ServiceError {
    ServiceError::NotFound(ErrorMessage::InternshipNotFound)
}

/// `end > start` and `deadline < start`.
pub fn validate_schedule(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    deadline: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if end <= start {
        return Err(ServiceError::InvalidDateRange(
            "End date must be after start date",
        ));
    }
    if deadline >= start {
        return Err(ServiceError::InvalidDateRange(
            "Application deadline must be before start date",
        ));
    }
    Ok(())
}

async fn unique_slug<D: InternshipExt>(
    db: &D,
    title: &str,
    except: Option<Uuid>,
) -> Result<String, ServiceError> {
    let base = slug::slugify(title);
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = slug::candidate(&base, attempt);
        if !db.slug_taken(&candidate, except).await? {
            return Ok(candidate);
        }
    }
    Ok(format!("{}-{}", base, &Uuid::new_v4().simple().to_string()[..8]))
}

fn slug_conflict(err: StoreError) -> ServiceError {
    match err {
        StoreError::Conflict(_) => {
            ServiceError::Conflict("Another internship was just saved with this title".to_string())
        }
        other => other.into(),
    }
}

pub async fn create_internship<D: InternshipExt>(
    db: &D,
    poster: &User,
    body: CreateInternshipDto,
) -> Result<Internship, ServiceError> {
    authorize(&Actor::from(poster), Resource::Listings, Action::Create)?;
    validate_schedule(body.start_date, body.end_date, body.application_deadline)?;

    let slug = unique_slug(db, &body.title, None).await?;
    let new_internship = NewInternship {
        title: body.title.trim().to_string(),
        slug,
        company: poster.display_company(),
        company_id: poster.id,
        posted_by: poster.id,
        logo: String::new(),
        location: body.location.trim().to_string(),
        description: body.description,
        requirements: body.requirements,
        responsibilities: body.responsibilities,
        benefits: body.benefits,
        start_date: body.start_date,
        end_date: body.end_date,
        application_deadline: body.application_deadline,
        salary: body
            .salary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Not specified".to_string()),
        category: body.category,
        job_type: body.job_type,
        experience: body.experience,
        skills: body.skills,
        status: body.status.unwrap_or(InternshipStatus::Active),
        is_urgent: body.is_urgent,
        is_featured: body.is_featured,
        max_applications: body.max_applications.unwrap_or(DEFAULT_MAX_APPLICATIONS),
    };

    let internship = db
        .create_internship(&new_internship)
        .await
        .map_err(slug_conflict)?;
    tracing::info!(internship_id = %internship.id, posted_by = %poster.id, "Internship created");
    Ok(internship)
}

pub async fn update_internship<D: InternshipExt>(
    db: &D,
    actor: &Actor,
    internship_id: Uuid,
    body: UpdateInternshipDto,
) -> Result<Internship, ServiceError> {
    let mut internship = db
        .get_internship(internship_id)
        .await?
        .ok_or_else(not_found)?;
    authorize(
        actor,
        Resource::Internship {
            owner: internship.posted_by,
        },
        Action::Update,
    )?;

    if let Some(title) = body.title {
        let title = title.trim().to_string();
        if title != internship.title {
            internship.slug = unique_slug(db, &title, Some(internship.id)).await?;
            internship.title = title;
        }
    }
    if let Some(v) = body.location {
        internship.location = v;
    }
    if let Some(v) = body.description {
        internship.description = v;
    }
    if let Some(v) = body.requirements {
        internship.requirements = v;
    }
    if let Some(v) = body.responsibilities {
        internship.responsibilities = v;
    }
    if let Some(v) = body.benefits {
        internship.benefits = v;
    }
    if let Some(v) = body.start_date {
        internship.start_date = v;
    }
    if let Some(v) = body.end_date {
        internship.end_date = v;
    }
    if let Some(v) = body.application_deadline {
        internship.application_deadline = v;
    }
    if let Some(v) = body.salary {
        internship.salary = v;
    }
    if let Some(v) = body.category {
        internship.category = v;
    }
    if let Some(v) = body.job_type {
        internship.job_type = v;
    }
    if let Some(v) = body.experience {
        internship.experience = v;
    }
    if let Some(v) = body.skills {
        internship.skills = v;
    }
    if let Some(v) = body.status {
        internship.status = v;
    }
    if let Some(v) = body.is_urgent {
        internship.is_urgent = v;
    }
    if let Some(v) = body.is_featured {
        internship.is_featured = v;
    }
    if let Some(v) = body.max_applications {
        internship.max_applications = v;
    }

    // Checked on the merged record so a partial patch cannot break the ordering.
    validate_schedule(
        internship.start_date,
        internship.end_date,
        internship.application_deadline,
    )?;

    db.update_internship(&internship)
        .await
        .map_err(slug_conflict)
}

/// Removes the posting, then the logo and any resumes it took with it.
pub async fn delete_internship<D: InternshipExt, B: BlobStore>(
    db: &D,
    blobs: &B,
    actor: &Actor,
    internship_id: Uuid,
    policy: DeletionPolicy,
) -> Result<(), ServiceError> {
    let internship = db
        .get_internship(internship_id)
        .await?
        .ok_or_else(not_found)?;
    authorize(
        actor,
        Resource::Internship {
            owner: internship.posted_by,
        },
        Action::Delete,
    )?;

    match db.delete_internship(internship_id, policy).await? {
        DeleteOutcome::Deleted { blobs: locators } => {
            for locator in &locators {
                discard_blob(blobs, locator).await;
            }
            tracing::info!(
                internship_id = %internship_id,
                ?policy,
                files = locators.len(),
                "Internship deleted"
            );
            Ok(())
        }
        DeleteOutcome::Missing => Err(not_found()),
        DeleteOutcome::HasApplications => Err(ServiceError::Conflict(
            "Internship has applications and cannot be deleted".to_string(),
        )),
    }
}

pub async fn set_logo<D: InternshipExt, B: BlobStore>(
    db: &D,
    blobs: &B,
    actor: &Actor,
    internship_id: Uuid,
    upload: FileUpload,
) -> Result<Internship, ServiceError> {
    let mut internship = db
        .get_internship(internship_id)
        .await?
        .ok_or_else(not_found)?;
    authorize(
        actor,
        Resource::Internship {
            owner: internship.posted_by,
        },
        Action::Update,
    )?;

    let locator = blobs.put(&upload).await.map_err(ServiceError::server)?;
    let previous = std::mem::replace(&mut internship.logo, locator.clone());

    match db.update_internship(&internship).await {
        Ok(updated) => {
            discard_blob(blobs, &previous).await;
            Ok(updated)
        }
        Err(e) => {
            discard_blob(blobs, &locator).await;
            Err(e.into())
        }
    }
}

/// Detail read; counts as a view.
pub async fn view_internship<D: InternshipExt>(
    db: &D,
    internship_id: Uuid,
) -> Result<Internship, ServiceError> {
    db.record_internship_view(internship_id)
        .await?
        .ok_or_else(not_found)
}

pub fn filter_from_query(query: &InternshipQueryDto) -> Result<InternshipFilter, ServiceError> {
    let job_types = match query.job_type.as_deref() {
        Some(raw) => raw
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(|part| {
                JobType::parse(part).ok_or_else(|| {
                    ServiceError::InvalidInput(format!("Unknown job type: {}", part.trim()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(InternshipFilter {
        category: query.category,
        location: query.location.clone(),
        job_types,
        experience: query.experience,
        is_urgent: query.is_urgent,
        is_featured: query.is_featured,
        search: query.search.clone(),
        ..InternshipFilter::default()
    })
}

pub async fn list_internships<D: InternshipExt>(
    db: &D,
    query: &InternshipQueryDto,
) -> Result<ListingPage, ServiceError> {
    let filter = filter_from_query(query)?;
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
    let sort = query.sort.unwrap_or_default();

    let (internships, total) = db.list_internships(&filter, sort, page, limit).await?;

    Ok(ListingPage {
        internships,
        total,
        page,
        limit,
    })
}

pub async fn featured_internships<D: InternshipExt>(db: &D) -> Result<Vec<Internship>, ServiceError> {
    Ok(db.featured_internships(FEATURED_LIMIT).await?)
}

pub async fn recent_internships<D: InternshipExt>(db: &D) -> Result<Vec<Internship>, ServiceError> {
    Ok(db.recent_internships(RECENT_LIMIT).await?)
}

/// Every posting of the calling company, drafts and closed ones included.
pub async fn my_internships<D: InternshipExt>(
    db: &D,
    actor: &Actor,
) -> Result<Vec<Internship>, ServiceError> {
    require_role(actor, &[UserRole::Company, UserRole::Admin])?;
    Ok(db.internships_by_owner(actor.id).await?)
}
