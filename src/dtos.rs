use crate::db::InternshipSort;
use crate::models::{
    ApplicationStatus, Category, CompanySize, Experience, InternshipStatus, JobType, StudyLevel,
    User, UserRole,
};
use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use validator::Validate;

// Request bodies are camelCase JSON. Patch bodies reject unknown fields so a
// typo never silently does nothing.

// ============================================================================
// Authentication DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Please add a valid email")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,

    /// Defaults to `student`. `admin` is refused.
    pub role: Option<UserRole>,
}

#[derive(Validate, Debug, Default, Clone, Deserialize)]
pub struct LoginUserDto {
    #[validate(
        length(min = 1, message = "Please provide an email and password"),
        email(message = "Please add a valid email")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Please provide an email and password"))]
    pub password: String,
}

#[derive(Validate, Debug, Clone, Deserialize)]
pub struct ForgotPasswordDto {
    #[validate(email(message = "Please add a valid email"))]
    pub email: String,
}

#[derive(Validate, Debug, Clone, Deserialize)]
pub struct ResetPasswordDto {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Validate, Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordDto {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// Profile edit. The shared block is open to everyone; the student and
/// company blocks only to those roles.
#[derive(Validate, Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateDetailsDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email(message = "Please add a valid email"))]
    pub email: Option<String>,
    #[validate(length(max = 100))]
    pub location: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,

    #[validate(length(max = 200))]
    pub university: Option<String>,
    pub study_level: Option<StudyLevel>,
    #[validate(length(max = 200))]
    pub study_field: Option<String>,
    #[validate(range(min = 2020, max = 2030))]
    pub graduation_year: Option<i32>,

    #[validate(length(max = 200))]
    pub company_name: Option<String>,
    pub company_size: Option<CompanySize>,
    #[validate(length(max = 100))]
    pub industry: Option<String>,
    #[validate(url(message = "Please add a valid URL"))]
    pub website: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

impl UpdateDetailsDto {
    pub fn has_student_fields(&self) -> bool {
        self.university.is_some()
            || self.study_level.is_some()
            || self.study_field.is_some()
            || self.graduation_year.is_some()
    }

    pub fn has_company_fields(&self) -> bool {
        self.company_name.is_some()
            || self.company_size.is_some()
            || self.industry.is_some()
            || self.website.is_some()
            || self.description.is_some()
    }
}

// ============================================================================
// Admin DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AdminUpdateUserDto {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email(message = "Please add a valid email"))]
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

#[derive(Validate, Debug, Default, Clone, Deserialize)]
pub struct UsersQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,

    pub role: Option<UserRole>,
}

// ============================================================================
// Internship DTOs
// ============================================================================

#[derive(Validate, Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateInternshipDto {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub requirements: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub responsibilities: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub benefits: String,

    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub application_deadline: DateTime<Utc>,

    #[validate(length(max = 100))]
    pub salary: Option<String>,
    pub category: Category,
    #[serde(default)]
    pub job_type: Vec<JobType>,
    #[serde(default)]
    pub experience: Experience,
    #[serde(default)]
    pub skills: Vec<String>,

    pub status: Option<InternshipStatus>,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[validate(range(min = 1, message = "Maximum applications must be at least 1"))]
    pub max_applications: Option<i32>,

    // Ownership always comes from the session; clients may still send these.
    #[serde(default)]
    pub posted_by: Option<IgnoredAny>,
    #[serde(default)]
    pub company_id: Option<IgnoredAny>,
    #[serde(default)]
    pub company: Option<IgnoredAny>,
}

#[derive(Validate, Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateInternshipDto {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub location: Option<String>,
    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: Option<String>,
    #[validate(length(max = 1000))]
    pub requirements: Option<String>,
    #[validate(length(max = 1000))]
    pub responsibilities: Option<String>,
    #[validate(length(max = 1000))]
    pub benefits: Option<String>,

    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub application_deadline: Option<DateTime<Utc>>,

    #[validate(length(max = 100))]
    pub salary: Option<String>,
    pub category: Option<Category>,
    pub job_type: Option<Vec<JobType>>,
    pub experience: Option<Experience>,
    pub skills: Option<Vec<String>>,

    pub status: Option<InternshipStatus>,
    pub is_urgent: Option<bool>,
    pub is_featured: Option<bool>,
    #[validate(range(min = 1, message = "Maximum applications must be at least 1"))]
    pub max_applications: Option<i32>,
}

/// Listing query string. `jobType` is a comma-separated list.
#[derive(Validate, Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternshipQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u32>,

    pub category: Option<Category>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub experience: Option<Experience>,
    pub is_urgent: Option<bool>,
    pub is_featured: Option<bool>,
    #[validate(length(max = 200))]
    pub search: Option<String>,
    pub sort: Option<InternshipSort>,
}

// ============================================================================
// Application DTOs
// ============================================================================

/// Text fields of the multipart submit form; the resume arrives separately.
#[derive(Validate, Debug, Default, Clone)]
pub struct ApplicationFormDto {
    pub internship_id: Option<String>,

    #[validate(length(
        min = 1,
        max = 2000,
        message = "Cover letter is required and cannot exceed 2000 characters"
    ))]
    pub cover_letter: String,

    #[validate(url(message = "Portfolio must be a valid URL"))]
    pub portfolio: Option<String>,
}

#[derive(Validate, Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecideApplicationDto {
    pub status: ApplicationStatus,

    #[validate(length(max = 500))]
    pub rejection_reason: Option<String>,

    pub interview_date: Option<DateTime<Utc>>,

    #[validate(length(max = 1000))]
    pub interview_notes: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,
}

// ============================================================================
// Response DTOs
// ============================================================================

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationDto>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            count: None,
            pagination: None,
            data,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_pagination(mut self, pagination: PaginationDto) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PaginationDto {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub pages: i64,
}

impl PaginationDto {
    pub fn new(page: u32, limit: u32, total: i64) -> Self {
        let limit = limit.max(1);
        PaginationDto {
            page,
            limit,
            total,
            pages: (total + limit as i64 - 1) / limit as i64,
        }
    }
}

/// Public summary of the signed-in account
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterUserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub avatar: String,
    pub location: String,
    pub company_name: String,
    pub university: String,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            role: user.role.to_str().to_string(),
            avatar: user.avatar.to_owned(),
            location: user.location.to_owned(),
            company_name: user.company_name.to_owned(),
            university: user.university.to_owned(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponseDto {
    pub success: bool,
    pub token: String,
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponseDto {
    pub success: bool,
    pub data: String,
    /// Only present when no mail transport is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

impl MessageResponseDto {
    pub fn new(data: impl Into<String>) -> Self {
        MessageResponseDto {
            success: true,
            data: data.into(),
            reset_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_pages_up() {
        assert_eq!(PaginationDto::new(1, 10, 0).pages, 0);
        assert_eq!(PaginationDto::new(1, 10, 10).pages, 1);
        assert_eq!(PaginationDto::new(2, 10, 11).pages, 2);
    }

    #[test]
    fn create_body_ignores_client_ownership() {
        let body = serde_json::json!({
            "title": "Data Intern",
            "location": "Berlin",
            "description": "Pipelines",
            "startDate": "2030-03-01T00:00:00Z",
            "endDate": "2030-06-01T00:00:00Z",
            "applicationDeadline": "2030-02-01T00:00:00Z",
            "category": "Development",
            "jobType": ["Remote", "Part-time"],
            "postedBy": "someone-else",
            "companyId": 42
        });
        let dto: CreateInternshipDto = serde_json::from_value(body).unwrap();
        assert_eq!(dto.job_type, vec![JobType::Remote, JobType::PartTime]);
        assert_eq!(dto.experience, Experience::Beginner);
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn patch_bodies_reject_unknown_fields() {
        let body = serde_json::json!({ "views": 1000 });
        assert!(serde_json::from_value::<UpdateInternshipDto>(body).is_err());

        let body = serde_json::json!({ "role": "admin" });
        assert!(serde_json::from_value::<UpdateDetailsDto>(body).is_err());
    }

    #[test]
    fn decision_rating_is_bounded() {
        let dto: DecideApplicationDto =
            serde_json::from_value(serde_json::json!({ "status": "accepted", "rating": 6 }))
                .unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn envelope_omits_absent_metadata() {
        let json = serde_json::to_value(ApiResponse::ok(vec![1, 2]).with_count(2)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 2);
        assert!(json.get("pagination").is_none());
    }
}
