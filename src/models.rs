use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User role enumeration for role-based access control (RBAC)
///
/// Stored in PostgreSQL as the `user_role` ENUM type. Students apply to
/// internships, companies post them, admins may act on anything.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Company,
    Admin,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Student => "student",
            UserRole::Company => "company",
            UserRole::Admin => "admin",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "study_level")]
pub enum StudyLevel {
    Bachelor,
    Master,
    PhD,
    Associate,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "company_size")]
pub enum CompanySize {
    #[sqlx(rename = "1-10")]
    #[serde(rename = "1-10")]
    Micro,
    #[sqlx(rename = "11-50")]
    #[serde(rename = "11-50")]
    Small,
    #[sqlx(rename = "51-200")]
    #[serde(rename = "51-200")]
    Medium,
    #[sqlx(rename = "200+")]
    #[serde(rename = "200+")]
    Large,
}

/// User model representing the users table
///
/// Profile fields are shared by every role; the student block and the company
/// block are only meaningful for their respective roles and stay at their
/// defaults otherwise.
///
/// Security notes:
/// - `password` holds the Argon2 PHC string, never plain text
/// - `password_reset_token` holds the SHA-256 digest of the raw reset token
/// - neither is ever serialized
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: UserRole,

    pub avatar: String,
    pub location: String,
    pub phone: String,

    pub is_verified: bool,
    pub is_active: bool,

    pub university: String,
    pub study_level: Option<StudyLevel>,
    pub study_field: String,
    pub graduation_year: Option<i32>,

    pub company_name: String,
    pub company_size: Option<CompanySize>,
    pub industry: String,
    pub website: String,
    pub description: String,

    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub login_attempts: i32,
    #[serde(skip_serializing)]
    pub lock_until: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.is_some_and(|until| until > now)
    }

    /// Name shown on postings: the company name when set, the account name otherwise.
    pub fn display_company(&self) -> String {
        if self.company_name.trim().is_empty() {
            self.name.clone()
        } else {
            self.company_name.clone()
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "internship_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InternshipStatus {
    Active,
    Closed,
    Draft,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "internship_category")]
pub enum Category {
    Development,
    Marketing,
    Design,
    HR,
    Finance,
    Sales,
    Communication,
    Legal,
    Other,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_type")]
pub enum JobType {
    #[sqlx(rename = "Full-time")]
    #[serde(rename = "Full-time")]
    FullTime,
    #[sqlx(rename = "Part-time")]
    #[serde(rename = "Part-time")]
    PartTime,
    Remote,
    #[sqlx(rename = "On-site")]
    #[serde(rename = "On-site")]
    OnSite,
    Hybrid,
}

impl JobType {
    pub fn parse(value: &str) -> Option<JobType> {
        match value.trim() {
            "Full-time" => Some(JobType::FullTime),
            "Part-time" => Some(JobType::PartTime),
            "Remote" => Some(JobType::Remote),
            "On-site" => Some(JobType::OnSite),
            "Hybrid" => Some(JobType::Hybrid),
            _ => None,
        }
    }
}

/// Experience tiers, ordered from least to most experienced.
#[derive(
    Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, Default,
)]
#[sqlx(type_name = "experience_level")]
pub enum Experience {
    #[default]
    Beginner,
    #[sqlx(rename = "1 year")]
    #[serde(rename = "1 year")]
    OneYear,
    #[sqlx(rename = "2 years")]
    #[serde(rename = "2 years")]
    TwoYears,
    #[sqlx(rename = "3+ years")]
    #[serde(rename = "3+ years")]
    ThreePlusYears,
}

/// Internship posting
///
/// `company_id` and `posted_by` always name the same company account; both are
/// stamped from the authenticated caller at creation time.
///
/// `applications_count` mirrors the number of applications referencing this
/// row. It is only ever changed in the same transaction that creates or
/// deletes an application (see `db::application`), and a nightly job repairs
/// any drift (see `db::scheduler`).
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Internship {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub company: String,
    pub company_id: Uuid,
    pub logo: String,
    pub location: String,

    pub description: String,
    pub requirements: String,
    pub responsibilities: String,
    pub benefits: String,

    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub application_deadline: DateTime<Utc>,

    pub salary: String,
    pub category: Category,
    pub job_type: Vec<JobType>,
    pub experience: Experience,
    pub skills: Vec<String>,

    pub status: InternshipStatus,
    pub is_urgent: bool,
    pub is_featured: bool,

    pub views: i64,
    pub applications_count: i32,
    pub max_applications: i32,

    pub posted_by: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Internship {
    pub fn has_capacity(&self) -> bool {
        self.applications_count < self.max_applications
    }
}

/// Application lifecycle status
///
/// `pending` is the initial state, `accepted` and `rejected` are terminal.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Interview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Interview,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Accepted | ApplicationStatus::Rejected)
    }

    /// Edges of the review state machine. Re-entering the current state is
    /// allowed so reviewers can amend notes, dates and ratings.
    pub fn can_move_to(&self, target: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        if *self == target {
            return true;
        }
        if self.is_terminal() {
            return false;
        }
        match self {
            Pending => matches!(target, Interview | Accepted | Rejected),
            _ => matches!(target, Accepted | Rejected),
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// A student's application to one internship
///
/// `(internship_id, student_id)` is unique at the storage layer.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub internship_id: Uuid,
    pub student_id: Uuid,

    pub resume: String,
    pub cover_letter: String,
    pub portfolio: String,

    pub status: ApplicationStatus,
    pub rejection_reason: String,
    pub interview_date: Option<DateTime<Utc>>,
    pub interview_notes: String,
    pub rating: Option<i16>,

    // Delivery is not wired up; the flags are kept for clients that read them.
    pub student_notified: bool,
    pub company_notified: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn review_edges_follow_the_state_machine() {
        assert!(Pending.can_move_to(Interview));
        assert!(Pending.can_move_to(Accepted));
        assert!(Pending.can_move_to(Rejected));
        assert!(Interview.can_move_to(Accepted));
        assert!(Interview.can_move_to(Rejected));

        assert!(!Interview.can_move_to(Pending));
        for terminal in [Accepted, Rejected] {
            for target in ApplicationStatus::ALL {
                assert_eq!(terminal.can_move_to(target), terminal == target);
            }
        }
    }

    #[test]
    fn enum_labels_match_the_wire_format() {
        assert_eq!(serde_json::to_string(&JobType::FullTime).unwrap(), "\"Full-time\"");
        assert_eq!(
            serde_json::to_string(&Experience::ThreePlusYears).unwrap(),
            "\"3+ years\""
        );
        assert_eq!(serde_json::to_string(&UserRole::Company).unwrap(), "\"company\"");
        assert_eq!(JobType::parse(" On-site "), Some(JobType::OnSite));
        assert_eq!(JobType::parse("Freelance"), None);
    }

    #[test]
    fn experience_tiers_are_ordered() {
        assert!(Experience::Beginner < Experience::OneYear);
        assert!(Experience::TwoYears < Experience::ThreePlusYears);
    }
}
