use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{DBClient, StoreResult, page_offset};
use crate::config::DeletionPolicy;
use crate::models::{Category, Experience, Internship, InternshipStatus, JobType};

#[derive(Debug, Clone)]
pub struct NewInternship {
    pub title: String,
    pub slug: String,
    pub company: String,
    pub company_id: Uuid,
    pub posted_by: Uuid,
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
    pub max_applications: i32,
}

/// Listing filter. Every populated field narrows the result.
#[derive(Debug, Clone)]
pub struct InternshipFilter {
    pub status: Option<InternshipStatus>,
    pub category: Option<Category>,
    /// Case-insensitive substring of the location.
    pub location: Option<String>,
    /// Matches when the posting offers any of these job types.
    pub job_types: Vec<JobType>,
    pub experience: Option<Experience>,
    pub is_urgent: Option<bool>,
    pub is_featured: Option<bool>,
    /// Full-text query over title, description, company and skills.
    pub search: Option<String>,
}

impl Default for InternshipFilter {
    fn default() -> Self {
        InternshipFilter {
            status: Some(InternshipStatus::Active),
            category: None,
            location: None,
            job_types: Vec::new(),
            experience: None,
            is_urgent: None,
            is_featured: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternshipSort {
    #[default]
    Newest,
    Salary,
    Title,
    Company,
    Deadline,
}

impl InternshipSort {
    fn order_by(&self) -> &'static str {
        match self {
            InternshipSort::Newest => " ORDER BY created_at DESC, id",
            InternshipSort::Salary => " ORDER BY salary DESC, created_at DESC, id",
            InternshipSort::Title => " ORDER BY title ASC, created_at DESC, id",
            InternshipSort::Company => " ORDER BY company ASC, created_at DESC, id",
            InternshipSort::Deadline => " ORDER BY application_deadline ASC, created_at DESC, id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Carries the locators of the logo and of every removed resume.
    Deleted { blobs: Vec<String> },
    Missing,
    /// Refused under `DeletionPolicy::Block`.
    HasApplications,
}

pub trait InternshipExt {
    async fn get_internship(&self, internship_id: Uuid) -> StoreResult<Option<Internship>>;

    /// Detail read: bumps `views` and returns the updated row
    async fn record_internship_view(&self, internship_id: Uuid)
    -> StoreResult<Option<Internship>>;

    /// Whether another internship already uses `slug`
    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> StoreResult<bool>;

    async fn create_internship(&self, new_internship: &NewInternship) -> StoreResult<Internship>;

    /// Write back the editable columns. `views` and `applications_count` are
    /// never written here.
    async fn update_internship(&self, internship: &Internship) -> StoreResult<Internship>;

    async fn delete_internship(
        &self,
        internship_id: Uuid,
        policy: DeletionPolicy,
    ) -> StoreResult<DeleteOutcome>;

    /// One page of matches plus the total number of matches
    async fn list_internships(
        &self,
        filter: &InternshipFilter,
        sort: InternshipSort,
        page: u32,
        limit: u32,
    ) -> StoreResult<(Vec<Internship>, i64)>;

    /// Active postings that are featured, urgent or popular, newest first
    async fn featured_internships(&self, limit: i64) -> StoreResult<Vec<Internship>>;

    async fn recent_internships(&self, limit: i64) -> StoreResult<Vec<Internship>>;

    async fn internships_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Internship>>;

    /// Reset every `applications_count` that drifted from the real count.
    /// Returns the number of rows repaired.
    async fn reconcile_application_counts(&self) -> StoreResult<u64>;
}

/// Views at which a posting counts as popular for the featured rail.
pub(crate) const POPULAR_VIEWS: i64 = 50;

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &InternshipFilter) {
    builder.push(" WHERE TRUE");

    if let Some(status) = filter.status {
        builder.push(" AND status = ").push_bind(status);
    }
    if let Some(category) = filter.category {
        builder.push(" AND category = ").push_bind(category);
    }
    if let Some(location) = filter.location.as_deref().filter(|l| !l.trim().is_empty()) {
        builder
            .push(" AND location ILIKE ")
            .push_bind(format!("%{}%", escape_like(location.trim())));
    }
    if !filter.job_types.is_empty() {
        builder
            .push(" AND job_type && ")
            .push_bind(filter.job_types.clone());
    }
    if let Some(experience) = filter.experience {
        builder.push(" AND experience = ").push_bind(experience);
    }
    if let Some(is_urgent) = filter.is_urgent {
        builder.push(" AND is_urgent = ").push_bind(is_urgent);
    }
    if let Some(is_featured) = filter.is_featured {
        builder.push(" AND is_featured = ").push_bind(is_featured);
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        builder
            .push(
                " AND to_tsvector('english', title || ' ' || description || ' ' || company || ' ' || array_to_string(skills, ' ')) @@ plainto_tsquery('english', ",
            )
            .push_bind(search.trim().to_string())
            .push(")");
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl InternshipExt for DBClient {
    async fn get_internship(&self, internship_id: Uuid) -> StoreResult<Option<Internship>> {
        let internship =
            sqlx::query_as::<_, Internship>("SELECT * FROM internships WHERE id = $1")
                .bind(internship_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(internship)
    }

    async fn record_internship_view(
        &self,
        internship_id: Uuid,
    ) -> StoreResult<Option<Internship>> {
        let internship = sqlx::query_as::<_, Internship>(
            "UPDATE internships SET views = views + 1 WHERE id = $1 RETURNING *",
        )
        .bind(internship_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(internship)
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM internships WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn create_internship(&self, new_internship: &NewInternship) -> StoreResult<Internship> {
        let n = new_internship;
        let internship = sqlx::query_as::<_, Internship>(
            r#"
            INSERT INTO internships (
                title, slug, company, company_id, posted_by, logo, location,
                description, requirements, responsibilities, benefits,
                start_date, end_date, application_deadline,
                salary, category, job_type, experience, skills,
                status, is_urgent, is_featured, max_applications
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11,
                $12, $13, $14,
                $15, $16, $17, $18, $19,
                $20, $21, $22, $23
            )
            RETURNING *
            "#,
        )
        .bind(&n.title)
        .bind(&n.slug)
        .bind(&n.company)
        .bind(n.company_id)
        .bind(n.posted_by)
        .bind(&n.logo)
        .bind(&n.location)
        .bind(&n.description)
        .bind(&n.requirements)
        .bind(&n.responsibilities)
        .bind(&n.benefits)
        .bind(n.start_date)
        .bind(n.end_date)
        .bind(n.application_deadline)
        .bind(&n.salary)
        .bind(n.category)
        .bind(&n.job_type)
        .bind(n.experience)
        .bind(&n.skills)
        .bind(n.status)
        .bind(n.is_urgent)
        .bind(n.is_featured)
        .bind(n.max_applications)
        .fetch_one(&self.pool)
        .await?;

        Ok(internship)
    }

    async fn update_internship(&self, internship: &Internship) -> StoreResult<Internship> {
        let i = internship;
        let updated = sqlx::query_as::<_, Internship>(
            r#"
            UPDATE internships
            SET title = $2, slug = $3, logo = $4, location = $5,
                description = $6, requirements = $7, responsibilities = $8, benefits = $9,
                start_date = $10, end_date = $11, application_deadline = $12,
                salary = $13, category = $14, job_type = $15, experience = $16, skills = $17,
                status = $18, is_urgent = $19, is_featured = $20, max_applications = $21,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(i.id)
        .bind(&i.title)
        .bind(&i.slug)
        .bind(&i.logo)
        .bind(&i.location)
        .bind(&i.description)
        .bind(&i.requirements)
        .bind(&i.responsibilities)
        .bind(&i.benefits)
        .bind(i.start_date)
        .bind(i.end_date)
        .bind(i.application_deadline)
        .bind(&i.salary)
        .bind(i.category)
        .bind(&i.job_type)
        .bind(i.experience)
        .bind(&i.skills)
        .bind(i.status)
        .bind(i.is_urgent)
        .bind(i.is_featured)
        .bind(i.max_applications)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn delete_internship(
        &self,
        internship_id: Uuid,
        policy: DeletionPolicy,
    ) -> StoreResult<DeleteOutcome> {
        let mut tx = self.pool.begin().await?;

        // Locking the posting first stops new submits from racing the delete.
        let Some(logo) = sqlx::query_scalar::<_, String>(
            "SELECT logo FROM internships WHERE id = $1 FOR UPDATE",
        )
        .bind(internship_id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(DeleteOutcome::Missing);
        };

        let mut blobs = match policy {
            DeletionPolicy::Cascade => {
                sqlx::query_scalar::<_, String>(
                    "DELETE FROM applications WHERE internship_id = $1 RETURNING resume",
                )
                .bind(internship_id)
                .fetch_all(&mut *tx)
                .await?
            }
            DeletionPolicy::Block => {
                let has_applications = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS (SELECT 1 FROM applications WHERE internship_id = $1)",
                )
                .bind(internship_id)
                .fetch_one(&mut *tx)
                .await?;
                if has_applications {
                    return Ok(DeleteOutcome::HasApplications);
                }
                Vec::new()
            }
        };

        sqlx::query("DELETE FROM internships WHERE id = $1")
            .bind(internship_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if !logo.is_empty() {
            blobs.push(logo);
        }
        Ok(DeleteOutcome::Deleted { blobs })
    }

    async fn list_internships(
        &self,
        filter: &InternshipFilter,
        sort: InternshipSort,
        page: u32,
        limit: u32,
    ) -> StoreResult<(Vec<Internship>, i64)> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM internships");
        push_filters(&mut count_query, filter);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut page_query = QueryBuilder::<Postgres>::new("SELECT * FROM internships");
        push_filters(&mut page_query, filter);
        page_query.push(sort.order_by());
        page_query
            .push(" LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(page_offset(page, limit));

        let internships = page_query
            .build_query_as::<Internship>()
            .fetch_all(&self.pool)
            .await?;

        Ok((internships, total))
    }

    async fn featured_internships(&self, limit: i64) -> StoreResult<Vec<Internship>> {
        let internships = sqlx::query_as::<_, Internship>(
            r#"
            SELECT * FROM internships
            WHERE status = 'active' AND (is_featured OR is_urgent OR views >= $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(POPULAR_VIEWS)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(internships)
    }

    async fn recent_internships(&self, limit: i64) -> StoreResult<Vec<Internship>> {
        let internships = sqlx::query_as::<_, Internship>(
            r#"
            SELECT * FROM internships
            WHERE status = 'active'
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(internships)
    }

    async fn internships_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Internship>> {
        let internships = sqlx::query_as::<_, Internship>(
            "SELECT * FROM internships WHERE posted_by = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(internships)
    }

    async fn reconcile_application_counts(&self) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Take every row lock before counting, so in-flight submits and
        // withdrawals either commit first or wait for this job.
        sqlx::query("SELECT id FROM internships ORDER BY id FOR UPDATE")
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query(
            r#"
            UPDATE internships i
            SET applications_count = actual.count
            FROM (
                SELECT i2.id, COUNT(a.id)::int AS count
                FROM internships i2
                LEFT JOIN applications a ON a.internship_id = i2.id
                GROUP BY i2.id
            ) AS actual
            WHERE i.id = actual.id AND i.applications_count <> actual.count
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_only_shows_active_postings() {
        let filter = InternshipFilter::default();
        assert_eq!(filter.status, Some(InternshipStatus::Active));
        assert!(filter.job_types.is_empty());
    }

    #[test]
    fn filters_render_into_sql() {
        let filter = InternshipFilter {
            category: Some(Category::Design),
            location: Some("Paris".into()),
            job_types: vec![JobType::Remote],
            search: Some("rust".into()),
            ..InternshipFilter::default()
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT * FROM internships");
        push_filters(&mut builder, &filter);
        let sql = builder.sql().to_string();

        assert!(sql.contains("status = $1"));
        assert!(sql.contains("category = $2"));
        assert!(sql.contains("location ILIKE $3"));
        assert!(sql.contains("job_type && $4"));
        assert!(sql.contains("plainto_tsquery('english', $5)"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }

    #[test]
    fn sort_keys_parse_from_query_strings() {
        let sort: InternshipSort = serde_json::from_str("\"deadline\"").unwrap();
        assert_eq!(sort, InternshipSort::Deadline);
        assert_eq!(InternshipSort::default(), InternshipSort::Newest);
    }

    #[test]
    fn every_sort_ends_on_a_unique_key() {
        for sort in [
            InternshipSort::Newest,
            InternshipSort::Salary,
            InternshipSort::Title,
            InternshipSort::Company,
            InternshipSort::Deadline,
        ] {
            assert!(sort.order_by().ends_with(", id"), "{:?}", sort);
        }
        assert!(InternshipSort::Title.order_by().contains("created_at DESC"));
        assert!(InternshipSort::Deadline.order_by().contains("created_at DESC"));
    }
}
