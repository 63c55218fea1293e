use super::{DBClient, StoreResult, page_offset};
use crate::models::{CompanySize, StudyLevel, User, UserRole};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Fields written when an account is created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Self-service profile changes. `None` leaves the stored value untouched.
#[derive(Debug, Default, Clone)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,

    pub university: Option<String>,
    pub study_level: Option<StudyLevel>,
    pub study_field: Option<String>,
    pub graduation_year: Option<i32>,

    pub company_name: Option<String>,
    pub company_size: Option<CompanySize>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
}

/// Account changes only an admin may make.
#[derive(Debug, Default, Clone)]
pub struct AdminUserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID or email. Returns None if not found
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>>;

    /// Newest-first page of users, optionally restricted to one role
    async fn get_users(
        &self,
        role: Option<UserRole>,
        page: u32,
        limit: u32,
    ) -> StoreResult<Vec<User>>;

    async fn get_user_count(&self, role: Option<UserRole>) -> StoreResult<i64>;

    /// Insert a new account. Duplicate email surfaces as `StoreError::Conflict`
    async fn save_user(&self, new_user: &NewUser) -> StoreResult<User>;

    async fn update_user_profile(&self, user_id: Uuid, patch: &ProfilePatch)
    -> StoreResult<User>;

    async fn update_user_admin(&self, user_id: Uuid, patch: &AdminUserPatch)
    -> StoreResult<User>;

    async fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<User>;

    /// Stamp a successful login and clear the failure counter and lock
    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()>;

    /// Count a failed password check. When `lock_until` is set the account is
    /// locked and the counter starts over
    async fn record_failed_login(
        &self,
        user_id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Store (or clear, with `None`) the reset-token digest and its expiry
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()>;

    /// Swap in the new password if an unexpired token with this digest exists,
    /// clearing the token in the same statement. `None` means no such token
    async fn consume_reset_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> StoreResult<Option<User>>;

    /// Drop every expired reset token, returning how many were cleared
    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64>;

    /// Removes the account with its postings and applications, returning
    /// the locators of every stored file those rows referenced.
    async fn delete_user(&self, user_id: Uuid) -> StoreResult<Vec<String>>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
                .bind(email.to_lowercase())
                .fetch_optional(&self.pool)
                .await?;
        }

        Ok(user)
    }

    async fn get_users(
        &self,
        role: Option<UserRole>,
        page: u32,
        limit: u32,
    ) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(role)
        .bind(limit as i64)
        .bind(page_offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn get_user_count(&self, role: Option<UserRole>) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE ($1::user_role IS NULL OR role = $1)",
        )
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn save_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&new_user.name)
        .bind(new_user.email.to_lowercase())
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                location = COALESCE($4, location),
                phone = COALESCE($5, phone),
                avatar = COALESCE($6, avatar),
                university = COALESCE($7, university),
                study_level = COALESCE($8, study_level),
                study_field = COALESCE($9, study_field),
                graduation_year = COALESCE($10, graduation_year),
                company_name = COALESCE($11, company_name),
                company_size = COALESCE($12, company_size),
                industry = COALESCE($13, industry),
                website = COALESCE($14, website),
                description = COALESCE($15, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&patch.name)
        .bind(patch.email.as_ref().map(|email| email.to_lowercase()))
        .bind(&patch.location)
        .bind(&patch.phone)
        .bind(&patch.avatar)
        .bind(&patch.university)
        .bind(patch.study_level)
        .bind(&patch.study_field)
        .bind(patch.graduation_year)
        .bind(&patch.company_name)
        .bind(patch.company_size)
        .bind(&patch.industry)
        .bind(&patch.website)
        .bind(&patch.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user_admin(
        &self,
        user_id: Uuid,
        patch: &AdminUserPatch,
    ) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                is_active = COALESCE($5, is_active),
                is_verified = COALESCE($6, is_verified),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&patch.name)
        .bind(patch.email.as_ref().map(|email| email.to_lowercase()))
        .bind(patch.role)
        .bind(patch.is_active)
        .bind(patch.is_verified)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_login = $2, login_attempts = 0, lock_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_failed_login(
        &self,
        user_id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET login_attempts = CASE WHEN $2::timestamptz IS NULL THEN login_attempts + 1 ELSE 0 END,
                lock_until = COALESCE($2, lock_until)
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(lock_until)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = $2, password_reset_expires = $3
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(digest)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        // One statement: two concurrent resets with the same token cannot both match.
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password = $3,
                password_reset_token = NULL,
                password_reset_expires = NULL,
                login_attempts = 0,
                lock_until = NULL,
                updated_at = NOW()
            WHERE password_reset_token = $1 AND password_reset_expires > $2
            RETURNING *
            "#,
        )
        .bind(digest)
        .bind(now)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_reset_token = NULL, password_reset_expires = NULL
            WHERE password_reset_expires IS NOT NULL AND password_reset_expires <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let mut tx = self.pool.begin().await?;

        // Holding the account row keeps new applications from slipping in
        // between the counter update and the cascade.
        let avatar = sqlx::query_scalar::<_, String>(
            "SELECT avatar FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

        // The cascade drops this student's applications; free their slots.
        sqlx::query(
            r#"
            UPDATE internships i
            SET applications_count = GREATEST(i.applications_count - held.n, 0)
            FROM (
                SELECT internship_id, COUNT(*)::int AS n
                FROM applications
                WHERE student_id = $1
                GROUP BY internship_id
            ) AS held
            WHERE i.id = held.internship_id
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let mut locators = sqlx::query_scalar::<_, String>(
            r#"
            SELECT a.resume
            FROM applications a
            JOIN internships i ON i.id = a.internship_id
            WHERE a.student_id = $1 OR i.posted_by = $1
            UNION ALL
            SELECT logo FROM internships WHERE posted_by = $1 AND logo <> ''
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        if !avatar.is_empty() {
            locators.push(avatar);
        }
        Ok(locators)
    }
}
