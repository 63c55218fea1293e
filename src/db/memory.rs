//! In-process store used by the service tests. Behaves like the Postgres
//! implementation for every rule the services rely on: unique keys, the
//! atomic capacity reservation, and the count bookkeeping on withdraw.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{
    AdminUserPatch, ApplicantSummary, ApplicationExt, DecisionUpdate, DeleteOutcome,
    InternshipExt, InternshipFilter, InternshipSort, InternshipSummary, NewApplication,
    NewInternship, NewUser, ProfilePatch, ReceivedApplication, StatsScope, StoreError,
    StoreResult, StudentApplication, SubmitOutcome, UserExt, internship::POPULAR_VIEWS,
};
use crate::config::DeletionPolicy;
use crate::models::{
    Application, ApplicationStatus, Category, Experience, Internship, InternshipStatus, User,
    UserRole,
};
use crate::upload::{BlobStore, FileUpload};

#[derive(Default)]
struct State {
    users: Vec<User>,
    internships: Vec<Internship>,
    applications: Vec<Application>,
    ticks: i64,
}

impl State {
    /// Strictly increasing timestamps so newest-first ordering is stable.
    fn stamp(&mut self) -> DateTime<Utc> {
        self.ticks += 1;
        Utc::now() + Duration::milliseconds(self.ticks)
    }
}

#[derive(Default)]
pub struct MemoryDb {
    state: Mutex<State>,
}

impl MemoryDb {
    pub fn new() -> Self {
        MemoryDb::default()
    }

    /// Insert an account directly, bypassing registration rules.
    pub fn seed_user(&self, name: &str, email: &str, role: UserRole) -> User {
        let mut state = self.state.lock().unwrap();
        let now = state.stamp();
        let user = blank_user(name, email, "", role, now);
        state.users.push(user.clone());
        user
    }

    /// Insert an active internship owned by `owner`, open for thirty days.
    pub fn seed_internship(
        &self,
        owner: &User,
        customize: impl FnOnce(&mut NewInternship),
    ) -> Internship {
        let now = Utc::now();
        let mut draft = NewInternship {
            title: "Backend Intern".to_string(),
            slug: format!("backend-intern-{}", Uuid::new_v4().simple()),
            company: owner.display_company(),
            company_id: owner.id,
            posted_by: owner.id,
            logo: String::new(),
            location: "Lyon".to_string(),
            description: "Build services".to_string(),
            requirements: String::new(),
            responsibilities: String::new(),
            benefits: String::new(),
            start_date: now + Duration::days(60),
            end_date: now + Duration::days(150),
            application_deadline: now + Duration::days(30),
            salary: "Not specified".to_string(),
            category: Category::Development,
            job_type: Vec::new(),
            experience: Experience::Beginner,
            skills: Vec::new(),
            status: InternshipStatus::Active,
            is_urgent: false,
            is_featured: false,
            max_applications: 50,
        };
        customize(&mut draft);

        let mut state = self.state.lock().unwrap();
        let stamp = state.stamp();
        let internship = from_draft(&draft, stamp);
        state.internships.push(internship.clone());
        internship
    }

    pub fn internship(&self, id: Uuid) -> Option<Internship> {
        let state = self.state.lock().unwrap();
        state.internships.iter().find(|i| i.id == id).cloned()
    }

    pub fn application_rows_for(&self, internship_id: Uuid) -> usize {
        let state = self.state.lock().unwrap();
        state
            .applications
            .iter()
            .filter(|a| a.internship_id == internship_id)
            .count()
    }

    pub fn user(&self, id: Uuid) -> Option<User> {
        let state = self.state.lock().unwrap();
        state.users.iter().find(|u| u.id == id).cloned()
    }

    /// Overwrite a stored counter to simulate drift.
    pub fn corrupt_count(&self, internship_id: Uuid, count: i32) {
        let mut state = self.state.lock().unwrap();
        if let Some(internship) = state.internships.iter_mut().find(|i| i.id == internship_id) {
            internship.applications_count = count;
        }
    }
}

fn blank_user(name: &str, email: &str, password: &str, role: UserRole, now: DateTime<Utc>) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email: email.to_lowercase(),
        password: password.to_string(),
        role,
        avatar: "default-avatar.png".to_string(),
        location: String::new(),
        phone: String::new(),
        is_verified: false,
        is_active: true,
        university: String::new(),
        study_level: None,
        study_field: String::new(),
        graduation_year: None,
        company_name: String::new(),
        company_size: None,
        industry: String::new(),
        website: String::new(),
        description: String::new(),
        password_reset_token: None,
        password_reset_expires: None,
        last_login: None,
        login_attempts: 0,
        lock_until: None,
        created_at: now,
        updated_at: now,
    }
}

fn from_draft(n: &NewInternship, now: DateTime<Utc>) -> Internship {
    Internship {
        id: Uuid::new_v4(),
        title: n.title.clone(),
        slug: n.slug.clone(),
        company: n.company.clone(),
        company_id: n.company_id,
        logo: n.logo.clone(),
        location: n.location.clone(),
        description: n.description.clone(),
        requirements: n.requirements.clone(),
        responsibilities: n.responsibilities.clone(),
        benefits: n.benefits.clone(),
        start_date: n.start_date,
        end_date: n.end_date,
        application_deadline: n.application_deadline,
        salary: n.salary.clone(),
        category: n.category,
        job_type: n.job_type.clone(),
        experience: n.experience,
        skills: n.skills.clone(),
        status: n.status,
        is_urgent: n.is_urgent,
        is_featured: n.is_featured,
        views: 0,
        applications_count: 0,
        max_applications: n.max_applications,
        posted_by: n.posted_by,
        created_at: now,
        updated_at: now,
    }
}

fn email_taken(state: &State, email: &str, except: Option<Uuid>) -> bool {
    state
        .users
        .iter()
        .any(|u| u.email == email && Some(u.id) != except)
}

fn matches(filter: &InternshipFilter, i: &Internship) -> bool {
    if filter.status.is_some_and(|s| s != i.status) {
        return false;
    }
    if filter.category.is_some_and(|c| c != i.category) {
        return false;
    }
    if let Some(location) = filter.location.as_deref().filter(|l| !l.trim().is_empty()) {
        if !i
            .location
            .to_lowercase()
            .contains(&location.trim().to_lowercase())
        {
            return false;
        }
    }
    if !filter.job_types.is_empty() && !filter.job_types.iter().any(|t| i.job_type.contains(t)) {
        return false;
    }
    if filter.experience.is_some_and(|e| e != i.experience) {
        return false;
    }
    if filter.is_urgent.is_some_and(|u| u != i.is_urgent) {
        return false;
    }
    if filter.is_featured.is_some_and(|f| f != i.is_featured) {
        return false;
    }
    if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let haystack = format!(
            "{} {} {} {}",
            i.title,
            i.description,
            i.company,
            i.skills.join(" ")
        )
        .to_lowercase();
        if !search
            .split_whitespace()
            .all(|term| haystack.contains(&term.to_lowercase()))
        {
            return false;
        }
    }
    true
}

fn sort_internships(items: &mut [Internship], sort: InternshipSort) {
    let newest = |a: &Internship, b: &Internship| {
        b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))
    };
    match sort {
        InternshipSort::Newest => items.sort_by(newest),
        InternshipSort::Salary => items.sort_by(|a, b| b.salary.cmp(&a.salary).then(newest(a, b))),
        InternshipSort::Title => items.sort_by(|a, b| a.title.cmp(&b.title).then(newest(a, b))),
        InternshipSort::Company => {
            items.sort_by(|a, b| a.company.cmp(&b.company).then(newest(a, b)))
        }
        InternshipSort::Deadline => items.sort_by(|a, b| {
            a.application_deadline
                .cmp(&b.application_deadline)
                .then(newest(a, b))
        }),
    }
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Vec<T> {
    let skip = super::page_offset(page, limit) as usize;
    items.into_iter().skip(skip).take(limit as usize).collect()
}

impl UserExt for MemoryDb {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
    ) -> StoreResult<Option<User>> {
        let state = self.state.lock().unwrap();
        let found = match (user_id, email) {
            (Some(id), _) => state.users.iter().find(|u| u.id == id),
            (None, Some(email)) => {
                let email = email.to_lowercase();
                state.users.iter().find(|u| u.email == email)
            }
            (None, None) => None,
        };
        Ok(found.cloned())
    }

    async fn get_users(
        &self,
        role: Option<UserRole>,
        page: u32,
        limit: u32,
    ) -> StoreResult<Vec<User>> {
        let state = self.state.lock().unwrap();
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(users, page, limit))
    }

    async fn get_user_count(&self, role: Option<UserRole>) -> StoreResult<i64> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .filter(|u| role.is_none_or(|r| u.role == r))
            .count() as i64)
    }

    async fn save_user(&self, new_user: &NewUser) -> StoreResult<User> {
        let mut state = self.state.lock().unwrap();
        let email = new_user.email.to_lowercase();
        if email_taken(&state, &email, None) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        let now = state.stamp();
        let user = blank_user(
            &new_user.name,
            &email,
            &new_user.password_hash,
            new_user.role,
            now,
        );
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        patch: &ProfilePatch,
    ) -> StoreResult<User> {
        let mut state = self.state.lock().unwrap();
        if let Some(email) = &patch.email {
            if email_taken(&state, &email.to_lowercase(), Some(user_id)) {
                return Err(StoreError::Conflict("users_email_key".to_string()));
            }
        }
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotFound)?;

        let p = patch.clone();
        if let Some(v) = p.name {
            user.name = v;
        }
        if let Some(v) = p.email {
            user.email = v.to_lowercase();
        }
        if let Some(v) = p.location {
            user.location = v;
        }
        if let Some(v) = p.phone {
            user.phone = v;
        }
        if let Some(v) = p.avatar {
            user.avatar = v;
        }
        if let Some(v) = p.university {
            user.university = v;
        }
        if p.study_level.is_some() {
            user.study_level = p.study_level;
        }
        if let Some(v) = p.study_field {
            user.study_field = v;
        }
        if p.graduation_year.is_some() {
            user.graduation_year = p.graduation_year;
        }
        if let Some(v) = p.company_name {
            user.company_name = v;
        }
        if p.company_size.is_some() {
            user.company_size = p.company_size;
        }
        if let Some(v) = p.industry {
            user.industry = v;
        }
        if let Some(v) = p.website {
            user.website = v;
        }
        if let Some(v) = p.description {
            user.description = v;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_user_admin(
        &self,
        user_id: Uuid,
        patch: &AdminUserPatch,
    ) -> StoreResult<User> {
        let mut state = self.state.lock().unwrap();
        if let Some(email) = &patch.email {
            if email_taken(&state, &email.to_lowercase(), Some(user_id)) {
                return Err(StoreError::Conflict("users_email_key".to_string()));
            }
        }
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(v) = &patch.name {
            user.name = v.clone();
        }
        if let Some(v) = &patch.email {
            user.email = v.to_lowercase();
        }
        if let Some(v) = patch.role {
            user.role = v;
        }
        if let Some(v) = patch.is_active {
            user.is_active = v;
        }
        if let Some(v) = patch.is_verified {
            user.is_verified = v;
        }
        Ok(user.clone())
    }

    async fn update_user_password(&self, user_id: Uuid, password_hash: &str) -> StoreResult<User> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StoreError::NotFound)?;
        user.password = password_hash.to_string();
        Ok(user.clone())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.last_login = Some(at);
            user.login_attempts = 0;
            user.lock_until = None;
        }
        Ok(())
    }

    async fn record_failed_login(
        &self,
        user_id: Uuid,
        lock_until: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            match lock_until {
                Some(until) => {
                    user.login_attempts = 0;
                    user.lock_until = Some(until);
                }
                None => user.login_attempts += 1,
            }
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        digest: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.id == user_id) {
            user.password_reset_token = digest.map(str::to_string);
            user.password_reset_expires = expires_at;
        }
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
        password_hash: &str,
    ) -> StoreResult<Option<User>> {
        let mut state = self.state.lock().unwrap();
        let user = state.users.iter_mut().find(|u| {
            u.password_reset_token.as_deref() == Some(digest)
                && u.password_reset_expires.is_some_and(|exp| exp > now)
        });
        Ok(user.map(|user| {
            user.password = password_hash.to_string();
            user.password_reset_token = None;
            user.password_reset_expires = None;
            user.login_attempts = 0;
            user.lock_until = None;
            user.clone()
        }))
    }

    async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.state.lock().unwrap();
        let mut cleared = 0;
        for user in state.users.iter_mut() {
            if user.password_reset_expires.is_some_and(|exp| exp <= now) {
                user.password_reset_token = None;
                user.password_reset_expires = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn delete_user(&self, user_id: Uuid) -> StoreResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.users.iter().position(|u| u.id == user_id) else {
            return Err(StoreError::NotFound);
        };
        let removed = state.users.remove(pos);

        let owned: Vec<Uuid> = state
            .internships
            .iter()
            .filter(|i| i.posted_by == user_id)
            .map(|i| i.id)
            .collect();
        let (gone, kept): (Vec<Application>, Vec<Application>) =
            std::mem::take(&mut state.applications)
                .into_iter()
                .partition(|a| a.student_id == user_id || owned.contains(&a.internship_id));
        state.applications = kept;

        for application in gone.iter().filter(|a| a.student_id == user_id) {
            if let Some(internship) = state
                .internships
                .iter_mut()
                .find(|i| i.id == application.internship_id)
            {
                internship.applications_count = (internship.applications_count - 1).max(0);
            }
        }

        let mut locators: Vec<String> = gone.into_iter().map(|a| a.resume).collect();
        for internship in state.internships.iter().filter(|i| i.posted_by == user_id) {
            if !internship.logo.is_empty() {
                locators.push(internship.logo.clone());
            }
        }
        state.internships.retain(|i| i.posted_by != user_id);
        if !removed.avatar.is_empty() {
            locators.push(removed.avatar);
        }
        Ok(locators)
    }
}

impl InternshipExt for MemoryDb {
    async fn get_internship(&self, internship_id: Uuid) -> StoreResult<Option<Internship>> {
        Ok(self.internship(internship_id))
    }

    async fn record_internship_view(
        &self,
        internship_id: Uuid,
    ) -> StoreResult<Option<Internship>> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .internships
            .iter_mut()
            .find(|i| i.id == internship_id)
            .map(|i| {
                i.views += 1;
                i.clone()
            }))
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> StoreResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .internships
            .iter()
            .any(|i| i.slug == slug && Some(i.id) != except))
    }

    async fn create_internship(&self, new_internship: &NewInternship) -> StoreResult<Internship> {
        let mut state = self.state.lock().unwrap();
        if state.internships.iter().any(|i| i.slug == new_internship.slug) {
            return Err(StoreError::Conflict("internships_slug_key".to_string()));
        }
        let now = state.stamp();
        let internship = from_draft(new_internship, now);
        state.internships.push(internship.clone());
        Ok(internship)
    }

    async fn update_internship(&self, internship: &Internship) -> StoreResult<Internship> {
        let mut state = self.state.lock().unwrap();
        if state
            .internships
            .iter()
            .any(|i| i.slug == internship.slug && i.id != internship.id)
        {
            return Err(StoreError::Conflict("internships_slug_key".to_string()));
        }
        let stored = state
            .internships
            .iter_mut()
            .find(|i| i.id == internship.id)
            .ok_or(StoreError::NotFound)?;

        let views = stored.views;
        let applications_count = stored.applications_count;
        let created_at = stored.created_at;
        *stored = internship.clone();
        stored.views = views;
        stored.applications_count = applications_count;
        stored.created_at = created_at;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete_internship(
        &self,
        internship_id: Uuid,
        policy: DeletionPolicy,
    ) -> StoreResult<DeleteOutcome> {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.internships.iter().position(|i| i.id == internship_id) else {
            return Ok(DeleteOutcome::Missing);
        };
        let has_applications = state
            .applications
            .iter()
            .any(|a| a.internship_id == internship_id);
        if has_applications && policy == DeletionPolicy::Block {
            return Ok(DeleteOutcome::HasApplications);
        }

        let internship = state.internships.remove(pos);
        let (gone, kept): (Vec<Application>, Vec<Application>) =
            std::mem::take(&mut state.applications)
                .into_iter()
                .partition(|a| a.internship_id == internship_id);
        state.applications = kept;

        let mut blobs: Vec<String> = gone.into_iter().map(|a| a.resume).collect();
        if !internship.logo.is_empty() {
            blobs.push(internship.logo);
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
        let state = self.state.lock().unwrap();
        let mut found: Vec<Internship> = state
            .internships
            .iter()
            .filter(|i| matches(filter, i))
            .cloned()
            .collect();
        let total = found.len() as i64;
        sort_internships(&mut found, sort);
        Ok((paginate(found, page, limit), total))
    }

    async fn featured_internships(&self, limit: i64) -> StoreResult<Vec<Internship>> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<Internship> = state
            .internships
            .iter()
            .filter(|i| {
                i.status == InternshipStatus::Active
                    && (i.is_featured || i.is_urgent || i.views >= POPULAR_VIEWS)
            })
            .cloned()
            .collect();
        sort_internships(&mut found, InternshipSort::Newest);
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn recent_internships(&self, limit: i64) -> StoreResult<Vec<Internship>> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<Internship> = state
            .internships
            .iter()
            .filter(|i| i.status == InternshipStatus::Active)
            .cloned()
            .collect();
        sort_internships(&mut found, InternshipSort::Newest);
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn internships_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<Internship>> {
        let state = self.state.lock().unwrap();
        let mut found: Vec<Internship> = state
            .internships
            .iter()
            .filter(|i| i.posted_by == owner_id)
            .cloned()
            .collect();
        sort_internships(&mut found, InternshipSort::Newest);
        Ok(found)
    }

    async fn reconcile_application_counts(&self) -> StoreResult<u64> {
        let mut state = self.state.lock().unwrap();
        let State {
            internships,
            applications,
            ..
        } = &mut *state;
        let mut repaired = 0;
        for internship in internships.iter_mut() {
            let actual = applications
                .iter()
                .filter(|a| a.internship_id == internship.id)
                .count() as i32;
            if internship.applications_count != actual {
                internship.applications_count = actual;
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}

impl ApplicationExt for MemoryDb {
    async fn get_application(&self, application_id: Uuid) -> StoreResult<Option<Application>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .applications
            .iter()
            .find(|a| a.id == application_id)
            .cloned())
    }

    async fn find_application(
        &self,
        internship_id: Uuid,
        student_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .applications
            .iter()
            .find(|a| a.internship_id == internship_id && a.student_id == student_id)
            .cloned())
    }

    async fn submit_application(
        &self,
        new_application: &NewApplication,
    ) -> StoreResult<SubmitOutcome> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state
            .internships
            .iter()
            .position(|i| i.id == new_application.internship_id)
        else {
            return Ok(SubmitOutcome::InternshipMissing);
        };
        if !state.internships[index].has_capacity() {
            return Ok(SubmitOutcome::CapacityReached);
        }
        if state.applications.iter().any(|a| {
            a.internship_id == new_application.internship_id
                && a.student_id == new_application.student_id
        }) {
            return Ok(SubmitOutcome::AlreadyApplied);
        }

        let now = state.stamp();
        let application = Application {
            id: Uuid::new_v4(),
            internship_id: new_application.internship_id,
            student_id: new_application.student_id,
            resume: new_application.resume.clone(),
            cover_letter: new_application.cover_letter.clone(),
            portfolio: new_application.portfolio.clone(),
            status: ApplicationStatus::Pending,
            rejection_reason: String::new(),
            interview_date: None,
            interview_notes: String::new(),
            rating: None,
            student_notified: false,
            company_notified: false,
            created_at: now,
            updated_at: now,
        };
        state.internships[index].applications_count += 1;
        state.applications.push(application.clone());
        Ok(SubmitOutcome::Created(application))
    }

    async fn update_application_decision(
        &self,
        application_id: Uuid,
        update: &DecisionUpdate,
    ) -> StoreResult<Application> {
        let mut state = self.state.lock().unwrap();
        let application = state
            .applications
            .iter_mut()
            .find(|a| a.id == application_id)
            .ok_or(StoreError::NotFound)?;
        application.status = update.status;
        if let Some(v) = &update.rejection_reason {
            application.rejection_reason = v.clone();
        }
        if update.interview_date.is_some() {
            application.interview_date = update.interview_date;
        }
        if let Some(v) = &update.interview_notes {
            application.interview_notes = v.clone();
        }
        if update.rating.is_some() {
            application.rating = update.rating;
        }
        application.updated_at = Utc::now();
        Ok(application.clone())
    }

    async fn withdraw_application(
        &self,
        application_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        let mut state = self.state.lock().unwrap();
        let Some(index) = state
            .applications
            .iter()
            .position(|a| a.id == application_id)
        else {
            return Ok(None);
        };
        let removed = state.applications.remove(index);
        if let Some(internship) = state
            .internships
            .iter_mut()
            .find(|i| i.id == removed.internship_id)
        {
            internship.applications_count = (internship.applications_count - 1).max(0);
        }
        Ok(Some(removed))
    }

    async fn applications_by_student(
        &self,
        student_id: Uuid,
    ) -> StoreResult<Vec<StudentApplication>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<StudentApplication> = state
            .applications
            .iter()
            .filter(|a| a.student_id == student_id)
            .filter_map(|a| {
                let i = state.internships.iter().find(|i| i.id == a.internship_id)?;
                Some(StudentApplication {
                    application: a.clone(),
                    internship: InternshipSummary {
                        id: i.id,
                        title: i.title.clone(),
                        company: i.company.clone(),
                        location: i.location.clone(),
                        salary: i.salary.clone(),
                        status: i.status,
                        application_deadline: i.application_deadline,
                    },
                })
            })
            .collect();
        rows.sort_by(|a, b| b.application.created_at.cmp(&a.application.created_at));
        Ok(rows)
    }

    async fn applications_by_internship(
        &self,
        internship_id: Uuid,
    ) -> StoreResult<Vec<ReceivedApplication>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<ReceivedApplication> = state
            .applications
            .iter()
            .filter(|a| a.internship_id == internship_id)
            .filter_map(|a| {
                let u = state.users.iter().find(|u| u.id == a.student_id)?;
                Some(ReceivedApplication {
                    application: a.clone(),
                    student: ApplicantSummary {
                        id: u.id,
                        name: u.name.clone(),
                        email: u.email.clone(),
                        avatar: u.avatar.clone(),
                        university: u.university.clone(),
                        study_level: u.study_level,
                        study_field: u.study_field.clone(),
                        graduation_year: u.graduation_year,
                    },
                })
            })
            .collect();
        rows.sort_by(|a, b| b.application.created_at.cmp(&a.application.created_at));
        Ok(rows)
    }

    async fn count_applications_by_status(
        &self,
        scope: StatsScope,
    ) -> StoreResult<Vec<(ApplicationStatus, i64)>> {
        let state = self.state.lock().unwrap();
        let mut counts: Vec<(ApplicationStatus, i64)> = Vec::new();
        for application in &state.applications {
            let in_scope = match scope {
                StatsScope::Student(id) => application.student_id == id,
                StatsScope::Company(id) => state
                    .internships
                    .iter()
                    .any(|i| i.id == application.internship_id && i.posted_by == id),
                StatsScope::Global => true,
            };
            if !in_scope {
                continue;
            }
            match counts.iter_mut().find(|(s, _)| *s == application.status) {
                Some((_, n)) => *n += 1,
                None => counts.push((application.status, 1)),
            }
        }
        Ok(counts)
    }
}

/// Blob store that keeps locators in memory and can be told to fail.
#[derive(Default)]
pub struct MemoryBlobs {
    stored: Mutex<Vec<String>>,
    fail_puts: bool,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        MemoryBlobs::default()
    }

    pub fn failing() -> Self {
        MemoryBlobs {
            stored: Mutex::new(Vec::new()),
            fail_puts: true,
        }
    }

    pub fn stored(&self) -> Vec<String> {
        self.stored.lock().unwrap().clone()
    }
}

impl BlobStore for MemoryBlobs {
    async fn put(&self, upload: &FileUpload) -> std::io::Result<String> {
        if self.fail_puts {
            return Err(std::io::Error::other("disk full"));
        }
        let locator = format!(
            "uploads/{}-{}.{}",
            upload.kind.field_name(),
            Uuid::new_v4(),
            upload.extension
        );
        self.stored.lock().unwrap().push(locator.clone());
        Ok(locator)
    }

    async fn remove(&self, locator: &str) -> std::io::Result<()> {
        self.stored.lock().unwrap().retain(|l| l != locator);
        Ok(())
    }
}
